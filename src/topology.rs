//! Spatially structured networks.
//!
//! A layer places nodes on a regular 2-D (or 3-D) grid covering a rectangular extent around a
//! center. Each grid point carries the same elements, i.e., a number of nodes of given models.
//! Layers can be connected with masks selecting candidate partners around each node and distance
//! dependent parameters giving connection probabilities, weights and delays.
//!
//! With periodic boundary conditions (`edge_wrap`), displacements are measured along the
//! shortest periodic path: each component `d` of a displacement in a layer of extent `e` is
//! reduced to `d - e * round(d / e)`, so that `|d| <= e / 2`.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::registry::NodeId;
use crate::status::Status;

pub mod connect;
pub mod index;
pub mod mask;
pub mod parameter;

pub use connect::{ConnectionType, LayerConnSpec};
pub use mask::{Mask, MaskSpec};
pub use parameter::DistanceParameter;

/// Handle of a layer, i.e., its creation index since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub usize);

/// Specification of a grid layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub rows: usize,
    pub columns: usize,
    /// Number of grid points along z for 3-D layers.
    pub depth: Option<usize>,
    /// Size of the layer along each axis; the z component is ignored for 2-D layers.
    pub extent: Vector3<f64>,
    pub center: Vector3<f64>,
    /// Models placed at each grid point, with their multiplicity.
    pub elements: Vec<(String, usize)>,
    pub edge_wrap: bool,
    /// Parameters applied to all nodes of the layer.
    pub params: Status,
}

impl LayerSpec {
    /// A `rows` x `columns` grid with extent 1 x 1 centered at the origin.
    pub fn grid(rows: usize, columns: usize) -> Self {
        LayerSpec {
            rows,
            columns,
            depth: None,
            extent: Vector3::new(1.0, 1.0, 1.0),
            center: Vector3::zeros(),
            elements: vec![],
            edge_wrap: false,
            params: Status::new(),
        }
    }

    /// Add `multiplicity` nodes of the given model at each grid point.
    pub fn with_element(mut self, model: &str, multiplicity: usize) -> Self {
        self.elements.push((model.to_string(), multiplicity));
        self
    }

    pub fn with_extent(mut self, x: f64, y: f64) -> Self {
        self.extent.x = x;
        self.extent.y = y;
        self
    }

    pub fn with_center(mut self, x: f64, y: f64) -> Self {
        self.center.x = x;
        self.center.y = y;
        self
    }

    /// Make the layer 3-D, with `depth` grid points spread over `extent` along z around `center`.
    pub fn with_depth(mut self, depth: usize, extent: f64, center: f64) -> Self {
        self.depth = Some(depth);
        self.extent.z = extent;
        self.center.z = center;
        self
    }

    pub fn with_edge_wrap(mut self, edge_wrap: bool) -> Self {
        self.edge_wrap = edge_wrap;
        self
    }

    pub fn with_params(mut self, params: Status) -> Self {
        self.params = params;
        self
    }

    /// Returns the number of spatial dimensions.
    pub fn dims(&self) -> usize {
        if self.depth.is_some() {
            3
        } else {
            2
        }
    }

    /// Check the layer parameters.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.rows == 0 || self.columns == 0 || self.depth == Some(0) {
            return Err(KernelError::InvalidParameter(format!(
                "layer grid must have at least one point along each axis, got {} x {} x {}",
                self.rows,
                self.columns,
                self.depth.unwrap_or(1)
            )));
        }
        let extent_ok = self.extent.iter().take(self.dims()).all(|e| e.is_finite() && *e > 0.0);
        if !extent_ok || !self.center.iter().all(|c| c.is_finite()) {
            return Err(KernelError::InvalidParameter(format!(
                "layer extent must be positive and center finite, got {:?} around {:?}",
                self.extent.as_slice(),
                self.center.as_slice()
            )));
        }
        if self.elements.is_empty() || self.elements.iter().any(|(_, n)| *n == 0) {
            return Err(KernelError::InvalidParameter(
                "layer elements must be non-empty with positive multiplicities".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the models and positions of all nodes of the layer, in creation order:
    /// by element, copy, column, row and depth.
    pub fn placements(&self) -> Vec<(&str, Vector3<f64>)> {
        let depth = self.depth.unwrap_or(1);
        let dx = self.extent.x / self.columns as f64;
        let dy = self.extent.y / self.rows as f64;
        let dz = self.extent.z / depth as f64;
        let mut placements = vec![];
        for (model, multiplicity) in self.elements.iter() {
            for _ in 0..*multiplicity {
                for c in 0..self.columns {
                    for r in 0..self.rows {
                        for k in 0..depth {
                            let x = self.center.x - self.extent.x / 2.0 + (c as f64 + 0.5) * dx;
                            let y = self.center.y + self.extent.y / 2.0 - (r as f64 + 0.5) * dy;
                            let z = if self.depth.is_some() {
                                self.center.z - self.extent.z / 2.0 + (k as f64 + 0.5) * dz
                            } else {
                                0.0
                            };
                            placements.push((model.as_str(), Vector3::new(x, y, z)));
                        }
                    }
                }
            }
        }
        placements
    }
}

/// A layer instantiated in a kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    id: LayerId,
    spec: LayerSpec,
    /// Handles of the nodes, contiguous and in creation order.
    nodes: Vec<NodeId>,
    models: Vec<String>,
    positions: Vec<Vector3<f64>>,
}

impl Layer {
    pub fn new(id: LayerId, spec: LayerSpec, nodes: Vec<NodeId>) -> Self {
        let (models, positions) = spec
            .placements()
            .into_iter()
            .map(|(model, position)| (model.to_string(), position))
            .unzip();
        Layer {
            id,
            spec,
            nodes,
            models,
            positions,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_wrap(&self) -> bool {
        self.spec.edge_wrap
    }

    /// Returns the index of a node in the layer, if it belongs to the layer.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let first = self.nodes.first()?;
        let index = id.0.checked_sub(first.0)? as usize;
        (index < self.nodes.len()).then_some(index)
    }

    /// Returns the position of a node of the layer.
    pub fn position(&self, id: NodeId) -> Result<Vector3<f64>, KernelError> {
        self.index_of(id)
            .map(|i| self.positions[i])
            .ok_or_else(|| {
                KernelError::InvalidParameter(format!(
                    "node {} does not belong to layer {}",
                    id, self.id.0
                ))
            })
    }

    /// Returns the displacement from `from` to `to`, along the shortest periodic path if the layer
    /// wraps around its edges.
    pub fn displacement(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> Vector3<f64> {
        let mut d = to - from;
        if self.spec.edge_wrap {
            for i in 0..self.spec.dims() {
                let e = self.spec.extent[i];
                d[i] -= e * (d[i] / e).round();
            }
        }
        d
    }

    /// Returns true if both layers cover the same region.
    pub fn same_geometry(&self, other: &Layer) -> bool {
        self.spec.dims() == other.spec.dims()
            && self.spec.extent == other.spec.extent
            && self.spec.center == other.spec.center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn layer(spec: LayerSpec) -> Layer {
        let n = spec.placements().len() as u64;
        Layer::new(LayerId(0), spec, (1..=n).map(NodeId).collect())
    }

    #[test]
    fn test_positions() {
        let spec = LayerSpec::grid(2, 4).with_element("iaf_neuron", 1);
        let layer = layer(spec);
        assert_eq!(layer.len(), 8);
        // column-major order, starting at the upper left corner
        assert_relative_eq!(layer.positions()[0], Vector3::new(-0.375, 0.25, 0.0));
        assert_relative_eq!(layer.positions()[1], Vector3::new(-0.375, -0.25, 0.0));
        assert_relative_eq!(layer.positions()[2], Vector3::new(-0.125, 0.25, 0.0));
        assert_relative_eq!(layer.positions()[7], Vector3::new(0.375, -0.25, 0.0));
    }

    #[test]
    fn test_elements_and_center() {
        let spec = LayerSpec::grid(1, 2)
            .with_element("iaf_neuron", 2)
            .with_element("parrot_neuron", 1)
            .with_extent(2.0, 1.0)
            .with_center(1.0, 1.0);
        let layer = layer(spec);
        assert_eq!(layer.len(), 6);
        assert_eq!(layer.models()[3], "iaf_neuron");
        assert_eq!(layer.models()[4], "parrot_neuron");
        assert_relative_eq!(layer.positions()[4], Vector3::new(0.5, 1.0, 0.0));
        assert_relative_eq!(layer.position(NodeId(2)).unwrap(), Vector3::new(1.5, 1.0, 0.0));
        assert!(layer.position(NodeId(7)).is_err());
    }

    #[test]
    fn test_3d_positions() {
        let spec = LayerSpec::grid(1, 1)
            .with_depth(4, 2.0, 0.0)
            .with_element("iaf_neuron", 1);
        let layer = layer(spec);
        let z: Vec<f64> = layer.positions().iter().map(|p| p.z).collect();
        assert_eq!(z, vec![-0.75, -0.25, 0.25, 0.75]);
    }

    #[test]
    fn test_wrapped_displacement() {
        let spec = LayerSpec::grid(10, 10)
            .with_element("iaf_neuron", 1)
            .with_edge_wrap(true);
        let layer = layer(spec);
        let left = Vector3::new(-0.45, 0.0, 0.0);
        let right = Vector3::new(0.45, 0.0, 0.0);
        assert_relative_eq!(layer.displacement(&left, &right), Vector3::new(-0.1, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(layer.displacement(&right, &left), Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-12);

        let spec = LayerSpec::grid(10, 10).with_element("iaf_neuron", 1);
        let layer = self::layer(spec);
        assert_relative_eq!(layer.displacement(&left, &right).norm(), 0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(LayerSpec::grid(0, 3).with_element("iaf_neuron", 1).validate().is_err());
        assert!(LayerSpec::grid(3, 3).validate().is_err());
        assert!(LayerSpec::grid(3, 3)
            .with_element("iaf_neuron", 1)
            .with_extent(-1.0, 1.0)
            .validate()
            .is_err());
        assert!(LayerSpec::grid(3, 3).with_element("iaf_neuron", 1).validate().is_ok());
    }
}
