//! Connections between layers.
//!
//! For every driving node (the target of a convergent connection, the source of a divergent
//! one), the candidates are looked up in a grid index of the other layer, filtered by the mask,
//! then accepted with the probability given by the kernel. Weights and delays are evaluated at the
//! distance between both nodes. All draws are made from a stream owned by the driving node, so
//! the connections only depend on the creation order of the nodes.
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::index::GridIndex;
use super::mask::MaskSpec;
use super::parameter::DistanceParameter;
use super::Layer;
use crate::connection::SynapseType;
use crate::error::KernelError;
use crate::random::KernelRng;
use crate::registry::NodeId;

/// Minimum number of driving nodes for the connections to be drawn in parallel.
const MIN_DRIVERS_PAR: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Each target picks its sources inside the mask around itself.
    Convergent,
    /// Each source picks its targets inside the mask around itself.
    Divergent,
}

fn default_one() -> DistanceParameter {
    DistanceParameter::from(1.0)
}

fn default_true() -> bool {
    true
}

/// Specification of a connection between two layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConnSpec {
    pub connection_type: ConnectionType,
    /// Region around the driving node where candidates are looked up; everywhere if `None`.
    #[serde(default)]
    pub mask: Option<MaskSpec>,
    /// Connection probability as a function of distance; always connect if `None`.
    #[serde(default)]
    pub kernel: Option<DistanceParameter>,
    #[serde(default = "default_one")]
    pub weights: DistanceParameter,
    #[serde(default = "default_one")]
    pub delays: DistanceParameter,
    #[serde(default)]
    pub synapse: SynapseType,
    #[serde(default)]
    pub receptor: usize,
    #[serde(default = "default_true")]
    pub allow_autapses: bool,
    /// Only connect from source nodes of this model.
    #[serde(default)]
    pub source_model: Option<String>,
    /// Only connect to target nodes of this model.
    #[serde(default)]
    pub target_model: Option<String>,
}

impl LayerConnSpec {
    pub fn new(connection_type: ConnectionType) -> Self {
        LayerConnSpec {
            connection_type,
            mask: None,
            kernel: None,
            weights: default_one(),
            delays: default_one(),
            synapse: SynapseType::default(),
            receptor: 0,
            allow_autapses: true,
            source_model: None,
            target_model: None,
        }
    }

    pub fn with_mask(mut self, mask: MaskSpec) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_kernel(mut self, kernel: DistanceParameter) -> Self {
        self.kernel = Some(kernel);
        self
    }

    pub fn with_weights(mut self, weights: impl Into<DistanceParameter>) -> Self {
        self.weights = weights.into();
        self
    }

    pub fn with_delays(mut self, delays: impl Into<DistanceParameter>) -> Self {
        self.delays = delays.into();
        self
    }

    pub fn with_synapse(mut self, synapse: SynapseType) -> Self {
        self.synapse = synapse;
        self
    }

    pub fn with_receptor(mut self, receptor: usize) -> Self {
        self.receptor = receptor;
        self
    }

    pub fn with_autapses(mut self, allow_autapses: bool) -> Self {
        self.allow_autapses = allow_autapses;
        self
    }

    pub fn with_source_model(mut self, model: &str) -> Self {
        self.source_model = Some(model.to_string());
        self
    }

    pub fn with_target_model(mut self, model: &str) -> Self {
        self.target_model = Some(model.to_string());
        self
    }

    /// Check the connection parameters against the layers they connect.
    pub fn validate(&self, source: &Layer, target: &Layer) -> Result<(), KernelError> {
        let dims = source.spec().dims();
        if dims != target.spec().dims() {
            return Err(KernelError::InvalidParameter(format!(
                "cannot connect a {}-D layer to a {}-D layer",
                dims,
                target.spec().dims()
            )));
        }
        if source.edge_wrap() && !source.same_geometry(target) {
            return Err(KernelError::InvalidParameter(
                "a layer with periodic boundaries can only be connected to a layer with the same extent and center"
                    .to_string(),
            ));
        }
        if let Some(mask) = &self.mask {
            mask.validate(dims)?;
        }
        if let Some(kernel) = &self.kernel {
            kernel.validate()?;
        }
        self.weights.validate()?;
        self.delays.validate()
    }
}

/// A connection drawn between two layers, not yet checked against the synapse type.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
    pub delay: f64,
}

/// Draw the connections from `source` to `target`.
///
/// `rng_of` returns the random stream of a driving node. The projections are ordered by driving
/// node, then by position of the candidate in its layer.
pub fn connect_layers<F>(
    source: &Layer,
    target: &Layer,
    spec: &LayerConnSpec,
    rng_of: F,
) -> Result<Vec<Projection>, KernelError>
where
    F: Fn(NodeId) -> KernelRng + Sync,
{
    spec.validate(source, target)?;

    let (drivers, candidates, driver_model, candidate_model) = match spec.connection_type {
        ConnectionType::Convergent => (target, source, &spec.target_model, &spec.source_model),
        ConnectionType::Divergent => (source, target, &spec.source_model, &spec.target_model),
    };
    let reach = spec.mask.as_ref().map_or(f64::INFINITY, MaskSpec::reach);
    let index = GridIndex::new(candidates, reach, source.edge_wrap());

    let draw = |i: usize| -> Vec<Projection> {
        if driver_model
            .as_ref()
            .is_some_and(|model| &drivers.models()[i] != model)
        {
            return vec![];
        }
        let driver = drivers.nodes()[i];
        let position = drivers.positions()[i];
        let mut rng = rng_of(driver);

        let mut projections = vec![];
        for j in index.candidates(&position, reach) {
            if candidate_model
                .as_ref()
                .is_some_and(|model| &candidates.models()[j] != model)
            {
                continue;
            }
            let candidate = candidates.nodes()[j];
            if !spec.allow_autapses && candidate == driver {
                continue;
            }
            let displacement = source.displacement(&position, &candidates.positions()[j]);
            if let Some(mask) = &spec.mask {
                if !mask.contains(&displacement) {
                    continue;
                }
            }
            let distance = displacement.norm();
            if let Some(kernel) = &spec.kernel {
                let p = kernel.value(distance, &mut rng);
                if rng.gen::<f64>() >= p {
                    continue;
                }
            }
            let weight = spec.weights.value(distance, &mut rng);
            let delay = spec.delays.value(distance, &mut rng);
            let (from, to) = match spec.connection_type {
                ConnectionType::Convergent => (candidate, driver),
                ConnectionType::Divergent => (driver, candidate),
            };
            projections.push(Projection {
                source: from,
                target: to,
                weight,
                delay,
            });
        }
        projections
    };

    let projections: Vec<Vec<Projection>> = if drivers.len() >= MIN_DRIVERS_PAR {
        (0..drivers.len()).into_par_iter().map(draw).collect()
    } else {
        (0..drivers.len()).map(draw).collect()
    };
    let projections: Vec<Projection> = projections.into_iter().flatten().collect();
    log::debug!(
        "Drew {} connections from layer {} to layer {}",
        projections.len(),
        source.id().0,
        target.id().0
    );
    Ok(projections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RngType;
    use crate::topology::{LayerId, LayerSpec, Mask};
    use approx::assert_relative_eq;

    fn layer(id: usize, first: u64, spec: LayerSpec) -> Layer {
        let n = spec.placements().len() as u64;
        Layer::new(LayerId(id), spec, (first..first + n).map(NodeId).collect())
    }

    fn rng_of(id: NodeId) -> KernelRng {
        KernelRng::new(RngType::ChaCha8, 12345, id.0)
    }

    fn pairs(projections: &[Projection]) -> Vec<(u64, u64)> {
        projections.iter().map(|p| (p.source.0, p.target.0)).collect()
    }

    #[test]
    fn test_all_to_all_without_mask() {
        let a = layer(0, 1, LayerSpec::grid(2, 2).with_element("iaf_neuron", 1));
        let b = layer(1, 5, LayerSpec::grid(1, 2).with_element("iaf_neuron", 1));
        let spec = LayerConnSpec::new(ConnectionType::Convergent);
        let projections = connect_layers(&a, &b, &spec, rng_of).unwrap();
        assert_eq!(
            pairs(&projections),
            vec![(1, 5), (2, 5), (3, 5), (4, 5), (1, 6), (2, 6), (3, 6), (4, 6)]
        );
    }

    #[test]
    fn test_circular_mask_nearest_neighbors() {
        let grid = layer(
            0,
            1,
            LayerSpec::grid(5, 5)
                .with_element("iaf_neuron", 1)
                .with_edge_wrap(true),
        );
        let spec = LayerConnSpec::new(ConnectionType::Divergent)
            .with_mask(MaskSpec::new(Mask::Circular { radius: 0.21 }))
            .with_autapses(false)
            .with_weights(DistanceParameter::Linear { a: -1.0, c: 1.0 });
        let projections = connect_layers(&grid, &grid, &spec, rng_of).unwrap();
        // four neighbors per node on a torus
        assert_eq!(projections.len(), 4 * 25);
        for p in projections.iter() {
            assert_relative_eq!(p.weight, 0.8, epsilon = 1e-9);
            assert_relative_eq!(p.delay, 1.0);
        }
        // the corner node reaches across the edges
        let corner: Vec<u64> = projections
            .iter()
            .filter(|p| p.source == NodeId(1))
            .map(|p| p.target.0)
            .collect();
        assert_eq!(corner, vec![2, 5, 6, 21]);
    }

    #[test]
    fn test_no_wrap_at_edges() {
        let grid = layer(0, 1, LayerSpec::grid(5, 5).with_element("iaf_neuron", 1));
        let spec = LayerConnSpec::new(ConnectionType::Divergent)
            .with_mask(MaskSpec::new(Mask::Circular { radius: 0.21 }))
            .with_autapses(false);
        let projections = connect_layers(&grid, &grid, &spec, rng_of).unwrap();
        // 4 corners with 2 neighbors, 12 edge nodes with 3, 9 inner nodes with 4
        assert_eq!(projections.len(), 4 * 2 + 12 * 3 + 9 * 4);
    }

    #[test]
    fn test_kernel_is_reproducible() {
        let grid = layer(0, 1, LayerSpec::grid(10, 10).with_element("iaf_neuron", 1));
        let spec = LayerConnSpec::new(ConnectionType::Convergent)
            .with_kernel(DistanceParameter::from(0.3))
            .with_weights(DistanceParameter::Uniform { min: 0.5, max: 1.5 });
        let first = connect_layers(&grid, &grid, &spec, rng_of).unwrap();
        let second = connect_layers(&grid, &grid, &spec, rng_of).unwrap();
        assert_eq!(first, second);
        assert!(first.len() > 2000 && first.len() < 4000);
        assert!(first.iter().all(|p| (0.5..1.5).contains(&p.weight)));
    }

    #[test]
    fn test_model_filter() {
        let a = layer(
            0,
            1,
            LayerSpec::grid(1, 2)
                .with_element("iaf_neuron", 1)
                .with_element("parrot_neuron", 1),
        );
        let spec = LayerConnSpec::new(ConnectionType::Convergent)
            .with_source_model("parrot_neuron")
            .with_target_model("iaf_neuron");
        let projections = connect_layers(&a, &a, &spec, rng_of).unwrap();
        assert_eq!(pairs(&projections), vec![(3, 1), (4, 1), (3, 2), (4, 2)]);
    }

    #[test]
    fn test_mismatched_geometry() {
        let a = layer(
            0,
            1,
            LayerSpec::grid(2, 2)
                .with_element("iaf_neuron", 1)
                .with_edge_wrap(true),
        );
        let b = layer(1, 5, LayerSpec::grid(2, 2).with_element("iaf_neuron", 1).with_extent(2.0, 2.0));
        let spec = LayerConnSpec::new(ConnectionType::Convergent);
        assert!(connect_layers(&a, &b, &spec, rng_of).is_err());
        let spec = LayerConnSpec::new(ConnectionType::Convergent)
            .with_mask(MaskSpec::new(Mask::Spherical { radius: 1.0 }));
        assert!(connect_layers(&b, &b, &spec, rng_of).is_err());
    }
}
