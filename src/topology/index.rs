//! Grid-bucket spatial index.
//!
//! The extent of a layer is cut into cells at least as wide as the reach of a mask, so that all
//! candidates of a query lie in the cells overlapping the bounding box of the query ball. The
//! number of cells along each axis is bounded by the number of nodes.
use itertools::Itertools;
use nalgebra::Vector3;

use super::Layer;

#[derive(Debug, Clone)]
pub struct GridIndex {
    dims: usize,
    lower: Vector3<f64>,
    cell_width: Vector3<f64>,
    num_cells: [usize; 3],
    wrap: bool,
    /// Indices of the layer nodes in each cell, in ascending order.
    cells: Vec<Vec<usize>>,
}

impl GridIndex {
    /// Index the nodes of a layer for queries of the given reach, with or without periodic
    /// boundaries.
    pub fn new(layer: &Layer, reach: f64, wrap: bool) -> Self {
        let spec = layer.spec();
        let dims = spec.dims();
        let lower = spec.center - spec.extent / 2.0;
        // at most as many cells as nodes, however small the reach
        let mut max_cells = 1_usize;
        while max_cells.pow(dims as u32) < layer.len() {
            max_cells += 1;
        }
        let mut num_cells = [1; 3];
        let mut cell_width = Vector3::new(1.0, 1.0, 1.0);
        for i in 0..dims {
            let e = spec.extent[i];
            let n = if reach.is_finite() && reach > 0.0 {
                ((e / reach).floor().min(max_cells as f64) as usize).max(1)
            } else {
                1
            };
            num_cells[i] = n;
            cell_width[i] = e / n as f64;
        }

        let mut index = GridIndex {
            dims,
            lower,
            cell_width,
            num_cells,
            wrap,
            cells: vec![vec![]; num_cells.iter().product()],
        };
        for (i, position) in layer.positions().iter().enumerate() {
            let cell = index.cell_of(position);
            index.cells[cell].push(i);
        }
        index
    }

    fn coord(&self, x: f64, axis: usize) -> i64 {
        ((x - self.lower[axis]) / self.cell_width[axis]).floor() as i64
    }

    fn cell_of(&self, position: &Vector3<f64>) -> usize {
        let mut cell = 0;
        for i in (0..3).rev() {
            let n = self.num_cells[i];
            let c = if i < self.dims {
                self.coord(position[i], i).clamp(0, n as i64 - 1) as usize
            } else {
                0
            };
            cell = cell * n + c;
        }
        cell
    }

    /// Returns the range of cell coordinates along an axis overlapping `[x - reach, x + reach]`.
    fn axis_range(&self, x: f64, reach: f64, axis: usize) -> Vec<usize> {
        let n = self.num_cells[axis];
        if axis >= self.dims || !reach.is_finite() {
            return (0..n).collect();
        }
        let lo = self.coord(x - reach, axis);
        let hi = self.coord(x + reach, axis);
        if self.wrap {
            if hi - lo + 1 >= n as i64 {
                (0..n).collect()
            } else {
                (lo..=hi).map(|c| c.rem_euclid(n as i64) as usize).collect()
            }
        } else {
            let lo = lo.max(0);
            let hi = hi.min(n as i64 - 1);
            (lo..=hi).map(|c| c as usize).collect()
        }
    }

    /// Returns the indices of all nodes possibly within `reach` of the given position, sorted
    /// ascending and without duplicates.
    pub fn candidates(&self, position: &Vector3<f64>, reach: f64) -> Vec<usize> {
        let ranges: Vec<Vec<usize>> = (0..3)
            .map(|axis| self.axis_range(position[axis], reach, axis))
            .collect();
        ranges[2]
            .iter()
            .cartesian_product(ranges[1].iter())
            .cartesian_product(ranges[0].iter())
            .flat_map(|((&z, &y), &x)| {
                let cell = (z * self.num_cells[1] + y) * self.num_cells[0] + x;
                self.cells[cell].iter().copied()
            })
            .sorted_unstable()
            .dedup()
            .collect()
    }
}
