//! Uniform cell grid over a periodic cube.
//!
//! The box of side `L` is cut into `C × C × C` cubic cells. Each inserted
//! point is threaded onto a singly linked list rooted at its cell, so the
//! grid costs one `u32` per cell plus one `u32` per point regardless of how
//! the points cluster.
//!
//! Radius queries walk the query cell plus a torus-wrapped ring of
//! `ceil(r / cell_width) + 1` cells in every direction. The extra cell
//! absorbs rounding in `floor(x / cell_width)` for points on a cell
//! boundary when `L / C` is not exact in binary. Every point within `r`
//! of the query point (minimal-image distance) is guaranteed to be returned;
//! points outside `r` may be returned as well and must be filtered by the
//! caller with an exact distance check.
//!
//! ```
//! use halo_core::grid::Grid;
//!
//! let positions = [[1.0, 1.0, 1.0], [99.5, 1.0, 1.0], [50.0, 50.0, 50.0]];
//! let mut grid = Grid::new(10, 100.0, positions.len()).unwrap();
//! grid.insert(&positions).unwrap();
//!
//! let near = grid.candidates_within_radius(0, 2.0).unwrap();
//! assert!(near.contains(&1)); // wrapped across x = 0
//! assert!(!near.contains(&2));
//! ```

use crate::errors::{HaloError, HaloResult};
use crate::periodic::wrap_coordinate;
use crate::types::Position;

const EMPTY: u32 = u32::MAX;

/// Point buckets on a periodic `C³` lattice.
#[derive(Debug, Clone)]
pub struct Grid {
    cells_per_side: usize,
    box_width: f64,
    cell_width: f64,
    /// First point of each cell's list, or `EMPTY`.
    heads: Vec<u32>,
    /// Next point in the same cell, or `EMPTY`. Indexed by point.
    next: Vec<u32>,
    /// Linear cell index of each inserted point.
    point_cells: Vec<usize>,
}

impl Grid {
    /// Allocate an empty grid.
    ///
    /// `point_count` is a capacity hint for the points that will be inserted.
    ///
    /// # Errors
    /// [`HaloError::Precondition`] if `cells_per_side` is zero, the total
    /// cell count overflows, or `box_width` is not a positive finite number.
    pub fn new(cells_per_side: usize, box_width: f64, point_count: usize) -> HaloResult<Self> {
        if cells_per_side == 0 {
            return Err(HaloError::precondition(
                "Grid::new",
                "cells_per_side must be at least 1",
            ));
        }
        if !(box_width.is_finite() && box_width > 0.0) {
            return Err(HaloError::precondition(
                "Grid::new",
                format!("box width must be positive and finite, got {}", box_width),
            ));
        }
        let cell_count = cells_per_side
            .checked_mul(cells_per_side)
            .and_then(|n| n.checked_mul(cells_per_side))
            .ok_or_else(|| {
                HaloError::precondition(
                    "Grid::new",
                    format!("{}^3 cells overflows", cells_per_side),
                )
            })?;

        Ok(Self {
            cells_per_side,
            box_width,
            cell_width: box_width / cells_per_side as f64,
            heads: vec![EMPTY; cell_count],
            next: Vec::with_capacity(point_count),
            point_cells: Vec::with_capacity(point_count),
        })
    }

    /// Bucket `positions`. Point indices continue from any earlier insert,
    /// so a single insert of N points yields indices `0..N`.
    ///
    /// # Errors
    /// [`HaloError::Precondition`] if a coordinate is not finite or the
    /// grid would hold more than `u32::MAX - 1` points.
    pub fn insert(&mut self, positions: &[Position]) -> HaloResult<()> {
        let total = self.next.len() + positions.len();
        if total >= EMPTY as usize {
            return Err(HaloError::precondition(
                "Grid::insert",
                format!("{} points exceeds grid capacity", total),
            ));
        }

        for pos in positions {
            if !pos.iter().all(|c| c.is_finite()) {
                return Err(HaloError::precondition(
                    "Grid::insert",
                    format!("non-finite position {:?}", pos),
                ));
            }
            let cell = self.cell_of(pos);
            let idx = self.next.len() as u32;
            self.next.push(self.heads[cell]);
            self.heads[cell] = idx;
            self.point_cells.push(cell);
        }
        Ok(())
    }

    /// Every point that may lie within `radius` of inserted point
    /// `point_index`, including the point itself.
    ///
    /// # Errors
    /// [`HaloError::Precondition`] if `point_index` was never inserted or
    /// `radius` is negative or not finite.
    pub fn candidates_within_radius(
        &self,
        point_index: usize,
        radius: f64,
    ) -> HaloResult<Vec<usize>> {
        let mut out = Vec::new();
        self.for_each_candidate(point_index, radius, |j| out.push(j))?;
        Ok(out)
    }

    /// Callback form of [`candidates_within_radius`](Self::candidates_within_radius).
    pub fn for_each_candidate<F: FnMut(usize)>(
        &self,
        point_index: usize,
        radius: f64,
        f: F,
    ) -> HaloResult<()> {
        let cell = *self.point_cells.get(point_index).ok_or_else(|| {
            HaloError::precondition(
                "Grid::for_each_candidate",
                format!(
                    "point {} out of range ({} points inserted)",
                    point_index,
                    self.point_cells.len()
                ),
            )
        })?;
        let c = self.cells_per_side;
        let center = [cell % c, (cell / c) % c, cell / (c * c)];
        self.visit_ring(center, radius, f)
    }

    /// Number of cells searched in each direction for a query of `radius`.
    ///
    /// `ceil(radius / cell_width) + 1`, saturating once the ring covers the
    /// whole axis.
    pub fn ring_reach(&self, radius: f64) -> usize {
        let cells = (radius / self.cell_width).ceil() + 1.0;
        if cells >= self.cells_per_side as f64 {
            self.cells_per_side
        } else {
            cells as usize
        }
    }

    pub fn cells_per_side(&self) -> usize {
        self.cells_per_side
    }

    pub fn box_width(&self) -> f64 {
        self.box_width
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    /// Number of points inserted so far.
    pub fn len(&self) -> usize {
        self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    fn visit_ring<F: FnMut(usize)>(
        &self,
        center: [usize; 3],
        radius: f64,
        mut f: F,
    ) -> HaloResult<()> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(HaloError::precondition(
                "Grid query",
                format!("radius must be non-negative and finite, got {}", radius),
            ));
        }
        let reach = self.ring_reach(radius);
        let xs = self.axis_range(center[0], reach);
        let ys = self.axis_range(center[1], reach);
        let zs = self.axis_range(center[2], reach);

        let c = self.cells_per_side;
        for &iz in &zs {
            for &iy in &ys {
                let row = c * (iy + c * iz);
                for &ix in &xs {
                    let mut p = self.heads[row + ix];
                    while p != EMPTY {
                        f(p as usize);
                        p = self.next[p as usize];
                    }
                }
            }
        }
        Ok(())
    }

    /// Distinct cell coordinates within `reach` of `center` along one axis.
    fn axis_range(&self, center: usize, reach: usize) -> Vec<usize> {
        let c = self.cells_per_side;
        if 2 * reach + 1 >= c {
            return (0..c).collect();
        }
        (0..=2 * reach)
            .map(|k| (center + c + k - reach) % c)
            .collect()
    }

    fn axis_cell(&self, x: f64) -> usize {
        let wrapped = wrap_coordinate(x, self.box_width);
        ((wrapped / self.cell_width).floor() as usize) % self.cells_per_side
    }

    fn cell_of(&self, pos: &Position) -> usize {
        let c = self.cells_per_side;
        let ix = self.axis_cell(pos[0]);
        let iy = self.axis_cell(pos[1]);
        let iz = self.axis_cell(pos[2]);
        ix + c * (iy + c * iz)
    }
}
