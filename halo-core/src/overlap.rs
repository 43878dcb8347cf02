//! Overlap-based subhalo identification.
//!
//! A halo is a subhalo when its center lies inside the exclusion sphere of a
//! larger halo. The exclusion sphere of halo `h` is centered on `h` with
//! radius `radius(h) * radius_mult`.
//!
//! Every halo queries the grid with its own scaled radius and credits a host
//! to each strictly smaller candidate whose center falls inside that sphere.
//! The test is one-sided: a small halo whose own sphere happens
//! to reach a larger halo's center is not thereby a host of anything, and
//! two halos whose spheres merely intersect are both left alone.
//!
//! "Larger" is decided by radius, ties broken by ascending halo ID, so the
//! result does not depend on the order halos are supplied in.

use log::debug;

use crate::errors::{HaloError, HaloResult};
use crate::grid::Grid;
use crate::periodic::periodic_distance_sq;
use crate::types::HaloColumns;

/// Counts, for every halo in a grid, how many larger halos contain it.
pub struct SubhaloFinder<'a> {
    grid: &'a Grid,
    host_counts: Vec<u32>,
}

impl<'a> SubhaloFinder<'a> {
    /// Create a finder over a grid that already holds every halo position,
    /// inserted in the same order as the columns later passed to
    /// [`find_subhalos`](Self::find_subhalos).
    pub fn new(grid: &'a Grid) -> Self {
        Self {
            grid,
            host_counts: vec![0; grid.len()],
        }
    }

    /// Compute host counts for every halo.
    ///
    /// Any earlier counts are discarded.
    ///
    /// # Errors
    /// [`HaloError::Precondition`] if the column lengths disagree with each
    /// other or with the grid, if any radius is not positive and finite, or
    /// if `radius_mult` is not positive and finite.
    pub fn find_subhalos(&mut self, halos: &HaloColumns, radius_mult: f64) -> HaloResult<()> {
        self.check_inputs(halos, radius_mult)?;

        let n = halos.len();
        let precedence = precedence_ranks(halos);
        let width = self.grid.box_width();
        self.host_counts.clear();
        self.host_counts.resize(n, 0);

        let mut candidates = Vec::new();
        for host in 0..n {
            let r = halos.radii[host] * radius_mult;
            let r2 = r * r;
            let host_pos = &halos.positions[host];

            candidates.clear();
            self.grid
                .for_each_candidate(host, r, |c| candidates.push(c))?;

            for &c in &candidates {
                if c == host || precedence[c] < precedence[host] {
                    continue;
                }
                if periodic_distance_sq(host_pos, &halos.positions[c], width) <= r2 {
                    self.host_counts[c] += 1;
                }
            }
        }

        debug!(
            "Overlap finder: {} halos, {} with at least one host",
            n,
            self.host_counts.iter().filter(|&&h| h > 0).count()
        );
        Ok(())
    }

    /// Number of larger halos whose exclusion sphere contains halo `i`.
    pub fn host_count(&self, i: usize) -> u32 {
        self.host_counts[i]
    }

    /// `true` iff halo `i` has at least one host.
    pub fn is_subhalo(&self, i: usize) -> bool {
        self.host_counts[i] > 0
    }

    pub fn host_counts(&self) -> &[u32] {
        &self.host_counts
    }

    fn check_inputs(&self, halos: &HaloColumns, radius_mult: f64) -> HaloResult<()> {
        const CONTEXT: &str = "SubhaloFinder::find_subhalos";

        let n = halos.ids.len();
        if halos.positions.len() != n || halos.radii.len() != n {
            return Err(HaloError::precondition(
                CONTEXT,
                format!(
                    "column lengths differ: {} ids, {} positions, {} radii",
                    n,
                    halos.positions.len(),
                    halos.radii.len()
                ),
            ));
        }
        if self.grid.len() != n {
            return Err(HaloError::precondition(
                CONTEXT,
                format!("grid holds {} points but {} halos given", self.grid.len(), n),
            ));
        }
        if !(radius_mult.is_finite() && radius_mult > 0.0) {
            return Err(HaloError::precondition(
                CONTEXT,
                format!("radius multiplier must be positive, got {}", radius_mult),
            ));
        }
        if let Some(i) = halos
            .radii
            .iter()
            .position(|r| !(r.is_finite() && *r > 0.0))
        {
            return Err(HaloError::precondition(
                CONTEXT,
                format!(
                    "halo {} has non-positive radius {}",
                    halos.ids[i], halos.radii[i]
                ),
            ));
        }
        Ok(())
    }
}

/// Position of each halo in the (radius descending, ID ascending) order.
/// Lower rank means larger halo.
fn precedence_ranks(halos: &HaloColumns) -> Vec<usize> {
    let mut order: Vec<usize> = (0..halos.len()).collect();
    order.sort_unstable_by(|&a, &b| {
        halos.radii[b]
            .total_cmp(&halos.radii[a])
            .then(halos.ids[a].cmp(&halos.ids[b]))
    });
    let mut ranks = vec![0; order.len()];
    for (rank, &i) in order.iter().enumerate() {
        ranks[i] = rank;
    }
    ranks
}

/// Build a grid over `halos` and return each halo's host count.
///
/// Convenience wrapper over [`Grid`] and [`SubhaloFinder`] for callers that
/// do not need the grid afterwards.
pub fn find_host_counts(
    halos: &HaloColumns,
    box_width: f64,
    cells_per_side: usize,
    radius_mult: f64,
) -> HaloResult<Vec<u32>> {
    let mut grid = Grid::new(cells_per_side, box_width, halos.len())?;
    grid.insert(&halos.positions)?;
    debug!(
        "Grid: {}^3 cells of width {:.4} over {} halos",
        cells_per_side,
        grid.cell_width(),
        halos.len()
    );

    let mut finder = SubhaloFinder::new(&grid);
    finder.find_subhalos(halos, radius_mult)?;
    Ok(finder.host_counts)
}
