//! The selection pipeline: resolve, group, exclude, expand.
//!
//! [`run_selection`] turns a [`SelectionRequest`] into the final ordered list
//! of [`SelectedHalo`] rows. Exclusion runs the overlap finder over the
//! *full* halo population of each selected snapshot, since the host of a
//! selected halo need not be selected itself.
//!
//! # Example
//!
//! ```
//! use halo_catalog::{run_selection, CatalogCache, IdType, MemoryCatalog, SelectionRequest, Selectors};
//! use halo_core::HaloRecord;
//!
//! let reader = MemoryCatalog::new().with_snapshot(10, 100.0, vec![
//!     HaloRecord::new(7, [10.0, 10.0, 10.0], 1.0, 5e13),
//!     HaloRecord::new(3, [20.0, 20.0, 20.0], 1.0, 4e13),
//! ]);
//! let mut cache = CatalogCache::new(reader);
//! let request = SelectionRequest::new(IdType::M200m, Selectors::List(vec![0, 1]), 10);
//! let rows = run_selection(&mut cache, &request)?;
//! assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![7, 3]);
//! # Ok::<(), halo_core::HaloError>(())
//! ```

use std::collections::{BTreeMap, HashMap};

use halo_core::overlap::find_host_counts;
use halo_core::{HaloColumns, HaloError, HaloId, HaloResult, Snapshot};
use log::{debug, info};
use serde::Deserialize;

use crate::cache::{CatalogCache, RankBound};
use crate::reader::CatalogReader;
use crate::resolve::{negative_rank, resolve_ids, IdType, SelectedHalo, Selectors};

/// Default grid resolution per side for the overlap finder.
pub const DEFAULT_FINDER_CELLS: usize = 150;

/// How subhalos are removed from a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionStrategy {
    /// Keep every selected halo.
    None,
    /// Reserved; always rejected.
    Subhalo,
    /// Drop halos inside the scaled radius of a larger halo.
    Overlap,
}

impl ExclusionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExclusionStrategy::None => "none",
            ExclusionStrategy::Subhalo => "subhalo",
            ExclusionStrategy::Overlap => "overlap",
        }
    }

    fn reject_unimplemented(self) -> HaloResult<()> {
        match self {
            ExclusionStrategy::Subhalo => Err(HaloError::unimplemented(
                "exclusion strategy 'subhalo'",
            )),
            _ => Ok(()),
        }
    }
}

/// A validated selection, ready to run against a cache.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRequest {
    pub id_type: IdType,
    pub selectors: Selectors,
    pub snapshot: Snapshot,
    pub exclusion: ExclusionStrategy,
    pub exclusion_radius_mult: f64,
    /// Copies of each surviving row.
    pub mult: usize,
    /// Grid cells per side for the overlap finder.
    pub finder_cells: usize,
}

impl SelectionRequest {
    /// A request with no exclusion and single multiplicity.
    pub fn new(id_type: IdType, selectors: Selectors, snapshot: Snapshot) -> Self {
        Self {
            id_type,
            selectors,
            snapshot,
            exclusion: ExclusionStrategy::None,
            exclusion_radius_mult: 1.0,
            mult: 1,
            finder_cells: DEFAULT_FINDER_CELLS,
        }
    }

    pub fn with_exclusion(mut self, strategy: ExclusionStrategy, radius_mult: f64) -> Self {
        self.exclusion = strategy;
        self.exclusion_radius_mult = radius_mult;
        self
    }

    pub fn with_mult(mut self, mult: usize) -> Self {
        self.mult = mult;
        self
    }

    pub fn with_finder_cells(mut self, cells: usize) -> Self {
        self.finder_cells = cells;
        self
    }

    /// Check every parameter without touching storage.
    ///
    /// # Errors
    /// [`HaloError::Config`] for bad parameters,
    /// [`HaloError::Unimplemented`] for the `subhalo` strategy.
    pub fn validate(&self) -> HaloResult<()> {
        self.exclusion.reject_unimplemented()?;
        if self.exclusion == ExclusionStrategy::Overlap
            && !(self.exclusion_radius_mult > 0.0 && self.exclusion_radius_mult.is_finite())
        {
            return Err(HaloError::config(
                "exclusion_radius_mult",
                format!(
                    "must be a positive number for 'overlap', got {}",
                    self.exclusion_radius_mult
                ),
            ));
        }
        if self.mult < 1 {
            return Err(HaloError::config("mult", "must be at least 1"));
        }
        if self.selectors.len().checked_mul(self.mult).is_none() {
            return Err(HaloError::config(
                "mult",
                format!(
                    "{} copies of {} selectors overflows",
                    self.mult,
                    self.selectors.len()
                ),
            ));
        }
        if self.id_type == IdType::M200m {
            if let Some(rank) = self.selectors.min_value().filter(|&r| r < 0) {
                return Err(negative_rank(rank));
            }
        }
        if self.finder_cells < 1 {
            return Err(HaloError::config("finder_cells", "must be at least 1"));
        }
        if let Selectors::Range { start, end } = self.selectors {
            if end < start {
                return Err(HaloError::config(
                    "id_end",
                    format!("range end {} is before start {}", end, start),
                ));
            }
        }
        Ok(())
    }
}

/// Run `request` against `cache`, returning the final rows in output order.
///
/// Nothing is returned unless every stage succeeds.
pub fn run_selection<R: CatalogReader>(
    cache: &mut CatalogCache<R>,
    request: &SelectionRequest,
) -> HaloResult<Vec<SelectedHalo>> {
    request.validate()?;

    let raw = request.selectors.expand();
    let selected = resolve_ids(cache, request.id_type, &raw, request.snapshot)?;

    let survivors = match request.exclusion {
        ExclusionStrategy::None => selected,
        ExclusionStrategy::Subhalo => {
            return Err(HaloError::unimplemented("exclusion strategy 'subhalo'"))
        }
        ExclusionStrategy::Overlap => {
            let flags = exclusion_flags(
                cache,
                &selected,
                request.exclusion_radius_mult,
                request.finder_cells,
            )?;
            let kept: Vec<SelectedHalo> = selected
                .iter()
                .zip(&flags)
                .filter_map(|(halo, &excluded)| (!excluded).then_some(*halo))
                .collect();
            info!(
                "Excluded {} of {} selected halos as subhalos",
                selected.len() - kept.len(),
                selected.len()
            );
            kept
        }
    };

    let rows = expand_multiplicity(&survivors, request.mult);
    info!("Selection produced {} rows", rows.len());
    Ok(rows)
}

/// Indices of `selected`, grouped by snapshot in ascending snapshot order.
///
/// Within a group, indices keep their selection order.
pub fn group_by_snapshot(selected: &[SelectedHalo]) -> BTreeMap<Snapshot, Vec<usize>> {
    let mut groups: BTreeMap<Snapshot, Vec<usize>> = BTreeMap::new();
    for (i, halo) in selected.iter().enumerate() {
        groups.entry(halo.snapshot).or_default().push(i);
    }
    groups
}

/// Exclusion flag for every entry of `selected`, true meaning the halo has
/// at least one host.
///
/// # Errors
/// [`HaloError::UnknownId`] if a selected ID is not in its snapshot's
/// catalog; any cache or finder error.
pub fn exclusion_flags<R: CatalogReader>(
    cache: &mut CatalogCache<R>,
    selected: &[SelectedHalo],
    radius_mult: f64,
    finder_cells: usize,
) -> HaloResult<Vec<bool>> {
    let mut flags = vec![false; selected.len()];
    for (snapshot, members) in group_by_snapshot(selected) {
        let excluded = snapshot_exclusions(cache, snapshot, radius_mult, finder_cells)?;
        for i in members {
            let id = selected[i].id;
            flags[i] = *excluded
                .get(&id)
                .ok_or_else(|| HaloError::unknown_id(snapshot, id))?;
        }
    }
    Ok(flags)
}

fn snapshot_exclusions<R: CatalogReader>(
    cache: &mut CatalogCache<R>,
    snapshot: Snapshot,
    radius_mult: f64,
    finder_cells: usize,
) -> HaloResult<HashMap<HaloId, bool>> {
    let ids = cache.sorted_ids(snapshot, RankBound::All)?.to_vec();
    let records = cache.halo_records(snapshot, &ids)?;
    let box_width = cache.header(snapshot)?.box_width;

    let halos = HaloColumns::from_records(&records);
    let hosts = find_host_counts(&halos, box_width, finder_cells, radius_mult)?;
    let excluded = hosts.iter().filter(|&&h| h > 0).count();
    debug!(
        "Snapshot {}: {} of {} halos have a host",
        snapshot,
        excluded,
        halos.len()
    );

    Ok(halos
        .ids
        .iter()
        .zip(&hosts)
        .map(|(&id, &h)| (id, h > 0))
        .collect())
}

/// Rows reserved up front by [`expand_multiplicity`]; larger outputs grow.
const MAX_PRESIZE: usize = 1 << 20;

/// Repeat each item `mult` times, copies of one item kept together.
pub fn expand_multiplicity<T: Clone>(items: &[T], mult: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len().saturating_mul(mult).min(MAX_PRESIZE));
    for item in items {
        out.extend(std::iter::repeat(item).take(mult).cloned());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryCatalog;
    use halo_core::{ErrorKind, HaloRecord};

    fn snapshot_ten() -> MemoryCatalog {
        MemoryCatalog::new().with_snapshot(
            10,
            100.0,
            vec![
                HaloRecord::new(9, [30.0, 30.0, 30.0], 1.0, 3e13),
                HaloRecord::new(2, [50.0, 50.0, 50.0], 1.0, 1e13),
                HaloRecord::new(7, [10.0, 10.0, 10.0], 1.0, 5e13),
                HaloRecord::new(1, [40.0, 40.0, 40.0], 1.0, 2e13),
                HaloRecord::new(3, [20.0, 20.0, 20.0], 1.0, 4e13),
            ],
        )
    }

    /// A big host (ID 100) with a satellite (ID 200) inside it, and an
    /// isolated halo (ID 300) near the box corner.
    fn host_and_satellite() -> MemoryCatalog {
        MemoryCatalog::new().with_snapshot(
            5,
            100.0,
            vec![
                HaloRecord::new(200, [55.0, 50.0, 50.0], 2.0, 1e12),
                HaloRecord::new(100, [50.0, 50.0, 50.0], 10.0, 1e14),
                HaloRecord::new(300, [1.0, 1.0, 1.0], 3.0, 5e12),
            ],
        )
    }

    fn ids(rows: &[SelectedHalo]) -> Vec<HaloId> {
        rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_end_to_end_mass_ranks_without_exclusion() {
        let mut cache = CatalogCache::new(snapshot_ten());
        let request = SelectionRequest::new(IdType::M200m, Selectors::List(vec![0, 1, 2]), 10);
        let rows = run_selection(&mut cache, &request).unwrap();
        assert_eq!(ids(&rows), vec![7, 3, 9]);
        assert!(rows.iter().all(|r| r.snapshot == 10));
    }

    #[test]
    fn test_overlap_drops_satellite() {
        let mut cache = CatalogCache::new(host_and_satellite());
        let request = SelectionRequest::new(IdType::HaloId, Selectors::List(vec![200, 100, 300]), 5)
            .with_exclusion(ExclusionStrategy::Overlap, 1.0)
            .with_finder_cells(8);
        let rows = run_selection(&mut cache, &request).unwrap();
        assert_eq!(ids(&rows), vec![100, 300]);
    }

    #[test]
    fn test_unselected_host_still_excludes() {
        let mut cache = CatalogCache::new(host_and_satellite());
        let request = SelectionRequest::new(IdType::HaloId, Selectors::List(vec![200]), 5)
            .with_exclusion(ExclusionStrategy::Overlap, 1.0);
        let rows = run_selection(&mut cache, &request).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_small_multiplier_keeps_satellite() {
        let mut cache = CatalogCache::new(host_and_satellite());
        let request = SelectionRequest::new(IdType::HaloId, Selectors::List(vec![200, 100]), 5)
            .with_exclusion(ExclusionStrategy::Overlap, 0.4);
        let rows = run_selection(&mut cache, &request).unwrap();
        assert_eq!(ids(&rows), vec![200, 100]);
    }

    #[test]
    fn test_overlap_with_unknown_id_is_range_error() {
        let mut cache = CatalogCache::new(host_and_satellite());
        let request = SelectionRequest::new(IdType::HaloId, Selectors::List(vec![100, 999]), 5)
            .with_exclusion(ExclusionStrategy::Overlap, 1.0);
        let err = run_selection(&mut cache, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_none_strategy_does_not_check_ids() {
        let mut cache = CatalogCache::new(host_and_satellite());
        let request = SelectionRequest::new(IdType::HaloId, Selectors::List(vec![999]), 5);
        let rows = run_selection(&mut cache, &request).unwrap();
        assert_eq!(ids(&rows), vec![999]);
        assert_eq!(cache.stats().catalog_reads, 0);
    }

    #[test]
    fn test_repeated_selection_is_served_from_cache() {
        let mut cache = CatalogCache::new(host_and_satellite());
        let request = SelectionRequest::new(IdType::M200m, Selectors::Range { start: 0, end: 3 }, 5)
            .with_exclusion(ExclusionStrategy::Overlap, 1.0);
        let rows = run_selection(&mut cache, &request).unwrap();
        assert_eq!(ids(&rows), vec![100, 300]);
        let after_first = cache.stats();
        // ID + mass scan for the ranks, then the full records for the finder.
        assert_eq!(after_first.catalog_reads, 2);
        assert_eq!(after_first.header_reads, 1);

        let again = run_selection(&mut cache, &request).unwrap();
        assert_eq!(again, rows);
        assert_eq!(cache.stats().catalog_reads, 2);
        assert_eq!(cache.stats().header_reads, 1);
    }

    #[test]
    fn test_multiplicity_groups_copies() {
        let mut cache = CatalogCache::new(snapshot_ten());
        let request =
            SelectionRequest::new(IdType::M200m, Selectors::List(vec![1, 0]), 10).with_mult(3);
        let rows = run_selection(&mut cache, &request).unwrap();
        assert_eq!(ids(&rows), vec![3, 3, 3, 7, 7, 7]);
    }

    #[test]
    fn test_expand_multiplicity() {
        assert_eq!(expand_multiplicity(&["r1", "r2"], 3), vec!["r1", "r1", "r1", "r2", "r2", "r2"]);
        assert_eq!(expand_multiplicity(&[1, 2], 1), vec![1, 2]);
        assert!(expand_multiplicity::<u8>(&[], 4).is_empty());
        assert!(expand_multiplicity::<u8>(&[], usize::MAX).is_empty());
    }

    #[test]
    fn test_huge_multiplicity_is_config_error() {
        let request = SelectionRequest::new(IdType::HaloId, Selectors::List(vec![1, 2]), 10)
            .with_mult(usize::MAX);
        assert_eq!(request.validate().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_negative_rank_rejected_before_io() {
        let mut cache = CatalogCache::new(snapshot_ten());
        for selectors in [Selectors::List(vec![0, -3]), Selectors::Range { start: -1, end: 2 }] {
            let request = SelectionRequest::new(IdType::M200m, selectors, 10);
            let err = run_selection(&mut cache, &request).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config);
        }
        assert_eq!(cache.stats().header_reads, 0);
        assert_eq!(cache.stats().catalog_reads, 0);

        let raw_ids = SelectionRequest::new(IdType::HaloId, Selectors::List(vec![-3]), 10);
        assert!(raw_ids.validate().is_ok());
    }

    #[test]
    fn test_group_by_snapshot() {
        let selected = [
            SelectedHalo { id: 1, snapshot: 7 },
            SelectedHalo { id: 2, snapshot: 3 },
            SelectedHalo { id: 3, snapshot: 7 },
        ];
        let groups = group_by_snapshot(&selected);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&3], vec![1]);
        assert_eq!(groups[&7], vec![0, 2]);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![3, 7]);
    }

    #[test]
    fn test_subhalo_strategy_is_unimplemented() {
        let mut cache = CatalogCache::new(snapshot_ten());
        let request = SelectionRequest::new(IdType::M200m, Selectors::List(vec![0]), 10)
            .with_exclusion(ExclusionStrategy::Subhalo, 1.0);
        assert_eq!(request.validate().unwrap_err().kind(), ErrorKind::Unimplemented);
        let err = run_selection(&mut cache, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unimplemented);
        assert_eq!(cache.stats().header_reads, 0);
        assert_eq!(cache.stats().catalog_reads, 0);
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        let base = SelectionRequest::new(IdType::M200m, Selectors::List(vec![0]), 10);
        let cases = [
            base.clone().with_exclusion(ExclusionStrategy::Overlap, 0.0),
            base.clone().with_exclusion(ExclusionStrategy::Overlap, -2.0),
            base.clone().with_mult(0),
            base.clone().with_finder_cells(0),
            SelectionRequest::new(IdType::M200m, Selectors::Range { start: 5, end: 2 }, 10),
        ];
        for request in cases {
            let err = request.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{:?}", request);
        }
        assert!(base.with_exclusion(ExclusionStrategy::None, 0.0).validate().is_ok());
    }

    #[test]
    fn test_rank_out_of_range_produces_no_rows() {
        let mut cache = CatalogCache::new(snapshot_ten());
        let request = SelectionRequest::new(IdType::M200m, Selectors::List(vec![0, 5]), 10);
        let err = run_selection(&mut cache, &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }
}
