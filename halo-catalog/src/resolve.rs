//! Translation of user selectors into catalog halo IDs.
//!
//! A selection is a list of raw integers, given either explicitly or as a
//! half-open range. How they are read depends on [`IdType`]:
//!
//! - [`IdType::HaloId`]: the integers are catalog IDs and pass through.
//! - [`IdType::M200m`]: the integers are zero-based mass ranks, mapped
//!   through the snapshot's mass-sorted ID list.

use std::fmt;
use std::str::FromStr;

use halo_core::{HaloError, HaloId, HaloResult, Snapshot};
use log::info;
use serde::Deserialize;

use crate::cache::{CatalogCache, RankBound};
use crate::reader::CatalogReader;

/// Meaning of the raw selector integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum IdType {
    /// Catalog halo IDs.
    #[serde(rename = "halo-id")]
    HaloId,
    /// Ranks by descending M200m, 0 being the most massive halo.
    #[serde(rename = "m200m")]
    M200m,
}

impl IdType {
    pub fn as_str(self) -> &'static str {
        match self {
            IdType::HaloId => "halo-id",
            IdType::M200m => "m200m",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = HaloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "halo-id" => Ok(IdType::HaloId),
            "m200m" => Ok(IdType::M200m),
            other => Err(HaloError::config(
                "id_type",
                format!("'{}' is not one of 'halo-id', 'm200m'", other),
            )),
        }
    }
}

/// Raw selector integers, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selectors {
    /// Explicit values, kept in the given order.
    List(Vec<i64>),
    /// Every value in `start..end`.
    Range { start: i64, end: i64 },
}

impl Selectors {
    /// The raw values in selection order.
    pub fn expand(&self) -> Vec<i64> {
        match self {
            Selectors::List(values) => values.clone(),
            Selectors::Range { start, end } => (*start..*end).collect(),
        }
    }

    /// Number of raw values, without expanding a range.
    pub fn len(&self) -> usize {
        match self {
            Selectors::List(values) => values.len(),
            Selectors::Range { start, end } => {
                usize::try_from(end.saturating_sub(*start).max(0)).unwrap_or(usize::MAX)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest raw value, `None` when there are none.
    pub fn min_value(&self) -> Option<i64> {
        match self {
            Selectors::List(values) => values.iter().copied().min(),
            Selectors::Range { start, end } => (start < end).then_some(*start),
        }
    }
}

/// One selected halo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectedHalo {
    pub id: HaloId,
    pub snapshot: Snapshot,
}

/// Resolve `raw` selectors in `snapshot` to catalog IDs, one output per input
/// and in input order.
///
/// # Errors
/// [`HaloError::Config`] in [`IdType::M200m`] mode if any rank is negative,
/// before any read; [`HaloError::RankOutOfRange`] if a rank is not below the
/// snapshot's halo count; any cache error.
pub fn resolve_ids<R: CatalogReader>(
    cache: &mut CatalogCache<R>,
    id_type: IdType,
    raw: &[i64],
    snapshot: Snapshot,
) -> HaloResult<Vec<SelectedHalo>> {
    let ids = match id_type {
        IdType::HaloId => raw.to_vec(),
        IdType::M200m => ranks_to_ids(cache, raw, snapshot)?,
    };
    info!(
        "Resolved {} {} selectors in snapshot {}",
        ids.len(),
        id_type,
        snapshot
    );
    Ok(ids
        .into_iter()
        .map(|id| SelectedHalo { id, snapshot })
        .collect())
}

fn ranks_to_ids<R: CatalogReader>(
    cache: &mut CatalogCache<R>,
    ranks: &[i64],
    snapshot: Snapshot,
) -> HaloResult<Vec<HaloId>> {
    let Some(&max_rank) = ranks.iter().max() else {
        return Ok(Vec::new());
    };
    if let Some(&neg) = ranks.iter().find(|&&r| r < 0) {
        return Err(negative_rank(neg));
    }

    let sorted = cache.sorted_ids(snapshot, RankBound::from_max_rank(max_rank))?;
    ranks
        .iter()
        .map(|&rank| {
            sorted
                .get(rank as usize)
                .copied()
                .ok_or_else(|| HaloError::rank_out_of_range(snapshot, rank, sorted.len()))
        })
        .collect()
}

pub(crate) fn negative_rank(rank: i64) -> HaloError {
    HaloError::config(
        "ids",
        format!("mass rank {} is negative; ranks start at 0", rank),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MemoryCatalog;
    use halo_core::{ErrorKind, HaloRecord};

    /// IDs [7, 3, 9, 1, 2] in descending-mass order, stored shuffled.
    fn snapshot_ten() -> CatalogCache<MemoryCatalog> {
        let records = vec![
            HaloRecord::new(9, [30.0, 30.0, 30.0], 1.0, 3e13),
            HaloRecord::new(2, [50.0, 50.0, 50.0], 1.0, 1e13),
            HaloRecord::new(7, [10.0, 10.0, 10.0], 1.0, 5e13),
            HaloRecord::new(1, [40.0, 40.0, 40.0], 1.0, 2e13),
            HaloRecord::new(3, [20.0, 20.0, 20.0], 1.0, 4e13),
        ];
        CatalogCache::new(MemoryCatalog::new().with_snapshot(10, 100.0, records))
    }

    fn ids(selected: &[SelectedHalo]) -> Vec<HaloId> {
        selected.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_selectors_expand_range_is_half_open() {
        assert_eq!(Selectors::Range { start: 2, end: 5 }.expand(), vec![2, 3, 4]);
        assert!(Selectors::Range { start: 5, end: 5 }.expand().is_empty());
        assert_eq!(Selectors::List(vec![4, 1, 4]).expand(), vec![4, 1, 4]);
    }

    #[test]
    fn test_halo_id_passthrough_needs_no_reads() {
        let mut cache = snapshot_ten();
        let out = resolve_ids(&mut cache, IdType::HaloId, &[123, 7], 10).unwrap();
        assert_eq!(ids(&out), vec![123, 7]);
        assert!(out.iter().all(|s| s.snapshot == 10));
        assert_eq!(cache.stats().catalog_reads, 0);
    }

    #[test]
    fn test_mass_ranks_map_to_sorted_ids() {
        let mut cache = snapshot_ten();
        let out = resolve_ids(&mut cache, IdType::M200m, &[0, 1, 2], 10).unwrap();
        assert_eq!(ids(&out), vec![7, 3, 9]);
    }

    #[test]
    fn test_mass_ranks_keep_input_order() {
        let mut cache = snapshot_ten();
        let out = resolve_ids(&mut cache, IdType::M200m, &[4, 0, 4], 10).unwrap();
        assert_eq!(ids(&out), vec![2, 7, 2]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut cache = snapshot_ten();
        let first = resolve_ids(&mut cache, IdType::M200m, &[0, 1, 2], 10).unwrap();
        let second = resolve_ids(&mut cache, IdType::M200m, &[0, 1, 2], 10).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.stats().catalog_reads, 1);
    }

    #[test]
    fn test_rank_beyond_catalog_is_range_error() {
        let records = (0..3)
            .map(|i| HaloRecord::new(i + 1, [0.0; 3], 1.0, 10.0 - i as f64))
            .collect();
        let mut cache = CatalogCache::new(MemoryCatalog::new().with_snapshot(0, 10.0, records));
        let err = resolve_ids(&mut cache, IdType::M200m, &[0, 4], 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(matches!(
            err,
            HaloError::RankOutOfRange {
                rank: 4,
                halo_count: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_rank_fails_without_reading() {
        let mut cache = snapshot_ten();
        let err = resolve_ids(&mut cache, IdType::M200m, &[2, -1], 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(cache.stats().header_reads, 0);
        assert_eq!(cache.stats().catalog_reads, 0);
    }

    #[test]
    fn test_selector_len_and_min() {
        let range = Selectors::Range { start: 3, end: 8 };
        assert_eq!(range.len(), 5);
        assert_eq!(range.min_value(), Some(3));
        let empty = Selectors::Range { start: 8, end: 3 };
        assert!(empty.is_empty());
        assert_eq!(empty.min_value(), None);
        assert_eq!(Selectors::List(vec![4, -2, 9]).min_value(), Some(-2));
    }

    #[test]
    fn test_empty_selection() {
        let mut cache = snapshot_ten();
        let out = resolve_ids(&mut cache, IdType::M200m, &[], 10).unwrap();
        assert!(out.is_empty());
        assert_eq!(cache.stats().catalog_reads, 0);
    }

    #[test]
    fn test_id_type_parsing() {
        assert_eq!("halo-id".parse::<IdType>().unwrap(), IdType::HaloId);
        assert_eq!("m200m".parse::<IdType>().unwrap(), IdType::M200m);
        let err = "mvir".parse::<IdType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(IdType::M200m.to_string(), "m200m");
    }
}
