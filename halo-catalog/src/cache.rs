//! Per-snapshot memoization of catalog reads.
//!
//! Catalogs are large and a selection run asks for the same snapshot several
//! times (mass-rank resolution, then the full population for overlap
//! exclusion). [`CatalogCache`] sits between those callers and a
//! [`CatalogReader`] so each snapshot's data is read from storage at most
//! once per required size.
//!
//! Three things are cached per snapshot:
//!
//! 1. The header (box width, halo count), read once.
//! 2. The mass-sorted ID list, bounded to the largest rank requested so far.
//!    A request within the cached bound is served from memory; a larger one
//!    triggers exactly one re-scan, which replaces the cached list.
//! 3. The full record set, loaded once and indexed by ID.
//!
//! Nothing is ever evicted. The cache is meant to live for one run.

use std::collections::{HashMap, HashSet};

use halo_core::{HaloError, HaloId, HaloRecord, HaloResult, Snapshot, SnapshotHeader};
use log::{debug, warn};

use crate::reader::{CatalogReader, Column};

/// How many mass-ranked IDs a caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBound {
    /// Ranks `0..=max_rank`.
    Top(usize),
    /// Every halo in the snapshot.
    All,
}

impl RankBound {
    /// Convert a signed maximum rank, where any negative value means "all".
    pub fn from_max_rank(max_rank: i64) -> Self {
        if max_rank < 0 {
            RankBound::All
        } else {
            RankBound::Top(max_rank as usize)
        }
    }

    /// Number of entries needed to satisfy this bound, `None` for all.
    pub fn required_len(self) -> Option<usize> {
        match self {
            RankBound::Top(max_rank) => Some(max_rank.saturating_add(1)),
            RankBound::All => None,
        }
    }
}

/// Counters of storage reads issued by a [`CatalogCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub header_reads: usize,
    pub catalog_reads: usize,
    /// Sorted-ID derivations, whether from storage or resident records.
    pub sorted_id_scans: usize,
}

#[derive(Debug)]
struct SortedIds {
    ids: Vec<HaloId>,
    bound: RankBound,
    /// `ids` holds every halo of the snapshot.
    complete: bool,
}

impl SortedIds {
    fn satisfies(&self, bound: RankBound) -> bool {
        if self.complete {
            return true;
        }
        match (self.bound, bound) {
            (RankBound::All, _) => true,
            (RankBound::Top(_), RankBound::All) => false,
            (RankBound::Top(cached), RankBound::Top(wanted)) => wanted <= cached,
        }
    }
}

#[derive(Debug)]
struct ResidentRecords {
    records: Vec<HaloRecord>,
    index: HashMap<HaloId, usize>,
}

#[derive(Debug, Default)]
struct CacheEntry {
    header: Option<SnapshotHeader>,
    sorted: Option<SortedIds>,
    records: Option<ResidentRecords>,
}

/// Memoizing front for a [`CatalogReader`].
pub struct CatalogCache<R> {
    reader: R,
    entries: HashMap<Snapshot, CacheEntry>,
    stats: CacheStats,
}

impl<R: CatalogReader> CatalogCache<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Header of `snapshot`, read on first use.
    pub fn header(&mut self, snapshot: Snapshot) -> HaloResult<SnapshotHeader> {
        let entry = self.entries.entry(snapshot).or_default();
        if let Some(header) = entry.header {
            return Ok(header);
        }
        self.stats.header_reads += 1;
        let header = self.reader.read_header(snapshot)?;
        debug!("Snapshot {}: header loaded ({} halos)", snapshot, header.halo_count);
        entry.header = Some(header);
        Ok(header)
    }

    /// IDs of `snapshot` sorted by descending mass (ties by ascending ID),
    /// holding at least `bound` entries or the whole catalog if it is
    /// smaller.
    ///
    /// [`RankBound::All`] loads the full record set first, so a later
    /// [`halo_records`](Self::halo_records) call costs no further read.
    pub fn sorted_ids(
        &mut self,
        snapshot: Snapshot,
        bound: RankBound,
    ) -> HaloResult<&[HaloId]> {
        if bound == RankBound::All {
            self.ensure_records(snapshot)?;
        }

        let entry = self.entries.entry(snapshot).or_default();
        let sorted = match entry.sorted.take() {
            Some(cached) if cached.satisfies(bound) => {
                debug!(
                    "Snapshot {}: sorted IDs served from cache ({:?} covers {:?})",
                    snapshot, cached.bound, bound
                );
                cached
            }
            previous => {
                if let Some(prev) = &previous {
                    debug!(
                        "Snapshot {}: re-scanning sorted IDs, cached {:?} does not cover {:?}",
                        snapshot, prev.bound, bound
                    );
                }
                match scan_sorted_ids(
                    &self.reader,
                    &mut self.stats,
                    snapshot,
                    bound,
                    entry.records.as_ref(),
                ) {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        entry.sorted = previous;
                        return Err(e);
                    }
                }
            }
        };
        Ok(entry.sorted.insert(sorted).ids.as_slice())
    }

    /// Records for `ids`, in the same order.
    ///
    /// The full catalog is loaded on first use and matched by exact ID.
    ///
    /// # Errors
    /// [`HaloError::UnknownId`] if any ID is absent from the snapshot;
    /// [`HaloError::CatalogIo`] if the catalog cannot be read.
    pub fn halo_records(
        &mut self,
        snapshot: Snapshot,
        ids: &[HaloId],
    ) -> HaloResult<Vec<HaloRecord>> {
        let resident = self.ensure_records(snapshot)?;
        ids.iter()
            .map(|id| {
                resident
                    .index
                    .get(id)
                    .map(|&row| resident.records[row])
                    .ok_or_else(|| HaloError::unknown_id(snapshot, *id))
            })
            .collect()
    }

    /// Whether records of `snapshot` are resident.
    pub fn has_records(&self, snapshot: Snapshot) -> bool {
        self.entries
            .get(&snapshot)
            .is_some_and(|e| e.records.is_some())
    }

    /// Bound of the cached sorted-ID list of `snapshot`, if any.
    pub fn cached_bound(&self, snapshot: Snapshot) -> Option<RankBound> {
        self.entries
            .get(&snapshot)
            .and_then(|e| e.sorted.as_ref())
            .map(|s| s.bound)
    }

    fn ensure_records(&mut self, snapshot: Snapshot) -> HaloResult<&ResidentRecords> {
        let entry = self.entries.entry(snapshot).or_default();
        let resident = match entry.records.take() {
            Some(resident) => resident,
            None => {
                self.stats.catalog_reads += 1;
                let records = self
                    .reader
                    .read_catalog(snapshot, &Column::ALL)?
                    .into_records(snapshot)?;
                let index = index_by_id(snapshot, &records)?;
                debug!("Snapshot {}: {} records resident", snapshot, records.len());
                if let Some(header) = entry.header {
                    if header.halo_count != records.len() {
                        warn!(
                            "Snapshot {}: header reports {} halos but catalog holds {}",
                            snapshot,
                            header.halo_count,
                            records.len()
                        );
                    }
                }
                ResidentRecords { records, index }
            }
        };
        Ok(entry.records.insert(resident))
    }
}

fn index_by_id(
    snapshot: Snapshot,
    records: &[HaloRecord],
) -> HaloResult<HashMap<HaloId, usize>> {
    let mut index = HashMap::with_capacity(records.len());
    for (row, rec) in records.iter().enumerate() {
        if index.insert(rec.id, row).is_some() {
            return Err(HaloError::catalog_io(
                snapshot,
                "read catalog",
                format!("duplicate halo ID {}", rec.id),
            ));
        }
    }
    Ok(index)
}

/// Derive the mass-sorted ID list, from resident records when available,
/// otherwise from an ID + mass read.
fn scan_sorted_ids<R: CatalogReader>(
    reader: &R,
    stats: &mut CacheStats,
    snapshot: Snapshot,
    bound: RankBound,
    resident: Option<&ResidentRecords>,
) -> HaloResult<SortedIds> {
    stats.sorted_id_scans += 1;

    let mut pairs: Vec<(HaloId, f64)> = match resident {
        Some(resident) => resident.records.iter().map(|r| (r.id, r.mass)).collect(),
        None => {
            stats.catalog_reads += 1;
            let cols = reader.read_catalog(snapshot, &[Column::Id, Column::Mass])?;
            if cols.mass.len() != cols.ids.len() {
                return Err(HaloError::catalog_io(
                    snapshot,
                    "read sorted IDs",
                    format!("{} IDs but {} masses", cols.ids.len(), cols.mass.len()),
                ));
            }
            let mut seen = HashSet::with_capacity(cols.ids.len());
            if let Some(dup) = cols.ids.iter().find(|id| !seen.insert(**id)) {
                return Err(HaloError::catalog_io(
                    snapshot,
                    "read sorted IDs",
                    format!("duplicate halo ID {}", dup),
                ));
            }
            cols.ids.into_iter().zip(cols.mass).collect()
        }
    };

    pairs.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let total = pairs.len();
    if let Some(n) = bound.required_len() {
        pairs.truncate(n);
    }
    let ids: Vec<HaloId> = pairs.into_iter().map(|(id, _)| id).collect();
    let complete = ids.len() == total;
    debug!(
        "Snapshot {}: sorted {} IDs, kept {} for {:?}",
        snapshot,
        total,
        ids.len(),
        bound
    );

    Ok(SortedIds {
        ids,
        bound,
        complete,
    })
}
