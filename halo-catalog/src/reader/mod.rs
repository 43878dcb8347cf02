//! Catalog storage seam.
//!
//! The cache never parses storage formats itself; it talks to a
//! [`CatalogReader`], which hands back a snapshot's header and unsorted,
//! column-oriented halo data for the columns asked for.
//!
//! - [`ascii`]: Rockstar-style whitespace-separated text catalogs
//! - [`MemoryCatalog`]: catalogs already held in memory

pub mod ascii;

use std::collections::HashMap;

use halo_core::{HaloError, HaloId, HaloRecord, HaloResult, Snapshot, SnapshotHeader};

pub use ascii::{AsciiCatalog, AsciiLayout};

/// A catalog column that can be requested from a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    X,
    Y,
    Z,
    Radius,
    Mass,
}

impl Column {
    /// Every column, enough to build full [`HaloRecord`]s.
    pub const ALL: [Column; 6] = [
        Column::Id,
        Column::X,
        Column::Y,
        Column::Z,
        Column::Radius,
        Column::Mass,
    ];
}

/// Unsorted catalog data, one vector per column.
///
/// Columns that were not requested are left empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogColumns {
    pub ids: Vec<HaloId>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub radius: Vec<f64>,
    pub mass: Vec<f64>,
}

impl CatalogColumns {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Zip the columns into records.
    ///
    /// # Errors
    /// [`HaloError::CatalogIo`] if any column's length differs from the ID
    /// column, which includes columns that were never requested.
    pub fn into_records(self, snapshot: Snapshot) -> HaloResult<Vec<HaloRecord>> {
        let n = self.ids.len();
        let lens = [
            self.x.len(),
            self.y.len(),
            self.z.len(),
            self.radius.len(),
            self.mass.len(),
        ];
        if lens.iter().any(|&l| l != n) {
            return Err(HaloError::catalog_io(
                snapshot,
                "read catalog",
                format!("column lengths {:?} do not match {} IDs", lens, n),
            ));
        }
        Ok((0..n)
            .map(|i| {
                HaloRecord::new(
                    self.ids[i],
                    [self.x[i], self.y[i], self.z[i]],
                    self.radius[i],
                    self.mass[i],
                )
            })
            .collect())
    }
}

/// Source of per-snapshot halo catalogs.
///
/// Reads are blocking and are not retried; any failure is reported as
/// [`HaloError::CatalogIo`] with the snapshot attached.
pub trait CatalogReader {
    /// Box width and halo count of `snapshot`.
    fn read_header(&self, snapshot: Snapshot) -> HaloResult<SnapshotHeader>;

    /// Unsorted halo data for the requested `columns` of `snapshot`.
    fn read_catalog(&self, snapshot: Snapshot, columns: &[Column]) -> HaloResult<CatalogColumns>;
}

/// Catalogs held in memory, keyed by snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    snapshots: HashMap<Snapshot, (f64, Vec<HaloRecord>)>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the catalog of `snapshot`.
    pub fn insert_snapshot(
        &mut self,
        snapshot: Snapshot,
        box_width: f64,
        records: Vec<HaloRecord>,
    ) {
        self.snapshots.insert(snapshot, (box_width, records));
    }

    /// Builder form of [`insert_snapshot`](Self::insert_snapshot).
    pub fn with_snapshot(
        mut self,
        snapshot: Snapshot,
        box_width: f64,
        records: Vec<HaloRecord>,
    ) -> Self {
        self.insert_snapshot(snapshot, box_width, records);
        self
    }

    fn snapshot(
        &self,
        snapshot: Snapshot,
        operation: &str,
    ) -> HaloResult<&(f64, Vec<HaloRecord>)> {
        self.snapshots.get(&snapshot).ok_or_else(|| {
            HaloError::catalog_io(snapshot, operation, "no catalog loaded for this snapshot")
        })
    }
}

impl CatalogReader for MemoryCatalog {
    fn read_header(&self, snapshot: Snapshot) -> HaloResult<SnapshotHeader> {
        let (box_width, records) = self.snapshot(snapshot, "read header")?;
        Ok(SnapshotHeader {
            box_width: *box_width,
            halo_count: records.len(),
        })
    }

    fn read_catalog(&self, snapshot: Snapshot, columns: &[Column]) -> HaloResult<CatalogColumns> {
        let (_, records) = self.snapshot(snapshot, "read catalog")?;
        let mut out = CatalogColumns::default();
        for &col in columns {
            match col {
                Column::Id => out.ids = records.iter().map(|r| r.id).collect(),
                Column::X => out.x = records.iter().map(|r| r.position[0]).collect(),
                Column::Y => out.y = records.iter().map(|r| r.position[1]).collect(),
                Column::Z => out.z = records.iter().map(|r| r.position[2]).collect(),
                Column::Radius => out.radius = records.iter().map(|r| r.radius).collect(),
                Column::Mass => out.mass = records.iter().map(|r| r.mass).collect(),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_core::ErrorKind;

    fn sample() -> MemoryCatalog {
        MemoryCatalog::new().with_snapshot(
            3,
            100.0,
            vec![
                HaloRecord::new(11, [1.0, 2.0, 3.0], 0.5, 1e12),
                HaloRecord::new(12, [4.0, 5.0, 6.0], 0.7, 2e12),
            ],
        )
    }

    #[test]
    fn test_memory_header() {
        let header = sample().read_header(3).unwrap();
        assert_eq!(header.box_width, 100.0);
        assert_eq!(header.halo_count, 2);
    }

    #[test]
    fn test_memory_reads_only_requested_columns() {
        let cols = sample().read_catalog(3, &[Column::Id, Column::Mass]).unwrap();
        assert_eq!(cols.ids, vec![11, 12]);
        assert_eq!(cols.mass, vec![1e12, 2e12]);
        assert!(cols.x.is_empty());
        assert!(cols.radius.is_empty());
    }

    #[test]
    fn test_missing_snapshot_is_catalog_io() {
        let err = sample().read_header(4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogIo);
        assert!(err.to_string().contains("snapshot 4"));
    }

    #[test]
    fn test_into_records_requires_all_columns() {
        let cols = sample().read_catalog(3, &[Column::Id, Column::Mass]).unwrap();
        let err = cols.into_records(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CatalogIo);
    }

    #[test]
    fn test_into_records_round_trip() {
        let cols = sample().read_catalog(3, &Column::ALL).unwrap();
        let records = cols.into_records(3).unwrap();
        assert_eq!(records[1], HaloRecord::new(12, [4.0, 5.0, 6.0], 0.7, 2e12));
    }
}
