//! Core halo data model.

use std::fmt;

/// Catalog identifier of a halo. Unique within one snapshot.
pub type HaloId = i64;

/// Index of a simulation snapshot.
pub type Snapshot = u32;

/// Cartesian position `[x, y, z]` in simulation length units.
pub type Position = [f64; 3];

/// A single halo as read from a snapshot catalog.
///
/// Immutable once read. `radius` is in the same length units as `position`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaloRecord {
    pub id: HaloId,
    pub position: Position,
    pub radius: f64,
    pub mass: f64,
}

impl HaloRecord {
    pub fn new(id: HaloId, position: Position, radius: f64, mass: f64) -> Self {
        Self {
            id,
            position,
            radius,
            mass,
        }
    }
}

/// Per-snapshot catalog metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotHeader {
    /// Side length of the periodic simulation box.
    pub box_width: f64,
    /// Number of halos in the snapshot's catalog.
    pub halo_count: usize,
}

impl fmt::Display for SnapshotHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Box width: {}", self.box_width)?;
        write!(f, "Halo count: {}", self.halo_count)
    }
}

/// Column-oriented view of a list of records, the layout the grid and
/// overlap finder consume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HaloColumns {
    pub ids: Vec<HaloId>,
    pub positions: Vec<Position>,
    pub radii: Vec<f64>,
}

impl HaloColumns {
    pub fn from_records(records: &[HaloRecord]) -> Self {
        let mut cols = Self {
            ids: Vec::with_capacity(records.len()),
            positions: Vec::with_capacity(records.len()),
            radii: Vec::with_capacity(records.len()),
        };
        for rec in records {
            cols.ids.push(rec.id);
            cols.positions.push(rec.position);
            cols.radii.push(rec.radius);
        }
        cols
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
