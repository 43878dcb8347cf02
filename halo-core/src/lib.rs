//! Halo data model and spatial machinery for subhalo exclusion.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | [`HaloId`], [`Snapshot`], [`HaloRecord`], [`SnapshotHeader`], [`HaloColumns`] |
//! | [`errors`] | [`HaloError`], [`HaloResult`], [`ErrorKind`] |
//! | [`periodic`] | Coordinate wrapping and minimal-image distances in a periodic box |
//! | [`grid`] | [`Grid`](grid::Grid), a uniform cell index with no-false-negative radius queries |
//! | [`overlap`] | [`SubhaloFinder`](overlap::SubhaloFinder), host counting by exclusion-sphere containment |
//!
//! # Quick Start
//!
//! ```
//! use halo_core::{overlap::find_host_counts, HaloColumns, HaloRecord};
//!
//! let halos = HaloColumns::from_records(&[
//!     HaloRecord::new(1, [50.0, 50.0, 50.0], 10.0, 1e14),
//!     HaloRecord::new(2, [55.0, 50.0, 50.0], 2.0, 1e12),
//! ]);
//! let hosts = find_host_counts(&halos, 100.0, 10, 1.0)?;
//! assert_eq!(hosts, vec![0, 1]);
//! # Ok::<(), halo_core::HaloError>(())
//! ```

pub mod errors;
pub mod grid;
pub mod overlap;
pub mod periodic;
pub mod types;

pub use errors::{ErrorKind, HaloError, HaloResult};
pub use types::{HaloColumns, HaloId, HaloRecord, Position, Snapshot, SnapshotHeader};
