//! Error types for halo selection.
//!
//! This module provides a unified error type [`HaloError`] covering every
//! failure mode of a selection run: bad configuration, out-of-range ranks or
//! unknown IDs, catalog storage failures, caller defects, and requests for
//! capabilities that do not exist yet.
//!
//! # Error Categories
//!
//! | Variant | Kind | Detected |
//! |---------|------|----------|
//! | [`Config`](HaloError::Config) | [`ErrorKind::Config`] | Before any I/O |
//! | [`RankOutOfRange`](HaloError::RankOutOfRange) | [`ErrorKind::Range`] | After reading sorted IDs |
//! | [`UnknownId`](HaloError::UnknownId) | [`ErrorKind::Range`] | After reading records |
//! | [`CatalogIo`](HaloError::CatalogIo) | [`ErrorKind::CatalogIo`] | On any storage read |
//! | [`Precondition`](HaloError::Precondition) | [`ErrorKind::Precondition`] | Grid/finder input checks |
//! | [`Unimplemented`](HaloError::Unimplemented) | [`ErrorKind::Unimplemented`] | Config validation or execution |
//!
//! None of these are retried. A run either completes fully or fails with the
//! first error encountered.
//!
//! ```
//! use halo_core::{ErrorKind, HaloError};
//!
//! let err = HaloError::rank_out_of_range(10, 4, 3);
//! assert_eq!(err.kind(), ErrorKind::Range);
//! assert!(err.to_string().contains("snapshot 10"));
//! ```

use thiserror::Error;

use crate::types::{HaloId, Snapshot};

/// Coarse classification of a [`HaloError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing selection parameters.
    Config,
    /// Requested rank or ID does not exist in the snapshot's catalog.
    Range,
    /// Underlying catalog storage failed.
    CatalogIo,
    /// Internal defect: malformed inputs to the grid or finder.
    Precondition,
    /// A recognised but unimplemented capability was requested.
    Unimplemented,
}

/// Unified error type for halo selection.
#[derive(Error, Debug)]
pub enum HaloError {
    /// Invalid or missing selection parameter.
    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    /// Mass rank beyond the end of the snapshot's catalog.
    #[error(
        "Mass rank {rank} requested in snapshot {snapshot}, but the catalog only has {halo_count} halos"
    )]
    RankOutOfRange {
        snapshot: Snapshot,
        rank: i64,
        halo_count: usize,
    },

    /// Halo ID absent from the snapshot's catalog.
    #[error("Halo ID {id} not found in the catalog of snapshot {snapshot}")]
    UnknownId { snapshot: Snapshot, id: HaloId },

    /// Storage read failure. Never retried.
    #[error("Catalog I/O error for snapshot {snapshot} ({operation}): {message}")]
    CatalogIo {
        snapshot: Snapshot,
        operation: String,
        message: String,
    },

    /// Caller defect; not data-dependent.
    #[error("Precondition violated in {context}: {message}")]
    Precondition { context: String, message: String },

    /// Capability that is reserved but not implemented.
    #[error("{capability} is not implemented")]
    Unimplemented { capability: String },
}

/// Convenience alias for `Result<T, HaloError>`.
pub type HaloResult<T> = Result<T, HaloError>;

impl HaloError {
    /// Creates a [`Config`](Self::Config) error for the named field.
    pub fn config(field: &str, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Creates a [`RankOutOfRange`](Self::RankOutOfRange) error.
    pub fn rank_out_of_range(snapshot: Snapshot, rank: i64, halo_count: usize) -> Self {
        Self::RankOutOfRange {
            snapshot,
            rank,
            halo_count,
        }
    }

    /// Creates an [`UnknownId`](Self::UnknownId) error.
    pub fn unknown_id(snapshot: Snapshot, id: HaloId) -> Self {
        Self::UnknownId { snapshot, id }
    }

    /// Creates a [`CatalogIo`](Self::CatalogIo) error.
    pub fn catalog_io(snapshot: Snapshot, operation: &str, message: impl Into<String>) -> Self {
        Self::CatalogIo {
            snapshot,
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Creates a [`Precondition`](Self::Precondition) error.
    pub fn precondition(context: &str, message: impl Into<String>) -> Self {
        Self::Precondition {
            context: context.to_string(),
            message: message.into(),
        }
    }

    /// Creates an [`Unimplemented`](Self::Unimplemented) error.
    pub fn unimplemented(capability: &str) -> Self {
        Self::Unimplemented {
            capability: capability.to_string(),
        }
    }

    /// Returns the taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::RankOutOfRange { .. } | Self::UnknownId { .. } => ErrorKind::Range,
            Self::CatalogIo { .. } => ErrorKind::CatalogIo,
            Self::Precondition { .. } => ErrorKind::Precondition,
            Self::Unimplemented { .. } => ErrorKind::Unimplemented,
        }
    }

    /// Returns `true` for errors that indicate a bug in the caller rather
    /// than bad input or bad data.
    pub fn is_fatal_defect(&self) -> bool {
        matches!(self.kind(), ErrorKind::Precondition)
    }
}
