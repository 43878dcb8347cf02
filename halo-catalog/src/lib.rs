//! Cached halo catalog access and halo ID selection with subhalo exclusion.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`reader`] | [`CatalogReader`] seam, [`MemoryCatalog`], [`AsciiCatalog`] |
//! | [`cache`] | [`CatalogCache`], per-snapshot memoization of headers, sorted IDs and records |
//! | [`resolve`] | [`resolve_ids`], mass ranks or raw IDs to catalog IDs |
//! | [`select`] | [`run_selection`], the resolve / exclude / expand pipeline |
//! | [`output`] | [`format_selection`], `ID Snapshot` text rows |
//! | [`config`] | [`parse_config`], TOML configuration for the `halo-id` binary |
//!
//! The storage reader is the only thing that touches disk; everything above
//! it goes through one [`CatalogCache`] owned by the caller, so a catalog is
//! read at most once per snapshot and bound.

pub mod cache;
pub mod config;
pub mod output;
pub mod reader;
pub mod resolve;
pub mod select;

pub use cache::{CacheStats, CatalogCache, RankBound};
pub use config::{parse_config, parse_config_str, IdConfigFile, EXAMPLE_CONFIG};
pub use output::format_selection;
pub use reader::{AsciiCatalog, AsciiLayout, CatalogColumns, CatalogReader, Column, MemoryCatalog};
pub use resolve::{resolve_ids, IdType, SelectedHalo, Selectors};
pub use select::{run_selection, ExclusionStrategy, SelectionRequest};
