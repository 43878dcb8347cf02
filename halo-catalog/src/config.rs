//! TOML configuration for the `halo-id` tool.
//!
//! Two tables: `[catalog]` says where snapshot catalogs live and how to read
//! them, `[id]` describes the selection. Everything is checked by
//! [`IdConfigFile::validate`] before any catalog is opened.

use std::fs;
use std::path::Path;

use halo_core::{HaloError, HaloResult, Snapshot};
use serde::Deserialize;

use crate::reader::ascii::SNAP_PLACEHOLDER;
use crate::reader::AsciiLayout;
use crate::resolve::{IdType, Selectors};
use crate::select::{ExclusionStrategy, SelectionRequest, DEFAULT_FINDER_CELLS};

/// Annotated configuration printed by `halo-id example-config`.
pub const EXAMPLE_CONFIG: &str = r##"[catalog]
# Catalog file of each snapshot; {snap} is replaced by the snapshot index.
# Relative paths are taken from the directory holding this file.
path_template = "halos/out_{snap}.list"
# Zero-based field indices within each halo line.
id_column = 0
position_columns = [8, 9, 10]
radius_column = 5
mass_column = 2
# Converts radii to position units (kpc/h -> Mpc/h).
radius_scale = 0.001
# Optional. Defaults to the "#Box size:" comment of each catalog.
# box_width = 125.0
# Optional range of valid snapshot indices.
snap_min = 0
snap_max = 100

[id]
# Snapshot the selection is made in.
snap = 100
# Either an explicit list of selectors...
ids = [0, 1, 2, 3, 4]
# ...or a half-open range [id_start, id_end).
# id_start = 0
# id_end = 10
# "m200m": selectors are mass ranks, 0 being the most massive halo.
# "halo-id": selectors are catalog IDs.
id_type = "m200m"
# "none", "overlap", or "subhalo" (reserved, not implemented).
exclusion_strategy = "overlap"
# A halo is dropped if it sits within this multiple of a larger halo's radius.
exclusion_radius_mult = 1.0
# Number of times each surviving halo is repeated in the output.
mult = 1
# Grid cells per side used by the overlap search.
finder_cells = 150
"##;

/// A parsed configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdConfigFile {
    pub catalog: CatalogSettings,
    pub id: IdSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogSettings {
    pub path_template: String,
    pub id_column: usize,
    pub position_columns: [usize; 3],
    pub radius_column: usize,
    pub mass_column: usize,
    #[serde(default = "default_radius_scale")]
    pub radius_scale: f64,
    pub box_width: Option<f64>,
    pub snap_min: Option<i64>,
    pub snap_max: Option<i64>,
}

fn default_radius_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdSettings {
    pub snap: Option<i64>,
    pub ids: Option<Vec<i64>>,
    pub id_start: Option<i64>,
    pub id_end: Option<i64>,
    #[serde(default = "default_id_type")]
    pub id_type: IdType,
    #[serde(default = "default_exclusion_strategy")]
    pub exclusion_strategy: ExclusionStrategy,
    #[serde(default = "default_exclusion_radius_mult")]
    pub exclusion_radius_mult: f64,
    #[serde(default = "default_mult")]
    pub mult: i64,
    #[serde(default = "default_finder_cells")]
    pub finder_cells: usize,
}

fn default_id_type() -> IdType {
    IdType::M200m
}

fn default_exclusion_strategy() -> ExclusionStrategy {
    ExclusionStrategy::Overlap
}

fn default_exclusion_radius_mult() -> f64 {
    1.0
}

fn default_mult() -> i64 {
    1
}

fn default_finder_cells() -> usize {
    DEFAULT_FINDER_CELLS
}

/// Read and validate a configuration file.
///
/// A relative `path_template` is resolved against the file's directory.
pub fn parse_config(path: &Path) -> HaloResult<IdConfigFile> {
    let contents = fs::read_to_string(path).map_err(|e| {
        HaloError::config(
            "config",
            format!("failed to read {}: {}", path.display(), e),
        )
    })?;
    let mut config = parse_config_str(&contents)?;

    let template = Path::new(&config.catalog.path_template);
    if template.is_relative() {
        if let Some(dir) = path.parent() {
            config.catalog.path_template = dir.join(template).to_string_lossy().into_owned();
        }
    }
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config_str(contents: &str) -> HaloResult<IdConfigFile> {
    let config: IdConfigFile = toml::from_str(contents).map_err(|e| {
        HaloError::config("config", format!("invalid TOML: {}", e.to_string().trim_end()))
    })?;
    config.validate()?;
    Ok(config)
}

impl IdConfigFile {
    /// Check every field without touching storage.
    ///
    /// # Errors
    /// [`HaloError::Config`] for missing or bad values,
    /// [`HaloError::Unimplemented`] for `exclusion_strategy = "subhalo"`.
    pub fn validate(&self) -> HaloResult<()> {
        let cat = &self.catalog;
        if !cat.path_template.contains(SNAP_PLACEHOLDER) {
            return Err(HaloError::config(
                "path_template",
                format!("must contain '{}'", SNAP_PLACEHOLDER),
            ));
        }
        if !(cat.radius_scale > 0.0 && cat.radius_scale.is_finite()) {
            return Err(HaloError::config(
                "radius_scale",
                format!("must be positive, got {}", cat.radius_scale),
            ));
        }
        if let Some(width) = cat.box_width {
            if !(width > 0.0 && width.is_finite()) {
                return Err(HaloError::config(
                    "box_width",
                    format!("must be positive, got {}", width),
                ));
            }
        }
        if let (Some(lo), Some(hi)) = (cat.snap_min, cat.snap_max) {
            if hi < lo {
                return Err(HaloError::config(
                    "snap_max",
                    format!("{} is below snap_min = {}", hi, lo),
                ));
            }
        }

        self.snapshot()?;
        self.selectors()?;
        if self.id.mult < 1 {
            return Err(HaloError::config(
                "mult",
                format!("must be at least 1, got {}", self.id.mult),
            ));
        }
        self.to_request_unchecked()?.validate()
    }

    /// The validated snapshot index.
    pub fn snapshot(&self) -> HaloResult<Snapshot> {
        let snap = self
            .id
            .snap
            .ok_or_else(|| HaloError::config("snap", "not set"))?;
        let lo = self.catalog.snap_min.unwrap_or(0).max(0);
        let hi = self.catalog.snap_max.unwrap_or(i64::from(Snapshot::MAX));
        if snap < lo || snap > hi {
            return Err(HaloError::config(
                "snap",
                format!("{} is outside the valid range [{}, {}]", snap, lo, hi),
            ));
        }
        Snapshot::try_from(snap)
            .map_err(|_| HaloError::config("snap", format!("{} is not a valid index", snap)))
    }

    /// The selectors given by either `ids` or `id_start`/`id_end`.
    pub fn selectors(&self) -> HaloResult<Selectors> {
        let id = &self.id;
        match (&id.ids, id.id_start, id.id_end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(HaloError::config(
                "ids",
                "give either 'ids' or 'id_start'/'id_end', not both",
            )),
            (Some(ids), None, None) => Ok(Selectors::List(ids.clone())),
            (None, Some(start), Some(end)) => {
                if end < start {
                    return Err(HaloError::config(
                        "id_end",
                        format!("set to {}, but 'id_start' is {}", end, start),
                    ));
                }
                Ok(Selectors::Range { start, end })
            }
            (None, Some(_), None) => Err(HaloError::config("id_end", "not set")),
            (None, None, Some(_)) => Err(HaloError::config("id_start", "not set")),
            (None, None, None) => Err(HaloError::config(
                "ids",
                "not set; give 'ids' or 'id_start'/'id_end'",
            )),
        }
    }

    /// The selection this file describes.
    pub fn to_request(&self) -> HaloResult<SelectionRequest> {
        self.validate()?;
        self.to_request_unchecked()
    }

    fn to_request_unchecked(&self) -> HaloResult<SelectionRequest> {
        let mult = usize::try_from(self.id.mult)
            .map_err(|_| HaloError::config("mult", format!("{} is out of range", self.id.mult)))?;
        Ok(
            SelectionRequest::new(self.id.id_type, self.selectors()?, self.snapshot()?)
                .with_exclusion(self.id.exclusion_strategy, self.id.exclusion_radius_mult)
                .with_mult(mult)
                .with_finder_cells(self.id.finder_cells),
        )
    }

    /// Reader layout for the `[catalog]` table.
    pub fn layout(&self) -> AsciiLayout {
        let cat = &self.catalog;
        AsciiLayout {
            path_template: cat.path_template.clone(),
            id_column: cat.id_column,
            position_columns: cat.position_columns,
            radius_column: cat.radius_column,
            mass_column: cat.mass_column,
            radius_scale: cat.radius_scale,
            box_width: cat.box_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_core::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[catalog]
path_template = "out_{snap}.list"
id_column = 0
position_columns = [1, 2, 3]
radius_column = 4
mass_column = 5

[id]
snap = 3
ids = [0, 1]
"#;

    fn with_id_line(line: &str) -> String {
        MINIMAL.replace("ids = [0, 1]", line)
    }

    fn config_err(text: &str) -> HaloError {
        parse_config_str(text).unwrap_err()
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = parse_config_str(EXAMPLE_CONFIG).unwrap();
        let request = config.to_request().unwrap();
        assert_eq!(request.snapshot, 100);
        assert_eq!(request.id_type, IdType::M200m);
        assert_eq!(request.exclusion, ExclusionStrategy::Overlap);
        assert_eq!(config.layout().radius_scale, 0.001);
    }

    #[test]
    fn test_defaults() {
        let config = parse_config_str(MINIMAL).unwrap();
        assert_eq!(config.catalog.radius_scale, 1.0);
        assert_eq!(config.catalog.box_width, None);
        let request = config.to_request().unwrap();
        assert_eq!(request.id_type, IdType::M200m);
        assert_eq!(request.exclusion, ExclusionStrategy::Overlap);
        assert_eq!(request.exclusion_radius_mult, 1.0);
        assert_eq!(request.mult, 1);
        assert_eq!(request.finder_cells, DEFAULT_FINDER_CELLS);
        assert_eq!(request.selectors, Selectors::List(vec![0, 1]));
    }

    #[test]
    fn test_range_selectors() {
        let config = parse_config_str(&with_id_line("id_start = 2\nid_end = 5")).unwrap();
        assert_eq!(
            config.selectors().unwrap(),
            Selectors::Range { start: 2, end: 5 }
        );
    }

    #[test]
    fn test_missing_or_partial_selectors() {
        for line in ["", "id_start = 2", "id_end = 5", "id_start = 5\nid_end = 2"] {
            let err = config_err(&with_id_line(line));
            assert_eq!(err.kind(), ErrorKind::Config, "{:?}", line);
        }
        let both = MINIMAL.replace("ids = [0, 1]", "ids = [0]\nid_start = 0\nid_end = 1");
        assert_eq!(config_err(&both).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_unknown_enum_values_are_config_errors() {
        let err = config_err(&format!("{}id_type = \"mvir\"\n", MINIMAL));
        assert_eq!(err.kind(), ErrorKind::Config);
        let err = config_err(&format!("{}exclusion_strategy = \"nearest\"\n", MINIMAL));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_subhalo_strategy_is_unimplemented() {
        let err = config_err(&format!("{}exclusion_strategy = \"subhalo\"\n", MINIMAL));
        assert_eq!(err.kind(), ErrorKind::Unimplemented);
    }

    #[test]
    fn test_bad_numeric_fields() {
        for extra in [
            "exclusion_radius_mult = 0.0",
            "mult = 0",
            "finder_cells = 0",
        ] {
            let err = config_err(&format!("{}{}\n", MINIMAL, extra));
            assert_eq!(err.kind(), ErrorKind::Config, "{}", extra);
        }
        let no_mult_needed = format!(
            "{}exclusion_strategy = \"none\"\nexclusion_radius_mult = 0.0\n",
            MINIMAL
        );
        assert!(parse_config_str(&no_mult_needed).is_ok());
    }

    #[test]
    fn test_snapshot_checks() {
        let missing = MINIMAL.replace("snap = 3\n", "");
        assert_eq!(config_err(&missing).kind(), ErrorKind::Config);

        let negative = MINIMAL.replace("snap = 3", "snap = -1");
        assert_eq!(config_err(&negative).kind(), ErrorKind::Config);

        let outside = MINIMAL.replace("mass_column = 5", "mass_column = 5\nsnap_min = 4\nsnap_max = 9");
        let err = config_err(&outside);
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("snap"));
    }

    #[test]
    fn test_template_needs_placeholder() {
        let text = MINIMAL.replace("out_{snap}.list", "out.list");
        assert_eq!(config_err(&text).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = format!("{}colour = \"red\"\n", MINIMAL);
        assert_eq!(config_err(&text).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_parse_config_resolves_relative_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = parse_config(&path).unwrap();
        let expected = dir.path().join("out_{snap}.list");
        assert_eq!(config.catalog.path_template, expected.to_string_lossy());
    }

    #[test]
    fn test_parse_config_keeps_absolute_template() {
        let mut file = NamedTempFile::new().unwrap();
        let text = MINIMAL.replace("out_{snap}.list", "/data/halos/out_{snap}.list");
        file.write_all(text.as_bytes()).unwrap();

        let config = parse_config(file.path()).unwrap();
        assert_eq!(config.catalog.path_template, "/data/halos/out_{snap}.list");
    }

    #[test]
    fn test_missing_file() {
        let err = parse_config(Path::new("/nonexistent/id.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
