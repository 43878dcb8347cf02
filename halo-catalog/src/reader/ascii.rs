//! Reader for Rockstar-style ASCII halo catalogs.
//!
//! One file per snapshot, located by substituting the snapshot index into a
//! path template (`halos/out_{snap}.list`). Each file is memory-mapped and
//! scanned line by line:
//!
//! - Lines starting with `#` are comments. A `#Box size: <L> ...` comment
//!   gives the periodic box width.
//! - Blank lines are skipped.
//! - Every other line is one halo, fields separated by whitespace, with the
//!   columns of interest picked out by zero-based index.
//!
//! Radii are multiplied by [`AsciiLayout::radius_scale`] so that they end up
//! in the same units as positions (Rockstar writes radii in kpc/h and
//! positions in Mpc/h, hence a scale of `0.001`).

use std::fs::File;
use std::path::PathBuf;

use halo_core::{HaloError, HaloResult, Snapshot, SnapshotHeader};
use log::debug;
use memmap2::Mmap;

use super::{CatalogColumns, CatalogReader, Column};

/// Placeholder replaced by the snapshot index in a path template.
pub const SNAP_PLACEHOLDER: &str = "{snap}";

const BOX_SIZE_TAG: &str = "Box size:";

/// Where to find each snapshot's file and which fields hold which column.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiLayout {
    pub path_template: String,
    pub id_column: usize,
    pub position_columns: [usize; 3],
    pub radius_column: usize,
    pub mass_column: usize,
    pub radius_scale: f64,
    /// Overrides the `#Box size:` comment when set.
    pub box_width: Option<f64>,
}

/// [`CatalogReader`] over Rockstar-style text files.
#[derive(Debug, Clone)]
pub struct AsciiCatalog {
    layout: AsciiLayout,
}

impl AsciiCatalog {
    pub fn new(layout: AsciiLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &AsciiLayout {
        &self.layout
    }

    /// Path of the catalog file for `snapshot`.
    pub fn path_for(&self, snapshot: Snapshot) -> PathBuf {
        PathBuf::from(
            self.layout
                .path_template
                .replace(SNAP_PLACEHOLDER, &snapshot.to_string()),
        )
    }

    /// Map the snapshot's file and hand its text to `f`.
    fn with_text<T>(
        &self,
        snapshot: Snapshot,
        operation: &str,
        f: impl FnOnce(&str) -> HaloResult<T>,
    ) -> HaloResult<T> {
        let path = self.path_for(snapshot);
        let io_err = |msg: String| HaloError::catalog_io(snapshot, operation, msg);

        let file = File::open(&path)
            .map_err(|e| io_err(format!("failed to open {}: {}", path.display(), e)))?;
        let len = file
            .metadata()
            .map_err(|e| io_err(format!("failed to stat {}: {}", path.display(), e)))?
            .len();
        debug!("Mapping {} ({} bytes)", path.display(), len);

        // Zero-length files cannot be mapped.
        if len == 0 {
            return f("");
        }

        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| io_err(format!("failed to memory-map {}: {}", path.display(), e)))?;
        let text = std::str::from_utf8(&mmap)
            .map_err(|e| io_err(format!("{} is not valid UTF-8: {}", path.display(), e)))?;
        f(text)
    }

    fn parse_box_width(&self, snapshot: Snapshot, text: &str) -> HaloResult<f64> {
        if let Some(width) = self.layout.box_width {
            return Ok(width);
        }
        for line in text.lines() {
            let Some(comment) = line.trim_start().strip_prefix('#') else {
                continue;
            };
            let Some(rest) = comment.trim_start().strip_prefix(BOX_SIZE_TAG) else {
                continue;
            };
            let token = rest.split_whitespace().next().unwrap_or("");
            return token.parse::<f64>().map_err(|_| {
                HaloError::catalog_io(
                    snapshot,
                    "read header",
                    format!("cannot parse box size from '{}'", line.trim()),
                )
            });
        }
        Err(HaloError::catalog_io(
            snapshot,
            "read header",
            format!(
                "{} has no '#{}' comment and no box_width is configured",
                self.path_for(snapshot).display(),
                BOX_SIZE_TAG
            ),
        ))
    }

    fn field_index(&self, column: Column) -> usize {
        match column {
            Column::Id => self.layout.id_column,
            Column::X => self.layout.position_columns[0],
            Column::Y => self.layout.position_columns[1],
            Column::Z => self.layout.position_columns[2],
            Column::Radius => self.layout.radius_column,
            Column::Mass => self.layout.mass_column,
        }
    }
}

/// Data lines paired with their 1-based line numbers.
fn data_lines<'a>(text: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    text.lines().enumerate().filter_map(|(i, line)| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            None
        } else {
            Some((i + 1, trimmed))
        }
    })
}

impl CatalogReader for AsciiCatalog {
    fn read_header(&self, snapshot: Snapshot) -> HaloResult<SnapshotHeader> {
        self.with_text(snapshot, "read header", |text| {
            let box_width = self.parse_box_width(snapshot, text)?;
            if !(box_width.is_finite() && box_width > 0.0) {
                return Err(HaloError::catalog_io(
                    snapshot,
                    "read header",
                    format!("box width must be positive, got {}", box_width),
                ));
            }
            Ok(SnapshotHeader {
                box_width,
                halo_count: data_lines(text).count(),
            })
        })
    }

    fn read_catalog(&self, snapshot: Snapshot, columns: &[Column]) -> HaloResult<CatalogColumns> {
        let path = self.path_for(snapshot);
        self.with_text(snapshot, "read catalog", |text| {
            let mut out = CatalogColumns::default();
            let mut fields: Vec<&str> = Vec::new();

            for (line_no, line) in data_lines(text) {
                fields.clear();
                fields.extend(line.split_whitespace());

                for &col in columns {
                    let idx = self.field_index(col);
                    let token = fields.get(idx).ok_or_else(|| {
                        HaloError::catalog_io(
                            snapshot,
                            "read catalog",
                            format!(
                                "{}:{}: column {} requested but line has {} fields",
                                path.display(),
                                line_no,
                                idx,
                                fields.len()
                            ),
                        )
                    })?;
                    let bad = || {
                        HaloError::catalog_io(
                            snapshot,
                            "read catalog",
                            format!(
                                "{}:{}: cannot parse {:?} value '{}'",
                                path.display(),
                                line_no,
                                col,
                                token
                            ),
                        )
                    };
                    match col {
                        Column::Id => out.ids.push(token.parse().map_err(|_| bad())?),
                        Column::X => out.x.push(token.parse().map_err(|_| bad())?),
                        Column::Y => out.y.push(token.parse().map_err(|_| bad())?),
                        Column::Z => out.z.push(token.parse().map_err(|_| bad())?),
                        Column::Radius => {
                            let r: f64 = token.parse().map_err(|_| bad())?;
                            out.radius.push(r * self.layout.radius_scale);
                        }
                        Column::Mass => out.mass.push(token.parse().map_err(|_| bad())?),
                    }
                }
            }

            debug!(
                "Read {} halos ({:?}) from {}",
                out.ids.len().max(out.mass.len()),
                columns,
                path.display()
            );
            Ok(out)
        })
    }
}
