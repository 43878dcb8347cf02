//! Text rendering of selection rows.
//!
//! Downstream tools read the `ID Snapshot` column layout, so it is fixed:
//! a `#` header naming each column with its zero-based index, then one
//! line per row.

use crate::resolve::SelectedHalo;

/// Column names of a selection, in output order.
pub const SELECTION_COLUMNS: [&str; 2] = ["ID", "Snapshot"];

/// Header line naming each column and the output columns it spans.
///
/// A column of width 1 is written `Name(i)`, a wider one `Name(i-j)`.
pub fn comment_string(names: &[&str], widths: &[usize]) -> String {
    let mut parts = Vec::with_capacity(names.len());
    let mut start = 0;
    for (name, &width) in names.iter().zip(widths) {
        let width = width.max(1);
        if width == 1 {
            parts.push(format!("{}({})", name, start));
        } else {
            parts.push(format!("{}({}-{})", name, start, start + width - 1));
        }
        start += width;
    }
    format!("# Column contents: {}", parts.join(" "))
}

/// Render integer columns as lines, each column right-aligned to its widest
/// value and columns separated by two spaces.
///
/// Every column must have the same length; extra rows of longer columns are
/// ignored.
pub fn format_int_columns(columns: &[Vec<i64>]) -> Vec<String> {
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let widths: Vec<usize> = columns
        .iter()
        .map(|col| {
            col.iter()
                .take(rows)
                .map(|v| v.to_string().len())
                .max()
                .unwrap_or(0)
        })
        .collect();

    (0..rows)
        .map(|row| {
            columns
                .iter()
                .zip(&widths)
                .map(|(col, &w)| format!("{:>w$}", col[row], w = w))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect()
}

/// Header plus one line per row.
pub fn format_selection(rows: &[SelectedHalo]) -> Vec<String> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let snaps: Vec<i64> = rows.iter().map(|r| i64::from(r.snapshot)).collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(comment_string(&SELECTION_COLUMNS, &[1, 1]));
    lines.extend(format_int_columns(&[ids, snaps]));
    lines
}
