//! Geometry in a periodic cubic box.
//!
//! Coordinates live on a torus of side `width`. Distances use the minimal
//! image convention: along each axis the separation is folded into
//! `[-width/2, width/2]` before squaring.

use crate::types::Position;

/// Wrap a coordinate into `[0, width)`.
///
/// Values a rounding error below `width` after the modulo are folded to 0
/// so the result never equals `width`.
#[inline]
pub fn wrap_coordinate(x: f64, width: f64) -> f64 {
    let wrapped = x.rem_euclid(width);
    if wrapped >= width {
        0.0
    } else {
        wrapped
    }
}

/// Minimal-image separation along one axis, in `[-width/2, width/2]`.
#[inline]
pub fn minimal_image_delta(a: f64, b: f64, width: f64) -> f64 {
    let mut d = (b - a).rem_euclid(width);
    if d > width * 0.5 {
        d -= width;
    }
    d
}

/// Squared minimal-image distance between two positions.
#[inline]
pub fn periodic_distance_sq(a: &Position, b: &Position, width: f64) -> f64 {
    let dx = minimal_image_delta(a[0], b[0], width);
    let dy = minimal_image_delta(a[1], b[1], width);
    let dz = minimal_image_delta(a[2], b[2], width);
    dx * dx + dy * dy + dz * dz
}
