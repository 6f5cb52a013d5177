//! Line coverage by grid traversal.
//!
//! Each segment is walked through fractional tile space one cell boundary at
//! a time (Amanatides-Woo voxel traversal), so every tile the segment touches
//! is visited exactly once.

use crate::coord::{to_tile_fraction, CoordError};
use crate::features::Position;

use super::TileSink;

/// Visits every tile touched by the polyline `positions`.
///
/// When `ring` is given, the walk also records one cell per change of row.
/// Polygon filling uses that trace to find where the outline crosses each
/// tile row.
pub(super) fn line_cover(
    positions: &[Position],
    zoom: u8,
    sink: &mut TileSink,
    mut ring: Option<&mut Vec<(i64, i64)>>,
) -> Result<(), CoordError> {
    let Some(first) = positions.first() else {
        return Ok(());
    };

    let mut prev: Option<(i64, i64)> = None;
    let mut visit = |x: i64, y: i64, ring: &mut Option<&mut Vec<(i64, i64)>>| {
        if prev == Some((x, y)) {
            return;
        }
        sink.insert(x, y);
        if let Some(ring) = ring.as_deref_mut() {
            if prev.map(|(_, py)| py) != Some(y) {
                ring.push((x, y));
            }
        }
        prev = Some((x, y));
    };

    // A line collapsed onto a single position still covers that position.
    let (fx, fy) = to_tile_fraction(first.lon, first.lat, zoom)?;
    visit(fx.floor() as i64, fy.floor() as i64, &mut ring);

    for segment in positions.windows(2) {
        let (x0, y0) = to_tile_fraction(segment[0].lon, segment[0].lat, zoom)?;
        let (x1, y1) = to_tile_fraction(segment[1].lon, segment[1].lat, zoom)?;
        let dx = x1 - x0;
        let dy = y1 - y0;

        if dx == 0.0 && dy == 0.0 {
            continue;
        }

        let sx: i64 = if dx > 0.0 { 1 } else { -1 };
        let sy: i64 = if dy > 0.0 { 1 } else { -1 };
        let mut x = x0.floor() as i64;
        let mut y = y0.floor() as i64;

        let mut t_max_x = if dx == 0.0 {
            f64::INFINITY
        } else {
            ((if dx > 0.0 { 1.0 } else { 0.0 } + x as f64 - x0) / dx).abs()
        };
        let mut t_max_y = if dy == 0.0 {
            f64::INFINITY
        } else {
            ((if dy > 0.0 { 1.0 } else { 0.0 } + y as f64 - y0) / dy).abs()
        };
        let t_dx = (1.0 / dx).abs();
        let t_dy = (1.0 / dy).abs();

        visit(x, y, &mut ring);

        while t_max_x < 1.0 || t_max_y < 1.0 {
            if t_max_x < t_max_y {
                t_max_x += t_dx;
                x += sx;
            } else {
                t_max_y += t_dy;
                y += sy;
            }
            visit(x, y, &mut ring);
        }
    }

    // A closed ring ends on the row it started on; drop the duplicate crossing.
    if let (Some(ring), Some((_, last_y))) = (ring, prev) {
        if ring.first().map(|&(_, y)| y) == Some(last_y) {
            ring.pop();
        }
    }

    Ok(())
}
