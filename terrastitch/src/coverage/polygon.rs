//! Polygon coverage: outline walk plus scanline fill.

use crate::coord::CoordError;
use crate::features::Position;

use super::line::line_cover;
use super::TileSink;

/// Visits every tile touched by the polygon outline or lying inside it.
///
/// Holes are handled by the even-odd rule: crossings of all rings are pooled
/// per tile row, sorted by column, and the cells strictly between each pair
/// of crossings are filled.
pub(super) fn polygon_cover(
    rings: &[Vec<Position>],
    zoom: u8,
    sink: &mut TileSink,
) -> Result<(), CoordError> {
    let mut crossings: Vec<(i64, i64)> = Vec::new();

    for ring_positions in rings {
        let mut ring = Vec::new();
        line_cover(ring_positions, zoom, sink, Some(&mut ring))?;

        let len = ring.len();
        for j in 0..len {
            let k = (j + len - 1) % len;
            let m = (j + 1) % len;
            let y = ring[j].1;
            let prev_y = ring[k].1;
            let next_y = ring[m].1;

            let local_min = y <= prev_y && y <= next_y;
            let local_max = y >= prev_y && y >= next_y;
            if !local_min && !local_max && y != next_y {
                crossings.push(ring[j]);
            }
        }
    }

    crossings.sort_by_key(|&(x, y)| (y, x));

    for pair in crossings.chunks_exact(2) {
        let y = pair[0].1;
        for x in (pair[0].0 + 1)..pair[1].0 {
            sink.insert(x, y);
        }
    }

    Ok(())
}
