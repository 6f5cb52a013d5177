//! Geometry coverage resolver.
//!
//! Converts feature geometries into the set of tiles that cover them at a
//! fixed zoom level:
//!
//! - Point / MultiPoint: the tile containing each position
//! - LineString / MultiLineString: every tile a segment passes through
//! - Polygon / MultiPolygon: outline tiles plus interior tiles
//!
//! Boundary tiles are always included. The union over all features is
//! deduplicated and sorted by column, then row.
//!
//! # Example
//!
//! ```
//! use terrastitch::coverage::resolve;
//! use terrastitch::features::FeatureCollection;
//!
//! let features = FeatureCollection::from_json(
//!     r#"{"features":[{"geometry":{"type":"Point","coordinates":[0,0]}}]}"#,
//! ).unwrap();
//! let coverage = resolve(&features, 10).unwrap();
//! assert_eq!(coverage.len(), 1);
//! ```

mod line;
mod polygon;

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info};

use crate::coord::{to_tile_coords, CoordError, TileCoord, MAX_ZOOM};
use crate::error::{StitchError, StitchResult};
use crate::features::{FeatureCollection, Geometry, Position};

use line::line_cover;
use polygon::polygon_cover;

/// Minimum positions in a LineString.
const MIN_LINE_POSITIONS: usize = 2;

/// Minimum positions in a closed polygon ring.
const MIN_RING_POSITIONS: usize = 4;

/// Reasons a single geometry cannot be covered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoverError {
    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error("{kind} needs at least {required} positions, got {found}")]
    TooFewPositions {
        kind: &'static str,
        required: usize,
        found: usize,
    },
}

/// Accumulates tile cells visited by the covering walks.
///
/// Cells are clamped into the pyramid: the southern Mercator limit lands
/// exactly on row `2^zoom`, which belongs to the last row.
pub(crate) struct TileSink {
    zoom: u8,
    max_index: i64,
    tiles: HashSet<TileCoord>,
}

impl TileSink {
    pub(crate) fn new(zoom: u8) -> Self {
        Self {
            zoom,
            max_index: (1i64 << zoom) - 1,
            tiles: HashSet::new(),
        }
    }

    pub(crate) fn insert(&mut self, x: i64, y: i64) {
        let x = x.clamp(0, self.max_index) as u32;
        let y = y.clamp(0, self.max_index) as u32;
        self.tiles.insert(TileCoord::new(x, y, self.zoom));
    }

    fn insert_point(&mut self, position: &Position) -> Result<(), CoordError> {
        self.tiles
            .insert(to_tile_coords(position.lon, position.lat, self.zoom)?);
        Ok(())
    }

    pub(crate) fn into_coords(self) -> impl Iterator<Item = TileCoord> {
        self.tiles.into_iter()
    }
}

fn check_line(positions: &[Position]) -> Result<(), CoverError> {
    if positions.len() < MIN_LINE_POSITIONS {
        return Err(CoverError::TooFewPositions {
            kind: "LineString",
            required: MIN_LINE_POSITIONS,
            found: positions.len(),
        });
    }
    Ok(())
}

fn check_rings(rings: &[Vec<Position>]) -> Result<(), CoverError> {
    for ring in rings {
        if ring.len() < MIN_RING_POSITIONS {
            return Err(CoverError::TooFewPositions {
                kind: "Polygon ring",
                required: MIN_RING_POSITIONS,
                found: ring.len(),
            });
        }
    }
    Ok(())
}

/// Adds every tile intersecting `geometry` at the sink's zoom.
pub(crate) fn cover_geometry(geometry: &Geometry, sink: &mut TileSink) -> Result<(), CoverError> {
    let zoom = sink.zoom;
    match geometry {
        Geometry::Point(position) => sink.insert_point(position)?,
        Geometry::MultiPoint(positions) => {
            for position in positions {
                sink.insert_point(position)?;
            }
        }
        Geometry::LineString(positions) => {
            check_line(positions)?;
            line_cover(positions, zoom, sink, None)?;
        }
        Geometry::MultiLineString(lines) => {
            for positions in lines {
                check_line(positions)?;
                line_cover(positions, zoom, sink, None)?;
            }
        }
        Geometry::Polygon(rings) => {
            check_rings(rings)?;
            polygon_cover(rings, zoom, sink)?;
        }
        Geometry::MultiPolygon(polygons) => {
            for rings in polygons {
                check_rings(rings)?;
                polygon_cover(rings, zoom, sink)?;
            }
        }
    }
    Ok(())
}

/// Unique tile coordinates covering a feature collection.
///
/// Sorted ascending by column, ties broken by row. All coordinates share the
/// same zoom level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSet {
    zoom: u8,
    tiles: Vec<TileCoord>,
}

impl CoverageSet {
    /// Builds a coverage set from arbitrary coordinates at `zoom`.
    ///
    /// Duplicates are removed and the result is sorted.
    pub fn new(zoom: u8, tiles: impl IntoIterator<Item = TileCoord>) -> Self {
        let mut tiles: Vec<TileCoord> = tiles.into_iter().collect();
        tiles.sort_unstable();
        tiles.dedup();
        Self { zoom, tiles }
    }

    /// Zoom level shared by every coordinate.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tile covers the input.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles in column-then-row order.
    pub fn tiles(&self) -> &[TileCoord] {
        &self.tiles
    }

    /// Iterates tiles in column-then-row order.
    pub fn iter(&self) -> std::slice::Iter<'_, TileCoord> {
        self.tiles.iter()
    }

    /// Whether the set contains `coord`.
    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.tiles.binary_search(coord).is_ok()
    }
}

impl<'a> IntoIterator for &'a CoverageSet {
    type Item = &'a TileCoord;
    type IntoIter = std::slice::Iter<'a, TileCoord>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}

/// Resolves the tiles covering every feature geometry at `zoom`.
///
/// # Errors
///
/// - [`StitchError::InvalidZoom`] if `zoom` exceeds [`MAX_ZOOM`]
/// - [`StitchError::EmptyFeatureSet`] if the collection has no features
/// - [`StitchError::InvalidGeometry`] for the first malformed or
///   unsupported geometry
pub fn resolve(features: &FeatureCollection, zoom: u8) -> StitchResult<CoverageSet> {
    if zoom > MAX_ZOOM {
        return Err(StitchError::InvalidZoom(zoom));
    }
    if features.is_empty() {
        return Err(StitchError::EmptyFeatureSet);
    }

    let geometries = features.geometries()?;
    let mut sink = TileSink::new(zoom);

    for (index, geometry) in geometries.iter().enumerate() {
        let before = sink.tiles.len();
        cover_geometry(geometry, &mut sink).map_err(|e| StitchError::InvalidGeometry {
            index,
            reason: e.to_string(),
        })?;
        debug!(
            feature = index,
            geometry = geometry.type_name(),
            new_tiles = sink.tiles.len() - before,
            "Covered feature"
        );
    }

    let coverage = CoverageSet::new(zoom, sink.into_coords());
    info!(
        features = features.len(),
        zoom,
        tiles = coverage.len(),
        "Resolved tile coverage"
    );
    Ok(coverage)
}
