//! Tile coordinate types and validation errors.

use std::fmt;

use thiserror::Error;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.051_128_779_806_6;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -MAX_LAT;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Minimum supported zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum supported zoom level.
///
/// Tile indices at this zoom still fit comfortably in `u32`.
pub const MAX_ZOOM: u8 = 24;

/// Errors raised when converting geographic positions to tiles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("latitude {0} outside Web Mercator range [{MIN_LAT}, {MAX_LAT}]")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("longitude {0} outside [-180, 180]")]
    InvalidLongitude(f64),

    /// Zoom level above [`MAX_ZOOM`].
    #[error("zoom level {0} exceeds maximum of {MAX_ZOOM}")]
    InvalidZoom(u8),

    /// Position contains NaN or infinity.
    #[error("non-finite coordinate ({lon}, {lat})")]
    NonFinite { lon: f64, lat: f64 },
}

/// A single cell of the XYZ tile pyramid.
///
/// - `x`: column, 0 to 2^zoom - 1, west to east
/// - `y`: row, 0 to 2^zoom - 1, north to south
///
/// Ordering is lexicographic on `(x, y, zoom)`. Within one run the zoom is
/// fixed, so sorting a coverage set yields ascending columns with ties
/// broken by ascending rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
    /// Zoom level.
    pub zoom: u8,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Number of tiles along one axis at this coordinate's zoom.
    #[inline]
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.zoom
    }

    /// Whether both indices are inside the pyramid at this zoom.
    pub fn is_valid(&self) -> bool {
        self.zoom <= MAX_ZOOM
            && u64::from(self.x) < self.tiles_per_axis()
            && u64::from(self.y) < self.tiles_per_axis()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}
