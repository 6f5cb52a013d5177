//! Coordinate conversion module
//!
//! Provides conversions between geographic positions (longitude/latitude) and
//! Web Mercator XYZ tile coordinates, plus the filename encoding used for
//! cached tiles.

mod key;
mod types;

pub use key::{normalize_extension, KeyParseError, TileKey};
pub use types::{
    CoordError, TileCoord, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Validates a lon/lat position and zoom level.
fn validate(lon: f64, lat: f64, zoom: u8) -> Result<(), CoordError> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(CoordError::NonFinite { lon, lat });
    }
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    Ok(())
}

/// Converts a position to fractional tile coordinates.
///
/// The integer part of each component is the tile index, the fraction is the
/// offset inside that tile. X wraps around the antimeridian so that
/// longitude 180 maps to column 0.
///
/// # Arguments
///
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `zoom` - Zoom level (0 to 24)
#[inline]
pub fn to_tile_fraction(lon: f64, lat: f64, zoom: u8) -> Result<(f64, f64), CoordError> {
    validate(lon, lat, zoom)?;

    let n = 2.0_f64.powi(zoom as i32);
    let sin = (lat * PI / 180.0).sin();

    let mut x = n * (lon / 360.0 + 0.5);
    let y = n * (0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI);

    x %= n;
    if x < 0.0 {
        x += n;
    }

    Ok((x, y))
}

/// Converts a position to the tile containing it.
///
/// # Returns
///
/// A `Result` containing the tile coordinates or an error if inputs are invalid.
#[inline]
pub fn to_tile_coords(lon: f64, lat: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    let (x, y) = to_tile_fraction(lon, lat, zoom)?;
    let max_index = (2.0_f64.powi(zoom as i32) - 1.0).max(0.0);

    // The southern Mercator limit lands exactly on 2^zoom; clamp it into the last row.
    Ok(TileCoord {
        x: x.floor().min(max_index) as u32,
        y: y.floor().clamp(0.0, max_index) as u32,
        zoom,
    })
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the longitude/latitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lon_lat(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let lon = tile.x as f64 / n * 360.0 - 180.0;

    let y = tile.y as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lon, lat)
}
