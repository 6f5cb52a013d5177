//! Tile key encoding for cached tile files.
//!
//! Tiles are stored as `{x}x{y}{ext}`, for example `512x340.png`. The zoom
//! level is implicit: one working directory only ever holds a single zoom.
//!
//! Everything inside the crate passes [`TileKey`] around; the string form only
//! exists at the storage boundary.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::TileCoord;

/// Error parsing a tile key or tile filename.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    /// Name doesn't match `{x}x{y}`
    #[error("'{0}' does not match the {{x}}x{{y}} tile pattern")]
    InvalidPattern(String),

    /// Index does not fit in u32
    #[error("tile index '{0}' out of range")]
    IndexOutOfRange(String),

    /// Filename has a different extension than expected
    #[error("'{name}' does not have extension '{expected}'")]
    WrongExtension { name: String, expected: String },
}

/// Structured `(x, y)` cache key of a tile within one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

/// Pattern: `<x>x<y>`, both unsigned ASCII decimal integers.
fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]+)x([0-9]+)$").expect("tile key pattern is valid"))
}

/// Normalizes an extension to carry a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    let extension = extension.trim();
    if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}

impl TileKey {
    /// Creates a key from column and row.
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Attaches a zoom level, producing a full tile coordinate.
    pub fn with_zoom(self, zoom: u8) -> TileCoord {
        TileCoord::new(self.x, self.y, zoom)
    }

    /// Sort key placing tiles in row-major order: row first, then column.
    #[inline]
    pub fn row_major(&self) -> (u32, u32) {
        (self.y, self.x)
    }

    /// Filename of this tile for the given extension (`"png"` or `".png"`).
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}{}", self, normalize_extension(extension))
    }

    /// Parses a filename such as `2x3.png`, checking the extension.
    pub fn parse_file_name(name: &str, extension: &str) -> Result<Self, KeyParseError> {
        let expected = normalize_extension(extension);
        let stem = name
            .strip_suffix(expected.as_str())
            .ok_or_else(|| KeyParseError::WrongExtension {
                name: name.to_string(),
                expected: expected.clone(),
            })?;
        stem.parse()
    }
}

impl From<TileCoord> for TileKey {
    fn from(coord: TileCoord) -> Self {
        Self::new(coord.x, coord.y)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

impl FromStr for TileKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = key_pattern()
            .captures(s)
            .ok_or_else(|| KeyParseError::InvalidPattern(s.to_string()))?;

        let parse_index = |i: usize| -> Result<u32, KeyParseError> {
            let raw = &captures[i];
            raw.parse::<u32>()
                .map_err(|_| KeyParseError::IndexOutOfRange(raw.to_string()))
        };

        Ok(Self {
            x: parse_index(1)?,
            y: parse_index(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(TileKey::new(2, 3).to_string(), "2x3");
        assert_eq!(TileKey::new(2, 3).file_name(".png"), "2x3.png");
        assert_eq!(TileKey::new(2, 3).file_name("png"), "2x3.png");
    }

    #[test]
    fn test_parse_roundtrip() {
        for key in [
            TileKey::new(0, 0),
            TileKey::new(512, 340),
            TileKey::new(u32::MAX, 7),
        ] {
            let name = key.file_name(".pngraw");
            assert_eq!(TileKey::parse_file_name(&name, ".pngraw"), Ok(key));
        }
    }

    #[test]
    fn test_parse_rejects_wrong_extension() {
        let result = TileKey::parse_file_name("2x3.jpg", ".png");
        assert!(matches!(result, Err(KeyParseError::WrongExtension { .. })));
    }

    #[test]
    fn test_parse_rejects_non_ascii_digits() {
        for name in ["\u{0663}x4", "2x\u{0664}", "\u{FF12}x3"] {
            assert_eq!(
                name.parse::<TileKey>(),
                Err(KeyParseError::InvalidPattern(name.to_string()))
            );
        }
        let result = TileKey::parse_file_name("\u{0663}x4.png", ".png");
        assert!(matches!(result, Err(KeyParseError::InvalidPattern(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for name in ["x3", "2x", "2_3", "-2x3", "2x3x4", "ax3", ""] {
            assert!(
                matches!(name.parse::<TileKey>(), Err(KeyParseError::InvalidPattern(_))),
                "{name} should not parse"
            );
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let result = "99999999999x3".parse::<TileKey>();
        assert!(matches!(result, Err(KeyParseError::IndexOutOfRange(_))));
    }

    #[test]
    fn test_row_major_order() {
        let mut keys: Vec<TileKey> = ["3x4", "2x4", "3x3", "2x3"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        keys.sort_by_key(TileKey::row_major);
        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["2x3", "3x3", "2x4", "3x4"]);
    }

    #[test]
    fn test_row_major_compares_numerically() {
        // "10" sorts before "9" as a string; numerically it must not.
        let mut keys = vec![TileKey::new(10, 1), TileKey::new(9, 1)];
        keys.sort_by_key(TileKey::row_major);
        assert_eq!(keys, vec![TileKey::new(9, 1), TileKey::new(10, 1)]);
    }

    #[test]
    fn test_from_coord_drops_zoom() {
        let coord = TileCoord::new(4, 5, 12);
        let key = TileKey::from(coord);
        assert_eq!(key, TileKey::new(4, 5));
        assert_eq!(key.with_zoom(12), coord);
    }
}
