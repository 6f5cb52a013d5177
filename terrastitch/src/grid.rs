//! Grid bounds calculation and the bounds sidecar.
//!
//! The bounding box of a coverage set fixes the layout of the composite: the
//! assembler places `width` tiles per row and downstream consumers read the
//! same box back from `<output>Bounds.json` to georeference the raster.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coord::TileCoord;
use crate::coverage::CoverageSet;
use crate::error::{StitchError, StitchResult};

/// Suffix appended to the output prefix for the bounds sidecar.
pub const SIDECAR_SUFFIX: &str = "Bounds.json";

/// Smallest axis-aligned tile rectangle enclosing a coverage set.
///
/// Serializes as `{ "box": [minX, minY, maxX, maxY], "width": w, "height": h }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    #[serde(rename = "box")]
    bbox: [u32; 4],
    width: u32,
    height: u32,
}

impl GridBounds {
    /// Creates bounds from inclusive corner indices.
    ///
    /// Corners are reordered if given reversed.
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        let (min_x, max_x) = (min_x.min(max_x), min_x.max(max_x));
        let (min_y, max_y) = (min_y.min(max_y), min_y.max(max_y));
        Self {
            bbox: [min_x, min_y, max_x, max_y],
            width: 1 + max_x - min_x,
            height: 1 + max_y - min_y,
        }
    }

    pub fn min_x(&self) -> u32 {
        self.bbox[0]
    }

    pub fn min_y(&self) -> u32 {
        self.bbox[1]
    }

    pub fn max_x(&self) -> u32 {
        self.bbox[2]
    }

    pub fn max_y(&self) -> u32 {
        self.bbox[3]
    }

    /// `[minX, minY, maxX, maxY]`
    pub fn bbox(&self) -> [u32; 4] {
        self.bbox
    }

    /// Tiles per row.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total cells in the box.
    pub fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `coord` lies inside the box (zoom is not checked).
    pub fn contains(&self, coord: &TileCoord) -> bool {
        (self.min_x()..=self.max_x()).contains(&coord.x)
            && (self.min_y()..=self.max_y()).contains(&coord.y)
    }

    /// Column of `coord` within the composite, if inside the box.
    pub fn column_of(&self, coord: &TileCoord) -> Option<u32> {
        self.contains(coord).then(|| coord.x - self.min_x())
    }

    /// Row of `coord` within the composite, if inside the box.
    pub fn row_of(&self, coord: &TileCoord) -> Option<u32> {
        self.contains(coord).then(|| coord.y - self.min_y())
    }

    /// Every cell of the box at `zoom`, row by row, west to east.
    pub fn coords(&self, zoom: u8) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_y()..=self.max_y()).flat_map(move |y| {
            (self.min_x()..=self.max_x()).map(move |x| TileCoord::new(x, y, zoom))
        })
    }

    /// Serializes the bounds as pretty JSON.
    pub fn to_json(&self) -> StitchResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            StitchError::io(
                SIDECAR_SUFFIX,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Writes the bounds sidecar to `path`.
    pub fn write_sidecar(&self, path: &Path) -> StitchResult<()> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| StitchError::io(path, e))?;
        debug!(path = %path.display(), bbox = ?self.bbox, "Wrote bounds sidecar");
        Ok(())
    }

    /// Reads a sidecar written by [`GridBounds::write_sidecar`].
    pub fn read_sidecar(path: &Path) -> StitchResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| StitchError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| StitchError::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Path of the bounds sidecar for an output prefix.
///
/// `out/ridge` becomes `out/ridgeBounds.json`.
pub fn sidecar_path(output_prefix: &Path) -> std::path::PathBuf {
    let mut name = output_prefix.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    name.into()
}

/// Computes the bounding grid of a coverage set.
///
/// # Errors
///
/// Returns [`StitchError::EmptyCoverage`] if the set has no tiles.
pub fn compute_bounds(coverage: &CoverageSet) -> StitchResult<GridBounds> {
    let mut tiles = coverage.iter();
    let first = tiles.next().ok_or(StitchError::EmptyCoverage)?;

    let (min_x, min_y, max_x, max_y) = tiles.fold(
        (first.x, first.y, first.x, first.y),
        |(min_x, min_y, max_x, max_y), t| {
            (min_x.min(t.x), min_y.min(t.y), max_x.max(t.x), max_y.max(t.y))
        },
    );

    let bounds = GridBounds::new(min_x, min_y, max_x, max_y);
    debug!(
        bbox = ?bounds.bbox(),
        width = bounds.width(),
        height = bounds.height(),
        "Computed grid bounds"
    );
    Ok(bounds)
}
