//! Grid assembler: ordered tile files to one composite raster.
//!
//! The assembler lists a tile directory, keeps the files whose names decode
//! as [`TileKey`]s with the configured extension, orders them row-major
//! (row, then column, both numeric) and hands them to a [`RasterJoin`].
//!
//! If the output already exists the whole step is skipped. This is
//! memoization of the composite only; individual tiles are never compared.

mod join;

pub use join::{ImageJoin, JoinError, JoinerKind, RasterJoin, VipsJoin, MAX_CANVAS_BYTES};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coord::{normalize_extension, TileKey};
use crate::error::{StitchError, StitchResult};

/// Default composite extension.
pub const DEFAULT_EXTENSION: &str = ".png";

/// Extension of cached tile files. Terrain-RGB tiles are PNG whatever the
/// composite format is.
pub const TILE_EXTENSION: &str = ".png";

/// The composite produced (or found) by [`GridAssembler::assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeRaster {
    /// Path of the composite image.
    pub path: PathBuf,
    /// `true` when the composite already existed and no join ran.
    pub reused: bool,
    /// Number of tiles joined; zero when reused.
    pub tile_count: usize,
}

/// Orders cached tiles and joins them into a composite.
#[derive(Clone)]
pub struct GridAssembler {
    joiner: Arc<dyn RasterJoin>,
    extension: String,
}

impl GridAssembler {
    /// Creates an assembler reading tiles with `extension` (`"png"` or `".png"`).
    pub fn new(joiner: Arc<dyn RasterJoin>, extension: &str) -> Self {
        Self {
            joiner,
            extension: normalize_extension(extension),
        }
    }

    /// Tile extension, with leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Lists tile files in `tile_dir` in row-major order.
    ///
    /// Files with another extension are ignored. Files with the right
    /// extension whose name is not `{x}x{y}` are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`StitchError::NoTilesFound`] if the directory does not exist.
    pub async fn list_tiles(&self, tile_dir: &Path) -> StitchResult<Vec<(TileKey, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(tile_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StitchError::NoTilesFound {
                    dir: tile_dir.to_path_buf(),
                })
            }
            Err(e) => return Err(StitchError::io(tile_dir, e)),
        };

        let mut tiles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StitchError::io(tile_dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(file = ?entry.path(), "Skipping tile with non UTF-8 name");
                continue;
            };
            if !name.ends_with(self.extension.as_str()) {
                continue;
            }

            match TileKey::parse_file_name(name, &self.extension) {
                Ok(key) => tiles.push((key, entry.path())),
                Err(e) => warn!(file = name, error = %e, "Skipping unrecognised tile file"),
            }
        }

        tiles.sort_by_key(|(key, _)| key.row_major());
        Ok(tiles)
    }

    /// Joins the tiles in `tile_dir` into `output`, `grid_width` per row.
    ///
    /// # Errors
    ///
    /// - [`StitchError::NoTilesFound`] if no tile files are present
    /// - [`StitchError::AssemblyFailed`] if the join fails; no composite is
    ///   left at `output`
    pub async fn assemble(
        &self,
        tile_dir: &Path,
        grid_width: u32,
        output: &Path,
    ) -> StitchResult<CompositeRaster> {
        if tokio::fs::try_exists(output)
            .await
            .map_err(|e| StitchError::io(output, e))?
        {
            info!(output = %output.display(), "Composite already exists, skipping assembly");
            return Ok(CompositeRaster {
                path: output.to_path_buf(),
                reused: true,
                tile_count: 0,
            });
        }

        if grid_width == 0 {
            return Err(StitchError::AssemblyFailed {
                output: output.to_path_buf(),
                reason: "grid width must be at least 1".to_string(),
            });
        }

        let tiles = self.list_tiles(tile_dir).await?;
        if tiles.is_empty() {
            return Err(StitchError::NoTilesFound {
                dir: tile_dir.to_path_buf(),
            });
        }

        let tile_count = tiles.len();
        if tile_count % grid_width as usize != 0 {
            warn!(
                tiles = tile_count,
                grid_width,
                "Tile count is not a multiple of the grid width, last row will be short"
            );
        }

        debug!(
            joiner = self.joiner.name(),
            tiles = tile_count,
            across = grid_width,
            "Joining tiles"
        );
        let paths = tiles.into_iter().map(|(_, path)| path).collect();
        self.joiner
            .join(paths, grid_width, output.to_path_buf())
            .await
            .map_err(|e| StitchError::AssemblyFailed {
                output: output.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(
            output = %output.display(),
            tiles = tile_count,
            across = grid_width,
            "Assembled composite"
        );
        Ok(CompositeRaster {
            path: output.to_path_buf(),
            reused: false,
            tile_count,
        })
    }
}
