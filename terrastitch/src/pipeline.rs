//! End-to-end stitching run.
//!
//! [`StitchPipeline::run`] wires the stages together:
//!
//! 1. resolve the coverage of the feature collection (no I/O)
//! 2. compute grid bounds and write the `<output>Bounds.json` sidecar
//! 3. fetch every tile into the run's tile directory
//! 4. join the tiles row-major into `<output><ext>`
//! 5. purge the tile directory unless asked to keep it
//!
//! The tile directory is derived from the zoom and the grid bounds, so an
//! interrupted run resumes from the tiles it already downloaded.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assemble::{
    CompositeRaster, GridAssembler, RasterJoin, DEFAULT_EXTENSION, TILE_EXTENSION,
};
use crate::cache::{DiskTileCache, TileCache};
use crate::config::ConfigFile;
use crate::coord::{normalize_extension, TileCoord};
use crate::coverage::{self, CoverageSet};
use crate::error::{StitchError, StitchResult};
use crate::features::FeatureCollection;
use crate::fetch::{FetchConfig, FetchProgress, FetchSummary, TileFetcher};
use crate::grid::{self, GridBounds};
use crate::provider::TileProvider;

/// One stitching job.
#[derive(Debug, Clone)]
pub struct StitchRequest {
    pub features: FeatureCollection,
    pub zoom: u8,
    /// Output prefix; the composite is `<output><ext>`.
    pub output: PathBuf,
}

impl StitchRequest {
    pub fn new(features: FeatureCollection, zoom: u8, output: impl Into<PathBuf>) -> Self {
        Self {
            features,
            zoom,
            output: output.into(),
        }
    }

    /// Reads the feature collection from `input`.
    pub fn from_file(input: &Path, zoom: u8, output: impl Into<PathBuf>) -> StitchResult<Self> {
        let features = FeatureCollection::load(input)?;
        debug!(input = %input.display(), features = features.len(), "Loaded features");
        Ok(Self::new(features, zoom, output))
    }
}

/// Run settings that do not concern the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchConfig {
    /// Composite extension, with leading dot. Tiles keep [`TILE_EXTENSION`].
    pub extension: String,
    /// Fetch the full bounding box so the join receives a dense grid.
    pub fill_gaps: bool,
    /// Keep the tile directory after a successful run.
    pub keep_tiles: bool,
    /// Parent of per-run tile directories.
    pub tile_root: PathBuf,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            fill_gaps: true,
            keep_tiles: false,
            tile_root: crate::config::default_cache_directory(),
        }
    }
}

impl StitchConfig {
    /// Builds run settings from the user configuration.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            extension: normalize_extension(&config.output.extension),
            fill_gaps: config.output.fill_gaps,
            keep_tiles: config.output.keep_tiles,
            tile_root: config.cache.directory.clone(),
        }
    }

    /// Tile directory for a grid, e.g. `z12-2048-1360-2050-1362`.
    pub fn tile_dir(&self, zoom: u8, bounds: &GridBounds) -> PathBuf {
        let [min_x, min_y, max_x, max_y] = bounds.bbox();
        self.tile_root
            .join(format!("z{zoom}-{min_x}-{min_y}-{max_x}-{max_y}"))
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct StitchReport {
    /// Tiles intersecting the features.
    pub coverage_tiles: usize,
    pub bounds: GridBounds,
    pub sidecar: PathBuf,
    /// Empty when the composite already existed.
    pub fetch: FetchSummary,
    pub composite: CompositeRaster,
    pub tile_dir: PathBuf,
    /// `false` once the tile directory has been purged.
    pub tiles_kept: bool,
}

/// Resolve, fetch, assemble.
pub struct StitchPipeline<P: TileProvider> {
    provider: Arc<P>,
    fetch_config: FetchConfig,
    assembler: GridAssembler,
    config: StitchConfig,
}

impl<P: TileProvider + 'static> StitchPipeline<P> {
    pub fn new(
        provider: P,
        joiner: Arc<dyn RasterJoin>,
        fetch_config: FetchConfig,
        config: StitchConfig,
    ) -> Self {
        let assembler = GridAssembler::new(joiner, TILE_EXTENSION);
        Self {
            provider: Arc::new(provider),
            fetch_config,
            assembler,
            config,
        }
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Runs the whole pipeline for `request`.
    ///
    /// `on_progress` is called after each fetched tile.
    ///
    /// # Errors
    ///
    /// Coverage errors are returned before anything is written. After that,
    /// the first fetch failure, a cancellation, or an assembly failure aborts
    /// the run and leaves the tile directory in place for the next attempt.
    pub async fn run<F>(
        &self,
        request: &StitchRequest,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> StitchResult<StitchReport>
    where
        F: FnMut(FetchProgress),
    {
        let zoom = request.zoom;
        if !self.provider.supports_zoom(zoom) {
            return Err(StitchError::InvalidZoom(zoom));
        }

        let coverage = coverage::resolve(&request.features, zoom)?;
        let bounds = grid::compute_bounds(&coverage)?;
        info!(
            zoom,
            tiles = coverage.len(),
            bbox = ?bounds.bbox(),
            width = bounds.width(),
            height = bounds.height(),
            "Resolved coverage"
        );

        let sidecar = grid::sidecar_path(&request.output);
        if let Some(parent) = non_empty_parent(&sidecar) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StitchError::io(parent, e))?;
        }
        bounds.write_sidecar(&sidecar)?;

        let composite_path = composite_path(&request.output, &self.config.extension);
        let tile_dir = self.config.tile_dir(zoom, &bounds);

        let fetch = if tokio::fs::try_exists(&composite_path)
            .await
            .map_err(|e| StitchError::io(&composite_path, e))?
        {
            debug!(output = %composite_path.display(), "Composite exists, not fetching tiles");
            FetchSummary::default()
        } else {
            let coords = self.coords_to_fetch(&coverage, &bounds);
            let cache = DiskTileCache::open(&tile_dir, TILE_EXTENSION).await?;
            let cache: Arc<dyn TileCache> = Arc::new(cache);
            let fetcher = TileFetcher::with_shared_provider(
                Arc::clone(&self.provider),
                cache,
                self.fetch_config.clone(),
            );
            fetcher.fetch_all(coords, cancel, on_progress).await?
        };

        let composite = self
            .assembler
            .assemble(&tile_dir, bounds.width(), &composite_path)
            .await?;

        let tiles_kept = self.config.keep_tiles || !purge_tile_dir(&tile_dir).await;

        Ok(StitchReport {
            coverage_tiles: coverage.len(),
            bounds,
            sidecar,
            fetch,
            composite,
            tile_dir,
            tiles_kept,
        })
    }

    fn coords_to_fetch(&self, coverage: &CoverageSet, bounds: &GridBounds) -> Vec<TileCoord> {
        if self.config.fill_gaps {
            let coords: Vec<TileCoord> = bounds.coords(coverage.zoom()).collect();
            let gaps = coords.len() - coverage.len();
            if gaps > 0 {
                debug!(gaps, "Filling grid cells outside the coverage");
            }
            coords
        } else {
            if (coverage.len() as u64) < bounds.cell_count() {
                warn!(
                    covered = coverage.len(),
                    cells = bounds.cell_count(),
                    "Coverage does not fill the grid, composite rows will be misaligned"
                );
            }
            coverage.tiles().to_vec()
        }
    }
}

/// `<prefix><ext>`, appended rather than replacing any extension.
pub fn composite_path(output_prefix: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(output_prefix.as_os_str());
    name.push(normalize_extension(extension));
    name.into()
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Removes the tile directory; returns `false` if it is still there.
async fn purge_tile_dir(tile_dir: &Path) -> bool {
    match tokio::fs::remove_dir_all(tile_dir).await {
        Ok(()) => {
            debug!(dir = %tile_dir.display(), "Removed tile directory");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(dir = %tile_dir.display(), error = %e, "Failed to remove tile directory");
            false
        }
    }
}
