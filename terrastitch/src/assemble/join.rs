//! Raster joiners.
//!
//! A joiner receives tile paths already in row-major order and the number of
//! tiles per row. Tile `i` lands at column `i % across`, row `i / across`.
//! Both joiners write to a sibling temp file and rename it into place, so a
//! failed join never leaves a partial composite behind.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use thiserror::Error;
use tracing::{debug, trace};

use crate::cache::BoxFuture;

/// Errors raised while joining tiles into a composite.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("no tiles to join")]
    NoTiles,

    #[error("tiles per row must be at least 1")]
    ZeroAcross,

    #[error("failed to decode tile {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error(
        "tile {} is {found_w}x{found_h}, expected {expected_w}x{expected_h}",
        .path.display()
    )]
    DimensionMismatch {
        path: PathBuf,
        expected_w: u32,
        expected_h: u32,
        found_w: u32,
        found_h: u32,
    },

    #[error(
        "composite of {across}x{rows} tiles of {tile_w}x{tile_h} px is too large to join \
         in memory (limit {limit} bytes); use the vips joiner"
    )]
    TooLarge {
        across: u32,
        rows: u32,
        tile_w: u32,
        tile_h: u32,
        limit: u64,
    },

    #[error("unsupported output format for {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to encode composite: {0}")]
    Encode(String),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Process {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("join task failed: {0}")]
    Task(String),
}

/// Joins ordered tile files into one raster.
pub trait RasterJoin: Send + Sync {
    /// Writes the composite of `tiles` to `output`, `across` tiles per row.
    fn join(&self, tiles: Vec<PathBuf>, across: u32, output: PathBuf)
        -> BoxFuture<'_, Result<(), JoinError>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Joiner implementations selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinerKind {
    /// In-process join with the `image` crate.
    #[default]
    Image,
    /// External `vips arrayjoin`.
    Vips,
}

impl JoinerKind {
    /// Instantiates the joiner.
    pub fn build(self) -> Box<dyn RasterJoin> {
        match self {
            JoinerKind::Image => Box::new(ImageJoin),
            JoinerKind::Vips => Box::new(VipsJoin::default()),
        }
    }
}

impl fmt::Display for JoinerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinerKind::Image => write!(f, "image"),
            JoinerKind::Vips => write!(f, "vips"),
        }
    }
}

impl FromStr for JoinerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(JoinerKind::Image),
            "vips" => Ok(JoinerKind::Vips),
            other => Err(format!("unknown joiner '{}', expected image or vips", other)),
        }
    }
}

/// Sibling temp path keeping the output extension, e.g. `ridge.partial.png`.
pub(crate) fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    output.with_file_name(name)
}

fn io_error(path: &Path, source: io::Error) -> JoinError {
    JoinError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Largest RGBA canvas [`ImageJoin`] allocates, in bytes (4 GiB).
pub const MAX_CANVAS_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Joins tiles in-process with the `image` crate.
///
/// Every tile must decode and share the first tile's dimensions. The
/// composite format follows the output extension; tile formats are sniffed
/// from their contents. The whole canvas lives in memory, so composites
/// above [`MAX_CANVAS_BYTES`] are refused before allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageJoin;

impl ImageJoin {
    fn join_blocking(tiles: &[PathBuf], across: u32, output: &Path) -> Result<(), JoinError> {
        if across == 0 {
            return Err(JoinError::ZeroAcross);
        }
        let first_path = tiles.first().ok_or(JoinError::NoTiles)?;
        let format = ImageFormat::from_path(output)
            .map_err(|_| JoinError::UnsupportedFormat(output.to_path_buf()))?;

        let first = decode(first_path)?;
        let (tile_w, tile_h) = (first.width(), first.height());
        let rows = (tiles.len() as u32).div_ceil(across);

        let too_large = || JoinError::TooLarge {
            across,
            rows,
            tile_w,
            tile_h,
            limit: MAX_CANVAS_BYTES,
        };
        let canvas_w = tile_w.checked_mul(across).ok_or_else(too_large)?;
        let canvas_h = tile_h.checked_mul(rows).ok_or_else(too_large)?;
        if canvas_w as u64 * canvas_h as u64 * 4 > MAX_CANVAS_BYTES {
            return Err(too_large());
        }

        let mut canvas = RgbaImage::new(canvas_w, canvas_h);
        for (i, path) in tiles.iter().enumerate() {
            let tile = if i == 0 { first.clone() } else { decode(path)? };
            if (tile.width(), tile.height()) != (tile_w, tile_h) {
                return Err(JoinError::DimensionMismatch {
                    path: path.clone(),
                    expected_w: tile_w,
                    expected_h: tile_h,
                    found_w: tile.width(),
                    found_h: tile.height(),
                });
            }

            let col = i as u32 % across;
            let row = i as u32 / across;
            trace!(tile = %path.display(), col, row, "Placing tile");
            image::imageops::replace(
                &mut canvas,
                &tile,
                (col * tile_w) as i64,
                (row * tile_h) as i64,
            );
        }

        let composite = match format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
            _ => DynamicImage::ImageRgba8(canvas),
        };

        let partial = partial_path(output);
        if let Err(e) = composite.save_with_format(&partial, format) {
            let _ = std::fs::remove_file(&partial);
            return Err(JoinError::Encode(e.to_string()));
        }
        if let Err(e) = std::fs::rename(&partial, output) {
            let _ = std::fs::remove_file(&partial);
            return Err(io_error(output, e));
        }

        debug!(
            output = %output.display(),
            width = canvas_w,
            height = canvas_h,
            tiles = tiles.len(),
            "Wrote composite"
        );
        Ok(())
    }
}

fn decode(path: &Path) -> Result<RgbaImage, JoinError> {
    let decode_error = |reason: String| JoinError::Decode {
        path: path.to_path_buf(),
        reason,
    };
    let img = ImageReader::open(path)
        .map_err(|e| io_error(path, e))?
        .with_guessed_format()
        .map_err(|e| decode_error(e.to_string()))?
        .decode()
        .map_err(|e| decode_error(e.to_string()))?;
    Ok(img.to_rgba8())
}

impl RasterJoin for ImageJoin {
    fn join(
        &self,
        tiles: Vec<PathBuf>,
        across: u32,
        output: PathBuf,
    ) -> BoxFuture<'_, Result<(), JoinError>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::join_blocking(&tiles, across, &output))
                .await
                .map_err(|e| JoinError::Task(e.to_string()))?
        })
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// Joins tiles with `vips arrayjoin`.
///
/// The tile list is passed as one space-separated argument, which is how
/// vips expects an image array; tile paths therefore must not contain spaces.
#[derive(Debug, Clone)]
pub struct VipsJoin {
    program: String,
}

impl Default for VipsJoin {
    fn default() -> Self {
        Self::new("vips")
    }
}

impl VipsJoin {
    /// Uses `program` instead of `vips` from `PATH`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(tiles: &[PathBuf], across: u32, output: &Path) -> Vec<OsString> {
        let list = tiles
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            OsString::from("arrayjoin"),
            OsString::from(list),
            output.as_os_str().to_os_string(),
            OsString::from("--across"),
            OsString::from(across.to_string()),
        ]
    }
}

impl RasterJoin for VipsJoin {
    fn join(
        &self,
        tiles: Vec<PathBuf>,
        across: u32,
        output: PathBuf,
    ) -> BoxFuture<'_, Result<(), JoinError>> {
        Box::pin(async move {
            if tiles.is_empty() {
                return Err(JoinError::NoTiles);
            }
            if across == 0 {
                return Err(JoinError::ZeroAcross);
            }

            let partial = partial_path(&output);
            let args = Self::args(&tiles, across, &partial);
            debug!(program = %self.program, tiles = tiles.len(), across, "Running vips arrayjoin");

            let result = tokio::process::Command::new(&self.program)
                .args(&args)
                .output()
                .await
                .map_err(|source| JoinError::Spawn {
                    program: self.program.clone(),
                    source,
                })?;

            if !result.status.success() {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(JoinError::Process {
                    program: self.program.clone(),
                    status: result.status.to_string(),
                    stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
                });
            }

            tokio::fs::rename(&partial, &output)
                .await
                .map_err(|e| io_error(&output, e))
        })
    }

    fn name(&self) -> &str {
        "vips"
    }
}
