//! Error taxonomy for a stitching run.
//!
//! Every stage converges on [`StitchError`]. Variants carry the coordinate,
//! path or underlying cause so a failure can be diagnosed from the message
//! alone.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::coord::TileCoord;

/// Result type for stitching operations.
pub type StitchResult<T> = Result<T, StitchError>;

/// Errors that can occur during a stitching run.
#[derive(Debug, Error)]
pub enum StitchError {
    /// A feature geometry is malformed or of an unsupported type.
    #[error("invalid geometry in feature {index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },

    /// The feature collection contains no features.
    #[error("feature collection is empty")]
    EmptyFeatureSet,

    /// Bounds were requested for an empty coverage set.
    #[error("coverage set is empty, grid bounds are undefined")]
    EmptyCoverage,

    /// Zoom level outside the supported range.
    #[error("zoom level {0} is not supported (max {max})", max = crate::coord::MAX_ZOOM)]
    InvalidZoom(u8),

    /// No access token is configured.
    #[error("no access token configured; run `terrastitch token` or set MBX_TOKEN")]
    MissingCredential,

    /// A tile could not be downloaded.
    #[error("failed to fetch tile {coord} after {attempts} attempt(s): {reason}")]
    FetchFailed {
        coord: TileCoord,
        attempts: u32,
        reason: String,
    },

    /// The tile cache directory could not be created or written.
    #[error("cache directory error at {}: {source}", .path.display())]
    CacheDirError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The raster join failed; no composite was written.
    #[error("failed to assemble {}: {reason}", .output.display())]
    AssemblyFailed { output: PathBuf, reason: String },

    /// The tile directory holds no matching tile files.
    #[error("no tiles found in {}", .dir.display())]
    NoTilesFound { dir: PathBuf },

    /// The feature file could not be read or parsed.
    #[error("invalid input {}: {reason}", .path.display())]
    InvalidInput { path: PathBuf, reason: String },

    /// The run was cancelled between tile fetches.
    #[error("run cancelled")]
    Cancelled,

    /// A background fetch task panicked or was aborted.
    #[error("fetch task failed: {0}")]
    TaskFailed(String),

    /// Other I/O failure.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StitchError {
    /// Convenience constructor for [`StitchError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failed_names_coordinate() {
        let err = StitchError::FetchFailed {
            coord: TileCoord::new(512, 340, 10),
            attempts: 3,
            reason: "HTTP 503".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("10/512/340"));
        assert!(message.contains("3 attempt"));
        assert!(message.contains("HTTP 503"));
    }

    #[test]
    fn test_cache_dir_error_exposes_source() {
        let err = StitchError::CacheDirError {
            path: PathBuf::from("/nope"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/nope"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_zoom_mentions_max() {
        let err = StitchError::InvalidZoom(30);
        assert!(err.to_string().contains("30"));
        assert!(err.to_string().contains("24"));
    }
}
