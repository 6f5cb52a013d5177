//! Core trait for tile storage.
//!
//! The fetcher only talks to [`TileCache`], so the disk layout used by the
//! assembler and the in-memory store used in tests are interchangeable.
//! Methods return [`BoxFuture`] so caches can be shared as
//! `Arc<dyn TileCache>`.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use thiserror::Error;

use crate::coord::TileKey;
use crate::error::StitchError;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory could not be created.
    #[error("failed to create cache directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading or writing an entry failed.
    #[error("cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    /// Path the failing operation touched.
    pub fn path(&self) -> &Path {
        match self {
            CacheError::CreateDir { path, .. } | CacheError::Io { path, .. } => path,
        }
    }
}

impl From<CacheError> for StitchError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::CreateDir { path, source } | CacheError::Io { path, source } => {
                StitchError::CacheDirError { path, source }
            }
        }
    }
}

/// Keyed storage for tile images.
///
/// Writes must be atomic: a reader either sees the complete tile or no tile,
/// never a partially written one.
pub trait TileCache: Send + Sync {
    /// Whether a tile is stored under `key`.
    fn has(&self, key: &TileKey) -> BoxFuture<'_, Result<bool, CacheError>>;

    /// Returns the stored bytes, or `None` on a miss.
    fn get(&self, key: &TileKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>>;

    /// Stores `data` under `key`, replacing any previous entry.
    fn put(&self, key: &TileKey, data: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>>;

    /// Directory backing the cache, if any.
    ///
    /// The assembler reads tiles straight from this directory.
    fn directory(&self) -> Option<&Path> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_maps_to_cache_dir_error() {
        let err = CacheError::CreateDir {
            path: PathBuf::from("/readonly/tiles"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.path(), Path::new("/readonly/tiles"));

        let stitch: StitchError = err.into();
        assert!(matches!(stitch, StitchError::CacheDirError { .. }));
        assert!(stitch.to_string().contains("/readonly/tiles"));
    }
}
