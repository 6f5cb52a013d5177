//! Directory-backed tile cache.
//!
//! Each tile is one file named by its [`TileKey`] (`{x}x{y}{ext}`) directly
//! inside the cache directory. That flat layout is what the grid assembler
//! lists and orders, so the directory doubles as the working set of a run.

use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::cache::traits::{BoxFuture, CacheError, TileCache};
use crate::coord::{normalize_extension, TileKey};

/// Suffix of in-progress writes. Never matches a tile extension.
const TEMP_SUFFIX: &str = ".tmp";

/// Tile cache storing one file per tile in a flat directory.
#[derive(Debug, Clone)]
pub struct DiskTileCache {
    directory: PathBuf,
    extension: String,
}

impl DiskTileCache {
    /// Opens (creating if needed) a cache rooted at `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CreateDir`] if the directory cannot be created.
    pub async fn open(
        directory: impl Into<PathBuf>,
        extension: &str,
    ) -> Result<Self, CacheError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| CacheError::CreateDir {
                path: directory.clone(),
                source,
            })?;

        Ok(Self {
            directory,
            extension: normalize_extension(extension),
        })
    }

    /// Tile file extension, with leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File path for a tile key.
    pub fn path_for(&self, key: &TileKey) -> PathBuf {
        self.directory.join(key.file_name(&self.extension))
    }

    fn temp_path_for(&self, key: &TileKey) -> PathBuf {
        let mut name = key.file_name(&self.extension);
        name.push_str(TEMP_SUFFIX);
        self.directory.join(name)
    }
}

fn io_error(path: &Path, source: io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl TileCache for DiskTileCache {
    fn has(&self, key: &TileKey) -> BoxFuture<'_, Result<bool, CacheError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            tokio::fs::try_exists(&path)
                .await
                .map_err(|e| io_error(&path, e))
        })
    }

    fn get(&self, key: &TileKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(io_error(&path, e)),
            }
        })
    }

    fn put(&self, key: &TileKey, data: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>> {
        let path = self.path_for(key);
        let temp_path = self.temp_path_for(key);
        Box::pin(async move {
            // Write atomically via temp file
            tokio::fs::write(&temp_path, &data)
                .await
                .map_err(|e| io_error(&temp_path, e))?;
            if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(io_error(&path, e));
            }
            trace!(path = %path.display(), bytes = data.len(), "Cached tile");
            Ok(())
        })
    }

    fn directory(&self) -> Option<&Path> {
        Some(&self.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_cache() -> (TempDir, DiskTileCache) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskTileCache::open(temp_dir.path().join("tiles"), "png")
            .await
            .unwrap();
        (temp_dir, cache)
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let (temp_dir, cache) = create_test_cache().await;
        assert!(temp_dir.path().join("tiles").is_dir());
        assert_eq!(cache.extension(), ".png");
        assert_eq!(cache.directory(), Some(temp_dir.path().join("tiles").as_path()));
    }

    #[tokio::test]
    async fn test_open_fails_under_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();

        let result = DiskTileCache::open(blocker.join("tiles"), ".png").await;
        assert!(matches!(result, Err(CacheError::CreateDir { .. })));
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (_temp_dir, cache) = create_test_cache().await;
        let key = TileKey::new(512, 340);

        assert!(!cache.has(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), None);

        cache.put(&key, vec![1, 2, 3]).await.unwrap();
        assert!(cache.has(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_file_named_by_key() {
        let (temp_dir, cache) = create_test_cache().await;
        cache.put(&TileKey::new(7, 12), vec![9]).await.unwrap();
        assert!(temp_dir.path().join("tiles").join("7x12.png").is_file());
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let (_temp_dir, cache) = create_test_cache().await;
        let key = TileKey::new(1, 1);
        cache.put(&key, vec![1]).await.unwrap();
        cache.put(&key, vec![2, 2]).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(vec![2, 2]));
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_temp_files() {
        let (temp_dir, cache) = create_test_cache().await;
        for x in 0..5 {
            cache.put(&TileKey::new(x, 0), vec![0; 64]).await.unwrap();
        }

        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path().join("tiles"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), "temp files should not remain");
    }
}
