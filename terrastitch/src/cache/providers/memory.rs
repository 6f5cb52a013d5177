//! In-memory tile cache using moka.
//!
//! Entries are weighted by their byte length and evicted LRU once the
//! configured capacity is exceeded. Nothing touches the filesystem, so this
//! cache has no [`TileCache::directory`] and cannot feed the assembler
//! directly.

use moka::future::Cache as MokaCache;

use crate::cache::traits::{BoxFuture, CacheError, TileCache};
use crate::coord::TileKey;

/// Default capacity: 256 MB.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 256 * 1024 * 1024;

/// In-memory tile cache.
#[derive(Clone)]
pub struct MemoryTileCache {
    cache: MokaCache<TileKey, Vec<u8>>,
}

impl MemoryTileCache {
    /// Creates a cache holding at most `max_size_bytes` of tile data.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = MokaCache::builder()
            // moka uses u32 weights
            .weigher(|_key: &TileKey, value: &Vec<u8>| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .build();
        Self { cache }
    }

    /// Number of stored tiles.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Runs pending eviction work so counts are current.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MemoryTileCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl TileCache for MemoryTileCache {
    fn has(&self, key: &TileKey) -> BoxFuture<'_, Result<bool, CacheError>> {
        let key = *key;
        Box::pin(async move { Ok(self.cache.contains_key(&key)) })
    }

    fn get(&self, key: &TileKey) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let key = *key;
        Box::pin(async move { Ok(self.cache.get(&key).await) })
    }

    fn put(&self, key: &TileKey, data: Vec<u8>) -> BoxFuture<'_, Result<(), CacheError>> {
        let key = *key;
        Box::pin(async move {
            self.cache.insert(key, data).await;
            Ok(())
        })
    }
}
