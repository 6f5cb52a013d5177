//! Tile image cache.
//!
//! [`TileCache`] is the storage seam used by the fetcher. Two backends ship:
//!
//! - [`DiskTileCache`]: one `{x}x{y}{ext}` file per tile in a flat directory,
//!   written atomically via temp file and rename. The pipeline uses it as
//!   the assembler's working directory.
//! - [`MemoryTileCache`]: moka-backed and size-bounded, for callers that
//!   only need the bytes.
//!
//! [`tile_root_stats`] and [`clear_tile_root`] manage the directory holding
//! per-run tile directories.
//!
//! # Example
//!
//! ```ignore
//! use terrastitch::cache::{DiskTileCache, TileCache};
//! use terrastitch::coord::TileKey;
//!
//! let cache = DiskTileCache::open("/tmp/tiles", ".png").await?;
//! cache.put(&TileKey::new(512, 340), bytes).await?;
//! assert!(cache.has(&TileKey::new(512, 340)).await?);
//! ```

mod maintenance;
mod providers;
mod traits;

pub use maintenance::{clear_tile_root, tile_root_stats, ClearResult, TileRootStats};
pub use providers::{DiskTileCache, MemoryTileCache, DEFAULT_MEMORY_CAPACITY};
pub use traits::{BoxFuture, CacheError, TileCache};
