//! Tile cache backends.

mod disk;
mod memory;

pub use disk::DiskTileCache;
pub use memory::{MemoryTileCache, DEFAULT_MEMORY_CAPACITY};
