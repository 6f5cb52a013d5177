//! Housekeeping for the tile root that holds per-run tile directories.
//!
//! Runs normally purge their own directory. Directories survive when a run
//! fails, is cancelled, or keeps its tiles; these helpers report and remove
//! them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::traits::CacheError;

/// Size of the tile root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileRootStats {
    /// Per-run tile directories.
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

/// Result of [`clear_tile_root`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearResult {
    pub directories_removed: usize,
    pub files_deleted: usize,
    pub bytes_freed: u64,
}

/// Counts directories, files and bytes under `root`.
///
/// A missing root is empty.
pub fn tile_root_stats(root: &Path) -> Result<TileRootStats, CacheError> {
    let mut stats = TileRootStats::default();
    for entry in read_root(root)? {
        let path = entry.map_err(|e| io_error(root, e))?.path();
        if path.is_dir() {
            stats.directories += 1;
            let (files, bytes) = dir_usage(&path)?;
            stats.files += files;
            stats.bytes += bytes;
        } else {
            stats.files += 1;
            stats.bytes += file_len(&path)?;
        }
    }
    Ok(stats)
}

/// Removes everything under `root`, keeping `root` itself.
pub fn clear_tile_root(root: &Path) -> Result<ClearResult, CacheError> {
    let mut result = ClearResult::default();
    for entry in read_root(root)? {
        let path = entry.map_err(|e| io_error(root, e))?.path();
        if path.is_dir() {
            let (files, bytes) = dir_usage(&path)?;
            fs::remove_dir_all(&path).map_err(|e| io_error(&path, e))?;
            debug!(dir = %path.display(), files, "Removed tile directory");
            result.directories_removed += 1;
            result.files_deleted += files;
            result.bytes_freed += bytes;
        } else {
            let bytes = file_len(&path)?;
            fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
            result.files_deleted += 1;
            result.bytes_freed += bytes;
        }
    }

    info!(
        root = %root.display(),
        directories = result.directories_removed,
        files = result.files_deleted,
        bytes = result.bytes_freed,
        "Cleared tile root"
    );
    Ok(result)
}

fn read_root(root: &Path) -> Result<Box<dyn Iterator<Item = io::Result<fs::DirEntry>>>, CacheError> {
    match fs::read_dir(root) {
        Ok(entries) => Ok(Box::new(entries)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Box::new(std::iter::empty())),
        Err(e) => Err(io_error(root, e)),
    }
}

/// Recursive file count and size of a directory.
fn dir_usage(dir: &Path) -> Result<(usize, u64), CacheError> {
    let mut files = 0;
    let mut bytes = 0;
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current).map_err(|e| io_error(&current, e))? {
            let path = entry.map_err(|e| io_error(&current, e))?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files += 1;
                bytes += file_len(&path)?;
            }
        }
    }
    Ok((files, bytes))
}

fn file_len(path: &Path) -> Result<u64, CacheError> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}
