//! Cache management CLI commands.

use clap::Subcommand;
use terrastitch::cache::{clear_tile_root, tile_root_stats};
use terrastitch::config::ConfigFile;

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove tile directories left by failed, cancelled or kept runs
    Clear,
    /// Show tile directory statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let root = &config.cache.directory;

    match action {
        CacheAction::Clear => {
            println!("Clearing tile cache at: {}", root.display());
            let result = clear_tile_root(root).map_err(|e| CliError::CacheClear(e.to_string()))?;
            println!(
                "Removed {} run directories, {} files, freed {}",
                result.directories_removed,
                result.files_deleted,
                format_bytes(result.bytes_freed)
            );
            Ok(())
        }
        CacheAction::Stats => {
            let stats = tile_root_stats(root).map_err(|e| CliError::CacheStats(e.to_string()))?;
            println!("Tile cache: {}", root.display());
            println!("  Runs:  {}", stats.directories);
            println!("  Files: {}", stats.files);
            println!("  Size:  {}", format_bytes(stats.bytes));
            Ok(())
        }
    }
}

/// Human-readable byte count (`1.5 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
