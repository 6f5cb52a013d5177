//! Configuration file handling for ~/.terrastitch/config.ini.
//!
//! Loads and saves user configuration with sensible defaults. Parsing lives
//! in [`super::parser`], serialization in [`super::writer`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::assemble::{JoinerKind, DEFAULT_EXTENSION};
use crate::fetch::{FetchConfig, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONCURRENT};
use crate::provider::{DEFAULT_TIMEOUT_SECS, MAPBOX_TERRAIN_URL};

/// Environment variable that overrides the configured access token.
pub const TOKEN_ENV_VAR: &str = "MBX_TOKEN";

/// Name of the per-user configuration directory under `$HOME`.
const CONFIG_DIR_NAME: &str = ".terrastitch";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// `[mapbox]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapboxSettings {
    /// Access token; `MBX_TOKEN` takes precedence when set.
    pub access_token: Option<String>,
    /// Tile URL template with `{z}`, `{x}`, `{y}`, `{token}` placeholders.
    pub url_template: String,
}

impl Default for MapboxSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            url_template: MAPBOX_TERRAIN_URL.to_string(),
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Concurrent downloads.
    pub parallel: usize,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Attempts per tile, including the first.
    pub max_retries: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_MAX_CONCURRENT,
            timeout: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    /// Composite extension, with leading dot.
    pub extension: String,
    /// Raster joiner.
    pub joiner: JoinerKind,
    /// Keep the tile directory after a successful run.
    pub keep_tiles: bool,
    /// Fetch every cell of the bounding box, not only covered tiles.
    pub fill_gaps: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            joiner: JoinerKind::default(),
            keep_tiles: false,
            fill_gaps: true,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Parent directory of per-run tile directories.
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path.
    pub file: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: config_directory().join("terrastitch.log"),
        }
    }
}

/// User configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub mapbox: MapboxSettings,
    pub download: DownloadSettings,
    pub output: OutputSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.terrastitch/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.terrastitch/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Access token from `MBX_TOKEN`, falling back to the file.
    pub fn access_token(&self) -> Option<String> {
        resolve_access_token(
            std::env::var(TOKEN_ENV_VAR).ok(),
            self.mapbox.access_token.as_deref(),
        )
    }

    /// Fetcher settings derived from `[download]`.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            retry: RetryPolicy::from_attempts(self.download.max_retries),
            max_concurrent: self.download.parallel.max(1),
            request_timeout: Duration::from_secs(self.download.timeout.max(1)),
        }
    }
}

/// Picks the environment token when non-empty, else the configured one.
pub fn resolve_access_token(env: Option<String>, configured: Option<&str>) -> Option<String> {
    env.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            configured
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
}

/// Get the path to the config directory (~/.terrastitch).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the path to the config file (~/.terrastitch/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default parent of tile working directories (~/.terrastitch/tiles).
pub fn default_cache_directory() -> PathBuf {
    config_directory().join("tiles")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert!(config.mapbox.access_token.is_none());
        assert_eq!(config.mapbox.url_template, MAPBOX_TERRAIN_URL);
        assert_eq!(config.download.parallel, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.download.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.download.max_retries, 3);
        assert_eq!(config.output.extension, ".png");
        assert_eq!(config.output.joiner, JoinerKind::Image);
        assert!(config.output.fill_gaps);
        assert!(!config.output.keep_tiles);
        assert!(config.cache.directory.ends_with(".terrastitch/tiles"));
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("nonexistent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.mapbox.access_token = Some("pk.saved".to_string());
        config.download.parallel = 3;
        config.output.joiner = JoinerKind::Vips;
        config.output.keep_tiles = true;
        config.cache.directory = temp_dir.path().join("tiles");
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_env_token_overrides_file() {
        assert_eq!(
            resolve_access_token(Some("pk.env".into()), Some("pk.file")),
            Some("pk.env".to_string())
        );
        assert_eq!(
            resolve_access_token(Some("  ".into()), Some("pk.file")),
            Some("pk.file".to_string())
        );
        assert_eq!(resolve_access_token(None, Some("")), None);
        assert_eq!(resolve_access_token(None, None), None);
    }

    #[test]
    fn test_fetch_config_from_download_section() {
        let mut config = ConfigFile::default();
        config.download.parallel = 0;
        config.download.max_retries = 1;
        config.download.timeout = 12;

        let fetch = config.fetch_config();
        assert_eq!(fetch.max_concurrent, 1);
        assert_eq!(fetch.retry, RetryPolicy::None);
        assert_eq!(fetch.request_timeout, Duration::from_secs(12));
    }
}
