//! User configuration.
//!
//! Settings live in `~/.terrastitch/config.ini`. Missing files and keys fall
//! back to defaults; the `MBX_TOKEN` environment variable overrides the
//! stored access token.

mod file;
mod keys;
mod parser;
mod writer;

pub use file::{
    config_directory, config_file_path, default_cache_directory, resolve_access_token,
    CacheSettings, ConfigFile, ConfigFileError, DownloadSettings, LoggingSettings,
    MapboxSettings, OutputSettings, TOKEN_ENV_VAR,
};
pub use keys::{ConfigKey, ConfigKeyError};
