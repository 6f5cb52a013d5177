//! Configuration key access and validation.
//!
//! Type-safe get/set of configuration values by `section.key` name, with
//! validation via small value specifications.

use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use super::file::ConfigFile;
use super::parser::{expand_tilde, optional_string, parse_bool_value};
use super::writer::path_to_string;
use crate::assemble::JoinerKind;
use crate::coord::normalize_extension;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    MapboxAccessToken,
    MapboxUrlTemplate,
    DownloadParallel,
    DownloadTimeout,
    DownloadMaxRetries,
    OutputExtension,
    OutputJoiner,
    OutputKeepTiles,
    OutputFillGaps,
    CacheDirectory,
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == lower)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "download.parallel").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::MapboxAccessToken => "mapbox.access_token",
            ConfigKey::MapboxUrlTemplate => "mapbox.url_template",
            ConfigKey::DownloadParallel => "download.parallel",
            ConfigKey::DownloadTimeout => "download.timeout",
            ConfigKey::DownloadMaxRetries => "download.max_retries",
            ConfigKey::OutputExtension => "output.extension",
            ConfigKey::OutputJoiner => "output.joiner",
            ConfigKey::OutputKeepTiles => "output.keep_tiles",
            ConfigKey::OutputFillGaps => "output.fill_gaps",
            ConfigKey::CacheDirectory => "cache.directory",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "download").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "parallel").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// `true` for keys whose value should not be echoed in full.
    pub fn is_secret(&self) -> bool {
        matches!(self, ConfigKey::MapboxAccessToken)
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::MapboxAccessToken => config.mapbox.access_token.clone().unwrap_or_default(),
            ConfigKey::MapboxUrlTemplate => config.mapbox.url_template.clone(),
            ConfigKey::DownloadParallel => config.download.parallel.to_string(),
            ConfigKey::DownloadTimeout => config.download.timeout.to_string(),
            ConfigKey::DownloadMaxRetries => config.download.max_retries.to_string(),
            ConfigKey::OutputExtension => config.output.extension.clone(),
            ConfigKey::OutputJoiner => config.output.joiner.to_string(),
            ConfigKey::OutputKeepTiles => config.output.keep_tiles.to_string(),
            ConfigKey::OutputFillGaps => config.output.fill_gaps.to_string(),
            ConfigKey::CacheDirectory => path_to_string(&config.cache.directory),
            ConfigKey::LoggingFile => path_to_string(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        self.validate(value)?;
        self.apply(config, value.trim())
    }

    /// Validate a value without setting it.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value.trim())
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    fn apply(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        match self {
            ConfigKey::MapboxAccessToken => config.mapbox.access_token = optional_string(value),
            ConfigKey::MapboxUrlTemplate => config.mapbox.url_template = value.to_string(),
            ConfigKey::DownloadParallel => config.download.parallel = self.parse(value)?,
            ConfigKey::DownloadTimeout => config.download.timeout = self.parse(value)?,
            ConfigKey::DownloadMaxRetries => config.download.max_retries = self.parse(value)?,
            ConfigKey::OutputExtension => config.output.extension = normalize_extension(value),
            ConfigKey::OutputJoiner => config.output.joiner = self.parse::<JoinerKind>(value)?,
            ConfigKey::OutputKeepTiles => config.output.keep_tiles = self.parse_bool(value)?,
            ConfigKey::OutputFillGaps => config.output.fill_gaps = self.parse_bool(value)?,
            ConfigKey::CacheDirectory => config.cache.directory = expand_tilde(value),
            ConfigKey::LoggingFile => config.logging.file = expand_tilde(value),
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigKeyError> {
        value.parse().map_err(|_| self.failed("could not be parsed"))
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigKeyError> {
        parse_bool_value(value).ok_or_else(|| self.failed("must be a boolean"))
    }

    fn failed(&self, reason: &str) -> ConfigKeyError {
        ConfigKeyError::ValidationFailed {
            key: self.name().to_string(),
            reason: reason.to_string(),
        }
    }

    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::MapboxAccessToken => Box::new(AnyStringSpec),
            ConfigKey::MapboxUrlTemplate => Box::new(UrlTemplateSpec),
            ConfigKey::DownloadParallel => Box::new(PositiveIntegerSpec),
            ConfigKey::DownloadTimeout => Box::new(PositiveIntegerSpec),
            ConfigKey::DownloadMaxRetries => Box::new(PositiveIntegerSpec),
            ConfigKey::OutputExtension => Box::new(ExtensionSpec),
            ConfigKey::OutputJoiner => Box::new(OneOfSpec::new(&["image", "vips"])),
            ConfigKey::OutputKeepTiles => Box::new(BooleanSpec),
            ConfigKey::OutputFillGaps => Box::new(BooleanSpec),
            ConfigKey::CacheDirectory => Box::new(PathSpec),
            ConfigKey::LoggingFile => Box::new(PathSpec),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::MapboxAccessToken,
            ConfigKey::MapboxUrlTemplate,
            ConfigKey::DownloadParallel,
            ConfigKey::DownloadTimeout,
            ConfigKey::DownloadMaxRetries,
            ConfigKey::OutputExtension,
            ConfigKey::OutputJoiner,
            ConfigKey::OutputKeepTiles,
            ConfigKey::OutputFillGaps,
            ConfigKey::CacheDirectory,
            ConfigKey::LoggingFile,
        ]
    }
}

// ============================================================================
// Value Specifications
// ============================================================================

trait ValueSpecification {
    /// Returns Err(reason) if the value is not acceptable.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

struct AnyStringSpec;

impl ValueSpecification for AnyStringSpec {
    fn is_satisfied_by(&self, _value: &str) -> Result<(), String> {
        Ok(())
    }
}

struct OneOfSpec {
    options: &'static [&'static str],
}

impl OneOfSpec {
    fn new(options: &'static [&'static str]) -> Self {
        Self { options }
    }
}

impl ValueSpecification for OneOfSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let lower = value.to_lowercase();
        if self.options.iter().any(|opt| *opt == lower) {
            Ok(())
        } else {
            Err(format!("must be one of: {}", self.options.join(", ")))
        }
    }
}

struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u32>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

struct BooleanSpec;

impl ValueSpecification for BooleanSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        parse_bool_value(value)
            .map(|_| ())
            .ok_or_else(|| "must be true/false, yes/no, 1/0, or on/off".to_string())
    }
}

struct PathSpec;

impl ValueSpecification for PathSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Err("path cannot be empty".to_string());
        }
        if Path::new(value).file_name().is_none() && value != "~" {
            return Err("must name a file or directory".to_string());
        }
        Ok(())
    }
}

/// Extensions are a bare name of letters and digits, dot optional.
struct ExtensionSpec;

impl ValueSpecification for ExtensionSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let bare = value.trim_start_matches('.');
        if !bare.is_empty() && bare.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(())
        } else {
            Err("must be a file extension like '.png'".to_string())
        }
    }
}

struct UrlTemplateSpec;

impl ValueSpecification for UrlTemplateSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            return Err("must start with http:// or https://".to_string());
        }
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !value.contains(placeholder) {
                return Err(format!("must contain the {placeholder} placeholder"));
            }
        }
        Ok(())
    }
}
