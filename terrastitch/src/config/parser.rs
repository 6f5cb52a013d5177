//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::Ini;

use super::file::{ConfigFile, ConfigFileError};
use crate::coord::normalize_extension;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [mapbox] section
    if let Some(section) = ini.section(Some("mapbox")) {
        if let Some(v) = section.get("access_token") {
            config.mapbox.access_token = optional_string(v);
        }
        if let Some(v) = section.get("url_template") {
            let v = v.trim();
            if !v.is_empty() {
                config.mapbox.url_template = v.to_string();
            }
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("parallel") {
            config.download.parallel = parse_positive("download", "parallel", v)?;
        }
        if let Some(v) = section.get("timeout") {
            config.download.timeout = parse_positive("download", "timeout", v)?;
        }
        if let Some(v) = section.get("max_retries") {
            config.download.max_retries = parse_positive("download", "max_retries", v)?;
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = section.get("extension") {
            let v = v.trim();
            if !v.is_empty() {
                config.output.extension = normalize_extension(v);
            }
        }
        if let Some(v) = section.get("joiner") {
            config.output.joiner = v.parse().map_err(|reason| ConfigFileError::InvalidValue {
                section: "output".to_string(),
                key: "joiner".to_string(),
                value: v.to_string(),
                reason,
            })?;
        }
        if let Some(v) = section.get("keep_tiles") {
            config.output.keep_tiles = parse_bool("output", "keep_tiles", v)?;
        }
        if let Some(v) = section.get("fill_gaps") {
            config.output.fill_gaps = parse_bool("output", "fill_gaps", v)?;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_positive<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(invalid(section, key, value, "must be a positive integer")),
    }
}

pub(super) fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    parse_bool_value(value)
        .ok_or_else(|| invalid(section, key, value, "must be true/false, yes/no, 1/0, or on/off"))
}

pub(super) fn optional_string(value: &str) -> Option<String> {
    let v = value.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Expands a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
