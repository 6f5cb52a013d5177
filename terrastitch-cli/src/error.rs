//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use terrastitch::config::ConfigFileError;
use terrastitch::StitchError;

/// Exit code when the user interrupted the run.
const EXIT_INTERRUPTED: i32 = 130;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read the access token from the terminal
    Prompt(String),
    /// Failed to start the async runtime or signal handler
    Runtime(String),
    /// Failed to clear the tile root
    CacheClear(String),
    /// Failed to read tile root statistics
    CacheStats(String),
    /// The stitching run failed
    Stitch(StitchError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Stitch(StitchError::MissingCredential) => {
                eprintln!();
                eprintln!("Provide a Mapbox access token in one of these ways:");
                eprintln!("  1. Run: terrastitch token");
                eprintln!("  2. Export MBX_TOKEN=<token>");
                eprintln!("  3. Run: terrastitch config set mapbox.access_token <token>");
            }
            CliError::Stitch(StitchError::FetchFailed { .. }) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Invalid or expired token (HTTP 401/403)");
                eprintln!("  2. Zoom level above what the tileset serves (HTTP 404)");
                eprintln!("  3. Network unavailable; tiles fetched so far are kept for a rerun");
            }
            CliError::Stitch(StitchError::AssemblyFailed { reason, .. }) => {
                eprintln!();
                if reason.contains("too large") {
                    eprintln!("Large grids need libvips: rerun with --joiner vips");
                } else {
                    eprintln!("With the vips joiner, make sure libvips is installed and on PATH,");
                    eprintln!("or switch back with: terrastitch config set output.joiner image");
                }
            }
            CliError::Stitch(StitchError::Cancelled) => process::exit(EXIT_INTERRUPTED),
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Prompt(msg) => write!(f, "Failed to read token: {}", msg),
            CliError::Runtime(msg) => write!(f, "Failed to start: {}", msg),
            CliError::CacheClear(msg) => write!(f, "Failed to clear tile cache: {}", msg),
            CliError::CacheStats(msg) => write!(f, "Failed to read tile cache: {}", msg),
            CliError::Stitch(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Stitch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StitchError> for CliError {
    fn from(e: StitchError) -> Self {
        CliError::Stitch(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stitch_error_message_passes_through() {
        let err = CliError::from(StitchError::EmptyFeatureSet);
        assert_eq!(err.to_string(), "feature collection is empty");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_is_prefixed() {
        let err = CliError::from(ConfigFileError::WriteError("disk full".to_string()));
        assert!(err.to_string().starts_with("Configuration error:"));
        assert!(err.to_string().contains("disk full"));
    }
}
