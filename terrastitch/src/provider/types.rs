//! Provider types and traits

use std::fmt;
use std::future::Future;

use crate::coord::TileCoord;

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Transport failure: connect, timeout, body read
    HttpError(String),
    /// Server answered with a non-success status
    HttpStatus { status: u16, url: String },
    /// Zoom level not supported by this provider
    UnsupportedZoom(u8),
    /// Invalid response data from provider
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport errors, `429 Too Many Requests` and server errors are
    /// transient. Other client errors and unsupported zooms are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::HttpError(_) => true,
            ProviderError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            ProviderError::UnsupportedZoom(_) | ProviderError::InvalidResponse(_) => false,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::HttpStatus { status, url } => {
                write!(f, "HTTP {} from {}", status, url)
            }
            ProviderError::UnsupportedZoom(zoom) => {
                write!(f, "Zoom level {} not supported by provider", zoom)
            }
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Async trait for raster tile sources.
///
/// Implementors download the raw bytes of one tile by its XYZ coordinate.
pub trait TileProvider: Send + Sync {
    /// Downloads a single tile.
    ///
    /// # Returns
    ///
    /// Raw image data (PNG for terrain-RGB) or an error.
    fn fetch_tile(
        &self,
        coord: TileCoord,
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;

    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;

    /// Returns the minimum supported zoom level.
    fn min_zoom(&self) -> u8;

    /// Returns the maximum supported zoom level.
    fn max_zoom(&self) -> u8;

    /// Checks if this provider supports the given zoom level.
    fn supports_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom() && zoom <= self.max_zoom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> ProviderError {
        ProviderError::HttpStatus {
            status,
            url: "https://example.com/1/2/3.pngraw".to_string(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::HttpError("timed out".into()).is_retryable());
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());

        assert!(!status(401).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!ProviderError::UnsupportedZoom(30).is_retryable());
        assert!(!ProviderError::InvalidResponse("empty body".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            status(404).to_string(),
            "HTTP 404 from https://example.com/1/2/3.pngraw"
        );
        assert_eq!(
            ProviderError::UnsupportedZoom(23).to_string(),
            "Zoom level 23 not supported by provider"
        );
    }
}
