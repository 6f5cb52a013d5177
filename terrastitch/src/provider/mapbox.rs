//! Mapbox terrain-RGB elevation provider.
//!
//! # URL Pattern
//!
//! `https://api.mapbox.com/v4/mapbox.terrain-rgb/{z}/{x}/{y}.pngraw?access_token={token}`
//!
//! - Standard XYZ tile coordinates
//! - `.pngraw` delivers lossless PNG, so the encoded heights survive intact
//! - The access token is a query parameter and is required
//!
//! The template is configurable for self-hosted mirrors. Placeholders:
//! `{z}`, `{x}`, `{y}` and `{token}`.
//!
//! # Coordinate System
//!
//! Uses standard Web Mercator XYZ tile coordinates:
//! - X: Column (0 to 2^zoom - 1, west to east)
//! - Y: Row (0 to 2^zoom - 1, north to south)
//! - Z: Zoom level (0 to 22)

use tracing::trace;

use crate::coord::TileCoord;
use crate::error::{StitchError, StitchResult};
use crate::provider::{AsyncHttpClient, ProviderError, TileProvider};

/// Default URL template for Mapbox terrain-RGB tiles.
pub const MAPBOX_TERRAIN_URL: &str =
    "https://api.mapbox.com/v4/mapbox.terrain-rgb/{z}/{x}/{y}.pngraw?access_token={token}";

/// Minimum zoom level supported by Mapbox.
const MIN_ZOOM: u8 = 0;

/// Maximum zoom level served by the Mapbox raster API.
const MAX_ZOOM: u8 = 22;

/// Mapbox terrain-RGB provider.
///
/// The access token is fixed at construction; nothing is read from the
/// environment at request time.
///
/// # Example
///
/// ```ignore
/// use terrastitch::provider::{MapboxTerrainProvider, ReqwestClient};
///
/// let client = ReqwestClient::new()?;
/// let provider = MapboxTerrainProvider::new(client, "pk.your_token")?;
/// ```
pub struct MapboxTerrainProvider<C: AsyncHttpClient> {
    http_client: C,
    access_token: String,
    url_template: String,
}

impl<C: AsyncHttpClient> MapboxTerrainProvider<C> {
    /// Creates a provider using the default terrain-RGB endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StitchError::MissingCredential`] if the token is empty.
    pub fn new(http_client: C, access_token: impl Into<String>) -> StitchResult<Self> {
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(StitchError::MissingCredential);
        }
        Ok(Self {
            http_client,
            access_token,
            url_template: MAPBOX_TERRAIN_URL.to_string(),
        })
    }

    /// Replaces the URL template.
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    /// Builds the tile URL for the given coordinates.
    fn build_url(&self, coord: &TileCoord) -> String {
        self.url_template
            .replace("{z}", &coord.zoom.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{token}", &self.access_token)
    }
}

impl<C: AsyncHttpClient> TileProvider for MapboxTerrainProvider<C> {
    async fn fetch_tile(&self, coord: TileCoord) -> Result<Vec<u8>, ProviderError> {
        if !self.supports_zoom(coord.zoom) {
            return Err(ProviderError::UnsupportedZoom(coord.zoom));
        }

        let url = self.build_url(&coord);
        trace!(tile = %coord, "Requesting terrain tile");
        let data = self.http_client.get(&url).await?;
        if data.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "empty body for tile {}",
                coord
            )));
        }
        Ok(data)
    }

    fn name(&self) -> &str {
        "Mapbox terrain-RGB"
    }

    fn min_zoom(&self) -> u8 {
        MIN_ZOOM
    }

    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockHttpClient;

    fn sample_png_response() -> Vec<u8> {
        // PNG signature
        vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
    }

    #[test]
    fn test_empty_token_is_missing_credential() {
        let mock = MockHttpClient::new(Ok(sample_png_response()));
        assert!(matches!(
            MapboxTerrainProvider::new(mock.clone(), ""),
            Err(StitchError::MissingCredential)
        ));
        assert!(matches!(
            MapboxTerrainProvider::new(mock, "   "),
            Err(StitchError::MissingCredential)
        ));
    }

    #[test]
    fn test_url_construction() {
        let mock = MockHttpClient::new(Ok(sample_png_response()));
        let provider = MapboxTerrainProvider::new(mock, "pk.test123").unwrap();

        let url = provider.build_url(&TileCoord::new(200, 100, 15));
        assert_eq!(
            url,
            "https://api.mapbox.com/v4/mapbox.terrain-rgb/15/200/100.pngraw?access_token=pk.test123"
        );
    }

    #[test]
    fn test_custom_template() {
        let mock = MockHttpClient::new(Ok(sample_png_response()));
        let provider = MapboxTerrainProvider::new(mock, "abc")
            .unwrap()
            .with_url_template("http://localhost:8080/{z}/{x}/{y}.png?t={token}");

        assert_eq!(
            provider.build_url(&TileCoord::new(1, 2, 3)),
            "http://localhost:8080/3/1/2.png?t=abc"
        );
    }

    #[test]
    fn test_zoom_range() {
        let mock = MockHttpClient::new(Ok(sample_png_response()));
        let provider = MapboxTerrainProvider::new(mock, "t").unwrap();
        assert!(provider.supports_zoom(0));
        assert!(provider.supports_zoom(15));
        assert!(provider.supports_zoom(22));
        assert!(!provider.supports_zoom(23));
    }

    #[tokio::test]
    async fn test_fetch_tile_requests_url() {
        let mock = MockHttpClient::new(Ok(sample_png_response()));
        let provider = MapboxTerrainProvider::new(mock.clone(), "pk.x").unwrap();

        let data = provider.fetch_tile(TileCoord::new(5, 6, 7)).await.unwrap();
        assert_eq!(data, sample_png_response());
        assert_eq!(mock.call_count(), 1);
        assert!(mock.urls()[0].contains("/7/5/6.pngraw"));
    }

    #[tokio::test]
    async fn test_fetch_tile_unsupported_zoom_skips_network() {
        let mock = MockHttpClient::new(Ok(sample_png_response()));
        let provider = MapboxTerrainProvider::new(mock.clone(), "pk.x").unwrap();

        let result = provider.fetch_tile(TileCoord::new(0, 0, 23)).await;
        assert_eq!(result, Err(ProviderError::UnsupportedZoom(23)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_is_invalid_response() {
        let mock = MockHttpClient::new(Ok(Vec::new()));
        let provider = MapboxTerrainProvider::new(mock, "pk.x").unwrap();

        let result = provider.fetch_tile(TileCoord::new(0, 0, 1)).await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_http_status_propagates() {
        let mock = MockHttpClient::new(Err(ProviderError::HttpStatus {
            status: 401,
            url: "u".into(),
        }));
        let provider = MapboxTerrainProvider::new(mock, "pk.x").unwrap();

        let err = provider.fetch_tile(TileCoord::new(0, 0, 1)).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
