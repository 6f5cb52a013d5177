//! Elevation tile provider abstraction
//!
//! Providers turn a [`TileCoord`](crate::coord::TileCoord) into raw tile
//! bytes. The HTTP transport sits behind [`AsyncHttpClient`] so providers
//! can be exercised with a mock client in tests.
//!
//! ```ignore
//! use terrastitch::provider::{MapboxTerrainProvider, ReqwestClient, TileProvider};
//!
//! let client = ReqwestClient::with_timeout(30)?;
//! let provider = MapboxTerrainProvider::new(client, token)?;
//! let bytes = provider.fetch_tile(TileCoord::new(512, 340, 10)).await?;
//! ```

mod http;
mod mapbox;
mod types;

pub use http::{redact_url, AsyncHttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use mapbox::{MapboxTerrainProvider, MAPBOX_TERRAIN_URL};
pub use types::{ProviderError, TileProvider};

#[cfg(test)]
pub use http::tests::MockHttpClient;
