//! terrastitch - stitch elevation tiles covering GeoJSON features
//!
//! Given a feature collection and a zoom level, the library computes the
//! Web Mercator tiles covering every geometry, derives their bounding grid,
//! downloads each tile through a disk cache and joins them row-major into a
//! single composite raster with a `Bounds.json` sidecar describing the grid.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use terrastitch::assemble::ImageJoin;
//! use terrastitch::fetch::FetchConfig;
//! use terrastitch::pipeline::{StitchConfig, StitchPipeline, StitchRequest};
//! use terrastitch::provider::{MapboxTerrainProvider, ReqwestClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = MapboxTerrainProvider::new(ReqwestClient::new()?, "pk.your-token")?;
//! let pipeline = StitchPipeline::new(
//!     provider,
//!     Arc::new(ImageJoin),
//!     FetchConfig::default(),
//!     StitchConfig::default(),
//! );
//! let request = StitchRequest::from_file("ridge.json".as_ref(), 12, "ridge")?;
//! let report = pipeline.run(&request, &CancellationToken::new(), |_| {}).await?;
//! println!("wrote {}", report.composite.path.display());
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod cache;
pub mod config;
pub mod coord;
pub mod coverage;
pub mod error;
pub mod features;
pub mod fetch;
pub mod grid;
pub mod logging;
pub mod pipeline;
pub mod provider;

pub use error::{StitchError, StitchResult};
