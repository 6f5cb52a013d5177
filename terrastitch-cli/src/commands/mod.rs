//! CLI command implementations.
//!
//! - [`cache`] - Tile cache management (clear, stats)
//! - [`config`] - Configuration management (get, set, list, path)
//! - [`stitch`] - Main command (resolve, fetch, assemble)
//! - [`token`] - Store a Mapbox access token

pub mod cache;
pub mod config;
pub mod stitch;
pub mod token;
