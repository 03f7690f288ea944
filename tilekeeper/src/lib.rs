//! TileKeeper - Offline raster map tile cache
//!
//! This library keeps pre-rendered slippy-map tiles available when the
//! network is not. It provides:
//!
//! - [`coord`]: Web Mercator projection and region enumeration
//! - [`codec`]: image bytes to storage-safe base64 and data URIs
//! - [`store`]: the persistent key-value contract the cache is built on
//! - [`cache`]: the tile cache with TTL expiry and LRU eviction
//! - [`prefetch`]: rate-limited bulk download of whole regions
//! - [`service`]: the local-first tile facade consumed by map renderers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilekeeper::cache::{CacheConfig, TileCache};
//! use tilekeeper::prefetch::{AsyncReqwestClient, TileFetcher, TileSource};
//! use tilekeeper::service::TileService;
//! use tilekeeper::store::StoreSet;
//!
//! let stores = StoreSet::open_directory("/var/cache/tilekeeper").await?;
//! let cache = TileCache::open(stores, CacheConfig::default()).await?;
//! let fetcher = TileFetcher::new(Arc::new(AsyncReqwestClient::new()?), TileSource::default(), 3);
//! let service = TileService::new(cache, Arc::new(fetcher));
//!
//! let tile = service.resolve_tile(12, 2074, 1409).await;
//! println!("{}", tile);
//! ```

pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod coord;
pub mod logging;
pub mod prefetch;
pub mod service;
pub mod store;

/// Library version, as reported in the HTTP User-Agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
