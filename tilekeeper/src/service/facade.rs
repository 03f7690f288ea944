//! Local-first tile resolution.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::config::ServiceConfig;
use super::error::ServiceError;
use super::placeholder::placeholder_data_uri;
use super::stats::{ServiceCounters, ServiceStats};
use crate::cache::{CacheStats, TileCache};
use crate::codec;
use crate::coord::{CoordError, RegionSpec, TileKey};
use crate::prefetch::{
    AsyncHttpClient, Connectivity, DownloadConfig, DownloadSummary, RegionDownloader,
    TileFetcher,
};

/// What a renderer should display for a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileReference {
    /// `data:` URI of the tile image.
    Image(String),
    /// URL the renderer should load itself.
    Remote(String),
    /// `data:` URI of the offline placeholder.
    Placeholder(&'static str),
}

impl TileReference {
    /// The URI to hand to an `<img>`-like consumer.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Image(uri) | Self::Remote(uri) => uri,
            Self::Placeholder(uri) => uri,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

impl fmt::Display for TileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single entry point for map renderers.
///
/// Tiles come from the cache when possible, from the network on a miss
/// (and are cached on the way through), and otherwise degrade to an
/// offline placeholder. Resolution never fails: errors are counted and the
/// tile falls back to its remote URL.
///
/// # Example
///
/// ```ignore
/// let service = TileService::new(cache, fetcher)
///     .with_config(ServiceConfig::offline_only());
///
/// let tile = service.resolve_tile(12, 2074, 1409).await;
/// ```
pub struct TileService<C> {
    cache: TileCache,
    fetcher: Arc<TileFetcher<C>>,
    config: RwLock<ServiceConfig>,
    counters: ServiceCounters,
    connectivity: Option<watch::Receiver<Connectivity>>,
    download_config: DownloadConfig,
}

impl<C: AsyncHttpClient> TileService<C> {
    pub fn new(cache: TileCache, fetcher: Arc<TileFetcher<C>>) -> Self {
        Self {
            cache,
            fetcher,
            config: RwLock::new(ServiceConfig::default()),
            counters: ServiceCounters::default(),
            connectivity: None,
            download_config: DownloadConfig::default(),
        }
    }

    pub fn with_config(self, config: ServiceConfig) -> Self {
        *self.config.write() = config;
        self
    }

    /// Skip on-demand downloads while `rx` reports offline.
    pub fn with_connectivity(mut self, rx: watch::Receiver<Connectivity>) -> Self {
        self.connectivity = Some(rx);
        self
    }

    /// Pacing used by [`preload_area`](Self::preload_area).
    pub fn with_download_config(mut self, config: DownloadConfig) -> Self {
        self.download_config = config;
        self
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn config(&self) -> ServiceConfig {
        *self.config.read()
    }

    pub fn set_config(&self, config: ServiceConfig) {
        *self.config.write() = config;
    }

    /// Modify the configuration in place.
    pub fn update_config(&self, update: impl FnOnce(&mut ServiceConfig)) {
        update(&mut self.config.write());
    }

    pub fn stats(&self) -> ServiceStats {
        self.counters.snapshot()
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    fn is_online(&self) -> bool {
        self.connectivity
            .as_ref()
            .map_or(true, |rx| rx.borrow().is_online())
    }

    fn remote_url(&self, key: &TileKey) -> String {
        self.fetcher.source().remote_url(key)
    }

    /// Resolve tile `zoom/x/y` to something displayable.
    pub async fn resolve_tile(&self, zoom: u8, x: u32, y: u32) -> TileReference {
        let config = self.config();
        let key = TileKey::new(zoom, x, y);

        if !config.enabled {
            return TileReference::Remote(self.remote_url(&key));
        }

        match self.try_resolve(zoom, x, y, config).await {
            Ok(reference) => reference,
            Err(e) => {
                self.counters.error();
                warn!(tile = %key, error = %e, "Tile resolution failed, using remote URL");
                TileReference::Remote(self.remote_url(&key))
            }
        }
    }

    async fn try_resolve(
        &self,
        zoom: u8,
        x: u32,
        y: u32,
        config: ServiceConfig,
    ) -> Result<TileReference, ServiceError> {
        let key = TileKey::checked(zoom, x, y)?;

        if config.use_local_first {
            if let Some(uri) = self.cache.get(key).await? {
                self.counters.hit();
                return Ok(TileReference::Image(uri));
            }
        }
        self.counters.miss();

        if !config.fallback_to_remote || !self.is_online() {
            debug!(tile = %key, "Tile not cached, serving placeholder");
            return Ok(TileReference::Placeholder(placeholder_data_uri()));
        }

        self.counters.remote_request();
        let tile = self.fetcher.fetch(key).await?;
        let uri = codec::data_uri_from_bytes(&tile.bytes)?;
        // The tile is still displayable; the failure is only counted
        if let Err(e) = self.cache.put(key, &tile.bytes).await {
            self.counters.error();
            warn!(tile = %key, error = %e, "Failed to cache downloaded tile");
        }
        Ok(TileReference::Image(uri))
    }

    /// Download every tile of `region` into this service's cache.
    pub async fn preload_area(&self, region: &RegionSpec) -> Result<DownloadSummary, CoordError> {
        let mut downloader = RegionDownloader::new(
            Arc::clone(&self.fetcher),
            Arc::new(self.cache.clone()),
            self.download_config.clone(),
        );
        if let Some(rx) = &self.connectivity {
            downloader = downloader.with_connectivity(rx.clone());
        }
        downloader.predownload_region(region).await
    }
}
