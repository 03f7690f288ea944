//! Destinations for downloaded tiles.
//!
//! The region downloader is generic over a [`TileSink`]: the
//! [`TileCache`] for in-process prefetch, or a [`DirectorySink`] writing
//! the conventional `<root>/<z>/<x>/<y>.png` tree for the CLI.

use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cache::{CacheError, TileCache};
use crate::coord::{RegionSpec, TileKey};

/// Errors writing to or probing a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the downloader puts tiles.
pub trait TileSink: Send + Sync {
    /// Whether the tile is already present (and need not be downloaded).
    fn contains(&self, key: TileKey) -> impl Future<Output = Result<bool, SinkError>> + Send;

    /// Persist a complete, validated tile.
    fn store(&self, key: TileKey, bytes: &[u8])
        -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Note that `region` has been pre-downloaded.
    fn record_region(&self, region: &RegionSpec)
        -> impl Future<Output = Result<(), SinkError>> + Send;
}

impl TileSink for TileCache {
    async fn contains(&self, key: TileKey) -> Result<bool, SinkError> {
        Ok(self.has(key).await?)
    }

    async fn store(&self, key: TileKey, bytes: &[u8]) -> Result<(), SinkError> {
        Ok(self.put(key, bytes).await?)
    }

    async fn record_region(&self, region: &RegionSpec) -> Result<(), SinkError> {
        Ok(TileCache::record_region(self, &region.name).await?)
    }
}

/// Writes tiles as `<root>/<z>/<x>/<y>.png`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.root
            .join(key.zoom.to_string())
            .join(key.x.to_string())
            .join(format!("{}.png", key.y))
    }
}

impl TileSink for DirectorySink {
    async fn contains(&self, key: TileKey) -> Result<bool, SinkError> {
        Ok(tokio::fs::try_exists(self.tile_path(&key)).await?)
    }

    async fn store(&self, key: TileKey, bytes: &[u8]) -> Result<(), SinkError> {
        let path = self.tile_path(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write atomically via temp file so an interrupted run never
        // leaves a truncated tile that would later be skipped
        let temp_path = path.with_extension("png.tmp");
        tokio::fs::write(&temp_path, bytes).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn record_region(&self, _region: &RegionSpec) -> Result<(), SinkError> {
        // The CLI writes its own metadata sidecar
        Ok(())
    }
}
