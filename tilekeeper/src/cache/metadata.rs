//! Persisted aggregate metadata for a tile cache.
//!
//! Stored as JSON under [`METADATA_KEY`] in the metadata namespace. A
//! missing, unreadable or differently-versioned document is rebuilt from a
//! scan of the tile namespace so the totals always match the records.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::RecordHeader;
use super::CacheError;
use crate::store::KeyValueStore;

/// Key of the metadata document.
pub const METADATA_KEY: &str = "cache_metadata";

/// Current metadata layout.
pub const SCHEMA_VERSION: u32 = 1;

/// Aggregate cache state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub schema_version: u32,
    pub total_tiles: u64,
    /// Sum of every record's `byte_size`.
    pub total_size: u64,
    /// Unix epoch milliseconds; 0 means never.
    pub last_cleanup_at: i64,
    /// Names of pre-downloaded regions.
    pub regions: Vec<String>,
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            total_tiles: 0,
            total_size: 0,
            last_cleanup_at: 0,
            regions: Vec::new(),
        }
    }
}

/// Only the fields needed to decide whether a document can be trusted.
#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
    #[serde(default)]
    regions: Vec<String>,
}

impl CacheMetadata {
    /// Append a region name unless it is already recorded.
    ///
    /// Returns `true` if the list changed.
    pub fn add_region(&mut self, name: &str) -> bool {
        if self.regions.iter().any(|r| r == name) {
            return false;
        }
        self.regions.push(name.to_string());
        true
    }

    /// Subtract one record from the totals.
    pub fn remove_record(&mut self, byte_size: u64) {
        self.total_tiles = self.total_tiles.saturating_sub(1);
        self.total_size = self.total_size.saturating_sub(byte_size);
    }

    /// Persist to the metadata namespace.
    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(self).map_err(|e| CacheError::CorruptRecord {
            key: METADATA_KEY.to_string(),
            reason: e.to_string(),
        })?;
        store.set_item(METADATA_KEY, bytes).await?;
        Ok(())
    }

    /// Load metadata, creating or rebuilding it as needed.
    pub async fn load_or_rebuild(
        metadata_store: &dyn KeyValueStore,
        tile_store: &dyn KeyValueStore,
    ) -> Result<Self, CacheError> {
        let Some(bytes) = metadata_store.get_item(METADATA_KEY).await? else {
            // First open: a tile namespace shared with an older instance
            // may already hold records.
            let metadata = Self::rebuild(tile_store, Vec::new()).await?;
            metadata.save(metadata_store).await?;
            return Ok(metadata);
        };

        match serde_json::from_slice::<CacheMetadata>(&bytes) {
            Ok(metadata) if metadata.schema_version == SCHEMA_VERSION => return Ok(metadata),
            _ => {}
        }

        // Keep the region log when the document is at least partly readable
        let (found_version, regions) = match serde_json::from_slice::<VersionProbe>(&bytes) {
            Ok(probe) => (Some(probe.schema_version), probe.regions),
            Err(_) => (None, Vec::new()),
        };
        warn!(
            found_version = ?found_version,
            expected_version = SCHEMA_VERSION,
            "Cache metadata unreadable or incompatible, rebuilding from records"
        );

        let metadata = Self::rebuild(tile_store, regions).await?;
        metadata.save(metadata_store).await?;
        Ok(metadata)
    }

    /// Recompute totals from every readable record.
    ///
    /// Records that cannot be parsed are removed, since nothing could ever
    /// serve or account for them.
    async fn rebuild(tile_store: &dyn KeyValueStore, regions: Vec<String>) -> Result<Self, CacheError> {
        let mut metadata = Self {
            regions,
            ..Self::default()
        };
        let mut dropped = 0usize;

        for key in tile_store.keys().await? {
            let Some(bytes) = tile_store.get_item(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<RecordHeader>(&bytes) {
                Ok(header) => {
                    metadata.total_tiles += 1;
                    metadata.total_size += header.byte_size;
                }
                Err(_) => {
                    tile_store.remove_item(&key).await?;
                    dropped += 1;
                }
            }
        }

        if metadata.total_tiles > 0 || dropped > 0 {
            info!(
                tiles = metadata.total_tiles,
                bytes = metadata.total_size,
                dropped,
                "Cache metadata rebuilt from records"
            );
        }
        Ok(metadata)
    }
}
