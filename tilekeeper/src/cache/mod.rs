//! Persistent tile cache with TTL expiry and LRU eviction.
//!
//! [`TileCache`] owns two [`KeyValueStore`](crate::store::KeyValueStore)
//! namespaces: one holding a JSON [`TileRecord`] per tile, and one holding
//! the singleton [`CacheMetadata`] with running totals. Every mutation runs
//! under a single async writer lock so the totals always equal the sum of
//! the stored records.
//!
//! # Eviction
//!
//! When a write pushes the totals over `max_cache_size_bytes` or
//! `max_tile_count`, the least recently accessed quarter of the records is
//! removed. Candidates are chosen from an unlocked snapshot and re-checked
//! under the lock, so a tile read or rewritten mid-pass is spared.
//!
//! # Example
//!
//! ```ignore
//! use tilekeeper::cache::{CacheConfig, TileCache};
//! use tilekeeper::coord::TileKey;
//! use tilekeeper::store::StoreSet;
//!
//! let cache = TileCache::open(StoreSet::in_memory(), CacheConfig::default()).await?;
//! cache.put(TileKey::new(12, 2074, 1409), &png_bytes).await?;
//! let uri = cache.get(TileKey::new(12, 2074, 1409)).await?;
//! ```

mod metadata;
mod tile_cache;
mod types;

pub use metadata::{CacheMetadata, METADATA_KEY, SCHEMA_VERSION};
pub use tile_cache::TileCache;
pub use types::{
    CacheConfig, CacheStats, EvictionMode, EvictionResult, RecordHeader, TileRecord,
    DEFAULT_MAX_CACHE_SIZE_BYTES, DEFAULT_MAX_TILE_COUNT, DEFAULT_TTL, EVICTION_DIVISOR,
};

use thiserror::Error;

use crate::codec::CodecError;
use crate::coord::CoordError;
use crate::store::StoreError;

/// Errors from tile cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The tile bytes could not be encoded or the payload decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The tile key is outside the grid.
    #[error("Invalid tile key: {0}")]
    InvalidKey(#[from] CoordError),

    /// A stored document could not be parsed or serialized.
    #[error("Corrupt record '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    /// The cache has been disposed.
    #[error("Tile cache has been disposed")]
    Disposed,
}
