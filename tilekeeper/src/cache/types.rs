//! Cache configuration, records and reporting types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::format_bytes;
use crate::coord::TileKey;

/// Default size ceiling (500 MiB).
pub const DEFAULT_MAX_CACHE_SIZE_BYTES: u64 = 500 * 1024 * 1024;

/// Default tile-count ceiling.
pub const DEFAULT_MAX_TILE_COUNT: u64 = 10_000;

/// Default time-to-live, measured from a record's creation.
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// One eviction pass removes `n / EVICTION_DIVISOR` of the `n` records.
pub const EVICTION_DIVISOR: usize = 4;

/// How eviction is run once a write crosses a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionMode {
    /// Spawn a background task; at most one runs at a time.
    #[default]
    Background,
    /// Evict before `put` returns.
    Inline,
}

/// Tile cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_cache_size_bytes: u64,
    pub max_tile_count: u64,
    pub ttl: Duration,
    pub eviction_mode: EvictionMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size_bytes: DEFAULT_MAX_CACHE_SIZE_BYTES,
            max_tile_count: DEFAULT_MAX_TILE_COUNT,
            ttl: DEFAULT_TTL,
            eviction_mode: EvictionMode::default(),
        }
    }
}

impl CacheConfig {
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size_bytes = bytes;
        self
    }

    pub fn with_max_tiles(mut self, count: u64) -> Self {
        self.max_tile_count = count;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_eviction_mode(mut self, mode: EvictionMode) -> Self {
        self.eviction_mode = mode;
        self
    }

    pub(crate) fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// A cached tile as persisted in the tile namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub key: TileKey,
    /// Base64 of the raw image bytes.
    pub payload: String,
    /// Length of the raw (decoded) image.
    pub byte_size: u64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds; updated on every read.
    pub last_accessed_at: i64,
}

impl TileRecord {
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            key: self.key,
            byte_size: self.byte_size,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
        }
    }
}

/// The bookkeeping fields of a [`TileRecord`], without the payload.
///
/// Deserializing a stored record into a header skips the payload string,
/// which keeps eviction scans cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RecordHeader {
    pub key: TileKey,
    pub byte_size: u64,
    pub created_at: i64,
    pub last_accessed_at: i64,
}

impl RecordHeader {
    /// Whether the record is older than `ttl_millis` at `now`.
    pub fn is_expired(&self, now: i64, ttl_millis: i64) -> bool {
        now.saturating_sub(self.created_at) > ttl_millis
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_tiles: u64,
    pub total_size_bytes: u64,
    /// `total_size_bytes` for display, e.g. "12.40 MB".
    pub size_human: String,
    /// Percentage of the size ceiling in use.
    pub usage_percent: f64,
    pub max_cache_size_bytes: u64,
    pub max_tile_count: u64,
    pub regions: Vec<String>,
    /// Unix epoch milliseconds of the last eviction, if any.
    pub last_cleanup_at: Option<i64>,
}

impl CacheStats {
    pub(crate) fn new(
        total_tiles: u64,
        total_size_bytes: u64,
        config: &CacheConfig,
        regions: Vec<String>,
        last_cleanup_at: i64,
    ) -> Self {
        let usage_percent = if config.max_cache_size_bytes == 0 {
            0.0
        } else {
            total_size_bytes as f64 / config.max_cache_size_bytes as f64 * 100.0
        };
        Self {
            total_tiles,
            total_size_bytes,
            size_human: format_bytes(total_size_bytes),
            usage_percent,
            max_cache_size_bytes: config.max_cache_size_bytes,
            max_tile_count: config.max_tile_count,
            regions,
            last_cleanup_at: (last_cleanup_at > 0).then_some(last_cleanup_at),
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tiles, {} ({:.1}% of {})",
            self.total_tiles,
            self.size_human,
            self.usage_percent,
            format_bytes(self.max_cache_size_bytes)
        )
    }
}

/// Result of an eviction or expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionResult {
    /// Records selected for removal when the pass started.
    pub candidates: usize,
    pub entries_removed: usize,
    pub bytes_freed: u64,
    /// Candidates kept because they were touched or rewritten mid-pass.
    pub spared: usize,
    pub duration_ms: u64,
}

impl fmt::Display for EvictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Eviction: removed {} of {} candidates, freed {} bytes in {}ms",
            self.entries_removed, self.candidates, self.bytes_freed, self.duration_ms
        )
    }
}
