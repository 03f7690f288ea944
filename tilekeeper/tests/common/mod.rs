//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tilekeeper::cache::{CacheConfig, TileCache};
use tilekeeper::clock::ManualClock;
use tilekeeper::coord::{BoundingBox, RegionSpec};
use tilekeeper::prefetch::{AsyncHttpClient, NetworkError, TileFetcher, TileSource};
use tilekeeper::store::{BoxFuture, KeyValueStore, MemoryStore, StoreError, StoreSet};

/// PNG signature followed by `len` filler bytes.
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend((0..len).map(|i| (i % 251) as u8));
    bytes
}

/// The narrow Paris box at zoom 10-12: 1 + 4 + 9 tiles.
pub fn paris() -> RegionSpec {
    RegionSpec::new("Paris", BoundingBox::new(48.9, 48.8, 2.4, 2.2), 10, 12)
}

pub const PARIS_TILE_COUNT: u64 = 14;

// ============================================================================
// Tile server stand-in
// ============================================================================

/// Serves a small PNG for every URL, except URLs containing one of the
/// failing patterns, which answer 503.
pub struct TestTileServer {
    failing: Vec<String>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl TestTileServer {
    pub fn new() -> Self {
        Self {
            failing: Vec::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, pattern: &str) -> Self {
        self.failing.push(pattern.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl AsyncHttpClient for TestTileServer {
    async fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|p| url.contains(p)) {
            return Err(NetworkError::Status {
                status: 503,
                url: url.to_string(),
            });
        }
        Ok(png_bytes(32))
    }
}

pub fn fetcher(server: &Arc<TestTileServer>) -> Arc<TileFetcher<TestTileServer>> {
    Arc::new(TileFetcher::new(Arc::clone(server), TileSource::default(), 3))
}

// ============================================================================
// Store instrumentation
// ============================================================================

/// Memory store that counts every operation.
pub struct CountingStore {
    inner: MemoryStore,
    operations: AtomicUsize,
}

impl CountingStore {
    pub fn new(name: &str) -> Self {
        Self {
            inner: MemoryStore::new(name),
            operations: AtomicUsize::new(0),
        }
    }

    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.operations.store(0, Ordering::SeqCst);
    }

    fn count(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }
}

impl KeyValueStore for CountingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get_item(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
        self.count();
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
        self.count();
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        self.count();
        self.inner.remove_item(key)
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        self.count();
        self.inner.keys()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.count();
        self.inner.clear()
    }
}

/// In-memory cache driven by a manual clock.
pub async fn manual_cache(config: CacheConfig) -> (TileCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let cache = TileCache::open_with_clock(StoreSet::in_memory(), config, clock.clone())
        .await
        .unwrap();
    (cache, clock)
}
