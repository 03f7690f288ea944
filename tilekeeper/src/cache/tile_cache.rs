//! The tile cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::metadata::CacheMetadata;
use super::types::{
    CacheConfig, CacheStats, EvictionMode, EvictionResult, RecordHeader, TileRecord,
    EVICTION_DIVISOR,
};
use super::CacheError;
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::coord::TileKey;
use crate::store::{KeyValueStore, StoreSet};

/// Persistent tile cache.
///
/// Cloning is cheap; clones share the same stores, lock and metadata.
#[derive(Clone)]
pub struct TileCache {
    inner: Arc<Inner>,
}

struct Inner {
    tiles: Arc<dyn KeyValueStore>,
    metadata_store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    /// Writer lock; also the in-memory copy of the persisted metadata.
    state: Mutex<CacheMetadata>,
    /// `true` while an eviction pass is pending or running.
    evicting: watch::Sender<bool>,
    eviction_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl TileCache {
    /// Open a cache over `stores`, loading or creating its metadata.
    pub async fn open(stores: StoreSet, config: CacheConfig) -> Result<Self, CacheError> {
        Self::open_with_clock(stores, config, Arc::new(SystemClock)).await
    }

    /// Open a cache that reads time from `clock`.
    pub async fn open_with_clock(
        stores: StoreSet,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CacheError> {
        let metadata =
            CacheMetadata::load_or_rebuild(stores.metadata.as_ref(), stores.tiles.as_ref())
                .await?;

        info!(
            tiles = metadata.total_tiles,
            bytes = metadata.total_size,
            max_bytes = config.max_cache_size_bytes,
            max_tiles = config.max_tile_count,
            ttl_secs = config.ttl.as_secs(),
            "Tile cache opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                tiles: stores.tiles,
                metadata_store: stores.metadata,
                config,
                clock,
                state: Mutex::new(metadata),
                evicting: watch::Sender::new(false),
                eviction_task: parking_lot::Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
        })
    }

    /// Shut the cache down.
    ///
    /// Waits for a running background eviction and flushes the metadata.
    /// Every later operation fails with [`CacheError::Disposed`].
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let task = self.inner.eviction_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        let state = self.inner.state.lock().await;
        if let Err(e) = state.save(self.inner.metadata_store.as_ref()).await {
            warn!(error = %e, "Failed to flush cache metadata on dispose");
        }
        info!("Tile cache disposed");
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.inner.disposed.load(Ordering::SeqCst) {
            Err(CacheError::Disposed)
        } else {
            Ok(())
        }
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    fn is_expired(&self, header: &RecordHeader, now: i64) -> bool {
        header.is_expired(now, self.inner.config.ttl_millis())
    }

    fn is_over_limits(&self, state: &CacheMetadata) -> bool {
        state.total_size > self.inner.config.max_cache_size_bytes
            || state.total_tiles > self.inner.config.max_tile_count
    }

    async fn read_record(&self, key: &TileKey) -> Result<Option<TileRecord>, CacheError> {
        let storage_key = key.storage_key();
        let Some(bytes) = self.inner.tiles.get_item(&storage_key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::CorruptRecord {
                key: storage_key,
                reason: e.to_string(),
            })
    }

    async fn read_header(&self, storage_key: &str) -> Result<Option<RecordHeader>, CacheError> {
        let Some(bytes) = self.inner.tiles.get_item(storage_key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::CorruptRecord {
                key: storage_key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Drop an unparseable record. It was never counted, so totals stay.
    async fn discard_corrupt(&self, storage_key: &str, reason: &str) -> Result<(), CacheError> {
        let _state = self.inner.state.lock().await;
        self.discard_corrupt_locked(storage_key, reason).await
    }

    /// As [`discard_corrupt`](Self::discard_corrupt), with the writer lock held.
    async fn discard_corrupt_locked(
        &self,
        storage_key: &str,
        reason: &str,
    ) -> Result<(), CacheError> {
        // A concurrent put may have replaced it meanwhile
        if matches!(
            self.read_header(storage_key).await,
            Err(CacheError::CorruptRecord { .. })
        ) {
            self.inner.tiles.remove_item(storage_key).await?;
            warn!(key = %storage_key, reason = %reason, "Removed corrupt tile record");
        }
        Ok(())
    }

    async fn write_record(&self, record: &TileRecord) -> Result<(), CacheError> {
        let storage_key = record.key.storage_key();
        let bytes = serde_json::to_vec(record).map_err(|e| CacheError::CorruptRecord {
            key: storage_key.clone(),
            reason: e.to_string(),
        })?;
        self.inner.tiles.set_item(&storage_key, bytes).await?;
        Ok(())
    }

    /// Remove `key` if it is still expired, under the writer lock.
    async fn expire(&self, key: &TileKey) -> Result<(), CacheError> {
        let storage_key = key.storage_key();
        let mut state = self.inner.state.lock().await;
        let header = match self.read_header(&storage_key).await {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(()),
            Err(CacheError::CorruptRecord { reason, .. }) => {
                return self.discard_corrupt_locked(&storage_key, &reason).await;
            }
            Err(e) => return Err(e),
        };
        if !self.is_expired(&header, self.now()) {
            return Ok(());
        }
        self.inner.tiles.remove_item(&storage_key).await?;
        state.remove_record(header.byte_size);
        if let Err(e) = state.save(self.inner.metadata_store.as_ref()).await {
            warn!(tile = %key, error = %e, "Failed to save cache metadata after expiry");
        }
        debug!(tile = %key, "Expired tile removed");
        Ok(())
    }

    /// Whether a non-expired record exists for `key`.
    ///
    /// An expired or unreadable record is removed and reported as absent.
    pub async fn has(&self, key: TileKey) -> Result<bool, CacheError> {
        self.ensure_open()?;
        let storage_key = key.storage_key();
        let header = match self.read_header(&storage_key).await {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(false),
            Err(CacheError::CorruptRecord { reason, .. }) => {
                self.discard_corrupt(&storage_key, &reason).await?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        if self.is_expired(&header, self.now()) {
            self.expire(&key).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Read a record and mark it as accessed.
    async fn touch(&self, key: TileKey) -> Result<Option<TileRecord>, CacheError> {
        self.ensure_open()?;

        // Misses never take the lock
        let record = match self.read_record(&key).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(CacheError::CorruptRecord { key: storage_key, reason }) => {
                self.discard_corrupt(&storage_key, &reason).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if self.is_expired(&record.header(), self.now()) {
            self.expire(&key).await?;
            return Ok(None);
        }

        let guard = self.inner.state.lock().await;
        // Re-read: the record may have been evicted or rewritten meanwhile
        let mut record = match self.read_record(&key).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(CacheError::CorruptRecord { key: storage_key, reason }) => {
                self.discard_corrupt_locked(&storage_key, &reason).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let now = self.now();
        if self.is_expired(&record.header(), now) {
            drop(guard);
            self.expire(&key).await?;
            return Ok(None);
        }

        record.last_accessed_at = now;
        if let Err(e) = self.write_record(&record).await {
            // The tile is still servable; only its LRU position is stale
            warn!(tile = %key, error = %e, "Failed to update tile access time");
        }
        drop(guard);
        Ok(Some(record))
    }

    /// Fetch a tile as a `data:` URI.
    ///
    /// Returns `Ok(None)` for a missing, expired or unreadable tile.
    pub async fn get(&self, key: TileKey) -> Result<Option<String>, CacheError> {
        match self.touch(key).await? {
            Some(record) => Ok(Some(codec::to_data_uri(&record.payload)?)),
            None => Ok(None),
        }
    }

    /// Fetch a tile's raw image bytes.
    pub async fn get_raw(&self, key: TileKey) -> Result<Option<Vec<u8>>, CacheError> {
        match self.touch(key).await? {
            Some(record) => Ok(Some(codec::decode(&record.payload)?)),
            None => Ok(None),
        }
    }

    /// Store a tile, replacing any previous version.
    ///
    /// Nothing is counted unless the record write succeeds. If the write
    /// pushes the cache over a ceiling, eviction is triggered according to
    /// the configured [`EvictionMode`]. A put that finds the cache still
    /// over a ceiling waits for the running eviction first, so the cache
    /// never holds more than one insertion beyond its limits.
    ///
    /// A metadata save failure after a successful record write is logged,
    /// not returned: the tile is stored and counted, and the totals are
    /// written again on the next mutation or on [`dispose`](Self::dispose).
    pub async fn put(&self, key: TileKey, raw: &[u8]) -> Result<(), CacheError> {
        self.ensure_open()?;
        let key = TileKey::checked(key.zoom, key.x, key.y)?;
        let payload = codec::encode(raw)?;
        let byte_size = raw.len() as u64;

        let already_over = {
            let state = self.inner.state.lock().await;
            self.is_over_limits(&state)
        };
        if already_over {
            self.trigger_eviction().await;
            self.wait_for_eviction().await;
        }

        let (persisted, over_limits) = {
            let mut state = self.inner.state.lock().await;
            let storage_key = key.storage_key();

            // An unreadable previous record was never counted
            let previous = match self.read_header(&storage_key).await {
                Ok(previous) => previous,
                Err(CacheError::CorruptRecord { .. }) => None,
                Err(e) => return Err(e),
            };

            let now = self.now();
            let record = TileRecord {
                key,
                payload,
                byte_size,
                created_at: now,
                last_accessed_at: now,
            };
            self.write_record(&record).await?;

            match previous {
                Some(previous) => {
                    state.total_size = state.total_size.saturating_sub(previous.byte_size) + byte_size;
                }
                None => {
                    state.total_tiles += 1;
                    state.total_size += byte_size;
                }
            }

            let persisted = state.save(self.inner.metadata_store.as_ref()).await;
            (persisted, self.is_over_limits(&state))
        };

        debug!(tile = %key, bytes = byte_size, "Tile stored");
        if let Err(e) = persisted {
            warn!(tile = %key, error = %e, "Failed to save cache metadata after put");
        }

        if over_limits {
            self.trigger_eviction().await;
        }
        Ok(())
    }

    /// Mark an eviction as running. Returns `false` if one already is.
    fn claim_eviction(&self) -> bool {
        self.inner.evicting.send_if_modified(|evicting| {
            if *evicting {
                false
            } else {
                *evicting = true;
                true
            }
        })
    }

    fn release_eviction(&self) {
        self.inner.evicting.send_replace(false);
    }

    /// Wait until no eviction pass is running.
    async fn wait_for_eviction(&self) {
        let mut rx = self.inner.evicting.subscribe();
        let _ = rx.wait_for(|evicting| !*evicting).await;
    }

    async fn trigger_eviction(&self) {
        if !self.claim_eviction() {
            return;
        }
        match self.inner.config.eviction_mode {
            EvictionMode::Inline => {
                self.evict_within_limits().await;
                self.release_eviction();
            }
            EvictionMode::Background => {
                let cache = self.clone();
                let task = tokio::spawn(async move {
                    // Runs to completion even if the cache is disposed meanwhile
                    cache.evict_within_limits().await;
                    cache.release_eviction();
                });
                *self.inner.eviction_task.lock() = Some(task);
            }
        }
    }

    /// Run eviction passes until the cache is back under its ceilings.
    ///
    /// Stops early when a pass removes nothing, since every candidate was
    /// touched after the snapshot.
    async fn evict_within_limits(&self) {
        loop {
            match self.run_eviction().await {
                Ok(result) if result.entries_removed > 0 => {}
                Ok(_) => break,
                Err(e) => {
                    warn!(error = %e, "Cache eviction failed");
                    break;
                }
            }
            let state = self.inner.state.lock().await;
            if !self.is_over_limits(&state) {
                break;
            }
        }
    }

    /// Remove a tile. Absent keys are not an error.
    ///
    /// Returns `true` if a record was removed.
    pub async fn remove(&self, key: TileKey) -> Result<bool, CacheError> {
        self.ensure_open()?;
        let storage_key = key.storage_key();
        let mut state = self.inner.state.lock().await;

        let header = match self.read_header(&storage_key).await {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(false),
            Err(CacheError::CorruptRecord { .. }) => {
                // Uncounted; just drop it
                return Ok(self.inner.tiles.remove_item(&storage_key).await?);
            }
            Err(e) => return Err(e),
        };

        self.inner.tiles.remove_item(&storage_key).await?;
        state.remove_record(header.byte_size);
        state.save(self.inner.metadata_store.as_ref()).await?;
        debug!(tile = %key, "Tile removed");
        Ok(true)
    }

    /// Delete every tile and reset the metadata.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        self.inner.tiles.clear().await?;
        *state = CacheMetadata::default();
        state.save(self.inner.metadata_store.as_ref()).await?;
        info!("Tile cache cleared");
        Ok(())
    }

    /// Current totals and limits.
    pub async fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock().await;
        CacheStats::new(
            state.total_tiles,
            state.total_size,
            &self.inner.config,
            state.regions.clone(),
            state.last_cleanup_at,
        )
    }

    /// Append a region name to the metadata's region log.
    ///
    /// Names already present are not repeated.
    pub async fn record_region(&self, name: &str) -> Result<(), CacheError> {
        self.ensure_open()?;
        let mut state = self.inner.state.lock().await;
        if state.add_region(name) {
            state.save(self.inner.metadata_store.as_ref()).await?;
        }
        Ok(())
    }

    /// Headers of every readable record, without holding the lock.
    async fn scan_headers(&self) -> Result<Vec<RecordHeader>, CacheError> {
        let keys = self.inner.tiles.keys().await?;
        let mut headers = Vec::with_capacity(keys.len());
        for key in keys {
            match self.read_header(&key).await {
                Ok(Some(header)) => headers.push(header),
                Ok(None) => {}
                Err(e) => debug!(key = %key, error = %e, "Skipping unreadable record"),
            }
        }
        Ok(headers)
    }

    /// Remove `victims` whose headers are unchanged since the snapshot.
    async fn remove_unchanged(
        &self,
        victims: &[RecordHeader],
        still_eligible: impl Fn(&RecordHeader, i64) -> bool,
    ) -> Result<EvictionResult, CacheError> {
        let mut result = EvictionResult {
            candidates: victims.len(),
            ..EvictionResult::default()
        };
        let mut failure = None;

        let mut state = self.inner.state.lock().await;
        let now = self.now();

        for victim in victims {
            let storage_key = victim.key.storage_key();
            let current = match self.read_header(&storage_key).await {
                Ok(Some(current)) => current,
                Ok(None) => continue,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };

            let unchanged = current.last_accessed_at == victim.last_accessed_at
                && current.created_at == victim.created_at;
            if !unchanged || !still_eligible(&current, now) {
                result.spared += 1;
                continue;
            }

            if let Err(e) = self.inner.tiles.remove_item(&storage_key).await {
                failure = Some(e.into());
                break;
            }
            state.remove_record(current.byte_size);
            result.entries_removed += 1;
            result.bytes_freed += current.byte_size;
        }

        state.last_cleanup_at = now;
        state.save(self.inner.metadata_store.as_ref()).await?;
        drop(state);

        match failure {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    /// Evict the least recently accessed quarter of the records.
    ///
    /// At least one record is removed when the cache is not empty.
    pub async fn evict(&self) -> Result<EvictionResult, CacheError> {
        self.ensure_open()?;
        self.run_eviction().await
    }

    async fn run_eviction(&self) -> Result<EvictionResult, CacheError> {
        let start = Instant::now();

        let mut headers = self.scan_headers().await?;
        if headers.is_empty() {
            return Ok(EvictionResult::default());
        }
        headers.sort_by_key(|h| (h.last_accessed_at, h.created_at, h.key));

        let count = (headers.len() / EVICTION_DIVISOR).max(1);
        headers.truncate(count);

        let mut result = self.remove_unchanged(&headers, |_, _| true).await?;
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            removed = result.entries_removed,
            candidates = result.candidates,
            spared = result.spared,
            bytes_freed = result.bytes_freed,
            duration_ms = result.duration_ms,
            "Cache eviction complete"
        );
        Ok(result)
    }

    /// Remove every expired record.
    pub async fn purge_expired(&self) -> Result<EvictionResult, CacheError> {
        self.ensure_open()?;
        let start = Instant::now();
        let now = self.now();
        let ttl_millis = self.inner.config.ttl_millis();

        let expired: Vec<RecordHeader> = self
            .scan_headers()
            .await?
            .into_iter()
            .filter(|h| h.is_expired(now, ttl_millis))
            .collect();

        let mut result = self
            .remove_unchanged(&expired, |h, now| h.is_expired(now, ttl_millis))
            .await?;
        result.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            removed = result.entries_removed,
            bytes_freed = result.bytes_freed,
            "Expired tiles purged"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{BoxFuture, MemoryStore, StoreError};
    use std::time::Duration;

    /// Memory store whose writes start failing once frozen.
    struct FreezableStore {
        inner: MemoryStore,
        frozen: AtomicBool,
    }

    impl FreezableStore {
        fn new(name: &str) -> Self {
            Self {
                inner: MemoryStore::new(name),
                frozen: AtomicBool::new(false),
            }
        }

        fn freeze(&self) {
            self.frozen.store(true, Ordering::SeqCst);
        }
    }

    impl KeyValueStore for FreezableStore {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn get_item(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
            if self.frozen.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err::<(), _>(StoreError::Unavailable("frozen".to_string()))
                });
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
            self.inner.remove_item(key)
        }

        fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
            self.inner.keys()
        }

        fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
            self.inner.clear()
        }
    }

    fn png_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend((0..len).map(|i| (i % 251) as u8));
        bytes
    }

    async fn open_cache(config: CacheConfig) -> (TileCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = TileCache::open_with_clock(StoreSet::in_memory(), config, clock.clone())
            .await
            .unwrap();
        (cache, clock)
    }

    #[tokio::test]
    async fn test_put_then_get_returns_data_uri() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        let key = TileKey::new(12, 2074, 1409);
        let raw = png_bytes(100);

        cache.put(key, &raw).await.unwrap();

        let uri = cache.get(key).await.unwrap().expect("tile should be cached");
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(cache.get_raw(key).await.unwrap(), Some(raw));
    }

    #[tokio::test]
    async fn test_get_missing_is_none_not_error() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        assert_eq!(cache.get(TileKey::new(3, 1, 1)).await.unwrap(), None);
        assert!(!cache.has(TileKey::new(3, 1, 1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_counts_and_overwrite_adjusts_by_delta() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        let key = TileKey::new(5, 1, 1);

        cache.put(key, &png_bytes(92)).await.unwrap();
        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 1);
        assert_eq!(stats.total_size_bytes, 100);

        cache.put(key, &png_bytes(42)).await.unwrap();
        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 1, "Overwrite must not double-count");
        assert_eq!(stats.total_size_bytes, 50);
    }

    #[tokio::test]
    async fn test_put_rejects_non_image_without_counting() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        let result = cache.put(TileKey::new(5, 1, 1), b"<html>oops</html>").await;

        assert!(matches!(result, Err(CacheError::Codec(_))));
        assert_eq!(cache.stats().await.total_tiles, 0);
    }

    #[tokio::test]
    async fn test_put_rejects_out_of_grid_key() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        let result = cache.put(TileKey::new(1, 2, 0), &png_bytes(10)).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_failed_store_write_leaves_metadata_untouched() {
        let stores = StoreSet::new(
            Arc::new(MemoryStore::with_quota("tiles", 400)),
            Arc::new(MemoryStore::new("metadata")),
        );
        let cache = TileCache::open(stores, CacheConfig::default()).await.unwrap();

        cache.put(TileKey::new(4, 0, 0), &png_bytes(10)).await.unwrap();
        let before = cache.stats().await;

        let result = cache.put(TileKey::new(4, 1, 0), &png_bytes(2000)).await;
        assert!(matches!(result, Err(CacheError::Store(_))));

        let after = cache.stats().await;
        assert_eq!(after.total_tiles, before.total_tiles);
        assert_eq!(after.total_size_bytes, before.total_size_bytes);
    }

    #[tokio::test]
    async fn test_metadata_save_failure_keeps_tile_counted() {
        let metadata = Arc::new(FreezableStore::new("metadata"));
        let stores = StoreSet::new(Arc::new(MemoryStore::new("tiles")), metadata.clone());
        let cache = TileCache::open(stores, CacheConfig::default()).await.unwrap();
        metadata.freeze();

        let key = TileKey::new(4, 1, 1);
        cache.put(key, &png_bytes(10)).await.unwrap();

        assert_eq!(cache.stats().await.total_tiles, 1);
        assert_eq!(cache.get_raw(key).await.unwrap(), Some(png_bytes(10)));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_miss_and_is_removed() {
        let stores = StoreSet::in_memory();
        let tiles = Arc::clone(&stores.tiles);
        let cache = TileCache::open(stores, CacheConfig::default()).await.unwrap();
        let key = TileKey::new(10, 518, 352);
        let other = TileKey::new(10, 518, 353);
        cache.put(other, &png_bytes(10)).await.unwrap();

        tiles
            .set_item(&key.storage_key(), b"{not json".to_vec())
            .await
            .unwrap();
        assert_eq!(cache.get(key).await.unwrap(), None);
        assert_eq!(tiles.get_item(&key.storage_key()).await.unwrap(), None);

        tiles
            .set_item(&key.storage_key(), b"{not json".to_vec())
            .await
            .unwrap();
        assert!(!cache.has(key).await.unwrap());
        assert_eq!(tiles.get_item(&key.storage_key()).await.unwrap(), None);

        // Only the readable record was ever counted
        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 1);
        assert_eq!(stats.total_size_bytes, 18);

        cache.put(key, &png_bytes(4)).await.unwrap();
        assert_eq!(cache.get_raw(key).await.unwrap(), Some(png_bytes(4)));
        assert_eq!(cache.stats().await.total_tiles, 2);
    }

    #[tokio::test]
    async fn test_remove_and_absent_remove() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        let key = TileKey::new(6, 3, 3);
        cache.put(key, &png_bytes(20)).await.unwrap();

        assert!(cache.remove(key).await.unwrap());
        assert!(!cache.remove(key).await.unwrap());
        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 0);
        assert_eq!(stats.total_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        cache.put(TileKey::new(6, 3, 3), &png_bytes(20)).await.unwrap();
        cache.record_region("Paris").await.unwrap();

        cache.clear().await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 0);
        assert_eq!(stats.total_size_bytes, 0);
        assert!(stats.regions.is_empty());
        assert!(!cache.has(TileKey::new(6, 3, 3)).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_tile_is_a_miss_and_is_purged() {
        let config = CacheConfig::default().with_ttl(Duration::from_secs(60));
        let (cache, clock) = open_cache(config).await;
        let key = TileKey::new(8, 10, 10);
        cache.put(key, &png_bytes(30)).await.unwrap();

        clock.advance(Duration::from_secs(61));

        assert!(!cache.has(key).await.unwrap());
        assert_eq!(cache.get(key).await.unwrap(), None);
        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 0, "Expired tile must be decremented");
        assert_eq!(stats.total_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_purge_expired_sweeps_only_old_records() {
        let config = CacheConfig::default().with_ttl(Duration::from_secs(60));
        let (cache, clock) = open_cache(config).await;

        cache.put(TileKey::new(8, 1, 1), &png_bytes(10)).await.unwrap();
        cache.put(TileKey::new(8, 2, 2), &png_bytes(10)).await.unwrap();
        clock.advance(Duration::from_secs(45));
        cache.put(TileKey::new(8, 3, 3), &png_bytes(10)).await.unwrap();
        clock.advance(Duration::from_secs(30));

        let result = cache.purge_expired().await.unwrap();

        assert_eq!(result.entries_removed, 2);
        assert_eq!(result.bytes_freed, 36);
        assert!(cache.has(TileKey::new(8, 3, 3)).await.unwrap());
        assert_eq!(cache.stats().await.total_tiles, 1);
    }

    #[tokio::test]
    async fn test_evict_removes_oldest_quarter() {
        let (cache, clock) = open_cache(CacheConfig::default()).await;
        for x in 0..8 {
            cache.put(TileKey::new(10, x, 0), &png_bytes(10)).await.unwrap();
            clock.advance(Duration::from_millis(10));
        }

        let result = cache.evict().await.unwrap();

        assert_eq!(result.entries_removed, 2);
        assert_eq!(result.bytes_freed, 36);
        assert!(!cache.has(TileKey::new(10, 0, 0)).await.unwrap());
        assert!(!cache.has(TileKey::new(10, 1, 0)).await.unwrap());
        assert!(cache.has(TileKey::new(10, 2, 0)).await.unwrap());

        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 6);
        assert_eq!(stats.total_size_bytes, 6 * 18);
        assert!(stats.last_cleanup_at.is_some());
    }

    #[tokio::test]
    async fn test_evict_removes_at_least_one() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        cache.put(TileKey::new(1, 0, 0), &png_bytes(1)).await.unwrap();

        let result = cache.evict().await.unwrap();
        assert_eq!(result.entries_removed, 1);
        assert_eq!(cache.stats().await.total_tiles, 0);
    }

    #[tokio::test]
    async fn test_evict_on_empty_cache_is_noop() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        assert_eq!(cache.evict().await.unwrap(), EvictionResult::default());
    }

    #[tokio::test]
    async fn test_inline_eviction_triggers_on_count_ceiling() {
        let config = CacheConfig::default()
            .with_max_tiles(4)
            .with_eviction_mode(EvictionMode::Inline);
        let (cache, clock) = open_cache(config).await;

        for x in 0..5 {
            cache.put(TileKey::new(10, x, 0), &png_bytes(10)).await.unwrap();
            clock.advance(Duration::from_millis(1));
        }

        // 5 records over a ceiling of 4: floor(5/4) = 1 evicted
        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 4);
        assert!(!cache.has(TileKey::new(10, 0, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_background_eviction_completes_on_dispose() {
        let config = CacheConfig::default().with_max_size(50);
        let (cache, clock) = open_cache(config).await;

        for x in 0..4 {
            cache.put(TileKey::new(10, x, 0), &png_bytes(10)).await.unwrap();
            clock.advance(Duration::from_millis(1));
        }
        cache.dispose().await;

        // Disposed caches still report their last state
        let stats = cache.stats().await;
        assert!(stats.total_tiles < 4, "Background eviction should have run");
        assert!(matches!(
            cache.get(TileKey::new(10, 3, 0)).await,
            Err(CacheError::Disposed)
        ));
    }

    #[tokio::test]
    async fn test_get_updates_access_time_for_lru() {
        let (cache, clock) = open_cache(CacheConfig::default()).await;
        for x in 0..4 {
            cache.put(TileKey::new(10, x, 0), &png_bytes(10)).await.unwrap();
            clock.advance(Duration::from_millis(10));
        }

        // Oldest write, but most recent read
        cache.get(TileKey::new(10, 0, 0)).await.unwrap();
        cache.evict().await.unwrap();

        assert!(cache.has(TileKey::new(10, 0, 0)).await.unwrap());
        assert!(!cache.has(TileKey::new(10, 1, 0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_region_dedupes_and_persists() {
        let stores = StoreSet::in_memory();
        let cache = TileCache::open(stores.clone(), CacheConfig::default())
            .await
            .unwrap();
        cache.record_region("Paris").await.unwrap();
        cache.record_region("Paris").await.unwrap();
        cache.put(TileKey::new(2, 1, 1), &png_bytes(5)).await.unwrap();
        cache.dispose().await;

        let reopened = TileCache::open(stores, CacheConfig::default()).await.unwrap();
        let stats = reopened.stats().await;
        assert_eq!(stats.regions, vec!["Paris".to_string()]);
        assert_eq!(stats.total_tiles, 1);
        assert_eq!(stats.total_size_bytes, 13);
    }

    #[tokio::test]
    async fn test_file_backed_cache_survives_restart() {
        let dir = tempfile::TempDir::new().unwrap();
        let key = TileKey::new(12, 2074, 1409);
        let raw = png_bytes(64);

        {
            let stores = StoreSet::open_directory(dir.path()).await.unwrap();
            let cache = TileCache::open(stores, CacheConfig::default()).await.unwrap();
            cache.put(key, &raw).await.unwrap();
            cache.dispose().await;
        }

        let stores = StoreSet::open_directory(dir.path()).await.unwrap();
        let cache = TileCache::open(stores, CacheConfig::default()).await.unwrap();
        assert_eq!(cache.get_raw(key).await.unwrap(), Some(raw));
        assert_eq!(cache.stats().await.total_tiles, 1);
    }

    #[tokio::test]
    async fn test_concurrent_puts_keep_totals_exact() {
        let (cache, _clock) = open_cache(CacheConfig::default()).await;
        let mut handles = Vec::new();
        for x in 0..40u32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                // Half the writers rewrite an existing key
                let key = TileKey::new(10, x % 20, 0);
                cache.put(key, &png_bytes(10)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cache.stats().await;
        assert_eq!(stats.total_tiles, 20);
        assert_eq!(stats.total_size_bytes, 20 * 18);
    }
}
