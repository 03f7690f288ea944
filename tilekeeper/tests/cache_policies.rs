//! Integration tests for cache eviction, LRU ordering and TTL expiry.
//!
//! Run with: `cargo test --test cache_policies`

mod common;

use std::time::Duration;

use common::{manual_cache, png_bytes};
use tilekeeper::cache::{CacheConfig, EvictionMode};
use tilekeeper::coord::TileKey;

const TILE_LEN: usize = 100;

#[tokio::test]
async fn eviction_keeps_count_bounded_and_bytes_exact() {
    let max_tiles = 8;
    let config = CacheConfig::default()
        .with_max_tiles(max_tiles)
        .with_eviction_mode(EvictionMode::Inline);
    let (cache, clock) = manual_cache(config).await;

    for x in 0..40u32 {
        let len = TILE_LEN + x as usize;
        cache.put(TileKey::new(10, x, 7), &png_bytes(len)).await.unwrap();
        clock.advance(Duration::from_millis(5));

        let stats = cache.stats().await;
        assert!(
            stats.total_tiles <= max_tiles + 1,
            "{} tiles after insert {}",
            stats.total_tiles,
            x
        );
    }

    let mut present = 0u64;
    let mut bytes = 0u64;
    for x in 0..40u32 {
        if let Some(raw) = cache.get_raw(TileKey::new(10, x, 7)).await.unwrap() {
            present += 1;
            bytes += raw.len() as u64;
        }
    }
    let stats = cache.stats().await;
    assert_eq!(stats.total_tiles, present);
    assert_eq!(stats.total_size_bytes, bytes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_eviction_keeps_count_bounded_under_steady_writes() {
    let max_tiles = 8;
    let (cache, clock) = manual_cache(CacheConfig::default().with_max_tiles(max_tiles)).await;

    let mut max_seen = 0u64;
    for x in 0..200u32 {
        cache.put(TileKey::new(12, x, 9), &png_bytes(TILE_LEN)).await.unwrap();
        clock.advance(Duration::from_millis(1));
        max_seen = max_seen.max(cache.stats().await.total_tiles);
    }
    cache.dispose().await;

    assert!(
        max_seen <= max_tiles + 1,
        "{} tiles observed with a ceiling of {}",
        max_seen,
        max_tiles
    );
    assert!(cache.stats().await.total_tiles <= max_tiles);
}

#[tokio::test]
async fn byte_ceiling_triggers_eviction() {
    let config = CacheConfig::default()
        .with_max_size(1_000)
        .with_eviction_mode(EvictionMode::Inline);
    let (cache, clock) = manual_cache(config).await;

    for x in 0..20u32 {
        cache.put(TileKey::new(8, x, 0), &png_bytes(TILE_LEN)).await.unwrap();
        clock.advance(Duration::from_millis(1));
    }

    let stats = cache.stats().await;
    assert!(stats.total_size_bytes <= 1_000 + (TILE_LEN as u64 + 8));
    assert!(stats.last_cleanup_at.is_some());
}

#[tokio::test]
async fn least_recently_accessed_tile_is_evicted_first() {
    let config = CacheConfig::default()
        .with_max_tiles(4)
        .with_eviction_mode(EvictionMode::Inline);
    let (cache, clock) = manual_cache(config).await;

    for x in 0..4u32 {
        cache.put(TileKey::new(10, x, 0), &png_bytes(10)).await.unwrap();
        clock.advance(Duration::from_secs(1));
    }

    // Oldest write, freshest read
    assert!(cache.get(TileKey::new(10, 0, 0)).await.unwrap().is_some());
    clock.advance(Duration::from_secs(1));

    // Fifth tile: 5 over a ceiling of 4 evicts max(1, 5/4) = 1 tile
    cache.put(TileKey::new(10, 4, 0), &png_bytes(10)).await.unwrap();

    assert!(cache.has(TileKey::new(10, 0, 0)).await.unwrap());
    assert!(!cache.has(TileKey::new(10, 1, 0)).await.unwrap());
    assert!(cache.has(TileKey::new(10, 4, 0)).await.unwrap());
    assert_eq!(cache.stats().await.total_tiles, 4);
}

#[tokio::test]
async fn tiles_expire_strictly_after_ttl() {
    let ttl = Duration::from_secs(3600);
    let (cache, clock) = manual_cache(CacheConfig::default().with_ttl(ttl)).await;
    let key = TileKey::new(12, 2074, 1409);
    cache.put(key, &png_bytes(10)).await.unwrap();

    clock.advance(ttl);
    assert!(cache.has(key).await.unwrap(), "Exactly TTL old is still fresh");

    clock.advance(Duration::from_millis(1));
    assert!(!cache.has(key).await.unwrap());
    assert_eq!(cache.get(key).await.unwrap(), None);

    let stats = cache.stats().await;
    assert_eq!(stats.total_tiles, 0);
    assert_eq!(stats.total_size_bytes, 0);
}

#[tokio::test]
async fn reading_does_not_extend_ttl() {
    let ttl = Duration::from_secs(60);
    let (cache, clock) = manual_cache(CacheConfig::default().with_ttl(ttl)).await;
    let key = TileKey::new(5, 3, 3);
    cache.put(key, &png_bytes(10)).await.unwrap();

    clock.advance(Duration::from_secs(50));
    assert!(cache.get(key).await.unwrap().is_some());
    clock.advance(Duration::from_secs(20));

    assert_eq!(cache.get(key).await.unwrap(), None);
}
