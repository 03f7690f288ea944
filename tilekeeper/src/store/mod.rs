//! Persistent key-value store contract.
//!
//! The tile cache is built on a minimal asynchronous key-value interface so
//! any embedded store can back it. Two independent namespaces are used: one
//! for tile records and one for cache metadata (see [`StoreSet`]).
//!
//! # Design Principles
//!
//! - **String keys**: Human-readable for debugging (`"12_2074_1409"`)
//! - **Vec<u8> values**: Raw bytes, serialization is the caller's concern
//! - **Dyn-compatible**: Uses `Pin<Box<dyn Future>>` so stores can be held
//!   as `Arc<dyn KeyValueStore>`
//!
//! # Providers
//!
//! - [`FileStore`]: one file per key under a directory, survives restarts
//! - [`MemoryStore`]: `DashMap`-backed, for tests and ephemeral sessions

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

/// Namespace holding tile records.
pub const TILES_NAMESPACE: &str = "tiles";

/// Namespace holding cache metadata.
pub const METADATA_NAMESPACE: &str = "metadata";

/// Errors raised by a persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error in a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The write would exceed the store's quota.
    #[error("Quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    /// The key contains characters the store cannot represent.
    #[error("Invalid key: '{0}'")]
    InvalidKey(String),

    /// The store is closed or otherwise unusable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Asynchronous key-value store.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` for use across async tasks.
/// Ordering between concurrent writers to the same key is the caller's
/// responsibility; the tile cache serializes its own mutations.
pub trait KeyValueStore: Send + Sync {
    /// Namespace name, used in logs.
    fn name(&self) -> &str;

    /// Retrieve a value.
    ///
    /// Returns `Ok(None)` when the key is absent.
    fn get_item(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>>;

    /// Store a value, replacing any previous one.
    ///
    /// A failed write leaves the previous value (if any) in place.
    fn set_item(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Remove a value.
    ///
    /// Returns `Ok(true)` if the key existed.
    fn remove_item(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// List all keys, in no particular order.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;

    /// Remove every key.
    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// The two namespaces a tile cache needs.
#[derive(Clone)]
pub struct StoreSet {
    pub tiles: Arc<dyn KeyValueStore>,
    pub metadata: Arc<dyn KeyValueStore>,
}

impl StoreSet {
    pub fn new(tiles: Arc<dyn KeyValueStore>, metadata: Arc<dyn KeyValueStore>) -> Self {
        Self { tiles, metadata }
    }

    /// Two independent in-memory namespaces.
    pub fn in_memory() -> Self {
        Self {
            tiles: Arc::new(MemoryStore::new(TILES_NAMESPACE)),
            metadata: Arc::new(MemoryStore::new(METADATA_NAMESPACE)),
        }
    }

    /// Two file-backed namespaces under `root` (`root/tiles`, `root/metadata`).
    pub async fn open_directory(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let tiles = FileStore::open(root.join(TILES_NAMESPACE), TILES_NAMESPACE).await?;
        let metadata = FileStore::open(root.join(METADATA_NAMESPACE), METADATA_NAMESPACE).await?;
        Ok(Self {
            tiles: Arc::new(tiles),
            metadata: Arc::new(metadata),
        })
    }
}
