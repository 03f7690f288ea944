//! In-memory store provider using `DashMap`.
//!
//! Sharded concurrent map; reads and writes on different keys never block
//! each other. An optional byte quota lets tests exercise the
//! quota-exceeded path of persistent stores.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::{BoxFuture, KeyValueStore, StoreError};

/// In-memory key-value store.
pub struct MemoryStore {
    name: String,
    entries: DashMap<String, Vec<u8>>,
    /// Sum of value lengths.
    used_bytes: AtomicU64,
    /// Maximum sum of value lengths, if limited.
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    /// Create an unbounded memory store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            used_bytes: AtomicU64::new(0),
            quota_bytes: None,
        }
    }

    /// Create a memory store that rejects writes beyond `quota_bytes`.
    pub fn with_quota(name: impl Into<String>, quota_bytes: u64) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new(name)
        }
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_quota(&self, key: &str, new_len: u64) -> Result<(), StoreError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let replaced = self
            .entries
            .get(key)
            .map(|v| v.len() as u64)
            .unwrap_or(0);
        let used_after = self.used_bytes().saturating_sub(replaced) + new_len;
        if used_after > quota {
            return Err(StoreError::QuotaExceeded {
                needed: new_len,
                available: quota.saturating_sub(self.used_bytes().saturating_sub(replaced)),
            });
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_item(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
        let value = self.entries.get(key).map(|v| v.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn set_item(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            let new_len = value.len() as u64;
            self.check_quota(&key, new_len)?;

            if let Some(old) = self.entries.insert(key, value) {
                self.used_bytes
                    .fetch_sub(old.len() as u64, Ordering::Relaxed);
            }
            self.used_bytes.fetch_add(new_len, Ordering::Relaxed);
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let key = key.to_string();
        Box::pin(async move {
            match self.entries.remove(&key) {
                Some((_, old)) => {
                    self.used_bytes
                        .fetch_sub(old.len() as u64, Ordering::Relaxed);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        Box::pin(async move { Ok(self.entries.iter().map(|e| e.key().clone()).collect()) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.entries.clear();
            self.used_bytes.store(0, Ordering::Relaxed);
            Ok(())
        })
    }
}
