//! Directory-backed store provider.
//!
//! Each key is one file in a flat directory:
//! ```text
//! {directory}/{key}.rec
//! ```
//!
//! Keys are used verbatim as file stems so [`KeyValueStore::keys`] can
//! list them back, which restricts them to `[A-Za-z0-9_-]`. Writes go to a
//! temp file that is then renamed over the target, so a crash mid-write
//! never leaves a truncated record behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{BoxFuture, KeyValueStore, StoreError};

const RECORD_EXTENSION: &str = "rec";
const TEMP_EXTENSION: &str = "tmp";

/// Durable key-value store, one file per key.
#[derive(Debug)]
pub struct FileStore {
    name: String,
    directory: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `directory`.
    ///
    /// Leftover temp files from an interrupted write are removed.
    pub async fn open(
        directory: impl Into<PathBuf>,
        name: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;

        let store = Self {
            name: name.into(),
            directory,
        };
        let removed = store.remove_temp_files().await?;

        info!(
            store = %store.name,
            dir = %store.directory.display(),
            stale_temp_files = removed,
            "File store opened"
        );
        Ok(store)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidKey(key.to_string()))
        }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        Self::validate_key(key)?;
        Ok(self
            .directory
            .join(format!("{}.{}", key, RECORD_EXTENSION)))
    }

    async fn remove_temp_files(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(removed)
    }
}

impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_item(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            match tokio::fs::read(path?).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }

    fn set_item(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            let path = path?;
            let temp_path = path.with_extension(TEMP_EXTENSION);
            if let Err(e) = tokio::fs::write(&temp_path, &value).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(StoreError::Io(e));
            }
            tokio::fs::rename(&temp_path, &path).await?;
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            match tokio::fs::remove_file(path?).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        Box::pin(async move {
            let mut keys = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.directory).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if !path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
            Ok(keys)
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut removed = 0usize;
            let mut entries = tokio::fs::read_dir(&self.directory).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let ours = path.extension().is_some_and(|ext| {
                    ext == RECORD_EXTENSION || ext == TEMP_EXTENSION
                });
                if !ours {
                    continue;
                }
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(StoreError::Io(e)),
                }
            }
            debug!(store = %self.name, removed, "File store cleared");
            Ok(())
        })
    }
}
