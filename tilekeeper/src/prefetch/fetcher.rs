//! Per-tile download with retry across mirrors.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::http::{AsyncHttpClient, NetworkError};
use super::source::TileSource;
use crate::codec;
use crate::coord::TileKey;

/// Default number of attempts per tile.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A successfully downloaded tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTile {
    pub key: TileKey,
    pub bytes: Vec<u8>,
    /// Mirror that served the tile.
    pub url: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Every attempt for a tile failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Tile {key} failed after {attempts} attempts: {last_error}")]
pub struct FetchError {
    pub key: TileKey,
    pub attempts: u32,
    pub last_error: NetworkError,
}

/// Downloads single tiles, rotating through mirrors on failure.
pub struct TileFetcher<C> {
    client: Arc<C>,
    source: TileSource,
    max_retries: u32,
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    /// `max_retries` is the total number of attempts per tile (at least 1).
    pub fn new(client: Arc<C>, source: TileSource, max_retries: u32) -> Self {
        Self {
            client,
            source,
            max_retries: max_retries.max(1),
        }
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Download `key`.
    ///
    /// The first attempt goes to mirror `(x + y) mod N`; each retry moves
    /// to the next mirror, falling through to the fallback templates. A
    /// response that is not an image counts as a failed attempt.
    pub async fn fetch(&self, key: TileKey) -> Result<FetchedTile, FetchError> {
        let start_index = self.source.primary_index(&key);
        let mut last_error = NetworkError::Offline;

        for attempt in 0..self.max_retries {
            let url = self.source.mirror_url(&key, start_index + attempt as usize);

            match self.client.get(&url).await {
                Ok(bytes) if codec::detect_format(&bytes).is_ok() => {
                    debug!(tile = %key, url = %url, attempt = attempt + 1, "Tile downloaded");
                    return Ok(FetchedTile {
                        key,
                        bytes,
                        url,
                        attempts: attempt + 1,
                    });
                }
                Ok(_) => {
                    debug!(tile = %key, url = %url, "Response is not an image");
                    last_error = NetworkError::InvalidBody { url };
                }
                Err(e) => {
                    debug!(tile = %key, error = %e, attempt = attempt + 1, "Tile attempt failed");
                    last_error = e;
                }
            }
        }

        warn!(
            tile = %key,
            attempts = self.max_retries,
            error = %last_error,
            "Tile download failed on all mirrors"
        );
        Err(FetchError {
            key,
            attempts: self.max_retries,
            last_error,
        })
    }
}
