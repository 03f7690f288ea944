//! Service error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::codec::CodecError;
use crate::coord::CoordError;
use crate::prefetch::FetchError;

/// Errors raised while resolving a tile.
///
/// `resolve_tile` never returns these; they are counted and the tile
/// degrades to its remote URL.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid tile: {0}")]
    InvalidTile(#[from] CoordError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Download error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
