//! Runtime configuration of the tile service.

use serde::{Deserialize, Serialize};

/// Resolution policy for [`TileService`](super::TileService).
///
/// Can be swapped at runtime; the next `resolve_tile` call sees the new
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// When false, every tile resolves to its remote URL and the cache is
    /// never consulted.
    pub enabled: bool,
    /// Look in the cache before going to the network.
    pub use_local_first: bool,
    /// On a cache miss, download the tile (and cache it) when online.
    pub fallback_to_remote: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_local_first: true,
            fallback_to_remote: true,
        }
    }
}

impl ServiceConfig {
    /// Strictly offline: cache hits or the placeholder, never the network.
    pub fn offline_only() -> Self {
        Self {
            fallback_to_remote: false,
            ..Self::default()
        }
    }

    /// Pass-through: every tile resolves to its remote URL.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
