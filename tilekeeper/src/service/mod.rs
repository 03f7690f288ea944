//! Tile service facade consumed by map renderers.
//!
//! [`TileService`] implements the local-first policy: cached tiles are
//! served as `data:` URIs, misses are downloaded and cached when the
//! network allows, and everything else degrades to an offline
//! placeholder or the tile's remote URL. Renderers never see an error.

mod config;
mod error;
mod facade;
mod placeholder;
mod stats;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use facade::{TileReference, TileService};
pub use placeholder::{placeholder_data_uri, placeholder_png, render_placeholder, TILE_SIZE};
pub use stats::ServiceStats;
