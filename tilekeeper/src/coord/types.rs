//! Coordinate type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels served by public raster tile servers
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 19;

/// Tile identity in the slippy-map scheme.
///
/// At zoom `z` the grid is `2^z × 2^z` tiles; `x` grows eastward from the
/// antimeridian and `y` grows southward from the north edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    /// Zoom level (0-19)
    pub zoom: u8,
    /// Column index, 0 at the west edge
    pub x: u32,
    /// Row index, 0 at the north edge
    pub y: u32,
}

impl TileKey {
    /// Create a tile key without range checks.
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Create a tile key, rejecting indices outside the grid for `zoom`.
    pub fn checked(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let n = grid_size(zoom);
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(CoordError::OutOfGrid { zoom, x, y });
        }
        Ok(Self { zoom, x, y })
    }

    /// Key used in the persistent store: `"{z}_{x}_{y}"`.
    pub fn storage_key(&self) -> String {
        format!("{}_{}_{}", self.zoom, self.x, self.y)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

impl FromStr for TileKey {
    type Err = CoordError;

    /// Parses the storage form `"{z}_{x}_{y}"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        let parsed = (|| {
            let zoom = parts.next()?.parse().ok()?;
            let x = parts.next()?.parse().ok()?;
            let y = parts.next()?.parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            Some(TileKey { zoom, x, y })
        })();
        parsed.ok_or_else(|| CoordError::InvalidKey(s.to_string()))
    }
}

/// Number of tiles along one axis at `zoom`.
#[inline]
pub fn grid_size(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Errors from coordinate conversion and region validation.
///
/// Every variant is detected before any network activity starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("Invalid latitude: {0} (must be between -85.05112878 and 85.05112878)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0} (must be between 0 and 19)")]
    InvalidZoom(u8),

    #[error("Invalid zoom range: min zoom {min} is greater than max zoom {max}")]
    InvalidZoomRange { min: u8, max: u8 },

    #[error("Degenerate bounding box: {0}")]
    DegenerateBounds(String),

    #[error("Region name must not be empty")]
    EmptyRegionName,

    #[error("Tile {zoom}/{x}/{y} is outside the zoom {zoom} grid")]
    OutOfGrid { zoom: u8, x: u32, y: u32 },

    #[error("Invalid tile key '{0}' (expected z_x_y)")]
    InvalidKey(String),
}
