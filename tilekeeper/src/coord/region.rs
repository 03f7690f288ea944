//! Bounding boxes, tile rectangles and region enumeration.
//!
//! Counting and enumeration are both driven by [`TileBounds`], so the
//! estimate shown before a download always equals the number of keys the
//! downloader actually visits.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::types::{CoordError, TileKey, MAX_ZOOM};
use super::{tile_bounds_for_zoom, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub const fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// The whole Web Mercator world.
    pub const fn world() -> Self {
        Self::new(MAX_LAT, MIN_LAT, MAX_LON, MIN_LON)
    }

    /// Check the box is finite, in range and not inverted.
    ///
    /// Latitudes beyond the Mercator limit are accepted; projection clamps
    /// them. Boxes crossing the antimeridian are not supported and must be
    /// split by the caller.
    pub fn validate(&self) -> Result<(), CoordError> {
        for lat in [self.north, self.south] {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(CoordError::InvalidLatitude(lat));
            }
        }
        for lon in [self.east, self.west] {
            if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(CoordError::InvalidLongitude(lon));
            }
        }
        if self.north <= self.south {
            return Err(CoordError::DegenerateBounds(format!(
                "north ({}) must be greater than south ({})",
                self.north, self.south
            )));
        }
        if self.east <= self.west {
            return Err(CoordError::DegenerateBounds(format!(
                "east ({}) must be greater than west ({})",
                self.east, self.west
            )));
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N{:.4} S{:.4} E{:.4} W{:.4}",
            self.north, self.south, self.east, self.west
        )
    }
}

/// Inclusive rectangle of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileBounds {
    /// Number of columns in the rectangle.
    pub fn width(&self) -> u64 {
        u64::from(self.max_x - self.min_x) + 1
    }

    /// Number of rows in the rectangle.
    pub fn height(&self) -> u64 {
        u64::from(self.max_y - self.min_y) + 1
    }

    /// Number of tiles in the rectangle.
    pub fn count(&self) -> u64 {
        self.width() * self.height()
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        key.zoom == self.zoom
            && (self.min_x..=self.max_x).contains(&key.x)
            && (self.min_y..=self.max_y).contains(&key.y)
    }

    /// Iterate every key in the rectangle, column by column.
    pub fn iter(&self) -> TileBoundsIter {
        TileBoundsIter {
            bounds: *self,
            next_x: self.min_x,
            next_y: self.min_y,
            done: false,
        }
    }
}

/// Iterator over the keys of a [`TileBounds`].
#[derive(Debug, Clone)]
pub struct TileBoundsIter {
    bounds: TileBounds,
    next_x: u32,
    next_y: u32,
    done: bool,
}

impl Iterator for TileBoundsIter {
    type Item = TileKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let key = TileKey::new(self.bounds.zoom, self.next_x, self.next_y);

        if self.next_y < self.bounds.max_y {
            self.next_y += 1;
        } else if self.next_x < self.bounds.max_x {
            self.next_x += 1;
            self.next_y = self.bounds.min_y;
        } else {
            self.done = true;
        }

        Some(key)
    }
}

/// A named area to pre-download: bounding box plus zoom range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub name: String,
    pub bounds: BoundingBox,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl RegionSpec {
    pub fn new(name: impl Into<String>, bounds: BoundingBox, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            name: name.into(),
            bounds,
            min_zoom,
            max_zoom,
        }
    }

    /// Validate name, bounds and zoom range.
    pub fn validate(&self) -> Result<(), CoordError> {
        if self.name.trim().is_empty() {
            return Err(CoordError::EmptyRegionName);
        }
        if self.min_zoom > self.max_zoom {
            return Err(CoordError::InvalidZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if self.max_zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(self.max_zoom));
        }
        self.bounds.validate()
    }

    pub fn zoom_levels(&self) -> RangeInclusive<u8> {
        self.min_zoom..=self.max_zoom
    }

    /// Tile rectangle at every zoom level of the region.
    pub fn tile_bounds(&self) -> Vec<TileBounds> {
        self.zoom_levels()
            .map(|zoom| tile_bounds_for_zoom(&self.bounds, zoom))
            .collect()
    }

    /// Total number of tiles in the region.
    pub fn tile_count(&self) -> u64 {
        self.tile_bounds().iter().map(TileBounds::count).sum()
    }

    /// Iterate every tile key in the region, lowest zoom first.
    pub fn tiles(&self) -> impl Iterator<Item = TileKey> {
        self.tile_bounds().into_iter().flat_map(|bounds| bounds.iter())
    }
}
