//! Catalogue of named regions the CLI can download.

use tilekeeper::coord::{count_tiles, BoundingBox, RegionSpec};

/// A predefined download area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NamedRegion {
    /// Command-line key, e.g. `new_york`.
    pub key: &'static str,
    /// Display name, recorded in the cache and the metadata sidecar.
    pub name: &'static str,
    pub bounds: BoundingBox,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

pub const REGIONS: [NamedRegion; 8] = [
    NamedRegion {
        key: "paris",
        name: "Paris",
        bounds: BoundingBox::new(48.902, 48.815, 2.470, 2.224),
        min_zoom: 10,
        max_zoom: 15,
    },
    NamedRegion {
        key: "london",
        name: "London",
        bounds: BoundingBox::new(51.692, 51.286, 0.334, -0.510),
        min_zoom: 10,
        max_zoom: 14,
    },
    NamedRegion {
        key: "new_york",
        name: "New York",
        bounds: BoundingBox::new(40.917, 40.477, -73.700, -74.259),
        min_zoom: 10,
        max_zoom: 14,
    },
    NamedRegion {
        key: "tokyo",
        name: "Tokyo",
        bounds: BoundingBox::new(35.818, 35.528, 139.919, 139.562),
        min_zoom: 10,
        max_zoom: 14,
    },
    NamedRegion {
        key: "sydney",
        name: "Sydney",
        bounds: BoundingBox::new(-33.578, -34.118, 151.343, 150.520),
        min_zoom: 10,
        max_zoom: 14,
    },
    NamedRegion {
        key: "san_francisco",
        name: "San Francisco",
        bounds: BoundingBox::new(37.833, 37.708, -122.357, -122.515),
        min_zoom: 10,
        max_zoom: 15,
    },
    NamedRegion {
        key: "berlin",
        name: "Berlin",
        bounds: BoundingBox::new(52.675, 52.338, 13.761, 13.088),
        min_zoom: 10,
        max_zoom: 14,
    },
    NamedRegion {
        key: "rome",
        name: "Rome",
        bounds: BoundingBox::new(41.990, 41.800, 12.600, 12.370),
        min_zoom: 10,
        max_zoom: 15,
    },
];

impl NamedRegion {
    /// Region spec with optional zoom overrides.
    pub fn spec(&self, min_zoom: Option<u8>, max_zoom: Option<u8>) -> RegionSpec {
        RegionSpec::new(
            self.name,
            self.bounds,
            min_zoom.unwrap_or(self.min_zoom),
            max_zoom.unwrap_or(self.max_zoom),
        )
    }

    /// Tile count over the default zoom range.
    pub fn estimated_tiles(&self) -> u64 {
        count_tiles(&self.bounds, self.min_zoom, self.max_zoom)
    }
}

/// Look up a region by key; case-insensitive, `-` and `_` interchangeable.
pub fn find(key: &str) -> Option<&'static NamedRegion> {
    let normalized = key.trim().to_lowercase().replace('-', "_");
    REGIONS.iter().find(|r| r.key == normalized)
}

/// File-name-safe form of a region name: `New York` → `new-york`.
pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("region");
    }
    slug
}
