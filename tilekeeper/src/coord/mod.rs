//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and slippy-map tile indices, plus the region enumeration shared by the
//! prefetch pipeline and the standalone downloader.

mod region;
mod types;

pub use region::{BoundingBox, RegionSpec, TileBounds, TileBoundsIter};
pub use types::{
    grid_size, CoordError, TileKey, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

#[inline]
fn tiles_per_axis(zoom: u8) -> f64 {
    2.0_f64.powi(zoom as i32)
}

/// Fractional tile X for a longitude: `(lon + 180) / 360 * 2^zoom`.
#[inline]
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * tiles_per_axis(zoom)
}

/// Fractional tile Y for a latitude (Web Mercator).
///
/// Latitudes are clamped to the Mercator limit first; the poles
/// themselves are not representable.
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT).to_radians();
    let merc = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln();
    (1.0 - merc / PI) / 2.0 * tiles_per_axis(zoom)
}

/// Longitude of the west edge of fractional tile column `x`.
#[inline]
pub fn tile_x_to_lon(x: f64, zoom: u8) -> f64 {
    x / tiles_per_axis(zoom) * 360.0 - 180.0
}

/// Latitude of the north edge of fractional tile row `y`.
#[inline]
pub fn tile_y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = PI * (1.0 - 2.0 * y / tiles_per_axis(zoom));
    n.sinh().atan().to_degrees()
}

/// Floor a fractional index and clamp it into the grid.
#[inline]
fn to_index(value: f64, zoom: u8) -> u32 {
    let max = tiles_per_axis(zoom) - 1.0;
    value.floor().clamp(0.0, max) as u32
}

/// Converts geographic coordinates to the tile containing them.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 19)
#[inline]
pub fn to_tile_key(lat: f64, lon: f64, zoom: u8) -> Result<TileKey, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    Ok(TileKey::new(
        zoom,
        to_index(lon_to_tile_x(lon, zoom), zoom),
        to_index(lat_to_tile_y(lat, zoom), zoom),
    ))
}

/// Returns the latitude/longitude of a tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(key: &TileKey) -> (f64, f64) {
    (
        tile_y_to_lat(key.y as f64, key.zoom),
        tile_x_to_lon(key.x as f64, key.zoom),
    )
}

/// Inclusive tile rectangle covering `bounds` at `zoom`.
///
/// West maps to `min_x`, east to `max_x`, north to `min_y` and south to
/// `max_y`; Y grows southward.
pub fn tile_bounds_for_zoom(bounds: &BoundingBox, zoom: u8) -> TileBounds {
    TileBounds {
        zoom,
        min_x: to_index(lon_to_tile_x(bounds.west, zoom), zoom),
        max_x: to_index(lon_to_tile_x(bounds.east, zoom), zoom),
        min_y: to_index(lat_to_tile_y(bounds.north, zoom), zoom),
        max_y: to_index(lat_to_tile_y(bounds.south, zoom), zoom),
    }
}

/// Number of tiles covering `bounds` over `min_zoom..=max_zoom`.
///
/// Returns 0 for an inverted zoom range.
pub fn count_tiles(bounds: &BoundingBox, min_zoom: u8, max_zoom: u8) -> u64 {
    (min_zoom..=max_zoom)
        .map(|zoom| tile_bounds_for_zoom(bounds, zoom).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const PARIS: BoundingBox = BoundingBox::new(48.9, 48.8, 2.4, 2.2);

    #[test]
    fn test_new_york_city_at_zoom_16() {
        // New York City: 40.7128°N, 74.0060°W
        let key = to_tile_key(40.7128, -74.0060, 16).unwrap();
        assert_eq!(key.y, 24640);
        assert_eq!(key.x, 19295);
        assert_eq!(key.zoom, 16);
    }

    #[test]
    fn test_invalid_latitude() {
        let result = to_tile_key(90.0, 0.0, 10);
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_zoom() {
        assert_eq!(to_tile_key(0.0, 0.0, 20), Err(CoordError::InvalidZoom(20)));
    }

    #[test]
    fn test_fractional_projection_at_origin() {
        assert_eq!(lon_to_tile_x(0.0, 1), 1.0);
        assert!((lat_to_tile_y(0.0, 1) - 1.0).abs() < 1e-12);
        assert_eq!(lon_to_tile_x(-180.0, 3), 0.0);
    }

    #[test]
    fn test_inverse_is_exact_for_fractional_values() {
        let zoom = 12;
        let x = lon_to_tile_x(2.3522, zoom);
        let y = lat_to_tile_y(48.8566, zoom);
        assert!((tile_x_to_lon(x, zoom) - 2.3522).abs() < 1e-9);
        assert!((tile_y_to_lat(y, zoom) - 48.8566).abs() < 1e-9);
    }

    #[test]
    fn test_tile_to_lat_lon_at_equator() {
        let (lat, lon) = tile_to_lat_lon(&TileKey::new(10, 512, 512));
        assert!(lat.abs() < 1e-9, "Should be on the equator");
        assert!(lon.abs() < 1e-9, "Should be on the prime meridian");
    }

    #[test]
    fn test_east_edge_clamps_into_grid() {
        let bounds = tile_bounds_for_zoom(&BoundingBox::world(), 3);
        assert_eq!(bounds.min_x, 0);
        assert_eq!(bounds.max_x, 7);
        assert_eq!(bounds.min_y, 0);
        assert_eq!(bounds.max_y, 7);
    }

    #[test]
    fn test_paris_grid_per_zoom() {
        let z10 = tile_bounds_for_zoom(&PARIS, 10);
        assert_eq!((z10.min_x, z10.max_x, z10.min_y, z10.max_y), (518, 518, 352, 352));

        let z11 = tile_bounds_for_zoom(&PARIS, 11);
        assert_eq!((z11.min_x, z11.max_x, z11.min_y, z11.max_y), (1036, 1037, 704, 705));

        let z12 = tile_bounds_for_zoom(&PARIS, 12);
        assert_eq!((z12.min_x, z12.max_x, z12.min_y, z12.max_y), (2073, 2075, 1408, 1410));

        assert_eq!(count_tiles(&PARIS, 10, 12), 1 + 4 + 9);
    }

    #[test]
    fn test_count_tiles_inverted_range_is_zero() {
        assert_eq!(count_tiles(&PARIS, 12, 10), 0);
    }

    #[test]
    fn test_world_counts() {
        // 1 + 4 + 16 + 64
        assert_eq!(count_tiles(&BoundingBox::world(), 0, 3), 85);
    }

    #[test]
    fn test_count_matches_enumeration() {
        let boxes = [
            // Inside a single zoom-16 tile
            BoundingBox::new(40.7129, 40.7127, -74.0059, -74.0061),
            PARIS,
            // Greater London
            BoundingBox::new(51.7, 51.28, 0.34, -0.51),
            // Iberian peninsula
            BoundingBox::new(43.8, 36.0, 3.3, -9.5),
            // Europe through Asia
            BoundingBox::new(70.0, -10.0, 150.0, -25.0),
        ];
        let ranges = [(0u8, 3u8), (10, 12), (14, 16)];

        for bounds in &boxes {
            for &(min_zoom, max_zoom) in &ranges {
                let region = RegionSpec::new("test", *bounds, min_zoom, max_zoom);
                let expected = count_tiles(bounds, min_zoom, max_zoom);
                // Skip enumerating continent-sized boxes at deep zoom;
                // the count still must match the per-zoom rectangles.
                if expected > 2_000_000 {
                    let rect_total: u64 = region.tile_bounds().iter().map(|b| b.count()).sum();
                    assert_eq!(rect_total, expected);
                    continue;
                }
                let distinct: HashSet<TileKey> = region.tiles().collect();
                assert_eq!(
                    distinct.len() as u64,
                    expected,
                    "{bounds} zoom {min_zoom}-{max_zoom}"
                );
            }
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip_within_one_tile(
            lat in -85.0f64..85.0,
            lon in -180.0f64..180.0,
            zoom in 0u8..=18,
        ) {
            let key = to_tile_key(lat, lon, zoom).unwrap();
            let (nw_lat, nw_lon) = tile_to_lat_lon(&key);
            let (se_lat, se_lon) = (
                tile_y_to_lat(key.y as f64 + 1.0, zoom),
                tile_x_to_lon(key.x as f64 + 1.0, zoom),
            );
            let tile_height = nw_lat - se_lat;
            let tile_width = se_lon - nw_lon;

            prop_assert!(lon >= nw_lon - 1e-9 && (lon - nw_lon) <= tile_width + 1e-9);
            prop_assert!(lat <= nw_lat + 1e-9 && (nw_lat - lat) <= tile_height + 1e-9);
        }
    }
}
