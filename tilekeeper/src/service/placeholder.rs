//! Offline placeholder tile.
//!
//! When a tile is neither cached nor fetchable the renderer still gets an
//! image: a grey square crossed in red, clearly marking the area as
//! unavailable offline.
//!
//! # Static Placeholder
//!
//! The PNG is generated on first access and cached for the lifetime of the
//! process. If encoding fails a static SVG data URI is used instead, so a
//! placeholder is always available.

use std::io::Cursor;
use std::sync::OnceLock;

use image::{ImageError, ImageFormat, Rgba, RgbaImage};
use tracing::warn;

use crate::codec;

/// Edge length of a standard slippy-map tile.
pub const TILE_SIZE: u32 = 256;

const BACKGROUND: Rgba<u8> = Rgba([221, 221, 221, 255]);
const BORDER: Rgba<u8> = Rgba([170, 170, 170, 255]);
const CROSS: Rgba<u8> = Rgba([204, 32, 32, 255]);

/// Half-width of the cross strokes in pixels.
const CROSS_HALF_WIDTH: i64 = 3;

/// Used when the PNG cannot be encoded.
const FALLBACK_SVG_URI: &str = "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHdpZHRoPSIyNTYiIGhlaWdodD0iMjU2Ij48cmVjdCB3aWR0aD0iMjU2IiBoZWlnaHQ9IjI1NiIgZmlsbD0iI2RkZCIvPjxwYXRoIGQ9Ik0wIDBMMjU2IDI1Nk0yNTYgMEwwIDI1NiIgc3Ryb2tlPSIjYzIyIiBzdHJva2Utd2lkdGg9IjYiLz48L3N2Zz4=";

static PLACEHOLDER_URI: OnceLock<String> = OnceLock::new();

/// Render the placeholder image.
pub fn render_placeholder() -> RgbaImage {
    let last = i64::from(TILE_SIZE) - 1;
    RgbaImage::from_fn(TILE_SIZE, TILE_SIZE, |x, y| {
        let (x, y) = (i64::from(x), i64::from(y));
        if x == 0 || y == 0 || x == last || y == last {
            BORDER
        } else if (x - y).abs() <= CROSS_HALF_WIDTH || (x + y - last).abs() <= CROSS_HALF_WIDTH {
            CROSS
        } else {
            BACKGROUND
        }
    })
}

/// Encode the placeholder as PNG bytes.
pub fn placeholder_png() -> Result<Vec<u8>, ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    render_placeholder().write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Data URI of the placeholder, generated once.
pub fn placeholder_data_uri() -> &'static str {
    PLACEHOLDER_URI
        .get_or_init(|| {
            match placeholder_png()
                .map_err(|e| e.to_string())
                .and_then(|png| codec::data_uri_from_bytes(&png).map_err(|e| e.to_string()))
            {
                Ok(uri) => uri,
                Err(e) => {
                    warn!(error = %e, "Failed to encode placeholder tile, using SVG fallback");
                    FALLBACK_SVG_URI.to_string()
                }
            }
        })
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_a_png_tile() {
        let png = placeholder_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), TILE_SIZE);
        assert_eq!(decoded.height(), TILE_SIZE);
    }

    #[test]
    fn test_cross_and_background_pixels() {
        let img = render_placeholder();
        assert_eq!(*img.get_pixel(128, 128), CROSS);
        assert_eq!(*img.get_pixel(10, 245), CROSS);
        assert_eq!(*img.get_pixel(128, 20), BACKGROUND);
        assert_eq!(*img.get_pixel(0, 100), BORDER);
    }

    #[test]
    fn test_data_uri_is_cached() {
        let first = placeholder_data_uri();
        assert!(first.starts_with("data:image/png;base64,"));
        assert!(std::ptr::eq(first, placeholder_data_uri()));
    }
}
