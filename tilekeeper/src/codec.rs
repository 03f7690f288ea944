//! Tile codec: raw image bytes ⇄ stored base64 ⇄ displayable data URI.
//!
//! Tiles are persisted as standard padded base64 so any string-oriented
//! store can hold them, and handed to renderers as
//! `data:<mime>;base64,<payload>` references. Encoding is lossless;
//! [`decode`] inverts [`encode`] exactly.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::ImageFormat;
use thiserror::Error;

/// Base64 characters needed to sniff an image signature (18 raw bytes).
const SNIFF_PREFIX_LEN: usize = 24;

/// Errors from encoding or decoding tile payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload was empty.
    #[error("Empty tile payload")]
    Empty,

    /// The bytes do not start with a recognised image signature.
    #[error("Unrecognised image data")]
    UnrecognisedImage,

    /// The stored form is not valid base64.
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Detect the image format of raw tile bytes.
pub fn detect_format(raw: &[u8]) -> Result<ImageFormat, CodecError> {
    if raw.is_empty() {
        return Err(CodecError::Empty);
    }
    image::guess_format(raw).map_err(|_| CodecError::UnrecognisedImage)
}

/// Encode raw image bytes into their stored form.
pub fn encode(raw: &[u8]) -> Result<String, CodecError> {
    detect_format(raw)?;
    Ok(STANDARD.encode(raw))
}

/// Decode a stored payload back into raw image bytes.
pub fn decode(stored: &str) -> Result<Vec<u8>, CodecError> {
    let raw = STANDARD.decode(stored)?;
    detect_format(&raw)?;
    Ok(raw)
}

/// Build a data URI from a stored payload without re-encoding it.
///
/// Only the leading bytes are decoded to determine the MIME type.
pub fn to_data_uri(stored: &str) -> Result<String, CodecError> {
    if stored.is_empty() {
        return Err(CodecError::Empty);
    }
    let prefix_len = stored.len().min(SNIFF_PREFIX_LEN);
    let head = STANDARD.decode(&stored.as_bytes()[..prefix_len])?;
    let format = detect_format(&head)?;
    Ok(format!("data:{};base64,{}", format.to_mime_type(), stored))
}

/// Build a data URI straight from raw image bytes.
pub fn data_uri_from_bytes(raw: &[u8]) -> Result<String, CodecError> {
    let format = detect_format(raw)?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(raw)
    ))
}
