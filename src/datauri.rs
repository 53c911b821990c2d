//! Helpers for `data:<mime>;base64,<payload>` strings.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{Result, StudioError};

pub const IMAGE_DATA_PREFIX: &str = "data:image/";

pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

pub fn is_image(value: &str) -> bool {
    value.starts_with(IMAGE_DATA_PREFIX)
}

/// Splits a base64 data URI into its media type and payload.
pub fn split(value: &str) -> Option<(&str, &str)> {
    let (meta, payload) = value.strip_prefix("data:")?.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((mime.trim(), payload.trim()))
}

pub fn decode(value: &str) -> Result<(String, Vec<u8>)> {
    let (mime, payload) = split(value)
        .ok_or_else(|| StudioError::UnsupportedMediaType("not a base64 data URI".into()))?;
    let bytes = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| StudioError::UnsupportedMediaType(format!("invalid base64 payload: {e}")))?;
    Ok((mime.to_string(), bytes))
}
