//! Locating the generated image in a provider completion and turning it into
//! something a client can display.

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, info};

use crate::{datauri, openrouter::ChatCompletion};

/// Fallback media type when raw base64 cannot be sniffed.
pub const DEFAULT_MEDIA_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Already a `data:image/...` URI, usable as-is.
    Inline(String),
    /// Has to be fetched before it can be returned.
    Remote(String),
}

impl ImageReference {
    fn classify(url: &str) -> Option<Self> {
        let url = url.trim();
        if datauri::is_image(url) {
            Some(Self::Inline(url.to_string()))
        } else if url.starts_with("http://") || url.starts_with("https://") {
            Some(Self::Remote(url.to_string()))
        } else {
            None
        }
    }
}

/// The first usable `image_url` entry of the first choice carrying images.
pub fn first_image_reference(completion: &ChatCompletion) -> Option<ImageReference> {
    let Some((index, entries)) = completion
        .choices
        .iter()
        .enumerate()
        .find_map(|(index, choice)| choice.images().map(|entries| (index, entries)))
    else {
        info!("⚠️ No choice carries an images collection");
        return None;
    };

    let reference = entries
        .iter()
        .filter(|entry| entry.kind.as_deref() == Some("image_url"))
        .filter_map(|entry| entry.image_url.as_ref()?.url.as_deref())
        .find_map(ImageReference::classify);

    match &reference {
        Some(ImageReference::Inline(uri)) => {
            info!("🎯 Choice {} carries an inline image ({} chars)", index, uri.len())
        }
        Some(ImageReference::Remote(url)) => info!("🎯 Choice {} links image at {}", index, url),
        None => info!("⚠️ Choice {} has {} image entries, none usable", index, entries.len()),
    }
    reference
}

pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Canonical data URI for display. Values that already carry an image data
/// prefix are returned untouched, so the prefix is never doubled.
pub fn display_uri(payload: &str) -> String {
    let payload = payload.trim();
    if datauri::is_image(payload) {
        return payload.to_string();
    }
    let mime = sniff_media_type(payload).unwrap_or(DEFAULT_MEDIA_TYPE);
    debug!("Prefixing raw payload as {}", mime);
    format!("data:{};base64,{}", mime, payload)
}

fn sniff_media_type(payload: &str) -> Option<&'static str> {
    let bytes = STANDARD.decode(payload.as_bytes()).ok()?;
    image::guess_format(&bytes).ok().map(|format| format.to_mime_type())
}
