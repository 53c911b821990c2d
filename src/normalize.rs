//! Client-side image normalization.
//!
//! A user-selected photo goes through five stages before it is embedded in a
//! prompt:
//! 1. decode the raw bytes into a raster
//! 2. measure its dimensions
//! 3. compute a uniform scale bounded by the maximum edge (never upscaling)
//! 4. draw the raster at the scaled size
//! 5. re-encode it as a JPEG data URI
//!
//! A failure at any stage short-circuits into a [`StudioError`].

use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    datauri,
    error::{Result, StudioError},
};

pub const MAX_EDGE: u32 = 1200;
pub const JPEG_QUALITY: u8 = 80;

/// A user-selected image as handed over by the image selector.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Bytes,
    pub media_type: String,
}

impl SourceImage {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    /// Builds a source from the data URI a browser file reader produces.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let (mime, bytes) = datauri::decode(uri)?;
        Ok(Self::new(bytes, mime))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedImage {
    #[serde(rename = "image")]
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledSize {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

/// `scale = min(1, max_edge / max(width, height))`, applied to both edges.
pub fn scaled_size(width: u32, height: u32, max_edge: u32) -> ScaledSize {
    let longest = width.max(height).max(1);
    let scale = (f64::from(max_edge) / f64::from(longest)).min(1.0);
    ScaledSize {
        width: scale_edge(width, scale),
        height: scale_edge(height, scale),
        scale,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_edge(edge: u32, scale: f64) -> u32 {
    ((f64::from(edge) * scale).round() as u32).max(1)
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    pub max_edge: u32,
    pub quality: u8,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            max_edge: MAX_EDGE,
            quality: JPEG_QUALITY,
        }
    }
}

impl Normalizer {
    /// Runs all stages on the blocking pool and resolves with a fully encoded image.
    pub async fn normalize(&self, source: SourceImage) -> Result<NormalizedImage> {
        let normalizer = *self;
        tokio::task::spawn_blocking(move || normalizer.normalize_blocking(&source))
            .await
            .map_err(|e| StudioError::Internal(format!("normalization task failed: {e}")))?
    }

    pub fn normalize_blocking(&self, source: &SourceImage) -> Result<NormalizedImage> {
        if !source.media_type.starts_with("image/") {
            return Err(StudioError::UnsupportedMediaType(source.media_type.clone()));
        }

        let decoded = decode(&source.bytes)?;
        let (width, height) = decoded.dimensions();
        let size = scaled_size(width, height, self.max_edge);
        debug!(width, height, scale = size.scale, "measured source image");

        let drawn = draw(decoded, size);
        let normalized = encode_jpeg(&drawn, self.quality)?;
        info!(
            "🖼️ Normalized {}x{} -> {}x{} ({} chars)",
            width,
            height,
            normalized.width,
            normalized.height,
            normalized.data_uri.len()
        );
        Ok(normalized)
    }
}

pub async fn normalize_image(source: SourceImage) -> Result<NormalizedImage> {
    Normalizer::default().normalize(source).await
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| StudioError::UnsupportedMediaType(format!("cannot decode image: {e}")))
}

fn draw(image: DynamicImage, size: ScaledSize) -> DynamicImage {
    if size.scale >= 1.0 {
        return image;
    }
    image.resize_exact(size.width, size.height, FilterType::Triangle)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<NormalizedImage> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .map_err(|e| StudioError::Internal(format!("jpeg encoding failed: {e}")))?;

    Ok(NormalizedImage {
        data_uri: datauri::encode("image/jpeg", &buf),
        width: rgb.width(),
        height: rgb.height(),
    })
}
