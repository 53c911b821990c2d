//! Full-bleed frame compositing for generated images.

use std::{io::Cursor, path::Path, time::Duration};

use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use tracing::info;

use crate::{
    datauri,
    error::{Result, StudioError},
};

/// Reads and decodes the overlay asset, giving up after `timeout`.
pub async fn load_overlay(path: &Path, timeout: Duration) -> Result<DynamicImage> {
    let name = path.display().to_string();
    let bytes = tokio::time::timeout(timeout, tokio::fs::read(path))
        .await
        .map_err(|_| StudioError::asset(&name, format!("timed out after {timeout:?}")))?
        .map_err(|e| StudioError::asset(&name, e))?;

    let overlay = image::load_from_memory(&bytes).map_err(|e| StudioError::asset(&name, e))?;
    info!("🖼️ Loaded overlay {} ({}x{})", name, overlay.width(), overlay.height());
    Ok(overlay)
}

/// Draws `generated`, then `overlay` stretched over the whole canvas. The
/// canvas always takes the generated image's dimensions.
pub fn apply_overlay(generated: &DynamicImage, overlay: &DynamicImage) -> RgbaImage {
    let (width, height) = generated.dimensions();
    let mut canvas = generated.to_rgba8();
    let frame = overlay.resize_exact(width, height, FilterType::Triangle).to_rgba8();
    imageops::overlay(&mut canvas, &frame, 0, 0);
    canvas
}

/// Decodes the raster behind a displayable data URI.
pub fn decode_display_uri(display_uri: &str) -> std::result::Result<DynamicImage, String> {
    let (_, bytes) = datauri::decode(display_uri).map_err(|e| e.to_string())?;
    image::load_from_memory(&bytes).map_err(|e| e.to_string())
}

/// Frames a displayable image and returns the result as a PNG data URI.
pub fn frame_image(display_uri: &str, overlay: &DynamicImage) -> Result<String> {
    let generated =
        decode_display_uri(display_uri).map_err(|e| StudioError::asset("generated image", e))?;
    frame_decoded(&generated, overlay)
}

pub fn frame_decoded(generated: &DynamicImage, overlay: &DynamicImage) -> Result<String> {
    let framed = apply_overlay(generated, overlay);
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(framed)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| StudioError::Internal(format!("png encoding failed: {e}")))?;
    Ok(datauri::encode("image/png", buf.get_ref()))
}
