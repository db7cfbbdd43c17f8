//! Raster processing pipeline
//!
//! Turns an uploaded sketch into line art and rescales it for export:
//! 1. Decode the upload at its native size
//! 2. Binarize against the brightness threshold (transparent background, black lines)
//! 3. Resize to the requested width, keeping the aspect ratio

mod mask;
mod scale;

use image::{GenericImageView, ImageReader};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{Result, SketchError};
use crate::types::{PixelBuffer, ProcessedImage, SourceImage, Threshold};

pub use mask::binarize;
pub use scale::{resize, scaled_height};

/// Decode the upload into RGBA at its native dimensions.
pub fn decode(source: &SourceImage) -> Result<PixelBuffer> {
    let img = ImageReader::new(Cursor::new(source.bytes()))
        .with_guessed_format()
        .map_err(|e| SketchError::Decode(format!("failed to guess image format: {e}")))?
        .decode()
        .map_err(|e| SketchError::Decode(e.to_string()))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(SketchError::Decode(format!(
            "image has no pixels ({width}x{height})"
        )));
    }

    log::debug!("decoded {} upload: {width}x{height}", source.media_type());

    PixelBuffer::new(width, height, img.to_rgba8().into_raw())
}

/// Decode and binarize in one go.
pub fn threshold(source: &SourceImage, threshold: Threshold) -> Result<ProcessedImage> {
    let processed = binarize(decode(source)?, threshold);

    log::info!(
        "processed {}x{} sketch at threshold {threshold}: {} line pixels",
        processed.width(),
        processed.height(),
        processed.opaque_count()
    );

    Ok(processed)
}

/// [`threshold`] on the blocking pool, so the caller's executor stays free while decoding.
pub async fn threshold_async(source: Arc<SourceImage>, t: Threshold) -> Result<ProcessedImage> {
    tokio::task::spawn_blocking(move || threshold(&source, t))
        .await
        .map_err(|e| SketchError::Decode(format!("decode task failed: {e}")))?
}
