//! PNG and data URL encoding.

use base64::{Engine as _, engine::general_purpose};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::error::{Result, SketchError};
use crate::types::PixelBuffer;

/// Encode an RGBA buffer as PNG.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let (width, height) = buffer.dimensions();
    let img = RgbaImage::from_raw(width, height, buffer.as_bytes().to_vec()).ok_or_else(|| {
        SketchError::InvalidInput(format!("pixel buffer does not match {width}x{height}"))
    })?;

    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| SketchError::Export {
            filename: format!("{width}x{height} png"),
            reason: e.to_string(),
        })?;

    Ok(bytes)
}

pub fn png_data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png)
    )
}
