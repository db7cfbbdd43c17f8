//! Aspect preserving resize with premultiplied alpha.

use fast_image_resize as fr;

use crate::error::{Result, SketchError};
use crate::types::PixelBuffer;

/// Height matching `target_width` for a `width x height` source.
///
/// Computed once with integer round-half-up, never less than one pixel.
/// Fails when the result does not fit in a `u32`.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> Result<u32> {
    let (w, h, t) = (width as u64, height as u64, target_width as u64);
    let rounded = (2 * t * h + w).checked_div(2 * w).ok_or_else(|| {
        SketchError::InvalidInput("source width must be positive".into())
    })?;
    u32::try_from(rounded)
        .map(|rows| rows.max(1))
        .map_err(|_| {
            SketchError::InvalidInput(format!(
                "{width}x{height} scaled to width {target_width} is {rounded} pixels tall"
            ))
        })
}

/// Resample `buffer` so it is `target_width` wide.
pub fn resize(
    buffer: &PixelBuffer,
    target_width: u32,
    filter: fr::FilterType,
) -> Result<PixelBuffer> {
    if target_width == 0 {
        return Err(SketchError::InvalidInput(
            "target width must be positive".into(),
        ));
    }

    let (width, height) = buffer.dimensions();
    if width == 0 || height == 0 {
        return Err(SketchError::InvalidInput(format!(
            "cannot resize an empty {width}x{height} image"
        )));
    }

    let target_height = scaled_height(width, height, target_width)?;

    let src_image =
        fr::images::Image::from_vec_u8(width, height, buffer.as_bytes().to_vec(), fr::PixelType::U8x4)
            .map_err(|e| SketchError::InvalidInput(format!("bad source buffer: {e}")))?;
    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    // U8x4 is treated as RGBA; premultiplication keeps transparent black out of the blend.
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(filter))
        .use_alpha(true);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| SketchError::Export {
            filename: format!("{target_width}x{target_height} raster"),
            reason: e.to_string(),
        })?;

    log::debug!("resized {width}x{height} -> {target_width}x{target_height} ({filter:?})");

    PixelBuffer::new(target_width, target_height, dst_image.into_vec())
}
