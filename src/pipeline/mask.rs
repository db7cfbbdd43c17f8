//! Background removal by brightness threshold
//!
//! Every pixel brighter than the cutoff becomes fully transparent, every
//! other pixel becomes opaque black. No neighbourhood is consulted, so the
//! pass is split across threads for large images.

use rayon::prelude::*;

use crate::types::{PixelBuffer, ProcessedImage, Threshold};

/// Below this many pixels the sequential loop wins.
const PARALLEL_PIXEL_THRESHOLD: usize = 32 * 1024;

/// Binarize one RGBA pixel in place.
///
/// `(r + g + b) / 3 > t` is evaluated as `r + g + b > 3t` so no rounding is involved.
#[inline]
fn classify_pixel(px: &mut [u8], cutoff: u16) {
    let sum = px[0] as u16 + px[1] as u16 + px[2] as u16;
    if sum > cutoff {
        px[3] = 0;
    } else {
        px[0] = 0;
        px[1] = 0;
        px[2] = 0;
        px[3] = 255;
    }
}

/// Turn a decoded buffer into line art.
pub fn binarize(mut buffer: PixelBuffer, threshold: Threshold) -> ProcessedImage {
    let cutoff = threshold.value() as u16 * 3;
    let pixel_count = buffer.width() as usize * buffer.height() as usize;
    let data = buffer.as_bytes_mut();

    if pixel_count >= PARALLEL_PIXEL_THRESHOLD {
        data.par_chunks_exact_mut(4)
            .for_each(|px| classify_pixel(px, cutoff));
    } else {
        data.chunks_exact_mut(4)
            .for_each(|px| classify_pixel(px, cutoff));
    }

    ProcessedImage::new(buffer, threshold)
}
