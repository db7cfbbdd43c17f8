use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SketchError};

/// Width catalog used by batch export.
pub const DEFAULT_SIZES: [u32; 3] = [300, 600, 1200];

/// Width preselected for single export.
pub const DEFAULT_SIZE: u32 = 600;

/// Encoded upload plus the media type it was accepted under.
///
/// Pixel dimensions come from the image header, see [`SourceImage::dimensions`].
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    media_type: String,
}

impl SourceImage {
    /// Accept user supplied bytes.
    ///
    /// A declared media type must be `image/*`. Without one the bytes are
    /// sniffed and must look like a known image format. Nothing is decoded here.
    pub fn from_upload(bytes: Vec<u8>, media_type: Option<&str>) -> Result<Self> {
        let media_type = match media_type {
            Some(declared) => {
                let declared = declared.trim().to_ascii_lowercase();
                if !declared.starts_with("image/") {
                    return Err(SketchError::InvalidInput(format!(
                        "expected an image upload, got {declared}"
                    )));
                }
                declared
            }
            None => image::guess_format(&bytes)
                .map(|format| format.to_mime_type().to_string())
                .map_err(|e| {
                    SketchError::InvalidInput(format!("upload is not a recognised image: {e}"))
                })?,
        };

        if bytes.is_empty() {
            return Err(SketchError::InvalidInput("upload is empty".into()));
        }

        Ok(Self { bytes, media_type })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Native `(width, height)` read from the image header, without decoding pixels.
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        image::ImageReader::new(std::io::Cursor::new(&self.bytes))
            .with_guessed_format()
            .map_err(|e| SketchError::Decode(format!("failed to guess image format: {e}")))?
            .into_dimensions()
            .map_err(|e| SketchError::Decode(e.to_string()))
    }
}

/// Flat RGBA8 samples, `width * height * 4` long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| {
                SketchError::InvalidInput(format!("{width}x{height} overflows a pixel buffer"))
            })?;

        if data.len() != expected {
            return Err(SketchError::InvalidInput(format!(
                "pixel buffer holds {} bytes, {width}x{height} RGBA needs {expected}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(4)
    }
}

/// Brightness cutoff in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Threshold(u8);

impl Threshold {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(128)
    }
}

impl From<u8> for Threshold {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl TryFrom<i64> for Threshold {
    type Error = SketchError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value).map(Threshold).map_err(|_| {
            SketchError::InvalidInput(format!("threshold {value} is outside 0..=255"))
        })
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Binarized line art: every pixel is either transparent or opaque black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    buffer: PixelBuffer,
    threshold: Threshold,
}

impl ProcessedImage {
    pub(crate) fn new(buffer: PixelBuffer, threshold: Threshold) -> Self {
        Self { buffer, threshold }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Threshold this image was produced with.
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn transparent_count(&self) -> usize {
        self.buffer.pixels().filter(|px| px[3] == 0).count()
    }

    pub fn opaque_count(&self) -> usize {
        self.buffer.pixels().filter(|px| px[3] == 255).count()
    }

    /// Full size PNG, as shown in the preview pane.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        crate::codec::encode_png(&self.buffer)
    }

    /// `data:image/png;base64,...` URL of the preview.
    pub fn to_data_url(&self) -> Result<String> {
        Ok(crate::codec::png_data_url(&self.to_png()?))
    }
}

/// Output flavour of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    /// Plain PNG.
    #[default]
    Raster,
    /// PNG embedded in an SVG document.
    Vector,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Raster => "png",
            ExportFormat::Vector => "svg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Raster => "image/png",
            ExportFormat::Vector => "image/svg+xml",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Raster => "PNG",
            ExportFormat::Vector => "SVG",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "raster" => Ok(ExportFormat::Raster),
            "svg" | "vector" => Ok(ExportFormat::Vector),
            other => Err(SketchError::InvalidInput(format!(
                "unknown export format {other:?}, expected png or svg"
            ))),
        }
    }
}

/// One requested output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExportSpec {
    pub target_width: u32,
    pub format: ExportFormat,
}

impl ExportSpec {
    pub fn new(target_width: u32, format: ExportFormat) -> Self {
        Self {
            target_width,
            format,
        }
    }

    /// `<stem>-<width>px.<ext>`
    pub fn filename(&self, stem: &str) -> String {
        format!(
            "{stem}-{}px.{}",
            self.target_width,
            self.format.extension()
        )
    }
}
