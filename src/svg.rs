//! SVG wrapping of a raster
//!
//! The document carries the raster as a base64 PNG `<image>` that covers the
//! whole viewBox, so renderers reproduce the pixels at the declared size.

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::codec::{encode_png, png_data_url};
use crate::error::{Result, SketchError};
use crate::types::PixelBuffer;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// A serialized SVG document and the pixel size it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorDocument {
    pub width: u32,
    pub height: u32,
    pub content: String,
}

impl VectorDocument {
    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.content.into_bytes()
    }
}

/// Wrap a raster into an SVG document of the same size.
pub fn wrap(raster: &PixelBuffer) -> Result<VectorDocument> {
    let png = encode_png(raster)?;
    wrap_png(&png, raster.width(), raster.height())
}

/// Wrap an already encoded PNG of `width x height` pixels.
pub fn wrap_png(png: &[u8], width: u32, height: u32) -> Result<VectorDocument> {
    let w = width.to_string();
    let h = height.to_string();
    let view_box = format!("0 0 {w} {h}");
    let href = png_data_url(png);

    let mut svg = BytesStart::new("svg");
    svg.push_attribute(("xmlns", SVG_NS));
    svg.push_attribute(("xmlns:xlink", XLINK_NS));
    svg.push_attribute(("width", w.as_str()));
    svg.push_attribute(("height", h.as_str()));
    svg.push_attribute(("viewBox", view_box.as_str()));

    let mut image = BytesStart::new("image");
    image.push_attribute(("x", "0"));
    image.push_attribute(("y", "0"));
    image.push_attribute(("width", w.as_str()));
    image.push_attribute(("height", h.as_str()));
    image.push_attribute(("href", href.as_str()));
    image.push_attribute(("xlink:href", href.as_str()));

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let events = [
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        Event::Start(svg),
        Event::Empty(image),
        Event::End(BytesEnd::new("svg")),
    ];
    for event in events {
        writer.write_event(event).map_err(|e| SketchError::Export {
            filename: format!("{w}x{h} svg"),
            reason: e.to_string(),
        })?;
    }

    let content = String::from_utf8(writer.into_inner()).map_err(|e| SketchError::Export {
        filename: format!("{w}x{h} svg"),
        reason: e.to_string(),
    })?;

    Ok(VectorDocument {
        width,
        height,
        content,
    })
}
