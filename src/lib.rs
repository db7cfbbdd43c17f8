//! # sketch-export
//!
//! Turns a scanned or photographed sketch into transparent line art and
//! exports it at fixed widths, as PNG or as SVG wrapping the PNG.
//!
//! ## Pipeline
//!
//! - **Threshold**: pixels brighter than the cutoff become transparent, the rest solid black
//! - **Resize**: aspect preserving, alpha aware resampling to the export width
//! - **Wrap**: PNG embedded in a minimal SVG of the same size
//! - **Export**: named artifacts delivered one at a time through an [`ArtifactSink`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use sketch_export::{DirectorySink, ExportFormat, Exporter, SourceImage, Threshold, pipeline};
//!
//! let bytes = std::fs::read("sketch.jpg").unwrap();
//! let source = SourceImage::from_upload(bytes, Some("image/jpeg")).unwrap();
//! let processed = pipeline::threshold(&source, Threshold::new(128)).unwrap();
//!
//! let mut exporter = Exporter::default();
//! let mut sink = DirectorySink::new("out");
//! let report = exporter
//!     .export_batch(Some(&processed), ExportFormat::Vector, &mut sink)
//!     .await;
//! ```

pub mod codec;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod session;
pub mod svg;
pub mod types;

// Re-export commonly used items
pub use error::{Result, SketchError};
pub use export::{
    ArtifactSink, BatchReport, DirectorySink, ExportArtifact, ExportOptions, Exporter, Payload,
    ResourceStore,
};
pub use session::{PendingRun, Session, Ticket};
pub use svg::{VectorDocument, wrap};
pub use types::{
    DEFAULT_SIZES, ExportFormat, ExportSpec, PixelBuffer, ProcessedImage, SourceImage, Threshold,
};
