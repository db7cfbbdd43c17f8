//! Export of processed line art
//!
//! Every artifact goes through the same steps:
//! 1. Resize the processed image to the requested width
//! 2. Encode it as PNG, and for vector output wrap the PNG in an SVG document
//! 3. Name it `<stem>-<width>px.<ext>`
//! 4. Deliver it through the rate limited queue
//!
//! Vector documents are handed to the sink as transient references that are
//! released after `release_delay`, whether or not the delivery worked.
//! Batch export skips a failing size and carries on with the next one.

mod delivery;
mod resources;

use std::borrow::Cow;
use std::time::Duration;

use fast_image_resize::FilterType;

use crate::codec::encode_png;
use crate::error::{Result, SketchError};
use crate::pipeline::resize;
use crate::svg::wrap_png;
use crate::types::{DEFAULT_SIZES, ExportFormat, ExportSpec, ProcessedImage};

pub use delivery::{ArtifactSink, DeliveryQueue, DirectorySink};
pub use resources::ResourceStore;

/// Tunables for export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Widths produced by a batch export (default: 300, 600, 1200)
    pub sizes: Vec<u32>,
    /// Minimum gap between two deliveries (default: 100ms)
    pub delivery_interval: Duration,
    /// How long a transient reference outlives its delivery (default: 100ms)
    pub release_delay: Duration,
    /// Resampling filter
    pub resize_filter: FilterType,
    /// Filename prefix
    pub file_stem: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sizes: DEFAULT_SIZES.to_vec(),
            delivery_interval: Duration::from_millis(100),
            release_delay: Duration::from_millis(100),
            resize_filter: FilterType::Bilinear,
            file_stem: "sketch".to_string(),
        }
    }
}

/// Artifact body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Encoded bytes carried by the artifact itself.
    Inline(Vec<u8>),
    /// Key into a [`ResourceStore`].
    Reference(String),
}

/// A named, ready to deliver export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub mime_type: &'static str,
    pub payload: Payload,
}

impl ExportArtifact {
    /// The artifact's bytes, looked up in `resources` for references.
    pub fn resolve(&self, resources: &ResourceStore) -> Result<Cow<'_, [u8]>> {
        match &self.payload {
            Payload::Inline(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Payload::Reference(key) => Ok(Cow::Owned(resources.get(key)?.to_vec())),
        }
    }

    fn transient_key(&self) -> Option<&str> {
        match &self.payload {
            Payload::Reference(key) => Some(key),
            Payload::Inline(_) => None,
        }
    }
}

/// Outcome of a multi artifact export.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Filenames in delivery order.
    pub delivered: Vec<String>,
    /// Widths that failed, with the reason.
    pub failed: Vec<(u32, SketchError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Turns processed images into delivered artifacts.
#[derive(Debug)]
pub struct Exporter {
    options: ExportOptions,
    resources: ResourceStore,
    queue: DeliveryQueue,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        let queue = DeliveryQueue::new(options.delivery_interval);
        Self {
            options,
            resources: ResourceStore::new(),
            queue,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Build the artifact for one spec without delivering it.
    ///
    /// Vector artifacts are registered in the resource store; the caller owns their release.
    pub fn prepare(&self, processed: &ProcessedImage, spec: ExportSpec) -> Result<ExportArtifact> {
        let filename = spec.filename(&self.options.file_stem);

        let build = || -> Result<ExportArtifact> {
            let resized = resize(
                processed.buffer(),
                spec.target_width,
                self.options.resize_filter,
            )?;
            let png = encode_png(&resized)?;

            let payload = match spec.format {
                ExportFormat::Raster => Payload::Inline(png),
                ExportFormat::Vector => {
                    let doc = wrap_png(&png, resized.width(), resized.height())?;
                    Payload::Reference(self.resources.create(doc.into_bytes()))
                }
            };

            Ok(ExportArtifact {
                filename: filename.clone(),
                mime_type: spec.format.mime_type(),
                payload,
            })
        };

        build().map_err(|e| e.for_artifact(&filename))
    }

    /// Export one spec. Without a processed image this does nothing.
    ///
    /// Returns the delivered filename.
    pub async fn export_single<S: ArtifactSink + ?Sized>(
        &mut self,
        processed: Option<&ProcessedImage>,
        spec: ExportSpec,
        sink: &mut S,
    ) -> Result<Option<String>> {
        let Some(processed) = processed else {
            log::debug!("nothing to export yet");
            return Ok(None);
        };

        let artifact = self.prepare(processed, spec)?;
        self.deliver(&artifact, sink).await?;
        Ok(Some(artifact.filename))
    }

    /// Export every catalog size in `format`, in catalog order.
    pub async fn export_batch<S: ArtifactSink + ?Sized>(
        &mut self,
        processed: Option<&ProcessedImage>,
        format: ExportFormat,
        sink: &mut S,
    ) -> BatchReport {
        let specs: Vec<ExportSpec> = self
            .options
            .sizes
            .iter()
            .map(|&width| ExportSpec::new(width, format))
            .collect();
        self.export_all(processed, &specs, sink).await
    }

    /// Export `specs` in order, skipping over failures.
    pub async fn export_all<S: ArtifactSink + ?Sized>(
        &mut self,
        processed: Option<&ProcessedImage>,
        specs: &[ExportSpec],
        sink: &mut S,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let Some(processed) = processed else {
            log::debug!("nothing to export yet");
            return report;
        };

        for &spec in specs {
            let outcome = match self.prepare(processed, spec) {
                Ok(artifact) => self
                    .deliver(&artifact, sink)
                    .await
                    .map(|()| artifact.filename),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(filename) => report.delivered.push(filename),
                Err(err) => {
                    log::warn!(
                        "skipping {}px {} export: {err}",
                        spec.target_width,
                        spec.format
                    );
                    report.failed.push((spec.target_width, err));
                }
            }
        }

        log::info!(
            "batch export finished: {} delivered, {} failed",
            report.delivered.len(),
            report.failed.len()
        );
        report
    }

    /// Deliver through the queue, then schedule the release of any transient reference.
    async fn deliver<S: ArtifactSink + ?Sized>(
        &mut self,
        artifact: &ExportArtifact,
        sink: &mut S,
    ) -> Result<()> {
        let result = self.queue.deliver(sink, artifact, &self.resources).await;

        if let Some(key) = artifact.transient_key() {
            self.resources
                .release_after(key.to_string(), self.options.release_delay);
        }

        result.map_err(|e| e.for_artifact(&artifact.filename))
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(ExportOptions::default())
    }
}
