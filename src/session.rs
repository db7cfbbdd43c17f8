//! Caller held state between pipeline runs.
//!
//! The pipeline itself is stateless. A front end keeps one [`Session`], asks
//! it for a [`PendingRun`] whenever the upload or threshold changes, runs it,
//! and hands the result back through [`Session::apply`]. Only the most recent
//! run may publish; anything older is dropped.

use std::sync::Arc;

use crate::error::Result;
use crate::pipeline;
use crate::types::{DEFAULT_SIZE, ExportFormat, ExportSpec, ProcessedImage, SourceImage, Threshold};

/// Identifies one submission. Later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// A threshold pass waiting to be run.
#[derive(Debug, Clone)]
pub struct PendingRun {
    pub ticket: Ticket,
    pub source: Arc<SourceImage>,
    pub threshold: Threshold,
}

impl PendingRun {
    pub async fn run(&self) -> Result<ProcessedImage> {
        pipeline::threshold_async(Arc::clone(&self.source), self.threshold).await
    }
}

/// Current upload, selection and displayed result.
#[derive(Debug)]
pub struct Session {
    source: Option<Arc<SourceImage>>,
    processed: Option<Arc<ProcessedImage>>,
    threshold: Threshold,
    size: u32,
    format: ExportFormat,
    generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            source: None,
            processed: None,
            threshold: Threshold::default(),
            size: DEFAULT_SIZE,
            format: ExportFormat::default(),
            generation: 0,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ticket(&mut self) -> Ticket {
        self.generation += 1;
        Ticket(self.generation)
    }

    /// Replace the upload and schedule a pass at the current threshold.
    ///
    /// The previous processed image stays visible until the new one is applied.
    pub fn upload(&mut self, source: SourceImage) -> PendingRun {
        let source = Arc::new(source);
        self.source = Some(Arc::clone(&source));
        PendingRun {
            ticket: self.next_ticket(),
            source,
            threshold: self.threshold,
        }
    }

    /// Change the threshold. Returns a pass to run if there is an upload.
    pub fn set_threshold(&mut self, threshold: Threshold) -> Option<PendingRun> {
        self.threshold = threshold;
        let source = self.source.clone()?;
        Some(PendingRun {
            ticket: self.next_ticket(),
            source,
            threshold,
        })
    }

    /// Publish the outcome of a run.
    ///
    /// `Ok(true)` when it became the displayed image, `Ok(false)` when a newer
    /// run superseded it. Errors of the current run are returned; errors of
    /// superseded runs are dropped along with them.
    pub fn apply(&mut self, ticket: Ticket, outcome: Result<ProcessedImage>) -> Result<bool> {
        if ticket.0 != self.generation {
            log::debug!(
                "discarding result of superseded run {} (latest is {})",
                ticket.0,
                self.generation
            );
            return Ok(false);
        }

        self.processed = Some(Arc::new(outcome?));
        Ok(true)
    }

    pub fn select_size(&mut self, size: u32) {
        self.size = size;
    }

    pub fn select_format(&mut self, format: ExportFormat) {
        self.format = format;
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn selected_size(&self) -> u32 {
        self.size
    }

    pub fn selected_format(&self) -> ExportFormat {
        self.format
    }

    /// Spec for a single export of the current selection.
    pub fn export_spec(&self) -> ExportSpec {
        ExportSpec::new(self.size, self.format)
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_deref()
    }

    pub fn processed(&self) -> Option<&ProcessedImage> {
        self.processed.as_deref()
    }
}
