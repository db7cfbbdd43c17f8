//! Error type shared by the whole pipeline.

/// Everything that can go wrong between receiving bytes and delivering an artifact.
#[derive(Debug, thiserror::Error)]
pub enum SketchError {
    /// Rejected before any processing started.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The bytes could not be decoded into a raster.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Resizing, encoding or wrapping failed for one artifact.
    #[error("failed to export {filename}: {reason}")]
    Export { filename: String, reason: String },

    /// The sink could not take the artifact.
    #[error("failed to deliver {filename}: {reason}")]
    Delivery { filename: String, reason: String },

    /// A transient reference was looked up after it had been released.
    #[error("resource {0} is no longer available")]
    ResourceMissing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SketchError {
    /// Attach an artifact name to an error raised while producing it.
    pub(crate) fn for_artifact(self, filename: &str) -> SketchError {
        match self {
            err @ SketchError::Delivery { .. } => err,
            SketchError::Export { reason, .. } => SketchError::Export {
                filename: filename.to_string(),
                reason,
            },
            other => SketchError::Export {
                filename: filename.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SketchError>;
