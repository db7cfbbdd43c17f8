//! Ordered, rate limited artifact delivery.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use super::ExportArtifact;
use super::resources::ResourceStore;
use crate::error::{Result, SketchError};

/// Where finished artifacts go: a download prompt, a directory, a test recorder.
pub trait ArtifactSink {
    fn deliver(&mut self, artifact: &ExportArtifact, resources: &ResourceStore) -> Result<()>;
}

/// Writes each artifact to `<dir>/<filename>`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn deliver(&mut self, artifact: &ExportArtifact, resources: &ResourceStore) -> Result<()> {
        let bytes = artifact.resolve(resources)?;
        let path = self.dir.join(&artifact.filename);
        fs::write(&path, &bytes).map_err(|e| SketchError::Delivery {
            filename: artifact.filename.clone(),
            reason: format!("cannot write {}: {e}", path.display()),
        })?;
        log::info!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Hands artifacts to a sink one at a time, at least `interval` apart.
#[derive(Debug)]
pub struct DeliveryQueue {
    interval: Duration,
    last_delivery: Option<Instant>,
}

impl DeliveryQueue {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_delivery: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait out the interval since the previous delivery, then deliver.
    pub async fn deliver<S: ArtifactSink + ?Sized>(
        &mut self,
        sink: &mut S,
        artifact: &ExportArtifact,
        resources: &ResourceStore,
    ) -> Result<()> {
        if let Some(last) = self.last_delivery {
            tokio::time::sleep_until(last + self.interval).await;
        }
        self.last_delivery = Some(Instant::now());

        log::debug!("delivering {}", artifact.filename);
        sink.deliver(artifact, resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Payload;

    struct Stamps(Vec<(String, Instant)>);

    impl ArtifactSink for Stamps {
        fn deliver(&mut self, artifact: &ExportArtifact, _: &ResourceStore) -> Result<()> {
            self.0.push((artifact.filename.clone(), Instant::now()));
            Ok(())
        }
    }

    fn artifact(name: &str) -> ExportArtifact {
        ExportArtifact {
            filename: name.to_string(),
            mime_type: "image/png",
            payload: Payload::Inline(vec![1]),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliveries_are_spaced() {
        let resources = ResourceStore::new();
        let mut queue = DeliveryQueue::new(Duration::from_millis(100));
        let mut sink = Stamps(Vec::new());

        for name in ["a", "b", "c"] {
            queue
                .deliver(&mut sink, &artifact(name), &resources)
                .await
                .unwrap();
        }

        let names: Vec<_> = sink.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        for pair in sink.0.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_delivery_is_immediate() {
        let resources = ResourceStore::new();
        let mut queue = DeliveryQueue::new(Duration::from_secs(5));
        let mut sink = Stamps(Vec::new());
        let start = Instant::now();

        queue
            .deliver(&mut sink, &artifact("a"), &resources)
            .await
            .unwrap();
        assert_eq!(sink.0[0].1, start);
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        sink.deliver(&artifact("sketch-300px.png"), &ResourceStore::new())
            .unwrap();
        assert_eq!(
            fs::read(dir.path().join("sketch-300px.png")).unwrap(),
            vec![1]
        );
    }

    #[test]
    fn test_directory_sink_missing_dir_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut sink = DirectorySink::new(dir.path().join("nope"));
        let err = sink
            .deliver(&artifact("x.png"), &ResourceStore::new())
            .unwrap_err();
        assert!(matches!(err, SketchError::Delivery { .. }));
    }
}
