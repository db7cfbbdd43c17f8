//! Integration tests for single and batch export
//!
//! A recording sink stands in for the download mechanism. Tests run with a
//! paused tokio clock so delivery spacing and delayed releases are exact.

use std::time::Duration;

use image::{Rgba, RgbaImage};
use quick_xml::Reader;
use quick_xml::events::Event;
use sketch_export::pipeline;
use sketch_export::{
    ArtifactSink, DirectorySink, ExportArtifact, ExportFormat, ExportOptions, ExportSpec,
    Exporter, Payload, ProcessedImage, ResourceStore, Session, SketchError, SourceImage,
    Threshold,
};
use tokio::time::Instant;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Keeps every delivered artifact with its resolved bytes and delivery time.
#[derive(Default)]
struct RecordingSink {
    delivered: Vec<(String, &'static str, Vec<u8>, Instant)>,
}

impl ArtifactSink for RecordingSink {
    fn deliver(
        &mut self,
        artifact: &ExportArtifact,
        resources: &ResourceStore,
    ) -> sketch_export::Result<()> {
        let bytes = artifact.resolve(resources)?.into_owned();
        self.delivered.push((
            artifact.filename.clone(),
            artifact.mime_type,
            bytes,
            Instant::now(),
        ));
        Ok(())
    }
}

impl RecordingSink {
    fn names(&self) -> Vec<&str> {
        self.delivered.iter().map(|(n, ..)| n.as_str()).collect()
    }
}

/// Refuses everything, like a blocked download.
struct FailingSink;

impl ArtifactSink for FailingSink {
    fn deliver(
        &mut self,
        artifact: &ExportArtifact,
        _: &ResourceStore,
    ) -> sketch_export::Result<()> {
        Err(SketchError::Delivery {
            filename: artifact.filename.clone(),
            reason: "blocked".into(),
        })
    }
}

fn upload(img: &RgbaImage) -> SourceImage {
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageFormat::Png,
    )
    .unwrap();
    SourceImage::from_upload(bytes, Some("image/png")).unwrap()
}

fn sketch(width: u32, height: u32) -> ProcessedImage {
    let mut img = RgbaImage::from_pixel(width, height, WHITE);
    for x in 0..width {
        img.put_pixel(x, height / 2, BLACK);
    }
    pipeline::threshold(&upload(&img), Threshold::new(128)).unwrap()
}

// Attributes of the first element called `name`
fn element_attributes(xml: &str, name: &[u8]) -> Vec<(String, String)> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == name => {
                return e
                    .attributes()
                    .map(|a| {
                        let a = a.unwrap();
                        (
                            String::from_utf8(a.key.as_ref().to_vec()).unwrap(),
                            String::from_utf8(a.value.to_vec()).unwrap(),
                        )
                    })
                    .collect();
            }
            Event::Eof => panic!("no <{}> element", String::from_utf8_lossy(name)),
            _ => {}
        }
    }
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> &'a str {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("missing attribute {key}"))
}

fn contains_image(group: &usvg::Group) -> bool {
    group.children().iter().any(|node| match node {
        usvg::Node::Image(_) => true,
        usvg::Node::Group(g) => contains_image(g),
        _ => false,
    })
}

// ============================================================================
// Batch Export Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_batch_raster_names_and_order() {
    let processed = sketch(200, 100);
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    let report = exporter
        .export_batch(Some(&processed), ExportFormat::Raster, &mut sink)
        .await;

    assert!(report.is_success());
    assert_eq!(
        sink.names(),
        ["sketch-300px.png", "sketch-600px.png", "sketch-1200px.png"]
    );
    assert_eq!(report.delivered, sink.names());

    for ((_, mime, bytes, _), width) in sink.delivered.iter().zip([300u32, 600, 1200]) {
        assert_eq!(*mime, "image/png");
        let decoded = image::load_from_memory(bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (width, width / 2));
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_deliveries_are_spaced_by_interval() {
    let processed = sketch(20, 20);
    let mut exporter = Exporter::new(ExportOptions {
        delivery_interval: Duration::from_millis(250),
        ..ExportOptions::default()
    });
    let mut sink = RecordingSink::default();

    exporter
        .export_batch(Some(&processed), ExportFormat::Raster, &mut sink)
        .await;

    for pair in sink.delivered.windows(2) {
        assert!(pair[1].3 - pair[0].3 >= Duration::from_millis(250));
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_ignores_selected_size() {
    let processed = sketch(30, 30);
    let mut session = Session::new();
    session.select_size(300);
    session.select_format(ExportFormat::Vector);

    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();
    exporter
        .export_batch(Some(&processed), session.selected_format(), &mut sink)
        .await;

    assert_eq!(
        sink.names(),
        ["sketch-300px.svg", "sketch-600px.svg", "sketch-1200px.svg"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_batch_without_processed_image_is_noop() {
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    let report = exporter
        .export_batch(None, ExportFormat::Vector, &mut sink)
        .await;

    assert!(report.is_success());
    assert!(report.delivered.is_empty());
    assert!(sink.delivered.is_empty());
    assert_eq!(exporter.resources().live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_batch_skips_failing_spec_and_continues() {
    let processed = sketch(40, 20);
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    let specs = [
        ExportSpec::new(300, ExportFormat::Raster),
        ExportSpec::new(0, ExportFormat::Vector),
        ExportSpec::new(600, ExportFormat::Vector),
    ];
    let report = exporter.export_all(Some(&processed), &specs, &mut sink).await;

    assert_eq!(sink.names(), ["sketch-300px.png", "sketch-600px.svg"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 0);
    assert!(matches!(
        &report.failed[0].1,
        SketchError::Export { filename, .. } if filename == "sketch-0px.svg"
    ));
}

// ============================================================================
// Single Export Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_single_without_processed_image_is_noop() {
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    let result = exporter
        .export_single(None, ExportSpec::new(600, ExportFormat::Raster), &mut sink)
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(sink.delivered.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_white_scenario_exports_transparent_300px() {
    let white = RgbaImage::from_pixel(800, 400, WHITE);
    let processed = pipeline::threshold(&upload(&white), Threshold::new(128)).unwrap();
    assert_eq!(processed.transparent_count(), 800 * 400);

    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();
    let name = exporter
        .export_single(
            Some(&processed),
            ExportSpec::new(300, ExportFormat::Raster),
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(name.as_deref(), Some("sketch-300px.png"));
    let png = image::load_from_memory(&sink.delivered[0].2).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), (300, 150));
    assert!(png.pixels().all(|p| p.0[3] == 0));
}

#[tokio::test(start_paused = true)]
async fn test_single_zero_width_is_error() {
    let processed = sketch(10, 10);
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    let err = exporter
        .export_single(
            Some(&processed),
            ExportSpec::new(0, ExportFormat::Raster),
            &mut sink,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SketchError::Export { .. }));
    assert!(sink.delivered.is_empty());
}

// ============================================================================
// Vector Document Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_vector_export_declares_resized_dimensions() {
    let processed = sketch(80, 60);
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    exporter
        .export_single(
            Some(&processed),
            ExportSpec::new(600, ExportFormat::Vector),
            &mut sink,
        )
        .await
        .unwrap();

    let (name, mime, bytes, _) = &sink.delivered[0];
    assert_eq!(name, "sketch-600px.svg");
    assert_eq!(*mime, "image/svg+xml");

    let xml = std::str::from_utf8(bytes).unwrap();
    assert!(xml.starts_with("<?xml"));

    let svg = element_attributes(xml, b"svg");
    assert_eq!(attr(&svg, "xmlns"), "http://www.w3.org/2000/svg");
    assert_eq!(attr(&svg, "width"), "600");
    assert_eq!(attr(&svg, "height"), "450");
    assert_eq!(attr(&svg, "viewBox"), "0 0 600 450");

    let image = element_attributes(xml, b"image");
    assert_eq!(attr(&image, "width"), "600");
    assert_eq!(attr(&image, "height"), "450");
    assert!(attr(&image, "href").starts_with("data:image/png;base64,"));

    let tree = usvg::Tree::from_str(xml, &usvg::Options::default()).unwrap();
    assert_eq!(tree.size().width(), 600.0);
    assert_eq!(tree.size().height(), 450.0);
    assert!(contains_image(tree.root()));
}

#[test]
fn test_wrap_matches_raster_size() {
    let raster = pipeline::resize(
        sketch(33, 17).buffer(),
        33,
        fast_image_resize::FilterType::Bilinear,
    )
    .unwrap();
    let doc = sketch_export::wrap(&raster).unwrap();

    let svg = element_attributes(&doc.content, b"svg");
    assert_eq!(attr(&svg, "width"), "33");
    assert_eq!(attr(&svg, "height"), "17");
    assert_eq!(attr(&svg, "viewBox"), "0 0 33 17");
}

#[tokio::test(start_paused = true)]
async fn test_vector_payload_decodes_to_resized_raster() {
    use base64::Engine;

    let processed = sketch(80, 60);
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    exporter
        .export_single(
            Some(&processed),
            ExportSpec::new(300, ExportFormat::Vector),
            &mut sink,
        )
        .await
        .unwrap();

    let xml = std::str::from_utf8(&sink.delivered[0].2).unwrap();
    let image = element_attributes(xml, b"image");
    let encoded = attr(&image, "href")
        .strip_prefix("data:image/png;base64,")
        .unwrap();
    let png = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    let embedded = image::load_from_memory(&png).unwrap().to_rgba8();

    let expected = pipeline::resize(
        processed.buffer(),
        300,
        exporter.options().resize_filter,
    )
    .unwrap();
    assert_eq!(embedded.dimensions(), expected.dimensions());
    assert_eq!(attr(&image, "width"), expected.width().to_string());
    assert_eq!(attr(&image, "height"), expected.height().to_string());
    assert_eq!(embedded.as_raw().as_slice(), expected.as_bytes());
}

// ============================================================================
// Transient Resource Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_vector_references_are_released_after_delay() {
    let processed = sketch(16, 16);
    let mut exporter = Exporter::default();
    let mut sink = RecordingSink::default();

    exporter
        .export_batch(Some(&processed), ExportFormat::Vector, &mut sink)
        .await;
    assert_eq!(sink.delivered.len(), 3);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(exporter.resources().live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_references_released_even_when_delivery_fails() {
    let processed = sketch(16, 16);
    let mut exporter = Exporter::default();
    let mut sink = FailingSink;

    let report = exporter
        .export_batch(Some(&processed), ExportFormat::Vector, &mut sink)
        .await;

    assert_eq!(report.failed.len(), 3);
    assert!(report.delivered.is_empty());
    assert!(
        report
            .failed
            .iter()
            .all(|(_, e)| matches!(e, SketchError::Delivery { .. }))
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(exporter.resources().live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_raster_artifacts_are_inline() {
    let processed = sketch(16, 16);
    let exporter = Exporter::default();
    let artifact = exporter
        .prepare(&processed, ExportSpec::new(300, ExportFormat::Raster))
        .unwrap();
    assert!(matches!(artifact.payload, Payload::Inline(_)));
    assert_eq!(exporter.resources().live_count(), 0);
}

// ============================================================================
// Session + Export Tests
// ============================================================================

#[tokio::test]
async fn test_superseded_run_does_not_overwrite_newer_result() {
    let mut img = RgbaImage::from_pixel(20, 20, WHITE);
    for x in 0..20 {
        img.put_pixel(x, 3, Rgba([100, 100, 100, 255]));
    }

    let mut session = Session::new();
    let slow = session.upload(upload(&img));
    let fast = session.set_threshold(Threshold::new(50)).unwrap();

    let fast_result = fast.run().await;
    assert!(session.apply(fast.ticket, fast_result).unwrap());

    let slow_result = slow.run().await;
    assert!(!session.apply(slow.ticket, slow_result).unwrap());

    let shown = session.processed().unwrap();
    assert_eq!(shown.threshold().value(), 50);
    assert_eq!(shown.opaque_count(), 0);
}

#[tokio::test]
async fn test_directory_export_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut session = Session::new();
    let run = session.upload(upload(&RgbaImage::from_pixel(50, 25, BLACK)));
    let outcome = run.run().await;
    session.apply(run.ticket, outcome).unwrap();

    let mut exporter = Exporter::new(ExportOptions {
        delivery_interval: Duration::from_millis(1),
        release_delay: Duration::from_millis(1),
        ..ExportOptions::default()
    });
    let mut sink = DirectorySink::new(dir.path());
    let report = exporter
        .export_batch(session.processed(), ExportFormat::Raster, &mut sink)
        .await;

    assert!(report.is_success());
    for name in ["sketch-300px.png", "sketch-600px.png", "sketch-1200px.png"] {
        assert!(dir.path().join(name).exists(), "{name} missing");
    }
}
