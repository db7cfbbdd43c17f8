use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use sketch_export::{
    DEFAULT_SIZES, DirectorySink, ExportFormat, ExportOptions, Exporter, Session, SketchError,
    SourceImage, Threshold,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Png,
    Svg,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => ExportFormat::Raster,
            Format::Svg => ExportFormat::Vector,
        }
    }
}

/// Convert a sketch into transparent line art and export it.
#[derive(Debug, Parser)]
#[command(name = "sketch-export", version)]
struct Cli {
    /// Sketch image (PNG or JPEG)
    input: PathBuf,

    /// Brightness cutoff: higher removes more of the paper
    #[arg(short, long, default_value_t = 128)]
    threshold: u8,

    /// Export width in pixels (300, 600 or 1200)
    #[arg(short, long, default_value_t = 600, value_parser = parse_size)]
    size: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Png)]
    format: Format,

    /// Export every size instead of just --size
    #[arg(short, long)]
    batch: bool,

    /// Directory receiving the exports
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Also write the full size processed PNG here
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Minimum pause between two exports, in milliseconds
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,

    /// How long a vector document stays referenced after delivery, in milliseconds
    #[arg(long, default_value_t = 100)]
    release_ms: u64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size(value: &str) -> Result<u32, String> {
    let size: u32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a pixel width"))?;
    if DEFAULT_SIZES.contains(&size) {
        Ok(size)
    } else {
        Err(format!("size must be one of {DEFAULT_SIZES:?}"))
    }
}

fn media_type_for(path: &std::path::Path) -> Option<&'static str> {
    image::ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type())
}

fn exit_code(err: &SketchError) -> i32 {
    match err {
        SketchError::InvalidInput(_) => 1,
        SketchError::Decode(_) => 2,
        _ => 3,
    }
}

fn fail(err: SketchError) -> ! {
    eprintln!("Error: {err}");
    process::exit(exit_code(&err));
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let bytes = match fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading input file '{}': {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let source =
        SourceImage::from_upload(bytes, media_type_for(&cli.input)).unwrap_or_else(|e| fail(e));

    let mut session = Session::new();
    session.select_size(cli.size);
    session.select_format(cli.format.into());
    session.set_threshold(Threshold::new(cli.threshold));

    let run = session.upload(source);
    let outcome = run.run().await;
    session
        .apply(run.ticket, outcome)
        .unwrap_or_else(|e| fail(e));

    let Some(processed) = session.processed() else {
        return;
    };

    if let Some(path) = &cli.preview {
        let png = processed.to_png().unwrap_or_else(|e| fail(e));
        if let Err(e) = fs::write(path, png) {
            fail(SketchError::Io(e));
        }
        log::info!("preview written to {}", path.display());
    }

    let options = ExportOptions {
        delivery_interval: Duration::from_millis(cli.interval_ms),
        release_delay: Duration::from_millis(cli.release_ms),
        ..ExportOptions::default()
    };
    let release_delay = options.release_delay;
    let mut exporter = Exporter::new(options);
    if let Err(e) = fs::create_dir_all(&cli.out_dir) {
        fail(SketchError::Io(e));
    }
    let mut sink = DirectorySink::new(&cli.out_dir);

    if cli.batch {
        let report = exporter
            .export_batch(Some(processed), session.selected_format(), &mut sink)
            .await;
        for name in &report.delivered {
            println!("Exported '{}'", name);
        }
        if !report.is_success() {
            for (width, err) in &report.failed {
                eprintln!("Error exporting {}px: {}", width, err);
            }
            process::exit(3);
        }
    } else {
        match exporter
            .export_single(Some(processed), session.export_spec(), &mut sink)
            .await
        {
            Ok(Some(name)) => println!("Exported '{}'", name),
            Ok(None) => {}
            Err(e) => fail(e),
        }
    }

    // Let pending releases run before the runtime shuts down.
    tokio::time::sleep(release_delay).await;
}
