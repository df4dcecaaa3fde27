//! visionode-sim: host-side simulation of the device frame loop.
//!
//! Moves a white square across a synthetic QVGA frame (or replays an
//! image file), runs the pipeline once per frame and prints what it
//! detected. Useful for:
//!
//! - Checking how ROI and downsample settings map blob coordinates
//! - Tuning threshold and minimum blob area before flashing a device
//! - Comparing blob labelers (`flood-fill` vs `run-length`)
//! - Measuring per-stage durations
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin visionode-sim -- [OPTIONS]
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default
//! `warn`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use visionode_io::{
    ConfigStore, FileStore, FrameSource, FrameSourceError, ImageFileSource, OwnedFrame,
    TestPattern, load_or_init, raster,
};
use visionode_pipeline::diagnostics::{Clock, FrameTimer, PipelineDiagnostics};
use visionode_pipeline::{BlobLabelerKind, Dimensions, Pipeline, PipelineConfig};

/// Simulation defaults: centre ROI of a QVGA frame, halved.
const SIM_THRESHOLD: u8 = 100;
const SIM_ROI: &str = "80,60,160,120";
const SIM_DOWNSAMPLE: u16 = 2;
const SIM_MIN_AREA: u32 = 20;

/// Host-side simulation of the visionode frame loop.
///
/// Runs the frame pipeline over a moving test pattern or a still image
/// and prints per-frame detections, frame rate and optional per-stage
/// diagnostics.
#[derive(Parser)]
#[command(name = "visionode-sim", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Number of frames to process.
    #[arg(long, default_value_t = 11, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    frames: u32,

    /// Test pattern frame width.
    #[arg(long, default_value_t = TestPattern::QVGA.width)]
    width: u32,

    /// Test pattern frame height.
    #[arg(long, default_value_t = TestPattern::QVGA.height)]
    height: u32,

    /// Edge length of the moving square.
    #[arg(long, default_value_t = TestPattern::DEFAULT_SQUARE)]
    square_size: u32,

    /// X of the square in the first frame.
    #[arg(long, default_value_t = TestPattern::DEFAULT_START_X)]
    start_x: u32,

    /// Y of the square.
    #[arg(long, default_value_t = TestPattern::DEFAULT_Y)]
    square_y: u32,

    /// Pixels the square moves right per frame.
    #[arg(long, default_value_t = TestPattern::DEFAULT_STEP)]
    step: u32,

    /// Replay this image (PNG, JPEG, BMP, WebP) instead of the test pattern.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Threshold level; pixels at or above it become foreground.
    #[arg(long, default_value_t = SIM_THRESHOLD)]
    threshold: u8,

    /// Disable the threshold stage.
    #[arg(long)]
    no_threshold: bool,

    /// Invert the threshold test.
    #[arg(long)]
    invert: bool,

    /// Region of interest as `X,Y,W,H` in native frame pixels.
    #[arg(long, default_value = SIM_ROI, value_parser = parse_roi)]
    roi: [u16; 4],

    /// Disable the ROI stage.
    #[arg(long)]
    no_roi: bool,

    /// Downsample factor (1 disables the stage).
    #[arg(long, default_value_t = SIM_DOWNSAMPLE, value_parser = clap::builder::RangedU64ValueParser::<u16>::new().range(1..))]
    downsample: u16,

    /// Minimum blob area in output pixels.
    #[arg(long, default_value_t = SIM_MIN_AREA)]
    min_area: u32,

    /// Blob labeling algorithm.
    #[arg(long, value_enum, default_value_t = Labeler::FloodFill)]
    labeler: Labeler,

    /// Disable blob detection.
    #[arg(long)]
    no_blobs: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Stored config file.
    ///
    /// Without `--save-settings` the pipeline runs with the stored
    /// config (initialising the file with defaults if it is missing or
    /// corrupt) and the pipeline flags are ignored.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the config built from the flags (or `--config-json`) to
    /// `--settings` before running.
    #[arg(long, requires = "settings")]
    save_settings: bool,

    /// Output per-frame results as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Collect per-stage diagnostics and print a report per frame.
    #[arg(long)]
    diagnostics: bool,

    /// Write each frame's output buffer as a PNG into this directory.
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

/// Blob labeling algorithm selection.
#[derive(Clone, Copy, ValueEnum)]
enum Labeler {
    /// Breadth-first flood fill.
    FloodFill,
    /// Run-length union-find.
    RunLength,
}

impl From<Labeler> for BlobLabelerKind {
    fn from(labeler: Labeler) -> Self {
        match labeler {
            Labeler::FloodFill => Self::FloodFill,
            Labeler::RunLength => Self::RunLength,
        }
    }
}

/// Parse `X,Y,W,H`.
fn parse_roi(s: &str) -> Result<[u16; 4], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected X,Y,W,H, got {s:?}"));
    };
    let mut out = [0u16; 4];
    for (slot, part) in out.iter_mut().zip([x, y, w, h]) {
        *slot = part
            .parse()
            .map_err(|e| format!("invalid ROI component {part:?}: {e}"))?;
    }
    Ok(out)
}

/// Build a [`PipelineConfig`] from the pipeline flags or `--config-json`.
fn config_from_flags(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let [roi_x, roi_y, roi_w, roi_h] = cli.roi;
    Ok(PipelineConfig {
        enable_threshold: !cli.no_threshold,
        threshold_val: cli.threshold,
        invert: cli.invert,
        enable_roi: !cli.no_roi,
        roi_x,
        roi_y,
        roi_w,
        roi_h,
        downsample_factor: cli.downsample,
        enable_blob_detection: !cli.no_blobs,
        min_blob_area: cli.min_area,
        blob_labeler: cli.labeler.into(),
        ..PipelineConfig::default()
    })
}

/// Resolve the effective config, loading or saving `--settings` as asked.
fn resolve_config(cli: &Cli) -> Result<PipelineConfig, String> {
    let Some(ref path) = cli.settings else {
        return config_from_flags(cli);
    };
    let mut store = FileStore::new(path);

    if cli.save_settings {
        let config = config_from_flags(cli)?;
        config.validate().map_err(|e| e.to_string())?;
        store
            .save(&config)
            .map_err(|e| format!("Error saving settings to {}: {e}", path.display()))?;
        eprintln!("Settings saved to {}", path.display());
        return Ok(config);
    }

    Ok(load_or_init(&mut store))
}

/// Where frames come from.
enum Source {
    Pattern(TestPattern),
    Image(ImageFileSource),
}

impl Source {
    fn from_cli(cli: &Cli) -> Result<Self, FrameSourceError> {
        if let Some(ref path) = cli.image {
            return Ok(Self::Image(ImageFileSource::open(path)?));
        }
        Ok(Self::Pattern(
            TestPattern::new()
                .with_dimensions(Dimensions::new(cli.width, cli.height))
                .with_square(cli.square_size)
                .with_origin(cli.start_x, cli.square_y)
                .with_step(cli.step),
        ))
    }

    /// X of the test square in the next frame, if this is a pattern.
    const fn next_x(&self) -> Option<u32> {
        match self {
            Self::Pattern(p) => Some(p.next_x()),
            Self::Image(_) => None,
        }
    }
}

impl FrameSource for Source {
    fn capture(&mut self) -> Result<OwnedFrame, FrameSourceError> {
        match self {
            Self::Pattern(p) => p.capture(),
            Self::Image(s) => s.capture(),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut pipeline = match Pipeline::with_config(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut source = match Source::from_cli(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening frame source: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref dir) = cli.dump_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("Error creating {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    eprintln!("--- visionode simulation: {} frames ---", cli.frames);
    eprintln!("Config: {config:#?}");
    eprintln!();

    let collect = cli.json || cli.diagnostics;
    let mut timer = FrameTimer::new(StdClock);
    let mut records = Vec::new();
    let mut all_diagnostics = Vec::new();

    for i in 0..cli.frames {
        let raw_x = source.next_x();
        let fps = timer.tick();

        let frame = match source.capture() {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(frame = i, error = %e, "capture failed");
                continue;
            }
        };

        let result = if collect {
            pipeline
                .process_with_diagnostics(&frame.descriptor(), &StdClock)
                .map(Some)
        } else {
            pipeline.process(&frame.descriptor()).map(|()| None)
        };

        let diagnostics = match result {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(frame = i, error = %e, "frame skipped");
                if cli.json {
                    records.push(serde_json::json!({ "frame": i, "raw_x": raw_x, "error": e }));
                }
                continue;
            }
        };

        if cli.json {
            records.push(serde_json::json!({
                "frame": i,
                "raw_x": raw_x,
                "width": pipeline.width(),
                "height": pipeline.height(),
                "fps": fps,
                "blobs": pipeline.blobs(),
                "diagnostics": diagnostics,
            }));
        } else {
            println!("{}", frame_line(i, raw_x, &pipeline, fps));
            if cli.diagnostics
                && let Some(ref d) = diagnostics
            {
                println!("{}", d.report());
                println!();
            }
        }

        if let Some(ref dir) = cli.dump_dir {
            let path = dir.join(format!("frame_{i:03}.png"));
            if let Err(e) = raster::save_gray_png(&path, &pipeline.output_image()) {
                tracing::error!(frame = i, error = %e, "raster dump failed");
            }
        }

        all_diagnostics.extend(diagnostics);
    }

    if cli.json {
        match serde_json::to_string_pretty(&records) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing results: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if cli.diagnostics && all_diagnostics.len() > 1 {
        print_multi_frame_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// One human-readable status line per frame.
fn frame_line(i: u32, raw_x: Option<u32>, pipeline: &Pipeline, fps: Option<f64>) -> String {
    let mut line = format!("[Frame {i:2}]");
    if let Some(x) = raw_x {
        line.push_str(&format!(" RawX={x:<3} |"));
    }
    line.push_str(&format!(
        " Output Res: {}x{} | Blobs: {}",
        pipeline.width(),
        pipeline.height(),
        pipeline.blobs().len(),
    ));
    if let Some(fps) = fps {
        line.push_str(&format!(" | {fps:.1} fps"));
    }
    match pipeline.blobs().first() {
        Some(b) => line.push_str(&format!(
            " -> Det at: x={}, y={} (w={} h={})",
            b.x, b.y, b.width, b.height
        )),
        None => line.push_str(" -> (no detection)"),
    }
    line
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Option<Duration>;

/// Print aggregated timing across all processed frames.
#[allow(clippy::cast_precision_loss)]
fn print_multi_frame_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!(
        "Summary ({} frames)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len().max(1) as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Grayscale", |d| Some(d.grayscale.duration)),
        ("ROI", |d| d.roi.as_ref().map(|s| s.duration)),
        ("Downsample", |d| d.downsample.as_ref().map(|s| s.duration)),
        ("Threshold", |d| d.threshold.as_ref().map(|s| s.duration)),
        ("Blob Detection", |d| {
            d.blob_detection.as_ref().map(|s| s.duration)
        }),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
