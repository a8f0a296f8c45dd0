//! planvec: turn photographs of drawing templates into laser-cutter SVG.
//!
//! Two subcommands:
//!
//! - `process` vectorizes one photograph and saves the cut file. A
//!   photograph whose markers cannot all be found is an error: a cut
//!   file must never silently come from an unrectified frame.
//! - `live` simulates the capture loop over a directory of frames, with
//!   a capture thread feeding a worker through a latest-frame-wins slot.
//!
//! Pipeline parameters come from `--config <FILE>` (JSON), adjusted by
//! individual flags. Logging goes to stderr and honours `RUST_LOG`.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin planvec -- process [OPTIONS] <IMAGE>
//! cargo run --release --bin planvec -- live [OPTIONS] <DIR>
//! ```

#![allow(clippy::print_stdout)]

mod live;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use planvec_pipeline::{
    ColorRangeTable, ContourTracerKind, LengthUnit, Outcome, PhysicalSize, PipelineConfig,
    PipelineDiagnostics, PipelineError, Stage, StageImage, StageMetrics, StageObserver,
    SystemClock, TimingCollector, VectorOutput,
};

/// Photograph-to-cut-file vectorizer for hand-drawn templates.
#[derive(Parser)]
#[command(name = "planvec", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Vectorize one photograph and write the cut file.
    Process(ProcessArgs),

    /// Run the capture loop over every image in a directory.
    Live(live::LiveArgs),
}

#[derive(Args)]
struct ProcessArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Write the cut file (SVG) here.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Dump every intermediate raster as PNG into this directory.
    #[arg(long)]
    stages: Option<PathBuf>,

    /// Number of runs for timing.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Pipeline parameters shared by every subcommand.
///
/// Flags override values read from `--config`.
#[derive(Debug, Clone, Default, Args)]
struct PipelineArgs {
    /// Full pipeline config as a JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Color range table as a JSON file (`name -> {low, high}`).
    #[arg(long)]
    colors: Option<PathBuf>,

    /// Gaussian kernel size (odd; 1 disables blurring).
    #[arg(long)]
    blur_kernel: Option<u32>,

    /// Intensity a pixel must exceed to count as paper.
    #[arg(long)]
    threshold: Option<u8>,

    /// Minimum region area in pixels.
    #[arg(long)]
    area_threshold: Option<u64>,

    /// Minimum points per contour.
    #[arg(long)]
    min_contour_vertices: Option<usize>,

    /// Douglas-Peucker tolerance in pixels.
    #[arg(long)]
    polygon_tolerance: Option<f64>,

    /// Stroke width in points.
    #[arg(long)]
    line_width: Option<f64>,

    /// Physical sheet size, e.g. `20x14`. Also sets the rectified
    /// frame size to match its aspect ratio.
    #[arg(long, value_parser = parse_size)]
    output_size: Option<(f64, f64)>,

    /// Unit of the sheet size.
    #[arg(long, value_enum)]
    unit: Option<Unit>,

    /// Contour tracing algorithm.
    #[arg(long, value_enum)]
    tracer: Option<Tracer>,
}

/// Physical unit selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Unit {
    /// Centimetres.
    Cm,
    /// Inches.
    In,
    /// Millimetres.
    Mm,
}

impl From<Unit> for LengthUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Cm => Self::Centimeters,
            Unit::In => Self::Inches,
            Unit::Mm => Self::Millimeters,
        }
    }
}

/// Contour tracer selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tracer {
    /// Sub-pixel marching squares.
    MarchingSquares,
    /// Integer-grid border following.
    BorderFollowing,
}

impl From<Tracer> for ContourTracerKind {
    fn from(tracer: Tracer) -> Self {
        match tracer {
            Tracer::MarchingSquares => Self::MarchingSquares,
            Tracer::BorderFollowing => Self::BorderFollowing,
        }
    }
}

/// Errors surfaced to the user.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing stage image {path}: {source}")]
    StageImage {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("error in color table {path}: {source}")]
    Colors {
        path: PathBuf,
        source: PipelineError,
    },

    #[error("error serializing diagnostics: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{path}: found {marker_count} of 4 markers, nothing was saved")]
    NotRectified { path: PathBuf, marker_count: usize },

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Parse `WIDTHxHEIGHT`.
fn parse_size(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid length {v:?}: {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}

/// Build a [`PipelineConfig`] from `--config` and the override flags.
fn config_from_cli(args: &PipelineArgs) -> Result<PipelineConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json(&read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };

    if let Some(kernel) = args.blur_kernel {
        config.blur_kernel = kernel;
    }
    if let Some(value) = args.threshold {
        config.threshold.value = value;
    }
    if let Some(area) = args.area_threshold {
        config.area_threshold = area;
    }
    if let Some(vertices) = args.min_contour_vertices {
        config.min_contour_vertices = vertices;
    }
    if let Some(tolerance) = args.polygon_tolerance {
        config.polygon_tolerance = tolerance;
    }
    if let Some(width) = args.line_width {
        config.line_width = width;
    }
    if let Some(tracer) = args.tracer {
        config.contour_tracer = tracer.into();
    }

    let unit = args.unit.map(LengthUnit::from);
    match (args.output_size, unit) {
        (Some((width, height)), unit) => {
            let unit = unit.unwrap_or(config.output_size.unit);
            config = config.with_output_size(PhysicalSize::new(width, height, unit));
        }
        (None, Some(unit)) => config.output_size = config.output_size.to_unit(unit),
        (None, None) => {}
    }

    config.validate()?;
    Ok(config)
}

/// Load the color table from `--colors`, or the built-in default.
fn table_from_cli(args: &PipelineArgs) -> Result<ColorRangeTable, CliError> {
    match &args.colors {
        Some(path) => ColorRangeTable::from_json(&read_to_string(path)?).map_err(|source| {
            CliError::Colors {
                path: path.clone(),
                source,
            }
        }),
        None => Ok(ColorRangeTable::default()),
    }
}

fn read_to_string(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and decode an image file.
fn load_frame(path: &Path) -> Result<planvec_pipeline::RgbImage, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(planvec_pipeline::decode_rgb(&bytes)?)
}

/// Write the cut file for `output`.
fn write_svg(
    path: &Path,
    output: &VectorOutput,
    title: &str,
    config: &PipelineConfig,
) -> Result<(), CliError> {
    let config_json = serde_json::to_string(config)?;
    let description = format!(
        "{} polylines on a {}x{}{} sheet",
        output.polylines.len(),
        output.scale.physical.width,
        output.scale.physical.height,
        output.scale.physical.unit,
    );
    let metadata = planvec_export::SvgMetadata {
        title: Some(title),
        description: Some(&description),
        config_json: Some(&config_json),
    };
    let svg = planvec_export::to_svg(output, &metadata);
    std::fs::write(path, &svg).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = svg.len(), "SVG written");
    Ok(())
}

/// Markers seen by the rectify stage of a run.
fn marker_count(diagnostics: &PipelineDiagnostics) -> usize {
    match diagnostics.stage(Stage::Rectify).map(|s| &s.metrics) {
        Some(StageMetrics::Rectify { marker_count, .. }) => *marker_count,
        _ => 0,
    }
}

/// Observer that saves every stage raster as `NN-<stage>.png`.
///
/// The first write error is kept and reported by
/// [`finish`](Self::finish); later stages are skipped.
struct StageDumper<'a> {
    dir: Option<&'a Path>,
    error: Option<CliError>,
}

impl<'a> StageDumper<'a> {
    const fn new(dir: Option<&'a Path>) -> Self {
        Self { dir, error: None }
    }

    fn finish(self) -> Result<(), CliError> {
        self.error.map_or(Ok(()), Err)
    }
}

impl StageObserver for StageDumper<'_> {
    fn observe(&mut self, stage: Stage, image: StageImage<'_>) {
        let Some(dir) = self.dir else { return };
        if self.error.is_some() {
            return;
        }
        let index = Stage::ALL.iter().position(|s| *s == stage).unwrap_or(0);
        let path = dir.join(format!("{index:02}-{stage}.png"));
        match image.to_dynamic().save(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "stage image written"),
            Err(source) => self.error = Some(CliError::StageImage { path, source }),
        }
    }
}

fn run_process(args: &ProcessArgs) -> Result<(), CliError> {
    let config = config_from_cli(&args.pipeline)?;
    let table = table_from_cli(&args.pipeline)?;
    let frame = load_frame(&args.image)?;

    tracing::info!(
        image = %args.image.display(),
        width = frame.width(),
        height = frame.height(),
        runs = args.runs,
        "processing"
    );
    tracing::debug!(?config, "pipeline config");

    if let Some(dir) = &args.stages {
        std::fs::create_dir_all(dir).map_err(|source| CliError::Write {
            path: dir.clone(),
            source,
        })?;
    }

    let mut collector = TimingCollector::new();
    let mut vector = None;

    for run in 0..args.runs {
        // Stage images are only dumped on the first run.
        let mut dumper = StageDumper::new(args.stages.as_deref().filter(|_| run == 0));
        let (outcome, diagnostics) =
            planvec_pipeline::run_with(frame.clone(), &config, &table, &SystemClock, &mut dumper)?;
        dumper.finish()?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        } else {
            println!("{}", diagnostics.report());
        }

        let markers = marker_count(&diagnostics);
        collector.record(diagnostics);
        match outcome {
            Outcome::Vectorized(output) => {
                vector.get_or_insert(output);
            }
            Outcome::Passthrough(_) => {
                return Err(CliError::NotRectified {
                    path: args.image.clone(),
                    marker_count: markers,
                });
            }
        }
    }

    if args.runs > 1 {
        println!();
        println!("{}", collector.report());
    }

    if let (Some(svg_path), Some(output)) = (&args.svg, &vector) {
        let title = args
            .image
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("planvec");
        write_svg(svg_path, output, title, &config)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Process(args) => run_process(&args),
        Command::Live(args) => live::run_live(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_size_accepts_both_separators() {
        assert_eq!(parse_size("20x14").unwrap(), (20.0, 14.0));
        assert_eq!(parse_size("8.5X11").unwrap(), (8.5, 11.0));
        assert!(parse_size("20").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn defaults_without_flags() {
        let config = config_from_cli(&PipelineArgs::default()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let args = PipelineArgs {
            blur_kernel: Some(5),
            threshold: Some(120),
            tracer: Some(Tracer::BorderFollowing),
            output_size: Some((10.0, 20.0)),
            unit: Some(Unit::In),
            ..PipelineArgs::default()
        };
        let config = config_from_cli(&args).unwrap();
        assert_eq!(config.blur_kernel, 5);
        assert_eq!(config.threshold.value, 120);
        assert_eq!(config.contour_tracer, ContourTracerKind::BorderFollowing);
        assert_eq!(
            config.output_size,
            PhysicalSize::new(10.0, 20.0, LengthUnit::Inches)
        );
        assert_eq!(config.rectify_size.height, 1920);
    }

    #[test]
    fn unit_alone_converts_the_sheet() {
        let args = PipelineArgs {
            unit: Some(Unit::Mm),
            ..PipelineArgs::default()
        };
        let config = config_from_cli(&args).unwrap();
        assert_eq!(config.output_size.unit, LengthUnit::Millimeters);
        assert!((config.output_size.width - 200.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_flag_value_is_rejected() {
        let args = PipelineArgs {
            blur_kernel: Some(4),
            ..PipelineArgs::default()
        };
        assert!(matches!(
            config_from_cli(&args),
            Err(CliError::Pipeline(PipelineError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let args = PipelineArgs {
            config: Some(PathBuf::from("/nonexistent/planvec.json")),
            ..PipelineArgs::default()
        };
        assert!(matches!(
            config_from_cli(&args),
            Err(CliError::Read { .. })
        ));
    }

    #[test]
    fn inverted_color_range_is_reported_with_its_file() {
        let path = std::env::temp_dir().join(format!("planvec-colors-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"red": {"low": [9, 0, 0], "high": [3, 255, 255]}}"#).unwrap();
        let args = PipelineArgs {
            colors: Some(path.clone()),
            ..PipelineArgs::default()
        };
        let result = table_from_cli(&args);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            result,
            Err(CliError::Colors {
                source: PipelineError::InvalidColorRange(_),
                ..
            })
        ));
    }

    #[test]
    fn default_color_table_without_flag() {
        let table = table_from_cli(&PipelineArgs::default()).unwrap();
        assert_eq!(table, ColorRangeTable::default());
    }
}
