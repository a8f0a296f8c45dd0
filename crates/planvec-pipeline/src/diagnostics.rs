//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! Every [`run_with`](crate::run_with) call returns a
//! [`PipelineDiagnostics`] alongside its outcome. Timestamps come from a
//! caller-supplied [`Clock`], so tests can use a fake clock and the CLI
//! uses [`SystemClock`].
//!
//! Aggregation across runs is explicit: the caller owns a
//! [`TimingCollector`] and records each run's diagnostics into it.
//! Nothing is accumulated in global state.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observer::Stage;
use crate::scale::LengthUnit;
use crate::types::Polyline;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by the `web-time` crate, which uses
/// `performance.now()` on WASM and `std::time::Instant` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// `stages` holds one entry per executed stage, in execution order. A
/// passthrough run stops after [`Stage::Rectify`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Per-stage measurements.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Which stage this is.
    pub stage: Stage,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Rectification metrics.
    Rectify {
        /// Markers found in the source frame.
        marker_count: usize,
        /// Whether the frame was warped.
        success: bool,
        /// Output width in pixels.
        width: u32,
        /// Output height in pixels.
        height: u32,
    },
    /// Gaussian blur metrics.
    Blur {
        /// Configured kernel size.
        kernel: u32,
        /// Equivalent sigma, `None` when blurring is disabled.
        sigma: Option<f32>,
    },
    /// Paint-out metrics.
    PaintOut {
        /// Number of color ranges painted over.
        range_count: usize,
        /// Pixels that matched any range.
        painted_pixels: u64,
    },
    /// Intensity reduction metrics.
    Intensity {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Binarization metrics.
    Binarize {
        /// Threshold value.
        threshold: u8,
        /// Pixels above the threshold.
        foreground_pixels: u64,
        /// Total pixel count.
        total_pixels: u64,
    },
    /// Region labelling and filtering metrics.
    Regions {
        /// Regions found before filtering.
        labelled: usize,
        /// Regions surviving the filter.
        kept: usize,
        /// Minimum area in pixels.
        area_threshold: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Contours traced before length filtering.
        traced_count: usize,
        /// Contours surviving the length filter.
        contour_count: usize,
        /// Total number of points across surviving contours.
        total_point_count: usize,
        /// Minimum points in any surviving contour.
        min_contour_points: usize,
        /// Maximum points in any surviving contour.
        max_contour_points: usize,
        /// Mean points per surviving contour.
        mean_contour_points: f64,
    },
    /// Simplification metrics.
    Simplification {
        /// Douglas-Peucker tolerance in pixels.
        tolerance: f64,
        /// Number of polylines.
        polyline_count: usize,
        /// Total points before simplification.
        points_before: usize,
        /// Total points after simplification.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
    /// Scaling metrics.
    Scale {
        /// Physical length of one pixel.
        units_per_pixel: f64,
        /// Physical unit of the output.
        unit: LengthUnit,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source frame width in pixels.
    pub image_width: u32,
    /// Source frame height in pixels.
    pub image_height: u32,
    /// Whether rectification succeeded.
    pub rectified: bool,
    /// Regions surviving the filter.
    pub region_count: usize,
    /// Polylines in the output.
    pub polyline_count: usize,
    /// Points across all output polylines.
    pub final_point_count: usize,
}

impl PipelineDiagnostics {
    /// Diagnostics of `stage`, if it ran.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Render a human-readable table of per-stage timings and metrics.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({})",
            self.summary.image_width,
            self.summary.image_height,
            if self.summary.rectified {
                "rectified"
            } else {
                "passthrough"
            },
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!(
                "{:<24} {ms:>8.3}ms {pct:>9.1}%  {details}",
                diag.stage.label()
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Regions: {}  |  Polylines: {}  |  Points: {}",
            self.summary.region_count, self.summary.polyline_count, self.summary.final_point_count,
        ));

        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Rectify {
            marker_count,
            success,
            width,
            height,
        } => {
            if *success {
                format!("{marker_count} markers -> {width}x{height}")
            } else {
                format!("{marker_count} markers, passthrough")
            }
        }
        StageMetrics::Blur { kernel, sigma } => match sigma {
            Some(sigma) => format!("kernel={kernel} sigma={sigma:.2}"),
            None => format!("kernel={kernel} (off)"),
        },
        StageMetrics::PaintOut {
            range_count,
            painted_pixels,
        } => format!("{range_count} ranges, {painted_pixels} px painted"),
        StageMetrics::Intensity { width, height } => format!("{width}x{height}"),
        StageMetrics::Binarize {
            threshold,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("> {threshold}: {foreground_pixels} px ({density:.1}%)")
        }
        StageMetrics::Regions {
            labelled,
            kept,
            area_threshold,
        } => format!("{labelled} -> {kept} regions (area >= {area_threshold})"),
        StageMetrics::ContourTracing {
            traced_count,
            contour_count,
            total_point_count,
            min_contour_points,
            max_contour_points,
            mean_contour_points,
        } => format!(
            "{traced_count} -> {contour_count} contours, {total_point_count} pts (min={min_contour_points} max={max_contour_points} mean={mean_contour_points:.1})",
        ),
        StageMetrics::Simplification {
            tolerance,
            points_before,
            points_after,
            reduction_ratio,
            ..
        } => format!(
            "tol={tolerance:.2} {points_before}->{points_after} pts ({:.1}% reduction)",
            reduction_ratio * 100.0,
        ),
        StageMetrics::Scale {
            units_per_pixel,
            unit,
        } => format!("{units_per_pixel:.5} {unit}/px"),
    }
}

pub(crate) fn count_nonzero(image: &image::GrayImage) -> u64 {
    image.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}

pub(crate) struct ContourStats {
    pub total: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

pub(crate) fn contour_stats(contours: &[Polyline]) -> ContourStats {
    let total = total_points(contours);
    let min = contours.iter().map(Polyline::len).min().unwrap_or(0);
    let max = contours.iter().map(Polyline::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if contours.is_empty() {
        0.0
    } else {
        total as f64 / contours.len() as f64
    };
    ContourStats {
        total,
        min,
        max,
        mean,
    }
}

pub(crate) fn total_points(polylines: &[Polyline]) -> usize {
    polylines.iter().map(Polyline::len).sum()
}

/// Caller-owned accumulator of many runs' diagnostics.
///
/// Holds every recorded run so aggregate statistics can be recomputed
/// at any point. [`reset`](Self::reset) starts over.
#[derive(Debug, Clone, Default)]
pub struct TimingCollector {
    runs: Vec<PipelineDiagnostics>,
}

impl TimingCollector {
    /// An empty collector.
    #[must_use]
    pub const fn new() -> Self {
        Self { runs: Vec::new() }
    }

    /// Record one run.
    pub fn record(&mut self, diagnostics: PipelineDiagnostics) {
        self.runs.push(diagnostics);
    }

    /// Number of recorded runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no runs have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// The recorded runs, oldest first.
    #[must_use]
    pub fn runs(&self) -> &[PipelineDiagnostics] {
        &self.runs
    }

    /// Forget every recorded run.
    pub fn reset(&mut self) {
        self.runs.clear();
    }

    /// Minimum, mean and maximum total duration, if any run was
    /// recorded.
    #[must_use]
    pub fn total_stats(&self) -> Option<(Duration, Duration, Duration)> {
        let min = self.runs.iter().map(|d| d.total_duration).min()?;
        let max = self.runs.iter().map(|d| d.total_duration).max()?;
        let sum: Duration = self.runs.iter().map(|d| d.total_duration).sum();
        let n = u32::try_from(self.runs.len()).ok()?;
        Some((min, sum / n, max))
    }

    /// Mean duration of every stage that ran at least once, slowest
    /// first. Stages are averaged over the runs in which they ran.
    #[must_use]
    pub fn mean_durations(&self) -> Vec<(Stage, Duration)> {
        let mut sums: BTreeMap<Stage, (Duration, u32)> = BTreeMap::new();
        for diag in self.runs.iter().flat_map(|d| &d.stages) {
            let entry = sums.entry(diag.stage).or_default();
            entry.0 += diag.duration;
            entry.1 += 1;
        }
        let mut means: Vec<(Stage, Duration)> = sums
            .into_iter()
            .map(|(stage, (sum, n))| (stage, sum / n))
            .collect();
        means.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        means
    }

    /// Render aggregated statistics across all recorded runs.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = vec![format!(
            "Summary ({} runs)\n{}",
            self.runs.len(),
            "=".repeat(60)
        )];

        let Some((min, mean, max)) = self.total_stats() else {
            lines.push("No runs recorded".to_owned());
            return lines.join("\n");
        };
        let passthrough = self.runs.iter().filter(|d| !d.summary.rectified).count();
        lines.push(format!(
            "Total duration: min={:.3}ms  mean={:.3}ms  max={:.3}ms",
            duration_ms(min),
            duration_ms(mean),
            duration_ms(max),
        ));
        lines.push(format!("Passthrough runs: {passthrough}"));
        lines.push(String::new());
        lines.push(format!("{:<24} {:>12}", "Stage", "Mean (ms)"));
        lines.push("-".repeat(40));
        for (stage, mean) in self.mean_durations() {
            lines.push(format!("{:<24} {:>10.3}ms", stage.label(), duration_ms(mean)));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(stage: Stage, ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            stage,
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn run(rectify_ms: u64, blur_ms: u64) -> PipelineDiagnostics {
        PipelineDiagnostics {
            stages: vec![
                stage(
                    Stage::Rectify,
                    rectify_ms,
                    StageMetrics::Rectify {
                        marker_count: 4,
                        success: true,
                        width: 600,
                        height: 350,
                    },
                ),
                stage(
                    Stage::Blur,
                    blur_ms,
                    StageMetrics::Blur {
                        kernel: 3,
                        sigma: Some(0.8),
                    },
                ),
            ],
            total_duration: Duration::from_millis(rectify_ms + blur_ms),
            summary: PipelineSummary {
                image_width: 800,
                image_height: 600,
                rectified: true,
                region_count: 1,
                polyline_count: 1,
                final_point_count: 40,
            },
        }
    }

    fn passthrough_run(ms: u64) -> PipelineDiagnostics {
        PipelineDiagnostics {
            stages: vec![stage(
                Stage::Rectify,
                ms,
                StageMetrics::Rectify {
                    marker_count: 3,
                    success: false,
                    width: 800,
                    height: 600,
                },
            )],
            total_duration: Duration::from_millis(ms),
            summary: PipelineSummary {
                image_width: 800,
                image_height: 600,
                rectified: false,
                region_count: 0,
                polyline_count: 0,
                final_point_count: 0,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let start = clock.now();
        let a = clock.elapsed(&start);
        let b = clock.elapsed(&start);
        assert!(b >= a);
    }

    #[test]
    fn count_nonzero_works() {
        let mut img = image::GrayImage::new(10, 10);
        for i in 0..5 {
            img.put_pixel(i, 0, image::Luma([1 + u8::try_from(i).unwrap()]));
        }
        assert_eq!(count_nonzero(&img), 5);
    }

    #[test]
    fn contour_stats_empty() {
        let stats = contour_stats(&[]);
        assert_eq!((stats.total, stats.min, stats.max), (0, 0, 0));
        assert!(stats.mean.abs() < f64::EPSILON);
    }

    #[test]
    fn contour_stats_computes() {
        let line = |n: u32| {
            Polyline::new(
                (0..n)
                    .map(|i| crate::Point::new(f64::from(i), 0.0))
                    .collect(),
            )
        };
        let stats = contour_stats(&[line(2), line(4)]);
        assert_eq!((stats.total, stats.min, stats.max), (6, 2, 4));
        assert!((stats.mean - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = run(10, 20).report();
        assert!(report.contains("Rectify"));
        assert!(report.contains("Blur"));
        assert!(report.contains("4 markers -> 600x350"));
        assert!(report.contains("rectified"));
    }

    #[test]
    fn diagnostics_serde_round_trip() {
        let diag = run(10, 20);
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_duration, diag.total_duration);
        assert_eq!(back.stages.len(), 2);
        assert_eq!(back.stages[1].metrics, diag.stages[1].metrics);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"stage":"blur","duration":-1.0,"metrics":{"Blur":{"kernel":1,"sigma":null}}}"#;
        assert!(serde_json::from_str::<StageDiagnostics>(json).is_err());
    }

    #[test]
    fn stage_lookup() {
        let diag = passthrough_run(5);
        assert!(diag.stage(Stage::Rectify).is_some());
        assert!(diag.stage(Stage::Blur).is_none());
    }

    #[test]
    fn collector_starts_empty() {
        let collector = TimingCollector::new();
        assert!(collector.is_empty());
        assert!(collector.total_stats().is_none());
        assert!(collector.mean_durations().is_empty());
        assert!(collector.report().contains("No runs recorded"));
    }

    #[test]
    fn collector_means_are_sorted_slowest_first() {
        let mut collector = TimingCollector::new();
        collector.record(run(10, 30));
        collector.record(run(20, 50));
        assert_eq!(collector.len(), 2);

        let means = collector.mean_durations();
        assert_eq!(
            means,
            vec![
                (Stage::Blur, Duration::from_millis(40)),
                (Stage::Rectify, Duration::from_millis(15)),
            ]
        );

        let (min, mean, max) = collector.total_stats().unwrap();
        assert_eq!(min, Duration::from_millis(40));
        assert_eq!(mean, Duration::from_millis(55));
        assert_eq!(max, Duration::from_millis(70));
    }

    #[test]
    fn collector_averages_stages_over_runs_they_ran_in() {
        let mut collector = TimingCollector::new();
        collector.record(run(10, 30));
        collector.record(passthrough_run(30));
        let means: BTreeMap<Stage, Duration> = collector.mean_durations().into_iter().collect();
        assert_eq!(means[&Stage::Rectify], Duration::from_millis(20));
        assert_eq!(means[&Stage::Blur], Duration::from_millis(30));
        assert!(collector.report().contains("Passthrough runs: 1"));
    }

    #[test]
    fn collector_reset_forgets_runs() {
        let mut collector = TimingCollector::new();
        collector.record(run(1, 1));
        collector.reset();
        assert!(collector.is_empty());
        assert!(collector.runs().is_empty());
    }
}
