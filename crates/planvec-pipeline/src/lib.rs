//! planvec-pipeline: Pure image processing pipeline (sans-IO).
//!
//! Turns a photograph of a drawing template into laser-cutter polylines
//! through:
//! rectify -> blur -> paint out -> intensity -> binarize -> regions ->
//! contour tracing -> simplification -> scaling.
//!
//! Input frames are [`RgbImage`]s with channels in R, G, B order; the
//! pipeline never guesses channel order. Frames in which exactly four
//! fiducial markers cannot be found are not errors: they come back
//! untouched as [`Outcome::Passthrough`].
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! images and returns structured data. Reading files, writing SVG and
//! driving a capture loop live in the `planvec` binary and
//! `planvec-export`.

pub mod blur;
pub mod color;
pub mod config;
pub mod contour;
pub mod diagnostics;
pub mod frame_slot;
pub mod grayscale;
pub mod marching_squares;
pub mod observer;
pub mod pipeline;
pub mod rectify;
pub mod regions;
pub mod scale;
pub mod segment;
pub mod simplify;
pub mod types;

#[cfg(test)]
mod testing;

pub use color::{ColorRange, ColorRangeError, ColorRangeTable, Hsv};
pub use config::PipelineConfig;
pub use contour::{ContourTracer, ContourTracerKind};
pub use diagnostics::{
    Clock, PipelineDiagnostics, PipelineSummary, StageDiagnostics, StageMetrics, SystemClock,
    TimingCollector,
};
pub use frame_slot::FrameSlot;
pub use grayscale::{ThresholdRange, decode_rgb};
pub use observer::{Stage, StageImage, StageObserver};
pub use pipeline::Pipeline;
pub use rectify::MarkerDetection;
pub use regions::Region;
pub use scale::{LengthUnit, PhysicalSize, ScaleMetadata};
pub use types::{
    Dimensions, GrayImage, Outcome, PipelineError, Point, Polyline, RgbImage, VectorOutput,
};

use crate::pipeline::{PipelineStage, Rectify};

/// Times each stage, hands its raster to the observer and records its
/// diagnostics.
struct Recorder<'a, C: Clock, O: StageObserver> {
    clock: &'a C,
    observer: &'a mut O,
    stages: Vec<StageDiagnostics>,
}

impl<C: Clock, O: StageObserver> Recorder<'_, C, O> {
    fn step<S: PipelineStage>(&mut self, advance: impl FnOnce() -> S) -> S {
        let start = self.clock.now();
        let stage = advance();
        let duration = self.clock.elapsed(&start);

        if let Some(image) = stage.image() {
            self.observer.observe(S::STAGE, image);
        }
        self.stages.push(StageDiagnostics {
            stage: S::STAGE,
            duration,
            metrics: stage.metrics(),
        });
        stage
    }

    fn finish(self, run_start: &C::Instant, summary: PipelineSummary) -> PipelineDiagnostics {
        PipelineDiagnostics {
            stages: self.stages,
            total_duration: self.clock.elapsed(run_start),
            summary,
        }
    }
}

/// Run the full pipeline with an injected clock and stage observer.
///
/// `observer` receives every raster intermediate (rectified frame
/// through region mask) as soon as it is produced. Observation time is
/// not counted in the stage durations.
///
/// # Pipeline steps
///
/// 1. Rectify against the fiducial (`"red"`) subset of `table`; on
///    failure stop with [`Outcome::Passthrough`]
/// 2. Gaussian blur
/// 3. Paint every range of `table` over with the paper color
/// 4. Reduce to intensity
/// 5. Binarize
/// 6. Label regions, drop the boundary artifact and small regions
/// 7. Trace contours at level 0 and drop short ones
/// 8. Douglas-Peucker simplification
/// 9. Scale into the physical output unit
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
/// No stage runs in that case.
pub fn run_with<C: Clock, O: StageObserver>(
    frame: RgbImage,
    config: &PipelineConfig,
    table: &ColorRangeTable,
    clock: &C,
    observer: &mut O,
) -> Result<(Outcome, PipelineDiagnostics), PipelineError> {
    let run_start = clock.now();
    let source = Dimensions::of(&frame);
    let pending = Pipeline::new(frame, config.clone(), table.clone())?;

    let mut recorder = Recorder {
        clock,
        observer,
        stages: Vec::new(),
    };

    let rectified = match recorder.step(|| pending.rectify()) {
        Rectify::Rectified(rectified) => rectified,
        Rectify::Passthrough(passthrough) => {
            let diagnostics = recorder.finish(
                &run_start,
                PipelineSummary {
                    image_width: source.width,
                    image_height: source.height,
                    rectified: false,
                    region_count: 0,
                    polyline_count: 0,
                    final_point_count: 0,
                },
            );
            return Ok((Outcome::Passthrough(passthrough.into_frame()), diagnostics));
        }
    };

    let blurred = recorder.step(|| rectified.blur());
    let painted = recorder.step(|| blurred.paint_out());
    let reduced = recorder.step(|| painted.reduce());
    let binarized = recorder.step(|| reduced.binarize());
    let regions = recorder.step(|| binarized.extract_regions());
    let contours = recorder.step(|| regions.trace_contours());
    let simplified = recorder.step(|| contours.simplify());
    let scaled = recorder.step(|| simplified.scale());

    let region_count = scaled.region_count();
    let output = scaled.into_output();
    let diagnostics = recorder.finish(
        &run_start,
        PipelineSummary {
            image_width: source.width,
            image_height: source.height,
            rectified: true,
            region_count,
            polyline_count: output.polylines.len(),
            final_point_count: diagnostics::total_points(&output.polylines),
        },
    );

    tracing::debug!(
        polylines = diagnostics.summary.polyline_count,
        points = diagnostics.summary.final_point_count,
        "vectorized frame"
    );
    Ok((Outcome::Vectorized(output), diagnostics))
}

/// Run the full pipeline on one frame.
///
/// Equivalent to [`run_with`] with the system clock and no observer,
/// discarding the diagnostics.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
pub fn run(
    frame: RgbImage,
    config: &PipelineConfig,
    table: &ColorRangeTable,
) -> Result<Outcome, PipelineError> {
    run_with(frame, config, table, &SystemClock, &mut ()).map(|(outcome, _)| outcome)
}
