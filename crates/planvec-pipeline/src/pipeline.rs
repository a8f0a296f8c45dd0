//! Incremental pipeline: advance stage by stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::run`], which executes everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use planvec_pipeline::{ColorRangeTable, PipelineConfig, PipelineError, RgbImage};
//! # use planvec_pipeline::pipeline::{Pipeline, Rectify};
//! # fn run(frame: RgbImage) -> Result<(), PipelineError> {
//! let pending = Pipeline::new(frame, PipelineConfig::default(), ColorRangeTable::default())?;
//! match pending.rectify() {
//!     Rectify::Rectified(rectified) => {
//!         let output = rectified
//!             .blur()
//!             .paint_out()
//!             .reduce()
//!             .binarize()
//!             .extract_regions()
//!             .trace_contours()
//!             .simplify()
//!             .scale()
//!             .into_output();
//!         println!("{} polylines", output.polylines.len());
//!     }
//!     Rectify::Passthrough(passthrough) => {
//!         println!("{} markers visible", passthrough.marker_count());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state. Only
//! what later stages need is carried forward, so earlier rasters are
//! freed as the pipeline advances.

use image::Rgb;

use crate::color::{ColorRange, ColorRangeTable};
use crate::config::PipelineConfig;
use crate::contour::{ContourTracer, filter_by_length};
use crate::diagnostics::{StageMetrics, contour_stats, count_nonzero, total_points};
use crate::observer::{Stage, StageImage};
use crate::regions::{Region, filter_regions, label_regions, regions_to_mask};
use crate::rectify::Rectification;
use crate::scale::{ScaleMetadata, scale_polylines};
use crate::types::{Dimensions, GrayImage, PipelineError, Point, Polyline, RgbImage, VectorOutput};

/// Iso level the region mask is traced at.
const CONTOUR_LEVEL: f64 = 0.0;

/// State shared by every stage of one run.
#[derive(Debug, Clone)]
struct Context {
    config: PipelineConfig,
    table: ColorRangeTable,
    source: Dimensions,
}

/// Entry point of the incremental pipeline.
#[derive(Debug)]
pub struct Pipeline;

impl Pipeline {
    /// Validate `config` and prepare to process `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// [`PipelineConfig::validate`]. Nothing has been computed yet.
    pub fn new(
        frame: RgbImage,
        config: PipelineConfig,
        table: ColorRangeTable,
    ) -> Result<Pending, PipelineError> {
        config.validate()?;
        Ok(Pending {
            ctx: Context {
                config,
                table,
                source: Dimensions::of(&frame),
            },
            frame,
        })
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .rectify() to continue"]
#[derive(Debug)]
pub struct Pending {
    ctx: Context,
    frame: RgbImage,
}

impl Pending {
    /// The source frame.
    #[must_use]
    pub const fn frame(&self) -> &RgbImage {
        &self.frame
    }

    /// Detect the fiducial markers and warp the frame onto the
    /// configured rectangle.
    pub fn rectify(self) -> Rectify {
        let fiducials: Vec<ColorRange> = self.ctx.table.fiducial_ranges();
        let result = crate::rectify::rectify(
            &self.frame,
            &fiducials,
            self.ctx.config.rectify_size,
            &self.ctx.config.markers,
        );
        match result {
            Rectification::Warped { image, corners } => Rectify::Rectified(Rectified {
                ctx: self.ctx,
                rectified: image,
                corners,
            }),
            Rectification::Passthrough {
                image,
                marker_count,
            } => Rectify::Passthrough(Passthrough {
                frame: image,
                marker_count,
            }),
        }
    }
}

// ───────────────────────── Stage 1: Rectify ──────────────────────────

/// Outcome of [`Pending::rectify`].
#[must_use = "match on the rectification outcome to continue"]
#[derive(Debug)]
pub enum Rectify {
    /// Four markers were found; processing can continue.
    Rectified(Rectified),
    /// Processing stops here; the frame is handed back.
    Passthrough(Passthrough),
}

/// The frame could not be rectified.
#[derive(Debug)]
pub struct Passthrough {
    frame: RgbImage,
    marker_count: usize,
}

impl Passthrough {
    /// The untouched source frame.
    #[must_use]
    pub const fn frame(&self) -> &RgbImage {
        &self.frame
    }

    /// Markers that were visible.
    #[must_use]
    pub const fn marker_count(&self) -> usize {
        self.marker_count
    }

    /// Consume the state, returning the source frame.
    #[must_use]
    pub fn into_frame(self) -> RgbImage {
        self.frame
    }
}

/// The frame, warped onto the configured rectangle.
#[must_use = "pipeline stages are consumed by advancing, call .blur() to continue"]
#[derive(Debug)]
pub struct Rectified {
    ctx: Context,
    rectified: RgbImage,
    corners: [Point; 4],
}

impl Rectified {
    /// The rectified frame.
    #[must_use]
    pub const fn rectified(&self) -> &RgbImage {
        &self.rectified
    }

    /// Marker centroids in source coordinates, clockwise from top-left.
    #[must_use]
    pub const fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    /// Advance to the blur stage.
    pub fn blur(self) -> Blurred {
        let blurred = crate::blur::gaussian_blur_rgb(&self.rectified, self.ctx.config.blur_kernel);
        Blurred {
            ctx: self.ctx,
            blurred,
        }
    }
}

// ───────────────────────── Stage 2: Blurred ──────────────────────────

/// The rectified frame after Gaussian blur.
#[must_use = "pipeline stages are consumed by advancing, call .paint_out() to continue"]
#[derive(Debug)]
pub struct Blurred {
    ctx: Context,
    blurred: RgbImage,
}

impl Blurred {
    /// The blurred frame.
    #[must_use]
    pub const fn blurred(&self) -> &RgbImage {
        &self.blurred
    }

    /// Paint every color in the range table over with the paper color,
    /// erasing markers and helper ink.
    pub fn paint_out(self) -> PaintedOut {
        let ranges = self.ctx.table.ranges();
        let mask = crate::segment::build_union_mask(&self.blurred, &ranges);
        let painted = crate::segment::paint_masked(
            &self.blurred,
            &mask,
            Rgb(self.ctx.config.paint_color),
        );
        PaintedOut {
            painted_pixels: count_nonzero(&mask),
            range_count: ranges.len(),
            ctx: self.ctx,
            painted,
        }
    }
}

// ───────────────────────── Stage 3: PaintedOut ───────────────────────

/// The frame with helper colors erased.
#[must_use = "pipeline stages are consumed by advancing, call .reduce() to continue"]
#[derive(Debug)]
pub struct PaintedOut {
    ctx: Context,
    painted: RgbImage,
    range_count: usize,
    painted_pixels: u64,
}

impl PaintedOut {
    /// The painted frame.
    #[must_use]
    pub const fn painted(&self) -> &RgbImage {
        &self.painted
    }

    /// Reduce to single-channel intensity.
    pub fn reduce(self) -> Reduced {
        Reduced {
            intensity: crate::grayscale::to_intensity(&self.painted),
            ctx: self.ctx,
        }
    }
}

// ───────────────────────── Stage 4: Reduced ──────────────────────────

/// Intensity image.
#[must_use = "pipeline stages are consumed by advancing, call .binarize() to continue"]
#[derive(Debug)]
pub struct Reduced {
    ctx: Context,
    intensity: GrayImage,
}

impl Reduced {
    /// The intensity image.
    #[must_use]
    pub const fn intensity(&self) -> &GrayImage {
        &self.intensity
    }

    /// Threshold the intensity image.
    pub fn binarize(self) -> Binarized {
        let binary = crate::grayscale::binarize(&self.intensity, self.ctx.config.threshold);
        Binarized {
            foreground_pixels: count_nonzero(&binary),
            ctx: self.ctx,
            binary,
        }
    }
}

// ───────────────────────── Stage 5: Binarized ────────────────────────

/// Binary image; bright paper is foreground.
#[must_use = "pipeline stages are consumed by advancing, call .extract_regions() to continue"]
#[derive(Debug)]
pub struct Binarized {
    ctx: Context,
    binary: GrayImage,
    foreground_pixels: u64,
}

impl Binarized {
    /// The binary image.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Label connected regions, drop the boundary artifact and small
    /// regions, and build a mask of the survivors.
    pub fn extract_regions(self) -> RegionsExtracted {
        let (labelled, regions) = label_regions(&self.binary);
        let (filtered, kept) =
            filter_regions(&labelled, &regions, self.ctx.config.area_threshold);
        RegionsExtracted {
            mask: regions_to_mask(&filtered),
            labelled_count: regions.len(),
            regions: kept,
            ctx: self.ctx,
        }
    }
}

// ───────────────────────── Stage 6: RegionsExtracted ─────────────────

/// Surviving regions and their mask.
#[must_use = "pipeline stages are consumed by advancing, call .trace_contours() to continue"]
#[derive(Debug)]
pub struct RegionsExtracted {
    ctx: Context,
    mask: GrayImage,
    regions: Vec<Region>,
    labelled_count: usize,
}

impl RegionsExtracted {
    /// The surviving regions.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Mask of every surviving region.
    #[must_use]
    pub const fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Trace the region mask and drop short contours.
    pub fn trace_contours(self) -> ContoursTraced {
        let traced = self.ctx.config.contour_tracer.trace(&self.mask, CONTOUR_LEVEL);
        let traced_count = traced.len();
        let contours = filter_by_length(traced, self.ctx.config.min_contour_vertices);
        ContoursTraced {
            region_count: self.regions.len(),
            ctx: self.ctx,
            contours,
            traced_count,
        }
    }
}

// ───────────────────────── Stage 7: ContoursTraced ───────────────────

/// Contours in rectified pixel coordinates.
#[must_use = "pipeline stages are consumed by advancing, call .simplify() to continue"]
#[derive(Debug)]
pub struct ContoursTraced {
    ctx: Context,
    contours: Vec<Polyline>,
    traced_count: usize,
    region_count: usize,
}

impl ContoursTraced {
    /// The surviving contours.
    #[must_use]
    pub fn contours(&self) -> &[Polyline] {
        &self.contours
    }

    /// Advance to the simplification stage.
    pub fn simplify(self) -> Simplified {
        let simplified =
            crate::simplify::simplify_paths(&self.contours, self.ctx.config.polygon_tolerance);
        Simplified {
            points_before: total_points(&self.contours),
            region_count: self.region_count,
            ctx: self.ctx,
            simplified,
        }
    }
}

// ───────────────────────── Stage 8: Simplified ───────────────────────

/// Simplified polylines, still in pixel coordinates.
#[must_use = "pipeline stages are consumed by advancing, call .scale() to continue"]
#[derive(Debug)]
pub struct Simplified {
    ctx: Context,
    simplified: Vec<Polyline>,
    points_before: usize,
    region_count: usize,
}

impl Simplified {
    /// The simplified polylines.
    #[must_use]
    pub fn simplified(&self) -> &[Polyline] {
        &self.simplified
    }

    /// Scale into the physical unit of the configured output size.
    pub fn scale(self) -> Scaled {
        let config = &self.ctx.config;
        let unit = config.output_size.unit;
        let scale = ScaleMetadata::fit(
            config.rectify_size,
            config.output_size,
            unit.from_points(config.line_width),
        );
        let polylines = scale_polylines(&self.simplified, &scale);
        Scaled {
            region_count: self.region_count,
            source: self.ctx.source,
            output: VectorOutput { polylines, scale },
        }
    }
}

// ───────────────────────── Stage 9: Scaled ───────────────────────────

/// Final state: physical-unit polylines.
#[must_use = "call .into_output() to extract the VectorOutput"]
#[derive(Debug)]
pub struct Scaled {
    output: VectorOutput,
    source: Dimensions,
    region_count: usize,
}

impl Scaled {
    /// The vector output.
    #[must_use]
    pub const fn output(&self) -> &VectorOutput {
        &self.output
    }

    /// Size of the source frame.
    #[must_use]
    pub const fn source(&self) -> Dimensions {
        self.source
    }

    /// Regions that produced the output.
    #[must_use]
    pub const fn region_count(&self) -> usize {
        self.region_count
    }

    /// Consume the pipeline, returning the vector output.
    #[must_use]
    pub fn into_output(self) -> VectorOutput {
        self.output
    }
}

// ──────────────────── PipelineStage trait ─────────────────────────────

/// Uniform view of a completed stage, used for diagnostics and
/// observation.
pub trait PipelineStage {
    /// Which stage produced this state.
    const STAGE: Stage;

    /// Stage-specific metrics.
    fn metrics(&self) -> StageMetrics;

    /// The raster this stage produced, if it produced one.
    fn image(&self) -> Option<StageImage<'_>> {
        None
    }
}

impl PipelineStage for Rectified {
    const STAGE: Stage = Stage::Rectify;

    fn metrics(&self) -> StageMetrics {
        let (width, height) = self.rectified.dimensions();
        StageMetrics::Rectify {
            marker_count: crate::rectify::MARKER_COUNT,
            success: true,
            width,
            height,
        }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        Some(StageImage::Color(&self.rectified))
    }
}

impl PipelineStage for Passthrough {
    const STAGE: Stage = Stage::Rectify;

    fn metrics(&self) -> StageMetrics {
        let (width, height) = self.frame.dimensions();
        StageMetrics::Rectify {
            marker_count: self.marker_count,
            success: false,
            width,
            height,
        }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        Some(StageImage::Color(&self.frame))
    }
}

impl PipelineStage for Rectify {
    const STAGE: Stage = Stage::Rectify;

    fn metrics(&self) -> StageMetrics {
        match self {
            Self::Rectified(s) => s.metrics(),
            Self::Passthrough(s) => s.metrics(),
        }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        match self {
            Self::Rectified(s) => s.image(),
            Self::Passthrough(s) => s.image(),
        }
    }
}

impl PipelineStage for Blurred {
    const STAGE: Stage = Stage::Blur;

    fn metrics(&self) -> StageMetrics {
        let kernel = self.ctx.config.blur_kernel;
        StageMetrics::Blur {
            kernel,
            sigma: crate::blur::kernel_sigma(kernel),
        }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        Some(StageImage::Color(&self.blurred))
    }
}

impl PipelineStage for PaintedOut {
    const STAGE: Stage = Stage::PaintOut;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::PaintOut {
            range_count: self.range_count,
            painted_pixels: self.painted_pixels,
        }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        Some(StageImage::Color(&self.painted))
    }
}

impl PipelineStage for Reduced {
    const STAGE: Stage = Stage::Intensity;

    fn metrics(&self) -> StageMetrics {
        let (width, height) = self.intensity.dimensions();
        StageMetrics::Intensity { width, height }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        Some(StageImage::Gray(&self.intensity))
    }
}

impl PipelineStage for Binarized {
    const STAGE: Stage = Stage::Binarize;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Binarize {
            threshold: self.ctx.config.threshold.value,
            foreground_pixels: self.foreground_pixels,
            total_pixels: Dimensions::of(&self.binary).pixel_count(),
        }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        Some(StageImage::Gray(&self.binary))
    }
}

impl PipelineStage for RegionsExtracted {
    const STAGE: Stage = Stage::Regions;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Regions {
            labelled: self.labelled_count,
            kept: self.regions.len(),
            area_threshold: self.ctx.config.area_threshold,
        }
    }

    fn image(&self) -> Option<StageImage<'_>> {
        Some(StageImage::Gray(&self.mask))
    }
}

impl PipelineStage for ContoursTraced {
    const STAGE: Stage = Stage::Contours;

    fn metrics(&self) -> StageMetrics {
        let stats = contour_stats(&self.contours);
        StageMetrics::ContourTracing {
            traced_count: self.traced_count,
            contour_count: self.contours.len(),
            total_point_count: stats.total,
            min_contour_points: stats.min,
            max_contour_points: stats.max,
            mean_contour_points: stats.mean,
        }
    }
}

impl PipelineStage for Simplified {
    const STAGE: Stage = Stage::Simplify;

    #[allow(clippy::cast_precision_loss)]
    fn metrics(&self) -> StageMetrics {
        let points_after = total_points(&self.simplified);
        let reduction_ratio = if self.points_before > 0 {
            1.0 - (points_after as f64 / self.points_before as f64)
        } else {
            0.0
        };
        StageMetrics::Simplification {
            tolerance: self.ctx.config.polygon_tolerance,
            polyline_count: self.simplified.len(),
            points_before: self.points_before,
            points_after,
            reduction_ratio,
        }
    }
}

impl PipelineStage for Scaled {
    const STAGE: Stage = Stage::Scale;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Scale {
            units_per_pixel: self.output.scale.units_per_pixel,
            unit: self.output.scale.physical.unit,
        }
    }
}
