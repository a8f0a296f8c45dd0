//! Pipeline stages and intermediate-image observation.
//!
//! A [`StageObserver`] is handed each raster intermediate as soon as the
//! stage producing it finishes. Closures are observers, and `()` is the
//! observer that ignores everything:
//!
//! ```rust
//! # use planvec_pipeline::observer::{Stage, StageImage, StageObserver};
//! let mut seen = Vec::new();
//! let mut record = |stage: Stage, _image: StageImage<'_>| seen.push(stage);
//! # let img = planvec_pipeline::GrayImage::new(1, 1);
//! record.observe(Stage::Binarize, StageImage::Gray(&img));
//! assert_eq!(seen, [Stage::Binarize]);
//! ```

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// A step of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Marker detection and perspective warp.
    Rectify,
    /// Gaussian blur of the rectified frame.
    Blur,
    /// Marker and helper-ink colors painted over.
    PaintOut,
    /// Reduction to intensity.
    Intensity,
    /// Thresholding to a binary image.
    Binarize,
    /// Region labelling and filtering.
    Regions,
    /// Contour tracing and length filtering.
    Contours,
    /// Douglas-Peucker simplification.
    Simplify,
    /// Scaling into physical units.
    Scale,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Self; 9] = [
        Self::Rectify,
        Self::Blur,
        Self::PaintOut,
        Self::Intensity,
        Self::Binarize,
        Self::Regions,
        Self::Contours,
        Self::Simplify,
        Self::Scale,
    ];

    /// Machine-readable name, e.g. `"paint_out"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rectify => "rectify",
            Self::Blur => "blur",
            Self::PaintOut => "paint_out",
            Self::Intensity => "intensity",
            Self::Binarize => "binarize",
            Self::Regions => "regions",
            Self::Contours => "contours",
            Self::Simplify => "simplify",
            Self::Scale => "scale",
        }
    }

    /// Human-readable label for reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rectify => "Rectify",
            Self::Blur => "Blur",
            Self::PaintOut => "Paint Out",
            Self::Intensity => "Intensity",
            Self::Binarize => "Binarize",
            Self::Regions => "Regions",
            Self::Contours => "Contour Tracing",
            Self::Simplify => "Simplification",
            Self::Scale => "Scale",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A borrowed raster intermediate.
#[derive(Debug, Clone, Copy)]
pub enum StageImage<'a> {
    /// A color frame.
    Color(&'a RgbImage),
    /// An intensity image or binary mask.
    Gray(&'a GrayImage),
}

impl StageImage<'_> {
    /// Width and height in pixels.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Color(img) => img.dimensions(),
            Self::Gray(img) => img.dimensions(),
        }
    }

    /// Owned copy, convenient for encoding.
    #[must_use]
    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            Self::Color(img) => DynamicImage::ImageRgb8((*img).clone()),
            Self::Gray(img) => DynamicImage::ImageLuma8((*img).clone()),
        }
    }
}

/// Receives intermediate images as the pipeline produces them.
pub trait StageObserver {
    /// Called once after `stage` finishes, with its output.
    fn observe(&mut self, stage: Stage, image: StageImage<'_>);
}

impl<F> StageObserver for F
where
    F: FnMut(Stage, StageImage<'_>),
{
    fn observe(&mut self, stage: Stage, image: StageImage<'_>) {
        self(stage, image);
    }
}

/// Ignores every stage.
impl StageObserver for () {
    fn observe(&mut self, _stage: Stage, _image: StageImage<'_>) {}
}
