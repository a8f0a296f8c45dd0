//! Shared types for the planvec image processing pipeline.

use serde::{Deserialize, Serialize};

use crate::color::ColorRangeError;
use crate::scale::ScaleMetadata;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can hand frames to the
/// pipeline without depending on `image` directly.
///
/// Channel order is always R, G, B.
pub use image::RgbImage;

/// A 2D point in image coordinates (or physical units after scaling).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (column, or distance from the left edge).
    pub x: f64,
    /// Vertical position (row, or distance from the top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// An ordered sequence of points: a traced contour, or after
/// simplification, a polyline ready for cutting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Whether the polyline ends where it starts (a closed contour).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.len() > 2 && self.first() == self.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an existing image.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Vector result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorOutput {
    /// Simplified polylines in physical units (see [`ScaleMetadata::physical`]).
    pub polylines: Vec<Polyline>,

    /// How pixel coordinates were mapped onto the physical output.
    pub scale: ScaleMetadata,
}

/// Result of running the pipeline on one frame.
///
/// Failing to find exactly four fiducial markers is not an error: the
/// frame is handed back untouched as [`Outcome::Passthrough`] so a live
/// display can keep showing the camera image.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Rectification succeeded and the frame was vectorized.
    Vectorized(VectorOutput),

    /// Rectification failed; the original frame, unmodified.
    Passthrough(RgbImage),
}

impl Outcome {
    /// Whether the frame was rectified and vectorized.
    #[must_use]
    pub const fn is_vectorized(&self) -> bool {
        matches!(self, Self::Vectorized(_))
    }

    /// The vector output, if rectification succeeded.
    #[must_use]
    pub const fn vector(&self) -> Option<&VectorOutput> {
        match self {
            Self::Vectorized(output) => Some(output),
            Self::Passthrough(_) => None,
        }
    }

    /// Consume the outcome, returning the vector output if there is one.
    #[must_use]
    pub fn into_vector(self) -> Option<VectorOutput> {
        match self {
            Self::Vectorized(output) => Some(output),
            Self::Passthrough(_) => None,
        }
    }
}

/// Errors that can occur before or during pipeline processing.
///
/// Geometric failure (wrong marker count) is deliberately absent: it is
/// reported through [`Outcome::Passthrough`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A color range was constructed with invalid bounds.
    #[error("invalid color range: {0}")]
    InvalidColorRange(#[from] ColorRangeError),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Pipeline configuration could not be parsed.
    #[error("failed to parse pipeline configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance_squared() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    // --- Polyline tests ---

    #[test]
    fn polyline_empty() {
        let pl = Polyline::new(vec![]);
        assert!(pl.is_empty());
        assert!(pl.first().is_none());
        assert!(pl.last().is_none());
        assert!(!pl.is_closed());
    }

    #[test]
    fn polyline_closed_when_endpoints_coincide() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ]);
        assert!(pl.is_closed());
    }

    #[test]
    fn polyline_open_when_endpoints_differ() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        assert!(!pl.is_closed());
    }

    // --- Dimensions tests ---

    #[test]
    fn dimensions_pixel_count() {
        assert_eq!(Dimensions::new(800, 600).pixel_count(), 480_000);
    }

    #[test]
    fn dimensions_of_image() {
        let img = GrayImage::new(17, 31);
        assert_eq!(Dimensions::of(&img), Dimensions::new(17, 31));
    }

    // --- Outcome tests ---

    #[test]
    fn passthrough_has_no_vector() {
        let outcome = Outcome::Passthrough(RgbImage::new(2, 2));
        assert!(!outcome.is_vectorized());
        assert!(outcome.vector().is_none());
        assert!(outcome.into_vector().is_none());
    }

    // --- PipelineError tests ---

    #[test]
    fn error_empty_input_display() {
        let err = PipelineError::EmptyInput;
        assert_eq!(err.to_string(), "input image data is empty");
    }

    #[test]
    fn error_invalid_config_display() {
        let err = PipelineError::InvalidConfig("blur_kernel must be odd".to_string());
        assert_eq!(
            err.to_string(),
            "invalid pipeline configuration: blur_kernel must be odd",
        );
    }

    // --- Serde round-trip tests ---

    #[test]
    fn polyline_serde_round_trip() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.5, 2.5),
            Point::new(3.0, 0.0),
        ]);
        let json = serde_json::to_string(&pl).unwrap();
        let deserialized: Polyline = serde_json::from_str(&json).unwrap();
        assert_eq!(pl, deserialized);
    }
}
