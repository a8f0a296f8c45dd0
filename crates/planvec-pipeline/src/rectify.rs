//! Fiducial rectification.
//!
//! Finds the four marker dots at the template corners, orders them and
//! warps the quadrilateral they span onto an upright rectangle of the
//! requested size.
//!
//! Anything other than exactly four markers is an expected condition in
//! live capture (a hand over the sheet, a marker out of frame). It is
//! reported as [`Rectification::Passthrough`] with the frame untouched,
//! never as an error.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use serde::{Deserialize, Serialize};

use crate::blur::gaussian_blur;
use crate::color::ColorRange;
use crate::grayscale::{ThresholdRange, binarize, to_intensity};
use crate::regions::{filter_regions, label_regions};
use crate::segment::{build_union_mask, keep_masked};
use crate::types::{Dimensions, Point};

/// Number of fiducial markers on a template.
pub const MARKER_COUNT: usize = 4;

/// Quadrilaterals with a smaller area (in square pixels) are treated as
/// degenerate.
const MIN_QUAD_AREA: f64 = 1.0;

/// Tuning for marker dot detection.
///
/// Marker dots are small, so these thresholds are much lower than the
/// ones used for drawn regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetection {
    /// Gaussian kernel applied to the marker intensity image.
    pub blur_kernel: u32,
    /// Intensity a blurred marker pixel must exceed.
    pub intensity_threshold: u8,
    /// Minimum marker area in pixels.
    pub area_threshold: u64,
}

impl Default for MarkerDetection {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            intensity_threshold: 10,
            area_threshold: 2,
        }
    }
}

/// Result of a rectification attempt.
#[derive(Debug, Clone)]
pub enum Rectification {
    /// Exactly four markers were found and the frame was warped.
    Warped {
        /// The rectified frame, sized to the requested target.
        image: RgbImage,
        /// Marker centroids in source coordinates, ordered top-left,
        /// top-right, bottom-right, bottom-left.
        corners: [Point; 4],
    },

    /// Rectification was not possible; the input frame, unmodified.
    Passthrough {
        /// The original frame.
        image: RgbImage,
        /// How many markers were found.
        marker_count: usize,
    },
}

impl Rectification {
    /// Whether the frame was rectified.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Warped { .. })
    }

    /// The rectified or passed-through frame.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        match self {
            Self::Warped { image, .. } | Self::Passthrough { image, .. } => image,
        }
    }

    /// Consume the result and return its frame.
    #[must_use]
    pub fn into_image(self) -> RgbImage {
        match self {
            Self::Warped { image, .. } | Self::Passthrough { image, .. } => image,
        }
    }
}

/// Find marker centroids in `image`.
///
/// Pixels outside the `fiducials` color ranges are blacked out, the rest
/// reduced to intensity, blurred and binarized, and the surviving
/// regions' centroids returned in label order.
#[must_use = "returns the marker centroids"]
pub fn detect_markers(
    image: &RgbImage,
    fiducials: &[ColorRange],
    params: &MarkerDetection,
) -> Vec<Point> {
    let mask = build_union_mask(image, fiducials);
    let markers_only = keep_masked(image, &mask);
    let intensity = gaussian_blur(&to_intensity(&markers_only), params.blur_kernel);
    let binary = binarize(
        &intensity,
        ThresholdRange {
            value: params.intensity_threshold,
            max: u8::MAX,
        },
    );
    let (labelled, regions) = label_regions(&binary);
    let (_, regions) = filter_regions(&labelled, &regions, params.area_threshold);

    let centroids: Vec<Point> = regions.iter().map(|r| r.centroid).collect();
    tracing::debug!(markers = centroids.len(), "detected fiducial markers");
    centroids
}

/// Sort four points clockwise (in image coordinates, y down) by their
/// angle around the mean of all four, starting at the top-left one.
///
/// Angles are `atan2(dy, dx)` in ascending order. Points at equal angles
/// are ordered by distance from the mean, then by `x`, then by `y`. The
/// cycle is then rotated to start at the point with the smallest
/// `x + y`, so the result is top-left, top-right, bottom-right,
/// bottom-left for any template tilted by less than 45 degrees.
#[must_use]
pub fn order_corners(points: [Point; 4]) -> [Point; 4] {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let centre = Point::new(cx, cy);

    let mut sorted = points;
    sorted.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a
            .total_cmp(&angle_b)
            .then_with(|| {
                a.distance_squared(centre)
                    .total_cmp(&b.distance_squared(centre))
            })
            .then_with(|| a.x.total_cmp(&b.x))
            .then_with(|| a.y.total_cmp(&b.y))
    });

    let start = (0..4)
        .min_by(|&i, &j| (sorted[i].x + sorted[i].y).total_cmp(&(sorted[j].x + sorted[j].y)))
        .unwrap_or(0);
    sorted.rotate_left(start);
    sorted
}

/// Shoelace area of a quadrilateral given in order.
fn quad_area(corners: &[Point; 4]) -> f64 {
    let twice: f64 = (0..4)
        .map(|i| {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            a.x.mul_add(b.y, -(b.x * a.y))
        })
        .sum();
    twice.abs() / 2.0
}

#[allow(clippy::cast_possible_truncation)]
fn as_control_point(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Rectify `image` onto a `target`-sized rectangle using the markers
/// matched by `fiducials`.
///
/// The ordered marker centroids map to `(0, 0)`, `(w, 0)`, `(w, h)` and
/// `(0, h)`. Samples outside the source frame are black.
#[must_use = "returns the rectification result"]
pub fn rectify(
    image: &RgbImage,
    fiducials: &[ColorRange],
    target: Dimensions,
    params: &MarkerDetection,
) -> Rectification {
    let markers = detect_markers(image, fiducials, params);
    let passthrough = |marker_count| Rectification::Passthrough {
        image: image.clone(),
        marker_count,
    };

    let Ok(found) = <[Point; MARKER_COUNT]>::try_from(markers.as_slice()) else {
        tracing::info!(
            markers = markers.len(),
            expected = MARKER_COUNT,
            "rectification failed, passing frame through"
        );
        return passthrough(markers.len());
    };

    let corners = order_corners(found);
    if quad_area(&corners) < MIN_QUAD_AREA {
        tracing::info!(?corners, "markers span a degenerate quadrilateral");
        return passthrough(MARKER_COUNT);
    }

    let w = f64::from(target.width);
    let h = f64::from(target.height);
    let destination = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];

    let Some(projection) = Projection::from_control_points(
        corners.map(as_control_point),
        destination.map(as_control_point),
    ) else {
        tracing::info!(?corners, "no projective transform fits the markers");
        return passthrough(MARKER_COUNT);
    };

    let mut warped = RgbImage::new(target.width, target.height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut warped,
    );

    tracing::debug!(
        width = target.width,
        height = target.height,
        "rectified frame"
    );
    Rectification::Warped {
        image: warped,
        corners,
    }
}
