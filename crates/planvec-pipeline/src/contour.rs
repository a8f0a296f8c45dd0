//! Contour tracing: extract polylines from a binary region mask.
//!
//! [`ContourTracer`] is the strategy trait and [`ContourTracerKind`]
//! selects an implementation at runtime. The kind is part of
//! [`PipelineConfig`](crate::PipelineConfig), so switching algorithms is
//! a configuration change rather than a code change.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::types::{Point, Polyline};

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourTracerKind {
    /// Sub-pixel iso-contours by marching squares.
    ///
    /// Closed boundaries repeat their first point at the end.
    #[default]
    MarchingSquares,

    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// Points lie on the integer pixel grid. Pixels above `level` are
    /// foreground.
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a single-channel mask and the iso level separating
/// foreground (`> level`) from background.
/// Output: one polyline per boundary.
pub trait ContourTracer {
    /// Trace contours in `mask` at `level`.
    fn trace(&self, mask: &GrayImage, level: f64) -> Vec<Polyline>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage, level: f64) -> Vec<Polyline> {
        let contours = match *self {
            Self::MarchingSquares => crate::marching_squares::find_contours(mask, level),
            Self::BorderFollowing => trace_border_following(mask, level),
        };
        tracing::debug!(tracer = ?self, contours = contours.len(), "traced contours");
        contours
    }
}

/// Suzuki-Abe border following on the pixels above `level`.
fn trace_border_following(mask: &GrayImage, level: f64) -> Vec<Polyline> {
    let mut binary = mask.clone();
    for pixel in binary.pixels_mut() {
        *pixel = if f64::from(pixel.0[0]) > level {
            Luma([255])
        } else {
            Luma([0])
        };
    }

    imageproc::contours::find_contours::<u32>(&binary)
        .into_iter()
        .filter(|c| c.points.len() >= 2)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Polyline::new(points)
        })
        .collect()
}

/// Drop contours with fewer than `min_vertices` points.
///
/// Short contours are almost always sensor noise or specks that survived
/// region filtering.
#[must_use = "returns the surviving contours"]
pub fn filter_by_length(contours: Vec<Polyline>, min_vertices: usize) -> Vec<Polyline> {
    let before = contours.len();
    let kept: Vec<Polyline> = contours
        .into_iter()
        .filter(|c| c.len() >= min_vertices)
        .collect();
    tracing::debug!(before, after = kept.len(), min_vertices, "filtered contours");
    kept
}
