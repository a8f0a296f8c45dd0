//! Polyline simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! Removes vertices that lie within `tolerance` pixels of the chord
//! segment between their retained neighbours. Endpoints are always kept, so a
//! closed contour (first point repeated as last) stays closed.

use crate::types::{Point, Polyline};

/// Simplify a single polyline.
///
/// A tolerance of zero or less returns the polyline unchanged.
/// Polylines with fewer than 3 points are also returned unchanged.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, tolerance: f64) -> Polyline {
    let points = polyline.points();
    if tolerance <= 0.0 || points.len() < 3 {
        return polyline.clone();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    let simplified: Vec<Point> = points
        .iter()
        .zip(&kept)
        .filter_map(|(&p, &k)| k.then_some(p))
        .collect();

    Polyline::new(simplified)
}

/// Simplify every polyline independently.
#[must_use = "returns the simplified polylines"]
pub fn simplify_paths(polylines: &[Polyline], tolerance: f64) -> Vec<Polyline> {
    let out: Vec<Polyline> = polylines.iter().map(|pl| simplify(pl, tolerance)).collect();
    tracing::debug!(
        before = polylines.iter().map(Polyline::len).sum::<usize>(),
        after = out.iter().map(Polyline::len).sum::<usize>(),
        tolerance,
        "simplified polylines"
    );
    out
}

fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for (i, &p) in points.iter().enumerate().take(end).skip(start + 1) {
        let d = segment_distance(p, points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Distance from `p` to the segment from `a` to `b`.
///
/// Points projecting beyond either end are measured to that end, and a
/// zero-length segment (the chord of a closed contour) degenerates to
/// the distance from `p` to `a`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let t = (p.x - a.x).mul_add(dx, (p.y - a.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);
    p.distance(Point::new(t.mul_add(dx, a.x), t.mul_add(dy, a.y)))
}
