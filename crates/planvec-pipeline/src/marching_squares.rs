//! Sub-pixel iso-contour extraction by marching squares.
//!
//! Pixel centres sit on integer coordinates (`x` = column, `y` = row).
//! A pixel is *inside* when its value is strictly greater than `level`.
//! Each 2x2 cell of pixel centres contributes zero, one or two oriented
//! segments whose endpoints are linearly interpolated along the cell
//! edges. Every segment keeps the inside on the same side, so segments
//! chain head-to-tail across shared edges into contours.
//!
//! Contours that close on themselves repeat their first point at the
//! end. Contours that run into the image border stay open. Saddle cells
//! (diagonal corners inside) keep the inside corners disconnected.

use std::collections::{HashMap, HashSet};

use image::GrayImage;

use crate::types::{Point, Polyline};

/// A cell edge between two neighbouring pixel centres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Edge {
    /// Between `(row, col)` and `(row, col + 1)`.
    Horizontal(u32, u32),
    /// Between `(row, col)` and `(row + 1, col)`.
    Vertical(u32, u32),
}

/// Corner bit masks of a cell.
const TL: u8 = 1;
const TR: u8 = 2;
const BR: u8 = 4;
const BL: u8 = 8;

/// Which side of a cell an edge is on.
#[derive(Clone, Copy)]
enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    const fn edge(self, row: u32, col: u32) -> Edge {
        match self {
            Self::Top => Edge::Horizontal(row, col),
            Self::Bottom => Edge::Horizontal(row + 1, col),
            Self::Left => Edge::Vertical(row, col),
            Self::Right => Edge::Vertical(row, col + 1),
        }
    }
}

/// Oriented segments for a cell configuration.
fn cell_segments(case: u8) -> &'static [(Side, Side)] {
    use Side::{Bottom as B, Left as L, Right as R, Top as T};
    match case {
        1 => &[(T, L)],
        2 => &[(R, T)],
        3 => &[(R, L)],
        4 => &[(B, R)],
        5 => &[(T, L), (B, R)],
        6 => &[(B, T)],
        7 => &[(B, L)],
        8 => &[(L, B)],
        9 => &[(T, B)],
        10 => &[(R, T), (L, B)],
        11 => &[(R, B)],
        12 => &[(L, R)],
        13 => &[(T, R)],
        14 => &[(L, T)],
        _ => &[],
    }
}

/// Trace every iso-contour of `image` at `level`.
///
/// Images narrower or shorter than two pixels have no cells and yield
/// no contours. Output order follows the row-major position of each
/// contour's first segment.
#[must_use = "returns the traced contours"]
pub fn find_contours(image: &GrayImage, level: f64) -> Vec<Polyline> {
    let (w, h) = image.dimensions();
    if w < 2 || h < 2 {
        return Vec::new();
    }

    let value = |row: u32, col: u32| f64::from(image.get_pixel(col, row).0[0]);
    let inside = |row: u32, col: u32| value(row, col) > level;

    let mut segments: Vec<(Edge, Edge)> = Vec::new();
    for row in 0..h - 1 {
        for col in 0..w - 1 {
            let mut case = 0;
            if inside(row, col) {
                case |= TL;
            }
            if inside(row, col + 1) {
                case |= TR;
            }
            if inside(row + 1, col + 1) {
                case |= BR;
            }
            if inside(row + 1, col) {
                case |= BL;
            }
            for &(from, to) in cell_segments(case) {
                segments.push((from.edge(row, col), to.edge(row, col)));
            }
        }
    }

    let crossing = |edge: Edge| -> Point {
        let (row, col, next_row, next_col) = match edge {
            Edge::Horizontal(r, c) => (r, c, r, c + 1),
            Edge::Vertical(r, c) => (r, c, r + 1, c),
        };
        let a = value(row, col);
        let b = value(next_row, next_col);
        let t = (level - a) / (b - a);
        match edge {
            Edge::Horizontal(..) => Point::new(f64::from(col) + t, f64::from(row)),
            Edge::Vertical(..) => Point::new(f64::from(col), f64::from(row) + t),
        }
    };

    let starting_at: HashMap<Edge, usize> = segments
        .iter()
        .enumerate()
        .map(|(i, &(from, _))| (from, i))
        .collect();
    let ending_at: HashSet<Edge> = segments.iter().map(|&(_, to)| to).collect();

    let mut visited = vec![false; segments.len()];
    let mut contours = Vec::new();

    let follow = |first: usize, visited: &mut [bool]| -> Polyline {
        let mut points = vec![crossing(segments[first].0)];
        let mut current = first;
        loop {
            visited[current] = true;
            let to = segments[current].1;
            points.push(crossing(to));
            match starting_at.get(&to) {
                Some(&next) if !visited[next] => current = next,
                _ => break,
            }
        }
        points.dedup();
        Polyline::new(points)
    };

    // Open contours start at an edge nothing flows into; everything left
    // afterwards belongs to a closed loop.
    for i in 0..segments.len() {
        if !visited[i] && !ending_at.contains(&segments[i].0) {
            contours.push(follow(i, &mut visited));
        }
    }
    for i in 0..segments.len() {
        if !visited[i] {
            contours.push(follow(i, &mut visited));
        }
    }

    contours.retain(|c| c.len() >= 2);
    contours
}
