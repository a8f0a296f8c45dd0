//! Synthetic template photographs for tests.
//!
//! A sheet of paper, rotated inside a gray frame, with red marker dots
//! at the corners of a 500 x 300 template rectangle. The paper extends
//! past the markers so a rectified frame is paper edge to edge.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point as Pixel;

use crate::types::Point;

pub const FRAME: (u32, u32) = (800, 600);
pub const TEMPLATE: (f64, f64) = (500.0, 300.0);
const PAPER_MARGIN: f64 = 20.0;
const MARKER_RADIUS: i32 = 8;

pub const BACKGROUND: Rgb<u8> = Rgb([90, 90, 90]);
pub const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
pub const INK: Rgb<u8> = Rgb([0, 0, 0]);
pub const HELPER_INK: Rgb<u8> = Rgb([100, 180, 40]);
pub const MARKER: Rgb<u8> = Rgb([220, 20, 20]);

/// What to draw on the synthetic sheet.
#[derive(Debug, Clone)]
pub struct TemplateDrawing {
    /// Clockwise rotation of the sheet in degrees.
    pub degrees: f64,
    /// How many of the four corner markers to draw.
    pub markers: usize,
    /// A closed 200 x 120 rectangle, 4 px thick, in black ink.
    pub outline: bool,
    /// A short green helper stroke.
    pub helper_stroke: bool,
}

impl Default for TemplateDrawing {
    fn default() -> Self {
        Self {
            degrees: 8.0,
            markers: 4,
            outline: true,
            helper_stroke: true,
        }
    }
}

/// Map template coordinates into the frame.
pub fn to_frame(u: f64, v: f64, degrees: f64) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = u - TEMPLATE.0 / 2.0;
    let dy = v - TEMPLATE.1 / 2.0;
    Point::new(
        f64::from(FRAME.0) / 2.0 + dx * cos - dy * sin,
        f64::from(FRAME.1) / 2.0 + dx * sin + dy * cos,
    )
}

/// Marker centres in the frame, clockwise from the template's top-left.
pub fn marker_centres(degrees: f64) -> [Point; 4] {
    let (w, h) = TEMPLATE;
    [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(u, v)| to_frame(u, v, degrees))
}

#[allow(clippy::cast_possible_truncation)]
fn pixel(p: Point) -> Pixel<i32> {
    Pixel::new(p.x.round() as i32, p.y.round() as i32)
}

fn quad(u0: f64, v0: f64, u1: f64, v1: f64, degrees: f64) -> [Pixel<i32>; 4] {
    [(u0, v0), (u1, v0), (u1, v1), (u0, v1)].map(|(u, v)| pixel(to_frame(u, v, degrees)))
}

pub fn synthetic_template(drawing: &TemplateDrawing) -> RgbImage {
    let deg = drawing.degrees;
    let (w, h) = TEMPLATE;
    let mut frame = RgbImage::from_pixel(FRAME.0, FRAME.1, BACKGROUND);

    let m = PAPER_MARGIN;
    draw_polygon_mut(&mut frame, &quad(-m, -m, w + m, h + m, deg), PAPER);

    if drawing.outline {
        draw_polygon_mut(&mut frame, &quad(150.0, 90.0, 350.0, 210.0, deg), INK);
        draw_polygon_mut(&mut frame, &quad(154.0, 94.0, 346.0, 206.0, deg), PAPER);
    }

    if drawing.helper_stroke {
        draw_polygon_mut(&mut frame, &quad(60.0, 240.0, 120.0, 246.0, deg), HELPER_INK);
    }

    for centre in marker_centres(deg).into_iter().take(drawing.markers) {
        let c = pixel(centre);
        draw_filled_circle_mut(&mut frame, (c.x, c.y), MARKER_RADIUS, MARKER);
    }

    frame
}
