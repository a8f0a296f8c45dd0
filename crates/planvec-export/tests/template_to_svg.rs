//! Integration test: photograph a synthetic drawing template, run it
//! through the full pipeline and export the cut file.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point as Pixel;
use planvec_pipeline::{
    ColorRangeTable, Dimensions, LengthUnit, Outcome, PhysicalSize, PipelineConfig,
};

const PAPER: Rgb<u8> = Rgb([250, 250, 245]);
const INK: Rgb<u8> = Rgb([20, 20, 30]);
const MARKER: Rgb<u8> = Rgb([210, 25, 30]);

/// Template-to-frame transform: 500 x 300 template rotated by `deg`
/// and centred in an 800 x 600 frame.
fn to_frame(u: f64, v: f64, deg: f64) -> Pixel<i32> {
    let (sin, cos) = deg.to_radians().sin_cos();
    let (dx, dy) = (u - 250.0, v - 150.0);
    #[allow(clippy::cast_possible_truncation)]
    Pixel::new(
        (400.0 + dx * cos - dy * sin).round() as i32,
        (300.0 + dx * sin + dy * cos).round() as i32,
    )
}

fn rect(u0: f64, v0: f64, u1: f64, v1: f64, deg: f64) -> [Pixel<i32>; 4] {
    [(u0, v0), (u1, v0), (u1, v1), (u0, v1)].map(|(u, v)| to_frame(u, v, deg))
}

/// A rectangle outline and a ring drawn on a tilted template.
fn photograph(deg: f64) -> RgbImage {
    let mut frame = RgbImage::from_pixel(800, 600, Rgb([70, 60, 50]));
    draw_polygon_mut(&mut frame, &rect(-25.0, -25.0, 525.0, 325.0, deg), PAPER);

    draw_polygon_mut(&mut frame, &rect(60.0, 80.0, 260.0, 220.0, deg), INK);
    draw_polygon_mut(&mut frame, &rect(64.0, 84.0, 256.0, 216.0, deg), PAPER);

    let centre = to_frame(380.0, 150.0, deg);
    draw_filled_circle_mut(&mut frame, (centre.x, centre.y), 50, INK);
    draw_filled_circle_mut(&mut frame, (centre.x, centre.y), 45, PAPER);

    for (u, v) in [(0.0, 0.0), (500.0, 0.0), (500.0, 300.0), (0.0, 300.0)] {
        let c = to_frame(u, v, deg);
        draw_filled_circle_mut(&mut frame, (c.x, c.y), 7, MARKER);
    }
    frame
}

fn config() -> PipelineConfig {
    PipelineConfig {
        rectify_size: Dimensions::new(600, 420),
        output_size: PhysicalSize::new(20.0, 14.0, LengthUnit::Centimeters),
        ..PipelineConfig::default()
    }
}

#[test]
fn tilted_template_exports_one_path_per_shape() {
    let config = config();
    let outcome =
        planvec_pipeline::run(photograph(-6.0), &config, &ColorRangeTable::default()).unwrap();
    let Outcome::Vectorized(output) = outcome else {
        panic!("template should rectify");
    };
    assert_eq!(output.polylines.len(), 2);

    for p in output.polylines.iter().flat_map(|pl| pl.points()) {
        assert!((0.0..=20.0).contains(&p.x), "x outside sheet: {p:?}");
        assert!((0.0..=14.0).contains(&p.y), "y outside sheet: {p:?}");
    }

    let config_json = serde_json::to_string(&config).unwrap();
    let svg = planvec_export::to_svg(
        &output,
        &planvec_export::SvgMetadata {
            title: Some("tilted-template"),
            config_json: Some(&config_json),
            ..planvec_export::SvgMetadata::default()
        },
    );

    assert!(svg.contains(r#"width="20cm""#));
    assert!(svg.contains(r#"height="14cm""#));
    assert!(svg.contains(r#"viewBox="0 0 20 14""#));
    assert_eq!(svg.matches("<path").count(), 2);
    assert!(svg.contains("<title>tilted-template</title>"));
    assert!(svg.trim_end().ends_with("</svg>"));
}

#[test]
fn hidden_marker_is_not_exported() {
    let mut frame = photograph(4.0);
    // Cover the bottom-right marker with a hand-coloured blob.
    let c = to_frame(500.0, 300.0, 4.0);
    draw_filled_circle_mut(&mut frame, (c.x, c.y), 15, Rgb([180, 140, 120]));

    let outcome = planvec_pipeline::run(frame.clone(), &config(), &ColorRangeTable::default())
        .unwrap();
    match outcome {
        Outcome::Passthrough(image) => assert_eq!(image, frame),
        Outcome::Vectorized(_) => panic!("three markers must not vectorize"),
    }
}
