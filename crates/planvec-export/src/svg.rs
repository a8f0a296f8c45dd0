//! SVG export serializer.
//!
//! Converts a [`VectorOutput`] into an SVG string with one `<path>` per
//! polyline, using the [`svg`] crate for document construction, XML
//! escaping, and path data formatting.
//!
//! The document is sized in the physical unit of the output sheet
//! (`width="20cm"`), and the `viewBox` spans the same sheet in the same
//! unit, so one user unit is one centimetre (or inch, or millimetre).
//! Laser cutter software imports such files at true scale.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use planvec_pipeline::{Polyline, VectorOutput};

/// Namespace of the `<planvec:pipeline>` metadata element.
const METADATA_NAMESPACE: &str = "urn:planvec:pipeline:1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the capture's file name or the drawer's name.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`PipelineConfig`](planvec_pipeline::PipelineConfig),
    /// emitted inside `<metadata>` so a cut file records the settings
    /// that produced it.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a polyline.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for polylines with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use planvec_pipeline::{Point, Polyline};
/// use planvec_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(1.0, 2.0),
///     Point::new(3.5, 4.0),
/// ]);
/// assert_eq!(build_path_data(&polyline), "M1,2 L3.5,4");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    let Some((first, rest)) = points.split_first() else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Format a physical length with its unit suffix, e.g. `"20cm"`.
fn length(value: f64, symbol: &str) -> String {
    format!("{value}{symbol}")
}

/// Serialize a vector output into an SVG document string.
///
/// Every polyline with 2 or more points becomes a `<path>` with
/// `fill="none"`, a black stroke, and `stroke-width` set to the
/// output's line width. Shorter polylines are skipped.
///
/// # Examples
///
/// ```
/// use planvec_pipeline::{Dimensions, LengthUnit, PhysicalSize, Point, Polyline, ScaleMetadata, VectorOutput};
/// use planvec_export::{SvgMetadata, to_svg};
///
/// let output = VectorOutput {
///     polylines: vec![Polyline::new(vec![Point::new(1.0, 1.0), Point::new(4.0, 2.5)])],
///     scale: ScaleMetadata::fit(
///         Dimensions::new(200, 140),
///         PhysicalSize::new(20.0, 14.0, LengthUnit::Centimeters),
///         0.05,
///     ),
/// };
/// let metadata = SvgMetadata {
///     title: Some("team-3"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&output, &metadata);
/// assert!(svg.contains(r#"width="20cm""#));
/// assert!(svg.contains("<title>team-3</title>"));
/// assert!(svg.contains("M1,1 L4,2.5"));
/// ```
#[must_use]
pub fn to_svg(output: &VectorOutput, metadata: &SvgMetadata<'_>) -> String {
    let sheet = output.scale.physical;
    let symbol = sheet.unit.symbol();

    let mut doc = Document::new()
        .set("width", length(sheet.width, symbol))
        .set("height", length(sheet.height, symbol))
        .set("viewBox", (0.0, 0.0, sheet.width, sheet.height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("planvec:pipeline");
        pipeline_el.assign("xmlns:planvec", METADATA_NAMESPACE);
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    for polyline in &output.polylines {
        let d = build_path_data(polyline);
        if d.is_empty() {
            continue;
        }

        let path = Path::new()
            .set("d", d)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", output.scale.line_width);
        doc = doc.add(path);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
