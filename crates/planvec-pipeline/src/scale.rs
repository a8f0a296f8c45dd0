//! Physical units and pixel-to-physical scaling.
//!
//! The rectified frame is a rectangle of known pixel size; the cut sheet
//! is a rectangle of known physical size. Polylines are scaled uniformly
//! by the largest factor that fits the pixel rectangle inside the
//! physical one, so shapes are never distorted.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point, Polyline};

/// Centimetres per inch.
pub const CM_PER_INCH: f64 = 2.54;

/// Points (the unit of stroke widths) per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Convert centimetres to inches.
#[must_use]
pub fn cm_to_inches(cm: f64) -> f64 {
    cm / CM_PER_INCH
}

/// Convert inches to centimetres.
#[must_use]
pub fn inches_to_cm(inches: f64) -> f64 {
    inches * CM_PER_INCH
}

/// Unit of a physical length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Centimetres.
    #[default]
    Centimeters,
    /// Inches.
    Inches,
    /// Millimetres.
    Millimeters,
}

impl LengthUnit {
    /// Unit suffix as used in SVG and CSS lengths.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Centimeters => "cm",
            Self::Inches => "in",
            Self::Millimeters => "mm",
        }
    }

    /// Length of one of this unit in centimetres.
    const fn in_cm(self) -> f64 {
        match self {
            Self::Centimeters => 1.0,
            Self::Inches => CM_PER_INCH,
            Self::Millimeters => 0.1,
        }
    }

    /// Length of `points` typographic points in this unit.
    #[must_use]
    pub fn from_points(self, points: f64) -> f64 {
        Self::Inches.convert(points / POINTS_PER_INCH, self)
    }

    /// Convert `value` from this unit to `target`.
    #[must_use]
    pub fn convert(self, value: f64, target: Self) -> f64 {
        if self == target {
            return value;
        }
        value * self.in_cm() / target.in_cm()
    }
}

impl std::fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Size of the physical output sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalSize {
    /// Sheet width.
    pub width: f64,
    /// Sheet height.
    pub height: f64,
    /// Unit of `width` and `height`.
    #[serde(default)]
    pub unit: LengthUnit,
}

impl PhysicalSize {
    /// Create a new physical size.
    #[must_use]
    pub const fn new(width: f64, height: f64, unit: LengthUnit) -> Self {
        Self {
            width,
            height,
            unit,
        }
    }

    /// The same size expressed in `unit`.
    #[must_use]
    pub fn to_unit(self, unit: LengthUnit) -> Self {
        Self {
            width: self.unit.convert(self.width, unit),
            height: self.unit.convert(self.height, unit),
            unit,
        }
    }

    /// Width divided by height.
    #[must_use]
    pub fn aspect_ratio(self) -> f64 {
        self.width / self.height
    }
}

impl Default for PhysicalSize {
    /// The 20 cm x 14 cm template sheet.
    fn default() -> Self {
        Self::new(20.0, 14.0, LengthUnit::Centimeters)
    }
}

/// How pixel coordinates map onto the physical sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleMetadata {
    /// Pixel size of the rectified frame the polylines were traced in.
    pub source: Dimensions,
    /// Physical sheet size; polyline coordinates are in its unit.
    pub physical: PhysicalSize,
    /// Physical length of one pixel.
    pub units_per_pixel: f64,
    /// Stroke width for rendering, in the physical unit.
    pub line_width: f64,
}

impl ScaleMetadata {
    /// Fit `source` uniformly inside `physical`.
    #[must_use]
    pub fn fit(source: Dimensions, physical: PhysicalSize, line_width: f64) -> Self {
        let units_per_pixel = if source.width == 0 || source.height == 0 {
            0.0
        } else {
            (physical.width / f64::from(source.width))
                .min(physical.height / f64::from(source.height))
        };
        Self {
            source,
            physical,
            units_per_pixel,
            line_width,
        }
    }

    /// Physical extent actually covered by the scaled frame.
    #[must_use]
    pub fn drawing_size(&self) -> PhysicalSize {
        PhysicalSize::new(
            f64::from(self.source.width) * self.units_per_pixel,
            f64::from(self.source.height) * self.units_per_pixel,
            self.physical.unit,
        )
    }

    /// Map a pixel-space point into physical units.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.units_per_pixel, p.y * self.units_per_pixel)
    }
}

/// Scale every polyline from pixel space into physical units.
#[must_use = "returns the scaled polylines"]
pub fn scale_polylines(polylines: &[Polyline], scale: &ScaleMetadata) -> Vec<Polyline> {
    polylines
        .iter()
        .map(|pl| Polyline::new(pl.points().iter().map(|&p| scale.apply(p)).collect()))
        .collect()
}
