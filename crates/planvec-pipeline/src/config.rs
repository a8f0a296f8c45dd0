//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::contour::ContourTracerKind;
use crate::grayscale::ThresholdRange;
use crate::rectify::MarkerDetection;
use crate::scale::PhysicalSize;
use crate::types::{Dimensions, PipelineError};

/// Long side of the rectified frame chosen by
/// [`PipelineConfig::with_output_size`].
pub const MAX_RECTIFY_PIXELS: u32 = 1920;

fn default_paint_color() -> [u8; 3] {
    [255, 255, 255]
}

/// Parameters for one pipeline run.
///
/// The core tuning fields are required when deserializing; a config file
/// missing any of them is rejected before any image is touched. The
/// remaining fields fall back to their defaults. Unknown keys are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pixel size of the rectified frame.
    pub rectify_size: Dimensions,

    /// Gaussian kernel applied to the rectified frame. Must be odd;
    /// 1 disables blurring.
    pub blur_kernel: u32,

    /// Binarization of the intensity image.
    pub threshold: ThresholdRange,

    /// Regions with fewer pixels are discarded as noise.
    pub area_threshold: u64,

    /// Contours with fewer points are discarded.
    pub min_contour_vertices: usize,

    /// Douglas-Peucker tolerance in pixels. 0 keeps every point.
    pub polygon_tolerance: f64,

    /// Stroke width of the output in points (1/72 inch).
    pub line_width: f64,

    /// Physical size of the cut sheet.
    pub output_size: PhysicalSize,

    /// Color that marker and helper-ink pixels are painted over with.
    /// Should be the paper color.
    #[serde(default = "default_paint_color")]
    pub paint_color: [u8; 3],

    /// Marker dot detection tuning.
    #[serde(default)]
    pub markers: MarkerDetection,

    /// Contour tracing algorithm.
    #[serde(default)]
    pub contour_tracer: ContourTracerKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rectify_size: Dimensions::new(MAX_RECTIFY_PIXELS, 1344),
            blur_kernel: 3,
            threshold: ThresholdRange::default(),
            area_threshold: 5000,
            min_contour_vertices: 100,
            polygon_tolerance: 1.0,
            line_width: 1.0,
            output_size: PhysicalSize::default(),
            paint_color: default_paint_color(),
            markers: MarkerDetection::default(),
            contour_tracer: ContourTracerKind::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON config and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigParse`] for malformed JSON or a
    /// missing required field, and [`PipelineError::InvalidConfig`] if
    /// a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the physical output size and derive a matching rectified
    /// frame: long side [`MAX_RECTIFY_PIXELS`], same aspect ratio.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn with_output_size(mut self, size: PhysicalSize) -> Self {
        let max = f64::from(MAX_RECTIFY_PIXELS);
        let short = |long: f64, other: f64| ((max * other / long).round() as u32).max(1);
        self.rectify_size = if size.width >= size.height {
            Dimensions::new(MAX_RECTIFY_PIXELS, short(size.width, size.height))
        } else {
            Dimensions::new(short(size.height, size.width), MAX_RECTIFY_PIXELS)
        };
        self.output_size = size;
        self
    }

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.rectify_size.width == 0 || self.rectify_size.height == 0 {
            return invalid(format!(
                "rectify_size must be non-zero, got {}x{}",
                self.rectify_size.width, self.rectify_size.height
            ));
        }
        if self.blur_kernel % 2 == 0 {
            return invalid(format!("blur_kernel must be odd, got {}", self.blur_kernel));
        }
        if self.markers.blur_kernel % 2 == 0 {
            return invalid(format!(
                "markers.blur_kernel must be odd, got {}",
                self.markers.blur_kernel
            ));
        }
        if self.threshold.max == 0 {
            return invalid("threshold.max must be non-zero".to_owned());
        }
        if !self.polygon_tolerance.is_finite() || self.polygon_tolerance < 0.0 {
            return invalid(format!(
                "polygon_tolerance must be finite and non-negative, got {}",
                self.polygon_tolerance
            ));
        }
        if !self.line_width.is_finite() || self.line_width <= 0.0 {
            return invalid(format!(
                "line_width must be finite and positive, got {}",
                self.line_width
            ));
        }
        let PhysicalSize { width, height, .. } = self.output_size;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return invalid(format!(
                "output_size must be finite and positive, got {width}x{height}"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::scale::LengthUnit;

    fn rejects(config: &PipelineConfig, field: &str) {
        match config.validate() {
            Err(PipelineError::InvalidConfig(msg)) => {
                assert!(msg.contains(field), "message {msg:?} lacks {field}");
            }
            other => panic!("expected InvalidConfig for {field}, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_field_tested_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.rectify_size, Dimensions::new(1920, 1344));
        assert_eq!(config.blur_kernel, 3);
        assert_eq!(config.threshold, ThresholdRange { value: 100, max: 255 });
        assert_eq!(config.area_threshold, 5000);
        assert_eq!(config.min_contour_vertices, 100);
        assert!((config.polygon_tolerance - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.output_size, PhysicalSize::default());
        assert_eq!(config.paint_color, [255, 255, 255]);
        assert_eq!(config.contour_tracer, ContourTracerKind::MarchingSquares);
        config.validate().unwrap();
    }

    #[test]
    fn default_rectify_size_matches_default_sheet() {
        let derived = PipelineConfig::default().with_output_size(PhysicalSize::default());
        assert_eq!(derived.rectify_size, PipelineConfig::default().rectify_size);
    }

    #[test]
    fn with_output_size_handles_portrait() {
        let config = PipelineConfig::default()
            .with_output_size(PhysicalSize::new(10.0, 20.0, LengthUnit::Centimeters));
        assert_eq!(config.rectify_size, Dimensions::new(960, 1920));
        assert_eq!(config.output_size.width, 10.0);
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let base = PipelineConfig::default();

        rejects(
            &PipelineConfig {
                rectify_size: Dimensions::new(0, 10),
                ..base.clone()
            },
            "rectify_size",
        );
        rejects(
            &PipelineConfig {
                blur_kernel: 4,
                ..base.clone()
            },
            "blur_kernel",
        );
        rejects(
            &PipelineConfig {
                threshold: ThresholdRange { value: 10, max: 0 },
                ..base.clone()
            },
            "threshold",
        );
        rejects(
            &PipelineConfig {
                polygon_tolerance: f64::NAN,
                ..base.clone()
            },
            "polygon_tolerance",
        );
        rejects(
            &PipelineConfig {
                line_width: 0.0,
                ..base.clone()
            },
            "line_width",
        );
        rejects(
            &PipelineConfig {
                output_size: PhysicalSize::new(-1.0, 5.0, LengthUnit::Inches),
                ..base
            },
            "output_size",
        );
    }

    #[test]
    fn serde_round_trip() {
        let config = PipelineConfig {
            contour_tracer: ContourTracerKind::BorderFollowing,
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn optional_fields_default_and_unknown_keys_are_ignored() {
        let json = r#"{
            "rectify_size": {"width": 600, "height": 350},
            "blur_kernel": 3,
            "threshold": {"value": 100, "max": 255},
            "area_threshold": 500,
            "min_contour_vertices": 10,
            "polygon_tolerance": 1.0,
            "line_width": 1.0,
            "output_size": {"width": 20.0, "height": 14.0},
            "camera_index": 2
        }"#;
        let config = PipelineConfig::from_json(json).unwrap();
        assert_eq!(config.rectify_size, Dimensions::new(600, 350));
        assert_eq!(config.output_size.unit, LengthUnit::Centimeters);
        assert_eq!(config.markers, MarkerDetection::default());
        assert_eq!(config.contour_tracer, ContourTracerKind::MarchingSquares);
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let json = r#"{ "blur_kernel": 3 }"#;
        assert!(matches!(
            PipelineConfig::from_json(json),
            Err(PipelineError::ConfigParse(_))
        ));
    }

    #[test]
    fn invalid_value_in_json_is_rejected() {
        let mut value = serde_json::to_value(PipelineConfig::default()).unwrap();
        value["blur_kernel"] = serde_json::json!(2);
        assert!(matches!(
            PipelineConfig::from_json(&value.to_string()),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
