//! Image decoding, intensity reduction and binarization.
//!
//! Decoding accepts raw image bytes (PNG, JPEG, BMP, WebP) and yields
//! an RGB frame. Intensity uses the BT.601 luminance weights
//! `0.299*R + 0.587*G + 0.114*B`, the weighting the default threshold
//! was tuned against.

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Decode raw image bytes into an RGB frame.
///
/// Alpha, if present, is dropped.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// BT.601 luma of one RGB pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn luma(Rgb([r, g, b]): Rgb<u8>) -> u8 {
    // Fixed point weights summing to 1000; max is 255_000 / 1000.
    let sum = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((sum + 500) / 1000) as u8
}

/// Reduce an RGB image to single-channel intensity.
#[must_use = "returns the intensity image"]
pub fn to_intensity(image: &RgbImage) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| Luma([luma(*image.get_pixel(x, y))]))
}

/// Binarization threshold: pixels strictly brighter than `value`
/// become `max`, all others become 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRange {
    /// Pixels must exceed this intensity to be foreground.
    pub value: u8,
    /// Intensity assigned to foreground pixels. Must be non-zero.
    pub max: u8,
}

impl Default for ThresholdRange {
    fn default() -> Self {
        Self {
            value: 100,
            max: 255,
        }
    }
}

/// Binarize an intensity image.
#[must_use = "returns the binary image"]
pub fn binarize(image: &GrayImage, threshold: ThresholdRange) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold.value {
            threshold.max
        } else {
            0
        };
    }
    out
}
