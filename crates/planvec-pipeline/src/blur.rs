//! Gaussian blur for noise reduction before segmentation.
//!
//! Blur strength is configured as an odd kernel size, the way camera
//! tuning values are usually written down, and converted to a sigma
//! with the conventional `0.3 * ((k - 1) / 2 - 1) + 0.8` rule. A kernel
//! of 1 (or 0) disables blurring.
//!
//! [`gaussian_blur`] operates on a single channel.
//! [`gaussian_blur_rgb`] applies the same blur independently to each
//! R/G/B channel of a color frame.

use image::{GrayImage, RgbImage};

/// Sigma equivalent of an odd Gaussian kernel size.
///
/// Returns `None` for kernels of size 0 or 1, which mean "no blur".
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn kernel_sigma(kernel: u32) -> Option<f32> {
    if kernel <= 1 {
        return None;
    }
    let half = (kernel as f32 - 1.0) * 0.5;
    Some(0.3f32.mul_add(half - 1.0, 0.8))
}

/// Apply Gaussian blur to a single-channel image.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, kernel: u32) -> GrayImage {
    match kernel_sigma(kernel) {
        Some(sigma) => imageproc::filter::gaussian_blur_f32(image, sigma),
        None => image.clone(),
    }
}

/// Apply Gaussian blur to an RGB image by blurring each channel
/// independently.
///
/// `imageproc::filter::gaussian_blur_f32` only accepts `GrayImage`, so
/// the frame is split into three single-channel images, blurred and
/// reassembled. Gaussian blur is linear and per-channel, so this equals
/// blurring in color space.
#[must_use = "returns the blurred RGB image"]
pub fn gaussian_blur_rgb(image: &RgbImage, kernel: u32) -> RgbImage {
    let Some(sigma) = kernel_sigma(kernel) else {
        return image.clone();
    };

    let (w, h) = (image.width(), image.height());

    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 3] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbImage::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}
