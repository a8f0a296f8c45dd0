//! Color segmentation: binary masks from HSV ranges, and painting
//! masked pixels.
//!
//! Masks are [`GrayImage`]s holding [`MASK_ON`] where a pixel matched
//! and [`MASK_OFF`] elsewhere. Every function here returns a new image
//! except [`white_to_black_in_place`], which classifies in place.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::color::{ColorRange, Hsv};

/// Mask value for a selected pixel.
pub const MASK_ON: u8 = 255;

/// Mask value for an unselected pixel.
pub const MASK_OFF: u8 = 0;

/// Build a mask selecting pixels whose HSV value lies within `range`.
#[must_use = "returns the mask"]
pub fn build_mask(image: &RgbImage, range: &ColorRange) -> GrayImage {
    build_union_mask(image, std::slice::from_ref(range))
}

/// Build a mask selecting pixels that lie within any of `ranges`.
///
/// An empty `ranges` slice selects nothing.
#[must_use = "returns the mask"]
pub fn build_union_mask(image: &RgbImage, ranges: &[ColorRange]) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let hsv = Hsv::from_rgb(image.get_pixel(x, y).0);
        if ranges.iter().any(|r| r.contains(hsv)) {
            Luma([MASK_ON])
        } else {
            Luma([MASK_OFF])
        }
    })
}

/// Return a copy of `image` with every masked pixel set to `color`.
///
/// # Panics
///
/// Panics if `mask` and `image` differ in size.
#[must_use = "returns the painted image"]
pub fn paint_masked(image: &RgbImage, mask: &GrayImage, color: Rgb<u8>) -> RgbImage {
    assert_eq!(
        image.dimensions(),
        mask.dimensions(),
        "mask must match image size"
    );
    let mut out = image.clone();
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        if m.0[0] != MASK_OFF {
            *pixel = color;
        }
    }
    out
}

/// Return a copy of `image` keeping only masked pixels; the rest become
/// black.
///
/// # Panics
///
/// Panics if `mask` and `image` differ in size.
#[must_use = "returns the filtered image"]
pub fn keep_masked(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    assert_eq!(
        image.dimensions(),
        mask.dimensions(),
        "mask must match image size"
    );
    let mut out = image.clone();
    for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == MASK_OFF {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    out
}

/// Swap selected and unselected pixels.
#[must_use = "returns the inverted mask"]
pub fn invert_mask(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    image::imageops::invert(&mut out);
    out
}

/// Set every pixel brighter than `threshold` to black, in place.
///
/// Brightness is the luma of the pixel. This is the one segmentation
/// routine that mutates its input.
pub fn white_to_black_in_place(image: &mut RgbImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        if crate::grayscale::luma(*pixel) > threshold {
            *pixel = Rgb([0, 0, 0]);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn red() -> ColorRange {
        ColorRange::new([0, 71, 71], [5, 255, 255]).unwrap()
    }

    fn green() -> ColorRange {
        ColorRange::new([40, 80, 80], [80, 255, 255]).unwrap()
    }

    /// Left half red, right half green, on a 10x4 canvas.
    fn red_green() -> RgbImage {
        RgbImage::from_fn(10, 4, |x, _| {
            if x < 5 {
                Rgb([220, 20, 20])
            } else {
                Rgb([20, 200, 20])
            }
        })
    }

    fn count_on(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] == MASK_ON).count()
    }

    #[test]
    fn mask_selects_only_matching_pixels() {
        let mask = build_mask(&red_green(), &red());
        assert_eq!(count_on(&mask), 20);
        assert_eq!(mask.get_pixel(0, 0).0[0], MASK_ON);
        assert_eq!(mask.get_pixel(9, 0).0[0], MASK_OFF);
    }

    #[test]
    fn union_mask_is_logical_or() {
        let mask = build_union_mask(&red_green(), &[red(), green()]);
        assert_eq!(count_on(&mask), 40);
    }

    #[test]
    fn union_of_nothing_is_empty() {
        let mask = build_union_mask(&red_green(), &[]);
        assert_eq!(count_on(&mask), 0);
    }

    #[test]
    fn painting_out_a_range_leaves_nothing_to_select() {
        let image = red_green();
        let range = red();
        let mask = build_mask(&image, &range);
        let painted = paint_masked(&image, &mask, Rgb([255, 255, 255]));
        assert_eq!(count_on(&build_mask(&painted, &range)), 0);
    }

    #[test]
    fn paint_masked_does_not_touch_input() {
        let image = red_green();
        let mask = build_mask(&image, &red());
        let painted = paint_masked(&image, &mask, Rgb([1, 2, 3]));
        assert_eq!(image, red_green());
        assert_eq!(painted.get_pixel(0, 0), &Rgb([1, 2, 3]));
        assert_eq!(painted.get_pixel(9, 0), &Rgb([20, 200, 20]));
    }

    #[test]
    fn keep_masked_blacks_out_the_rest() {
        let image = red_green();
        let kept = keep_masked(&image, &build_mask(&image, &green()));
        assert_eq!(kept.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(kept.get_pixel(9, 3), &Rgb([20, 200, 20]));
    }

    #[test]
    fn invert_mask_swaps_values() {
        let mask = build_mask(&red_green(), &red());
        let inverted = invert_mask(&mask);
        assert_eq!(inverted.get_pixel(0, 0).0[0], MASK_OFF);
        assert_eq!(inverted.get_pixel(9, 0).0[0], MASK_ON);
    }

    #[test]
    fn white_to_black_mutates_in_place() {
        let mut image = RgbImage::from_fn(4, 1, |x, _| {
            if x < 2 {
                Rgb([250, 250, 250])
            } else {
                Rgb([30, 30, 30])
            }
        });
        white_to_black_in_place(&mut image, 100);
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(3, 0), &Rgb([30, 30, 30]));
    }

    #[test]
    #[should_panic(expected = "mask must match image size")]
    fn mismatched_mask_is_a_contract_violation() {
        let image = red_green();
        let _ = paint_masked(&image, &GrayImage::new(3, 3), Rgb([0, 0, 0]));
    }
}
