//! Connected-region labelling and filtering.
//!
//! Foreground is any non-zero pixel of a binary image. Components are
//! 4-connected: diagonal neighbours belong to different regions.
//!
//! Labels are numbered `1..=n` in the raster order of each region's
//! first pixel (top row first, then left to right), so the result only
//! depends on the image content. 0 is background.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::segment::{MASK_OFF, MASK_ON};
use crate::types::{Dimensions, Point};

/// Image of region labels; 0 is background.
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Axis-aligned bounding box in pixel indices.
///
/// `min_*` are inclusive and `max_*` exclusive, so the box of a single
/// pixel at `(r, c)` is `(r, c, r + 1, c + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// First row.
    pub min_row: u32,
    /// First column.
    pub min_col: u32,
    /// One past the last row.
    pub max_row: u32,
    /// One past the last column.
    pub max_col: u32,
}

impl BoundingBox {
    /// Number of pixels covered by the box.
    #[must_use]
    pub const fn area(&self) -> u64 {
        (self.max_row - self.min_row) as u64 * (self.max_col - self.min_col) as u64
    }
}

/// A labelled connected region and its geometric descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Label of the region in the accompanying [`LabelImage`].
    pub label: u32,
    /// Number of pixels in the region.
    pub area: u64,
    /// Bounding box of the region.
    pub bbox: BoundingBox,
    /// Mean pixel position (`x` = column, `y` = row).
    pub centroid: Point,
}

impl Region {
    /// Area of the bounding box.
    #[must_use]
    pub const fn bbox_area(&self) -> u64 {
        self.bbox.area()
    }
}

/// Running sums for one region while scanning.
struct Accumulator {
    area: u64,
    sum_x: u64,
    sum_y: u64,
    bbox: BoundingBox,
}

impl Accumulator {
    const fn new(x: u32, y: u32) -> Self {
        Self {
            area: 0,
            sum_x: 0,
            sum_y: 0,
            bbox: BoundingBox {
                min_row: y,
                min_col: x,
                max_row: y + 1,
                max_col: x + 1,
            },
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.sum_x += u64::from(x);
        self.sum_y += u64::from(y);
        self.bbox.min_row = self.bbox.min_row.min(y);
        self.bbox.min_col = self.bbox.min_col.min(x);
        self.bbox.max_row = self.bbox.max_row.max(y + 1);
        self.bbox.max_col = self.bbox.max_col.max(x + 1);
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, label: u32) -> Region {
        let n = self.area as f64;
        Region {
            label,
            area: self.area,
            bbox: self.bbox,
            centroid: Point::new(self.sum_x as f64 / n, self.sum_y as f64 / n),
        }
    }
}

/// Label every 4-connected foreground component of `binary`.
///
/// Returns the label image and one [`Region`] per label, ordered by
/// label.
#[must_use = "returns the labelled image and its regions"]
pub fn label_regions(binary: &GrayImage) -> (LabelImage, Vec<Region>) {
    let raw = connected_components(binary, Connectivity::Four, Luma([0u8]));

    // imageproc's numbering is an implementation detail; renumber by
    // first appearance so labels are stable across library versions.
    let mut remap: Vec<u32> = Vec::new();
    let mut accumulators: Vec<Accumulator> = Vec::new();
    let (w, h) = raw.dimensions();
    let mut labelled = LabelImage::new(w, h);

    for (x, y, pixel) in raw.enumerate_pixels() {
        let old = pixel.0[0];
        if old == 0 {
            continue;
        }
        let idx = old as usize;
        if remap.len() <= idx {
            remap.resize(idx + 1, 0);
        }
        if remap[idx] == 0 {
            accumulators.push(Accumulator::new(x, y));
            remap[idx] = u32::try_from(accumulators.len()).unwrap_or(u32::MAX);
        }
        let label = remap[idx];
        labelled.put_pixel(x, y, Luma([label]));
        if let Some(acc) = accumulators.get_mut(label as usize - 1) {
            acc.add(x, y);
        }
    }

    let regions = accumulators
        .into_iter()
        .zip(1u32..)
        .map(|(acc, label)| acc.finish(label))
        .collect::<Vec<_>>();

    tracing::debug!(regions = regions.len(), "labelled regions");
    (labelled, regions)
}

/// Drop the image-boundary artifact and regions smaller than
/// `area_threshold`.
///
/// A region whose bounding box covers the whole image is the artifact
/// left by the background surrounding the drawing; it is always
/// dropped. Dropped regions are zeroed in the returned label image.
/// Surviving regions keep their order and labels.
#[must_use = "returns the filtered label image and regions"]
pub fn filter_regions(
    labelled: &LabelImage,
    regions: &[Region],
    area_threshold: u64,
) -> (LabelImage, Vec<Region>) {
    let full = Dimensions::of(labelled).pixel_count();
    let max_label = regions.iter().map(|r| r.label).max().unwrap_or(0) as usize;
    let mut keep = vec![false; max_label + 1];
    let mut kept = Vec::with_capacity(regions.len());

    for region in regions {
        if region.bbox_area() == full {
            tracing::debug!(label = region.label, "dropping image-boundary region");
            continue;
        }
        if region.area < area_threshold {
            continue;
        }
        keep[region.label as usize] = true;
        kept.push(*region);
    }

    let mut out = labelled.clone();
    for pixel in out.pixels_mut() {
        let label = pixel.0[0] as usize;
        if label != 0 && !keep.get(label).copied().unwrap_or(false) {
            pixel.0[0] = 0;
        }
    }

    tracing::debug!(
        before = regions.len(),
        after = kept.len(),
        area_threshold,
        "filtered regions"
    );
    (out, kept)
}

/// Binary mask of every labelled (non-zero) pixel.
#[must_use = "returns the mask"]
pub fn regions_to_mask(labelled: &LabelImage) -> GrayImage {
    let (w, h) = labelled.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        if labelled.get_pixel(x, y).0[0] == 0 {
            Luma([MASK_OFF])
        } else {
            Luma([MASK_ON])
        }
    })
}
