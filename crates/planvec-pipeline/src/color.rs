//! HSV color ranges and the named table of ranges used for marker
//! detection and helper-ink removal.
//!
//! Colors are compared in 8-bit HSV with the OpenCV channel domains:
//! hue in `0..=179` (degrees halved so it fits a byte), saturation and
//! value in `0..=255`. Red wraps past hue zero, so a red marker is
//! normally described by two ranges (`red_low` and `red_high`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Largest value of each HSV channel, in channel order.
pub const CHANNEL_MAX: [u8; 3] = [179, 255, 255];

/// Channel names in channel order, used in error messages.
const CHANNEL_NAMES: [&str; 3] = ["hue", "saturation", "value"];

/// An 8-bit HSV sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv(pub [u8; 3]);

impl Hsv {
    /// Convert an RGB sample to HSV.
    ///
    /// `V = max(R, G, B)`, `S = 255 * (V - min) / V` and hue is the
    /// usual hexcone angle halved, rounded to the nearest integer.
    #[must_use]
    #[allow(
        clippy::many_single_char_names,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let v = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = f32::from(v - min);

        let s = if v == 0 {
            0
        } else {
            (255.0 * delta / f32::from(v)).round() as u8
        };

        let h = if v == min {
            0.0
        } else {
            let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
            let degrees = if v == r {
                60.0 * (gf - bf) / delta
            } else if v == g {
                60.0f32.mul_add((bf - rf) / delta, 120.0)
            } else {
                60.0f32.mul_add((rf - gf) / delta, 240.0)
            };
            let degrees = if degrees < 0.0 {
                degrees + 360.0
            } else {
                degrees
            };
            degrees / 2.0
        };

        // 359.x degrees halves to 179.5+, which would round out of domain.
        let h = (h.round() as u8) % 180;
        Self([h, s, v])
    }

    /// Hue channel.
    #[must_use]
    pub const fn h(self) -> u8 {
        self.0[0]
    }

    /// Saturation channel.
    #[must_use]
    pub const fn s(self) -> u8 {
        self.0[1]
    }

    /// Value channel.
    #[must_use]
    pub const fn v(self) -> u8 {
        self.0[2]
    }
}

/// Errors from constructing a [`ColorRange`] with invalid bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorRangeError {
    /// A bound lies outside its channel's domain.
    #[error("{channel} bound {value} is outside 0..={max}")]
    OutOfDomain {
        /// Channel name.
        channel: &'static str,
        /// The offending bound.
        value: u8,
        /// Largest value the channel allows.
        max: u8,
    },

    /// A channel's low bound exceeds its high bound.
    #[error("{channel} low bound {low} exceeds high bound {high}")]
    Inverted {
        /// Channel name.
        channel: &'static str,
        /// Low bound.
        low: u8,
        /// High bound.
        high: u8,
    },
}

/// An inclusive box in HSV space.
///
/// Validated once in [`ColorRange::new`] and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawColorRange", into = "RawColorRange")]
pub struct ColorRange {
    low: Hsv,
    high: Hsv,
}

/// Unvalidated serde form of [`ColorRange`].
#[derive(Serialize, Deserialize)]
struct RawColorRange {
    low: [u8; 3],
    high: [u8; 3],
}

impl TryFrom<RawColorRange> for ColorRange {
    type Error = ColorRangeError;

    fn try_from(raw: RawColorRange) -> Result<Self, Self::Error> {
        Self::new(raw.low, raw.high)
    }
}

impl From<ColorRange> for RawColorRange {
    fn from(range: ColorRange) -> Self {
        Self {
            low: range.low.0,
            high: range.high.0,
        }
    }
}

impl ColorRange {
    /// Create a range from inclusive `low` and `high` HSV bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ColorRangeError::OutOfDomain`] if a bound exceeds its
    /// channel's maximum (see [`CHANNEL_MAX`]) and
    /// [`ColorRangeError::Inverted`] if `low > high` on any channel.
    pub fn new(low: [u8; 3], high: [u8; 3]) -> Result<Self, ColorRangeError> {
        for channel in 0..3 {
            let name = CHANNEL_NAMES[channel];
            let max = CHANNEL_MAX[channel];
            for value in [low[channel], high[channel]] {
                if value > max {
                    return Err(ColorRangeError::OutOfDomain {
                        channel: name,
                        value,
                        max,
                    });
                }
            }
            if low[channel] > high[channel] {
                return Err(ColorRangeError::Inverted {
                    channel: name,
                    low: low[channel],
                    high: high[channel],
                });
            }
        }
        Ok(Self {
            low: Hsv(low),
            high: Hsv(high),
        })
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn low(&self) -> Hsv {
        self.low
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn high(&self) -> Hsv {
        self.high
    }

    /// Whether every channel of `hsv` lies within the range.
    #[must_use]
    pub fn contains(&self, hsv: Hsv) -> bool {
        (0..3).all(|c| (self.low.0[c]..=self.high.0[c]).contains(&hsv.0[c]))
    }
}

/// Named mapping of color ranges.
///
/// Entries whose name contains `"red"` describe the fiducial markers;
/// the whole table describes helper ink (markers included) that is
/// painted out before binarization. Iteration is in name order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorRangeTable(BTreeMap<String, ColorRange>);

/// Substring marking a table entry as a fiducial range.
pub const FIDUCIAL_KEY: &str = "red";

impl ColorRangeTable {
    /// An empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Parse a table from a JSON object of `name -> {low, high}`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigParse`] for malformed JSON and
    /// [`PipelineError::InvalidColorRange`] for an entry whose bounds
    /// fail [`ColorRange::new`].
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let raw: BTreeMap<String, RawColorRange> = serde_json::from_str(json)?;
        raw.into_iter()
            .map(|(name, range)| Ok::<_, PipelineError>((name, ColorRange::try_from(range)?)))
            .collect()
    }

    /// Insert or replace a named range, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, range: ColorRange) -> Option<ColorRange> {
        self.0.insert(name.into(), range)
    }

    /// Look up a range by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ColorRange> {
        self.0.get(name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, range)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColorRange)> {
        self.0.iter().map(|(name, range)| (name.as_str(), range))
    }

    /// Every range in the table, in name order.
    #[must_use]
    pub fn ranges(&self) -> Vec<ColorRange> {
        self.0.values().copied().collect()
    }

    /// Ranges designated as fiducial markers (name contains `"red"`).
    #[must_use]
    pub fn fiducial_ranges(&self) -> Vec<ColorRange> {
        self.0
            .iter()
            .filter(|(name, _)| name.contains(FIDUCIAL_KEY))
            .map(|(_, range)| *range)
            .collect()
    }
}

impl Default for ColorRangeTable {
    /// Ranges found empirically for red marker dots and green helper ink.
    fn default() -> Self {
        let entries = [
            ("red_low", [0, 71, 71], [5, 255, 255]),
            ("red_high", [165, 60, 60], [179, 255, 255]),
            ("green", [15, 20, 30], [60, 225, 225]),
        ];
        let mut table = Self::new();
        for (name, low, high) in entries {
            if let Ok(range) = ColorRange::new(low, high) {
                table.insert(name, range);
            }
        }
        table
    }
}

impl FromIterator<(String, ColorRange)> for ColorRangeTable {
    fn from_iter<T: IntoIterator<Item = (String, ColorRange)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
