//! Coordinate Spaces
//!
//! The producer reports positions in a fixed `640 x 448` source space
//! (the PS2 framebuffer resolution). The consumer works in a small
//! discrete target space centred on the origin.
//!
//! # Conversion
//!
//! ```text
//! target = floor(((source / extent) - 0.5) * 100)
//! ```
//!
//! The floor is deliberate: it rounds toward negative infinity, so the
//! left/top edge maps to `-50` and the centre maps to `0`. Truncation or
//! rounding would move the boundary values.

use serde::{Deserialize, Serialize};

/// Source-space width.
pub const SOURCE_WIDTH: f64 = 640.0;

/// Source-space height.
pub const SOURCE_HEIGHT: f64 = 448.0;

/// Scale of the target space (full source extent maps to this many units).
pub const TARGET_SCALE: f64 = 100.0;

/// Point in the producer's source space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourcePoint {
    /// Horizontal coordinate, `[0, 640]` once clamped.
    pub x: f64,
    /// Vertical coordinate, `[0, 448]` once clamped.
    pub y: f64,
}

impl SourcePoint {
    /// Centre of the source space.
    pub const CENTER: Self = Self {
        x: SOURCE_WIDTH / 2.0,
        y: SOURCE_HEIGHT / 2.0,
    };

    /// Create a point without clamping.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both axes into the source bounds.
    ///
    /// A NaN axis falls back to the centre value for that axis.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_axis(self.x, SOURCE_WIDTH, Self::CENTER.x),
            y: clamp_axis(self.y, SOURCE_HEIGHT, Self::CENTER.y),
        }
    }

    /// Whether both axes lie inside the source bounds.
    pub fn in_bounds(&self) -> bool {
        (0.0..=SOURCE_WIDTH).contains(&self.x) && (0.0..=SOURCE_HEIGHT).contains(&self.y)
    }

    /// Convert to target space.
    pub fn to_target(self) -> TargetPoint {
        TargetPoint {
            x: quantize(self.x, SOURCE_WIDTH),
            y: quantize(self.y, SOURCE_HEIGHT),
        }
    }
}

impl Default for SourcePoint {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Point in the consumer's target space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPoint {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl TargetPoint {
    /// Create a target point from explicit values.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[inline]
fn clamp_axis(value: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, max)
    }
}

#[inline]
fn quantize(value: f64, extent: f64) -> f64 {
    (((value / extent) - 0.5) * TARGET_SCALE).floor()
}
