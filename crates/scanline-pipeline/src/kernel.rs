//! 3x3 window reductions: smoothing, sharpening and gradient magnitude.
//!
//! This module defines the [`Reduction`] trait, which turns one 3x3
//! neighbourhood into one output sample, and its three implementations.
//! The reductions are pure integer arithmetic with explicit saturation, so
//! they match a hardware datapath bit for bit.

use crate::types::{Sample, SmoothingArithmetic};

/// Side length of every filter kernel in this crate.
pub const KERNEL_SIZE: usize = 3;

/// A 3x3 neighbourhood, `taps[row][col]`, row 0 on top.
pub type Taps = [[Sample; KERNEL_SIZE]; KERNEL_SIZE];

/// Sharpening weights: five times the centre minus the four orthogonal
/// neighbours.
pub const SHARPEN: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

/// Horizontal Sobel operator.
pub const SOBEL_X: [[i32; 3]; 3] = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];

/// Vertical Sobel operator.
pub const SOBEL_Y: [[i32; 3]; 3] = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// 16-bit fixed-point reciprocal of nine, rounded up.
///
/// Rounding down (7281) loses one on every exact multiple of nine.
/// Rounding up keeps `(sum * 7282) >> 16 == sum / 9` for every
/// `sum < 32768`, which covers the largest 3x3 sum of `9 * 255`.
pub const RECIPROCAL_NINE_Q16: u32 = 7282;

/// Largest possible sum of a 3x3 window of 8-bit samples.
pub const MAX_WINDOW_SUM: u32 = 9 * Sample::MAX as u32;

/// Reduces a 3x3 neighbourhood to one output sample.
pub trait Reduction {
    /// Short name used in logs and diagnostics.
    const NAME: &'static str;

    /// Compute the output sample for `taps`.
    fn reduce(&self, taps: &Taps) -> Sample;
}

/// Unweighted 3x3 average, truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Smoothing {
    /// How the sum is divided by nine.
    pub arithmetic: SmoothingArithmetic,
}

/// 3x3 sharpening, saturated to `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sharpening;

/// `min(255, |Gx| + |Gy|)` over the Sobel operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GradientMagnitude;

impl Reduction for Smoothing {
    const NAME: &'static str = "smoothing";

    fn reduce(&self, taps: &Taps) -> Sample {
        divide_by_nine(window_sum(taps), self.arithmetic)
    }
}

impl Reduction for Sharpening {
    const NAME: &'static str = "sharpening";

    fn reduce(&self, taps: &Taps) -> Sample {
        saturate(correlate(taps, &SHARPEN))
    }
}

impl Reduction for GradientMagnitude {
    const NAME: &'static str = "gradient";

    fn reduce(&self, taps: &Taps) -> Sample {
        let gx = correlate(taps, &SOBEL_X);
        let gy = correlate(taps, &SOBEL_Y);
        saturate(gx.abs() + gy.abs())
    }
}

/// Sum of all nine taps.
#[must_use]
pub fn window_sum(taps: &Taps) -> u32 {
    taps.iter().flatten().map(|&s| u32::from(s)).sum()
}

/// Divide a window sum by nine with the chosen arithmetic.
#[must_use]
pub const fn divide_by_nine(sum: u32, arithmetic: SmoothingArithmetic) -> Sample {
    debug_assert!(sum <= MAX_WINDOW_SUM);
    let quotient = match arithmetic {
        SmoothingArithmetic::Division => sum / 9,
        SmoothingArithmetic::FixedPoint => (sum * RECIPROCAL_NINE_Q16) >> 16,
    };
    #[allow(clippy::cast_possible_truncation)]
    let sample = quotient as Sample;
    sample
}

/// Weighted sum of `taps` against `weights` (correlation, no kernel flip).
#[must_use]
pub fn correlate(taps: &Taps, weights: &[[i32; 3]; 3]) -> i32 {
    taps.iter()
        .flatten()
        .zip(weights.iter().flatten())
        .map(|(&s, &w)| i32::from(s) * w)
        .sum()
}

/// Clamp to the 8-bit sample range.
#[must_use]
pub fn saturate(value: i32) -> Sample {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sample = value.clamp(0, i32::from(Sample::MAX)) as Sample;
    sample
}
