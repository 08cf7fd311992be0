//! Shared types for the scanline streaming pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hold whole frames
/// without depending on `image` directly.
pub use image::GrayImage;

/// One grayscale pixel value, the unit of data moved per cycle.
pub type Sample = u8;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels (samples per row).
    pub width: u32,
    /// Height in pixels (rows per frame).
    pub height: u32,
}

impl Dimensions {
    /// Create validated dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] if either side is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Dimensions of an in-memory frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidDimensions`] for an empty image.
    pub fn of(image: &GrayImage) -> Result<Self, PipelineError> {
        Self::new(image.width(), image.height())
    }

    /// Number of samples in one frame (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Which processing path the [`Stage`](crate::Stage) routes samples through.
///
/// The mode is fixed when the stage is built. There is no way to switch
/// it mid-stream: a partially filled row history has no defined meaning
/// for a different filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Bypass: output equals input, always valid.
    #[default]
    None,
    /// 3x3 box average.
    Smooth,
    /// 3x3 Laplacian sharpening, saturated to 8 bits.
    Sharpen,
    /// L1 Sobel gradient magnitude, saturated to 8 bits.
    Gradient,
    /// Smoothing cascaded into gradient magnitude.
    #[serde(rename = "chain")]
    SmoothThenGradient,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Smooth => "smooth",
            Self::Sharpen => "sharpen",
            Self::Gradient => "gradient",
            Self::SmoothThenGradient => "chain",
        };
        f.write_str(name)
    }
}

/// When a filter raises its valid flag and which window the valid output
/// reduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    /// Valid from cycle `radius * W + radius` on. Each output is centred on
    /// the frame pixel it is reported for, with clamp-to-edge borders, so
    /// output pixel `i` is the 3x3 neighbourhood of input pixel `i`.
    #[default]
    Aligned,
    /// Classic line-buffer timing: valid once the row history is ready and
    /// more than `radius` rows have been counted. The raw window is reduced
    /// as stored, including zeroed history and taps that wrap across row
    /// boundaries. The first valid output arrives on cycle `(K - 1) * W - 1`.
    Reference,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aligned => "aligned",
            Self::Reference => "reference",
        })
    }
}

/// How the smoothing filter divides its window sum by nine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingArithmetic {
    /// Truncating integer division, `sum / 9`.
    #[default]
    Division,
    /// Multiply by a 16-bit fixed-point reciprocal and shift, the form a
    /// divider-less hardware block would use. Bit-exact with `Division`
    /// for every possible 3x3 sum.
    FixedPoint,
}

/// How RGB input is reduced to one luminance sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrayscaleArithmetic {
    /// `0.299 R + 0.587 G + 0.114 B` in `f32`, truncated.
    #[default]
    Float,
    /// `(77 R + 150 G + 29 B) >> 8`.
    FixedPoint,
}

/// How many extra cycles the driver runs after the last frame sample to
/// drain the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Exactly the stage latency, the shortest flush that still yields
    /// every output sample.
    #[default]
    Exact,
    /// A fixed number of whole rows. `Rows(5)` reproduces the classic
    /// `W*H + 5*W` cycle budget.
    Rows(u32),
}

impl FlushPolicy {
    /// Total number of cycles to run for a frame of `dimensions` through a
    /// stage with the given `latency`.
    #[must_use]
    pub const fn cycle_budget(self, dimensions: Dimensions, latency: u64) -> u64 {
        let flush = match self {
            Self::Exact => latency,
            Self::Rows(rows) => rows as u64 * dimensions.width as u64,
        };
        dimensions.pixel_count() + flush
    }
}

/// Configuration for the streaming pipeline.
///
/// All parameters have defaults reproducing the plain streaming
/// behaviour: bypass mode, aligned timing, integer division, float
/// grayscale and an exact flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Processing path selected for the whole stream.
    pub mode: FilterMode,

    /// Filter timing: centred outputs or classic line-buffer timing.
    pub timing: Timing,

    /// Division strategy used by the smoothing filter.
    pub smoothing: SmoothingArithmetic,

    /// RGB to luminance conversion used when decoding colour input.
    pub grayscale: GrayscaleArithmetic,

    /// Flush length appended after the frame.
    pub flush: FlushPolicy,
}

impl PipelineConfig {
    /// Check field ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for `FlushPolicy::Rows(0)`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.flush == FlushPolicy::Rows(0) {
            return Err(PipelineError::InvalidConfig(
                "flush must span at least one row".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a stage or filter produces on one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Output {
    /// The output sample. Meaningless while `valid` is low.
    pub sample: Sample,
    /// Whether `sample` carries a real result yet.
    pub valid: bool,
}

impl Output {
    /// A valid output carrying `sample`.
    #[must_use]
    pub const fn valid(sample: Sample) -> Self {
        Self {
            sample,
            valid: true,
        }
    }

    /// An invalid (warm-up) output. The sample is whatever the datapath
    /// held and must be ignored.
    #[must_use]
    pub const fn invalid(sample: Sample) -> Self {
        Self {
            sample,
            valid: false,
        }
    }

    /// The sample, if valid.
    #[must_use]
    pub const fn valid_sample(self) -> Option<Sample> {
        if self.valid { Some(self.sample) } else { None }
    }
}

/// Result of streaming one frame through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    /// Filtered frame, reassembled from valid outputs in the order received.
    pub output: GrayImage,

    /// Frame dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Errors that can occur while building or running the pipeline.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The image data could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input byte slice was empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A frame dimension was zero.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The kernel size was zero or even.
    #[error("kernel size must be odd and non-zero, got {0}")]
    InvalidKernelSize(usize),

    /// A configuration value is out of range.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidDimensions { width: u32, height: u32 },
    InvalidKernelSize(usize),
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::InvalidDimensions { width, height } => PipelineErrorProxy::InvalidDimensions {
                width: *width,
                height: *height,
            },
            Self::InvalidKernelSize(k) => PipelineErrorProxy::InvalidKernelSize(*k),
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                // The original image::ImageError cannot be reconstructed,
                // so carry the message as a config-style error.
                Self::InvalidConfig(format!("image decode: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::InvalidDimensions { width, height } => {
                Self::InvalidDimensions { width, height }
            }
            PipelineErrorProxy::InvalidKernelSize(k) => Self::InvalidKernelSize(k),
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_width_is_rejected() {
        let result = Dimensions::new(0, 4);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidDimensions {
                width: 0,
                height: 4
            })
        ));
    }

    #[test]
    fn zero_height_is_rejected() {
        assert!(Dimensions::new(4, 0).is_err());
    }

    #[test]
    fn pixel_count_does_not_overflow_u32() {
        let dims = Dimensions::new(u32::MAX, 2).unwrap();
        assert_eq!(dims.pixel_count(), u64::from(u32::MAX) * 2);
    }

    #[test]
    fn exact_flush_adds_latency() {
        let dims = Dimensions::new(8, 6).unwrap();
        assert_eq!(FlushPolicy::Exact.cycle_budget(dims, 9), 48 + 9);
    }

    #[test]
    fn row_flush_reproduces_five_row_budget() {
        let dims = Dimensions::new(8, 6).unwrap();
        assert_eq!(FlushPolicy::Rows(5).cycle_budget(dims, 9), 48 + 40);
    }

    #[test]
    fn default_config_is_bypass() {
        let config = PipelineConfig::default();
        assert_eq!(config.mode, FilterMode::None);
        assert_eq!(config.timing, Timing::Aligned);
        assert_eq!(config.smoothing, SmoothingArithmetic::Division);
        assert_eq!(config.grayscale, GrayscaleArithmetic::Float);
        assert_eq!(config.flush, FlushPolicy::Exact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_row_flush_is_invalid() {
        let config = PipelineConfig {
            flush: FlushPolicy::Rows(0),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_json_uses_snake_case_names() {
        let config = PipelineConfig {
            mode: FilterMode::SmoothThenGradient,
            timing: Timing::Reference,
            smoothing: SmoothingArithmetic::FixedPoint,
            grayscale: GrayscaleArithmetic::FixedPoint,
            flush: FlushPolicy::Rows(5),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"chain\""), "got {json}");
        assert!(json.contains("\"fixed_point\""), "got {json}");
        assert!(json.contains("\"timing\":\"reference\""), "got {json}");
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"mode":"sharpen"}"#).unwrap();
        assert_eq!(config.mode, FilterMode::Sharpen);
        assert_eq!(config.flush, FlushPolicy::Exact);
        assert_eq!(config.timing, Timing::Aligned);
    }

    #[test]
    fn mode_display_matches_cli_names() {
        assert_eq!(FilterMode::None.to_string(), "none");
        assert_eq!(FilterMode::Gradient.to_string(), "gradient");
        assert_eq!(FilterMode::SmoothThenGradient.to_string(), "chain");
    }

    #[test]
    fn output_valid_sample() {
        assert_eq!(Output::valid(7).valid_sample(), Some(7));
        assert_eq!(Output::invalid(7).valid_sample(), None);
    }

    #[test]
    fn error_display_messages() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::InvalidKernelSize(4).to_string(),
            "kernel size must be odd and non-zero, got 4"
        );
        assert_eq!(
            PipelineError::InvalidDimensions {
                width: 0,
                height: 3
            }
            .to_string(),
            "invalid frame dimensions 0x3"
        );
    }

    #[test]
    fn error_serde_round_trip_keeps_variant() {
        let err = PipelineError::InvalidDimensions {
            width: 0,
            height: 9,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::InvalidDimensions {
                width: 0,
                height: 9
            }
        ));
    }
}
