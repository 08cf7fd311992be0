//! Image decoding and RGB to grayscale conversion.
//!
//! Accepts raw image bytes (ASCII or binary PNM, PNG, JPEG, BMP) and
//! produces the single-channel frame the streaming stage consumes.
//!
//! This is the first step in the pipeline: raw bytes in, `GrayImage` out.

use image::{DynamicImage, GrayImage};

use crate::types::{GrayscaleArithmetic, PipelineError, Sample};

/// Decode raw image bytes.
///
/// Supports whatever the `image` crate can decode with the enabled
/// features, including ASCII `P3` pixmaps.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Luminance of one RGB pixel.
///
/// Uses the ITU-R BT.601 weights `0.299 R + 0.587 G + 0.114 B`, either in
/// `f32` with truncation or as the 8-bit fixed-point approximation
/// `(77 R + 150 G + 29 B) >> 8`.
#[must_use]
pub fn luminance(rgb: [u8; 3], arithmetic: GrayscaleArithmetic) -> Sample {
    let [r, g, b] = rgb;
    match arithmetic {
        GrayscaleArithmetic::Float => {
            // Three rounded products and two rounded sums, left to right.
            // A fused multiply-add rounds differently on some colours.
            #[allow(clippy::suboptimal_flops)]
            let y = 0.299f32 * f32::from(r) + 0.587f32 * f32::from(g) + 0.114f32 * f32::from(b);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let sample = y as Sample;
            sample
        }
        GrayscaleArithmetic::FixedPoint => {
            let y = (77 * u32::from(r) + 150 * u32::from(g) + 29 * u32::from(b)) >> 8;
            #[allow(clippy::cast_possible_truncation)]
            let sample = y as Sample;
            sample
        }
    }
}

/// Convert a decoded image to a grayscale frame, pixel by pixel in
/// row-major order.
#[must_use = "returns the grayscale frame"]
pub fn to_grayscale(image: &DynamicImage, arithmetic: GrayscaleArithmetic) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        image::Luma([luminance(rgb.get_pixel(x, y).0, arithmetic)])
    })
}

/// Decode raw image bytes and convert to grayscale.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_and_grayscale(
    bytes: &[u8],
    arithmetic: GrayscaleArithmetic,
) -> Result<GrayImage, PipelineError> {
    let image = decode(bytes)?;
    Ok(to_grayscale(&image, arithmetic))
}
