//! PNG serializer.

use scanline_pipeline::GrayImage;

/// Errors from encoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The encoder rejected the frame.
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Encode a grayscale frame as an 8-bit grayscale PNG.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] if the PNG encoder fails.
pub fn to_png(frame: &GrayImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        frame.as_raw(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(buf)
}
