//! Image codec backed by the `image` crate

use crate::{
    config::OutputFormat,
    error::{Result, SilhouetteError},
    types::PixelBuffer,
};
use image::{DynamicImage, ImageEncoder};
use std::io::Cursor;

/// Decode any supported compressed image into an RGBA8 buffer
///
/// Format is detected from content, not from a file extension.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer> {
    if bytes.is_empty() {
        return Err(SilhouetteError::decode("empty input"));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| SilhouetteError::decode(format!("Failed to decode image from bytes: {e}")))?;
    Ok(PixelBuffer::from(image.to_rgba8()))
}

/// Encode an RGBA8 buffer, keeping the alpha channel
pub fn encode(buffer: &PixelBuffer, format: OutputFormat) -> Result<Vec<u8>> {
    let (width, height) = buffer.dimensions();
    if width == 0 || height == 0 {
        return Err(SilhouetteError::encode(format!(
            "cannot encode an empty {width}x{height} image"
        )));
    }

    let mut out = Vec::new();
    match format {
        OutputFormat::Png => {
            image::codecs::png::PngEncoder::new(&mut out)
                .write_image(
                    buffer.as_bytes(),
                    width,
                    height,
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| SilhouetteError::encode(format!("PNG encoding failed: {e}")))?;
        },
        OutputFormat::Tiff => {
            DynamicImage::ImageRgba8(buffer.as_image().clone())
                .write_to(&mut Cursor::new(&mut out), format.image_format())
                .map_err(|e| SilhouetteError::encode(format!("TIFF encoding failed: {e}")))?;
        },
    }
    Ok(out)
}
