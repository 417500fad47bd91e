//! Core types for silhouette extraction

use crate::error::{BackendError, Result, SilhouetteError};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes per RGBA8 pixel
pub const CHANNELS: usize = 4;

/// Owned RGBA8 raster, row-major, no padding
///
/// The backing buffer always holds exactly `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, rejecting buffers whose length is not `width * height * 4`
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = pixel_count(width, height) * CHANNELS;
        if data.len() != expected {
            return Err(SilhouetteError::encode(format!(
                "RGBA buffer for {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        RgbaImage::from_raw(width, height, data)
            .map(|image| Self { image })
            .ok_or_else(|| SilhouetteError::encode("Failed to build RGBA raster from bytes"))
    }

    /// Buffer filled with a single color
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba(rgba)),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Number of pixels (`width * height`)
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        pixel_count(self.width(), self.height())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.image.into_raw()
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// RGBA value of the pixel at row-major index `index`
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<[u8; 4]> {
        let start = index.checked_mul(CHANNELS)?;
        let px = self.as_bytes().get(start..start + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        Self { image }
    }
}

/// `width * height` as usize
#[must_use]
pub fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Foreground mask: only the alpha channel carries meaning
///
/// 0 = background (discard), 255 = foreground (keep).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    buffer: PixelBuffer,
}

impl Mask {
    /// Fully opaque white mask; compositing against it performs no cutout
    #[must_use]
    pub fn opaque(width: u32, height: u32) -> Self {
        Self {
            buffer: PixelBuffer::filled(width, height, [255, 255, 255, 255]),
        }
    }

    /// Build a white mask from per-pixel alpha values
    pub fn from_alpha(width: u32, height: u32, alpha: &[u8]) -> Result<Self> {
        let count = pixel_count(width, height);
        if alpha.len() != count {
            return Err(SilhouetteError::encode(format!(
                "Mask of {}x{} needs {} alpha values, got {}",
                width,
                height,
                count,
                alpha.len()
            )));
        }
        let mut data = Vec::with_capacity(count * CHANNELS);
        for &a in alpha {
            data.extend_from_slice(&[255, 255, 255, a]);
        }
        Ok(Self {
            buffer: PixelBuffer::from_raw(width, height, data)?,
        })
    }

    /// Treat an arbitrary RGBA buffer as a mask (its alpha is the mask)
    #[must_use]
    pub fn from_rgba(buffer: PixelBuffer) -> Self {
        Self { buffer }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    #[must_use]
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    /// Iterator over the alpha channel in row-major order
    pub fn alpha(&self) -> impl Iterator<Item = u8> + '_ {
        self.buffer
            .as_bytes()
            .chunks_exact(CHANNELS)
            .map(|px| px[3])
    }

    /// Alpha at row-major pixel index
    #[must_use]
    pub fn alpha_at(&self, index: usize) -> Option<u8> {
        self.buffer.pixel(index).map(|px| px[3])
    }

    /// Same alpha with RGB forced to white
    #[must_use]
    pub fn to_white(&self) -> Self {
        let mut image = self.buffer.as_image().clone();
        for px in image.pixels_mut() {
            px.0[..3].fill(255);
        }
        Self {
            buffer: PixelBuffer::from(image),
        }
    }

    /// True when every pixel is fully opaque
    #[must_use]
    pub fn is_fully_opaque(&self) -> bool {
        self.alpha().all(|a| a == 255)
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.buffer.pixel_count();
        let foreground_pixels = self.alpha().filter(|&a| a > 127).count();
        let background_pixels = total_pixels - foreground_pixels;
        let (foreground_ratio, background_ratio) = if total_pixels == 0 {
            (0.0, 0.0)
        } else {
            (
                foreground_pixels as f32 / total_pixels as f32,
                background_pixels as f32 / total_pixels as f32,
            )
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio,
            background_ratio,
        }
    }
}

/// Statistics about a mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Decoded source image plus the locator it was read from; immutable
#[derive(Debug, Clone)]
pub struct SourceImage {
    buffer: PixelBuffer,
    locator: PathBuf,
}

impl SourceImage {
    #[must_use]
    pub fn new(buffer: PixelBuffer, locator: PathBuf) -> Self {
        Self { buffer, locator }
    }

    #[must_use]
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn locator(&self) -> &Path {
        &self.locator
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }
}

/// Final cutout: source RGB verbatim with mask alpha, at source resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeResult {
    buffer: PixelBuffer,
}

impl CompositeResult {
    pub(crate) fn new(buffer: PixelBuffer) -> Self {
        Self { buffer }
    }

    #[must_use]
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn into_buffer(self) -> PixelBuffer {
        self.buffer
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }
}

/// Result of running the backend chain
#[derive(Debug)]
pub enum SegmentationOutcome {
    /// A real segmentation backend produced the mask
    Success { mask: Mask, backend: String },
    /// Every real backend failed; the opaque fallback mask is used
    Degraded { mask: Mask, reason: String },
    /// Nothing could proceed, e.g. the source itself failed to decode
    Failure(SilhouetteError),
}

impl SegmentationOutcome {
    /// Degraded outcome built from the last backend failure, if any
    #[must_use]
    pub fn degraded(mask: Mask, last_error: Option<&BackendError>) -> Self {
        let reason = last_error.map_or_else(
            || "no segmentation backend configured".to_string(),
            ToString::to_string,
        );
        Self::Degraded { mask, reason }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The chosen mask, or the failure
    pub fn into_mask(self) -> Result<Mask> {
        match self {
            Self::Success { mask, .. } | Self::Degraded { mask, .. } => Ok(mask),
            Self::Failure(err) => Err(err),
        }
    }
}

/// Timing breakdown for one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Reading and decoding the source
    pub decode_ms: u64,

    /// Running the backend chain until a mask was chosen
    pub segmentation_ms: u64,

    /// Resampling the mask and merging channels
    pub compositing_ms: u64,

    /// Encoding the output raster
    pub encode_ms: u64,

    /// Writing the output file
    pub write_ms: u64,

    /// Total end-to-end time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Segmentation: {}ms | Composite: {}ms | Encode: {}ms | Write: {}ms",
            self.total_ms,
            self.decode_ms,
            self.segmentation_ms,
            self.compositing_ms,
            self.encode_ms,
            self.write_ms
        )
    }
}

/// Detailed outcome of one extraction, for callers that want more than the locator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Locator of the written cutout
    pub output_locator: String,

    /// Name of the backend whose mask was used
    pub backend: String,

    /// Why the opaque fallback was used, when it was
    pub degraded_reason: Option<String>,

    pub source_dimensions: (u32, u32),

    /// Mask resolution before resampling to the source
    pub mask_dimensions: (u32, u32),

    pub timings: ProcessingTimings,
}

impl ExtractionReport {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded_reason.is_some()
    }
}
