//! Alpha compositing of a source image with a mask
//!
//! Output RGB is the source RGB verbatim and output alpha is the mask alpha. No
//! premultiplication happens here, so edge pixels keep full-intensity color even
//! where alpha is low. Viewers that assume premultiplied data may show a faint
//! halo around the cutout.

use crate::{
    config::ResampleFilter,
    error::Result,
    imaging::resample::resample,
    types::{CompositeResult, Mask, PixelBuffer, SourceImage, CHANNELS},
};
use std::borrow::Cow;
use tracing::debug;

/// Merges a source image's color channels with a mask's alpha channel
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor {
    filter: ResampleFilter,
}

impl Compositor {
    #[must_use]
    pub fn new(filter: ResampleFilter) -> Self {
        Self { filter }
    }

    #[must_use]
    pub fn filter(&self) -> ResampleFilter {
        self.filter
    }

    /// Composite `source` with `mask`, resampling the mask to source size first
    ///
    /// # Errors
    /// - Mask resampling fails (empty mask for a non-empty source)
    /// - The output raster cannot be constructed (`Encode`)
    pub fn composite(&self, source: &SourceImage, mask: &Mask) -> Result<CompositeResult> {
        self.composite_buffers(source.buffer(), mask)
    }

    /// Composite raw buffers; see [`Compositor::composite`]
    pub fn composite_buffers(&self, source: &PixelBuffer, mask: &Mask) -> Result<CompositeResult> {
        let (width, height) = source.dimensions();

        let mask_buffer: Cow<'_, PixelBuffer> = if mask.dimensions() == (width, height) {
            Cow::Borrowed(mask.buffer())
        } else {
            debug!(
                mask_width = mask.dimensions().0,
                mask_height = mask.dimensions().1,
                width,
                height,
                filter = %self.filter,
                "Resampling mask to source resolution"
            );
            Cow::Owned(resample(mask.buffer(), width, height, self.filter)?)
        };

        let out: Vec<u8> = source
            .as_bytes()
            .chunks_exact(CHANNELS)
            .zip(mask_buffer.as_bytes().chunks_exact(CHANNELS))
            .flat_map(|(src, m)| [src[0], src[1], src[2], m[3]])
            .collect();

        Ok(CompositeResult::new(PixelBuffer::from_raw(width, height, out)?))
    }
}
