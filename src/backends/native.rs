//! Native high-fidelity backend
//!
//! Wraps a platform person segmenter. The segmenter answers at its own model
//! resolution, which is almost never an aspect-preserving size of the source, so
//! the raw mask is scaled with independent horizontal and vertical factors and
//! then blended over a clear background using the scaled mask as weight.

use super::SegmentationBackend;
use crate::{
    config::ResampleFilter,
    error::BackendError,
    imaging::resample::{resample, ScaleFactors},
    types::{pixel_count, Mask, PixelBuffer, SourceImage, CHANNELS},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// One-channel 8-bit person mask at the segmenter's resolution
///
/// 0 = background, 255 = person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl NativeMask {
    #[must_use]
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Failures reported by a platform segmenter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeSegmentationError {
    #[error("person segmentation not available: {0}")]
    NotAvailable(String),

    #[error("no person found")]
    NoSubjectFound,

    #[error("person segmentation failed: {0}")]
    Processing(String),
}

impl From<NativeSegmentationError> for BackendError {
    fn from(err: NativeSegmentationError) -> Self {
        match err {
            NativeSegmentationError::NotAvailable(msg) => Self::NotAvailable(msg),
            NativeSegmentationError::NoSubjectFound => Self::NoSubjectFound,
            NativeSegmentationError::Processing(msg) => Self::Processing(msg),
        }
    }
}

/// Platform-provided person segmentation capability
///
/// Called from a blocking worker thread.
pub trait PersonSegmenter: Send + Sync {
    /// Segment the person in `image`
    ///
    /// # Errors
    /// [`NativeSegmentationError`] when the capability is missing, finds nobody,
    /// or fails internally.
    fn segment_person(&self, image: &PixelBuffer) -> Result<NativeMask, NativeSegmentationError>;
}

/// Backend over an optional [`PersonSegmenter`]
#[derive(Clone)]
pub struct NativeBackend {
    segmenter: Option<Arc<dyn PersonSegmenter>>,
    filter: ResampleFilter,
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend")
            .field("registered", &self.segmenter.is_some())
            .field("filter", &self.filter)
            .finish()
    }
}

impl NativeBackend {
    pub const NAME: &'static str = "native";

    #[must_use]
    pub fn new(segmenter: Arc<dyn PersonSegmenter>, filter: ResampleFilter) -> Self {
        Self {
            segmenter: Some(segmenter),
            filter,
        }
    }

    /// Backend with no platform capability; every attempt reports `NotAvailable`
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            segmenter: None,
            filter: ResampleFilter::default(),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.segmenter.is_some()
    }
}

#[async_trait]
impl SegmentationBackend for NativeBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(&self, source: Arc<SourceImage>) -> Result<Mask, BackendError> {
        let Some(segmenter) = self.segmenter.clone() else {
            return Err(BackendError::not_available(
                "no platform person segmenter registered",
            ));
        };
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Err(BackendError::InvalidSource(format!(
                "cannot segment an empty {width}x{height} image"
            )));
        }

        let filter = self.filter;
        tokio::task::spawn_blocking(move || {
            let raw = segmenter.segment_person(source.buffer())?;
            blend_over_clear(source.buffer(), &raw, filter)
        })
        .await
        .map_err(|e| BackendError::Processing(format!("native segmentation task failed: {e}")))?
    }
}

/// Scale `raw` to the source size and blend the source over a clear background
///
/// With `w = scaled / 255`: alpha = round(255 * w), RGB = round(source RGB * w).
///
/// # Errors
/// `Render` when the raw mask is malformed or cannot be scaled.
pub fn blend_over_clear(
    source: &PixelBuffer,
    raw: &NativeMask,
    filter: ResampleFilter,
) -> Result<Mask, BackendError> {
    let expected = pixel_count(raw.width, raw.height);
    if expected == 0 || raw.data.len() != expected {
        return Err(BackendError::render(format!(
            "native mask of {}x{} carries {} values",
            raw.width,
            raw.height,
            raw.data.len()
        )));
    }

    let (width, height) = source.dimensions();
    let factors = ScaleFactors::between((raw.width, raw.height), (width, height));
    debug!(
        sx = factors.sx,
        sy = factors.sy,
        mask_width = raw.width,
        mask_height = raw.height,
        "Scaling native mask to source resolution"
    );

    let weights = Mask::from_alpha(raw.width, raw.height, &raw.data)
        .map_err(|e| BackendError::render(e.to_string()))?;
    let scaled = resample(weights.buffer(), width, height, filter)
        .map_err(|e| BackendError::render(e.to_string()))?;

    let blended: Vec<u8> = source
        .as_bytes()
        .chunks_exact(CHANNELS)
        .zip(scaled.as_bytes().chunks_exact(CHANNELS))
        .flat_map(|(src, m)| {
            let w = f32::from(m[3]) / 255.0;
            let weigh = |c: u8| (f32::from(c) * w).round() as u8;
            [weigh(src[0]), weigh(src[1]), weigh(src[2]), (255.0 * w).round() as u8]
        })
        .collect();

    PixelBuffer::from_raw(width, height, blended)
        .map(Mask::from_rgba)
        .map_err(|e| BackendError::render(e.to_string()))
}
