//! Segmentation backends
//!
//! Every way of producing a foreground mask implements [`SegmentationBackend`].
//! The pipeline holds them as an ordered chain and stops at the first success:
//! - Native backend (platform person segmenter, when one is registered)
//! - Model backend (fixed-size on-device model through a [`crate::inference::ModelRuntime`])
//! - Opaque backend (always succeeds, performs no cutout)
//!
//! Model runtimes live here too: Tract (pure Rust) and ONNX Runtime.

pub mod fallback;
pub mod model;
pub mod native;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

use crate::{error::BackendError, types::Mask, types::SourceImage};
use async_trait::async_trait;
use std::sync::Arc;

pub use self::fallback::OpaqueBackend;
pub use self::model::ModelBackend;
pub use self::native::{NativeBackend, NativeMask, NativeSegmentationError, PersonSegmenter};

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxRuntime;

#[cfg(feature = "tract")]
pub use self::tract::TractRuntime;

/// One way of turning a decoded source image into a mask
///
/// The source is shared read-only between attempts. The returned mask may have
/// any resolution; the compositor resamples it to the source size.
#[async_trait]
pub trait SegmentationBackend: Send + Sync {
    /// Backend name used in logs, progress and reports
    fn name(&self) -> &str;

    /// Try to segment `source`
    ///
    /// # Errors
    /// Any [`BackendError`]; the pipeline reacts by trying the next backend.
    async fn attempt(&self, source: Arc<SourceImage>) -> Result<Mask, BackendError>;
}
