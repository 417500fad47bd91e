#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Silhouette Extraction Library
//!
//! Cuts the foreground subject out of a photo and writes it as an RGBA image
//! with a transparent background.
//!
//! Segmentation runs through an ordered chain of backends, stopping at the first
//! one that produces a mask:
//!
//! - **Native**: a platform person segmenter, registered through [`PersonSegmenter`]
//! - **Model**: a fixed-input on-device model run with Tract (default) or ONNX Runtime
//! - **Opaque**: an all-opaque mask, so a decodable source always yields a result
//!
//! The chosen mask is resampled to the source resolution with independent
//! horizontal and vertical scale factors and merged with the source: RGB comes
//! from the source verbatim, alpha from the mask.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use silhouette_extract::{extract_silhouette, SegmentationKind, SilhouetteConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = SilhouetteConfig::builder()
//!     .kind(SegmentationKind::Clothes)
//!     .output_dir("/tmp/cutouts")
//!     .build()?;
//!
//! let cutout = extract_silhouette("file:///photos/shirt.jpg", &config).await?;
//! println!("wrote {cutout}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tract` (default): pure Rust model runtime
//! - `onnx`: ONNX Runtime model runtime
//! - `cli` (default): the `silhouette` command line tool
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod inference;
pub mod model_cache;
pub mod models;
pub mod pipeline;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use backends::{
    ModelBackend, NativeBackend, NativeMask, NativeSegmentationError, OpaqueBackend,
    PersonSegmenter, SegmentationBackend,
};
pub use config::{OutputFormat, ResampleFilter, SilhouetteConfig, SilhouetteConfigBuilder};
pub use error::{BackendError, Result, SilhouetteError};
pub use imaging::{Compositor, ScaleFactors};
pub use inference::{default_runtime, LoadedModel, ModelRuntime};
pub use model_cache::{ModelCache, ModelCacheStats};
pub use models::{ModelProfile, SegmentationKind, TensorLayout};
pub use pipeline::{SilhouettePipeline, SilhouettePipelineBuilder};
pub use services::{
    NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate,
    TracingProgressReporter,
};
pub use types::{
    CompositeResult, ExtractionReport, Mask, MaskStatistics, PixelBuffer, ProcessingTimings,
    SegmentationOutcome, SourceImage,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Extract the silhouette of the image at `locator`
///
/// Uses the default backend chain for `config` with the process-wide model
/// cache. No platform segmenter is registered; use
/// [`SilhouettePipelineBuilder::with_person_segmenter`] for that.
///
/// Returns the locator of a newly written RGBA image. If the source decodes, a
/// result is always produced, uncut when no backend could segment it.
///
/// # Errors
/// - `Decode` when `locator` is not a readable local image
/// - `Render` / `Encode` / `Io` when the result cannot be produced or written
/// - `InvalidConfig` when `config` does not validate
pub async fn extract_silhouette(locator: &str, config: &SilhouetteConfig) -> Result<String> {
    SilhouettePipeline::new(config.clone())?
        .extract_silhouette(locator)
        .await
}

/// Composite the image at `original` with the mask image at `mask`
///
/// The mask's alpha channel is resampled to the original's size.
///
/// # Errors
/// - `Decode` when either input is not a readable local image
/// - `Render` / `Encode` / `Io` when the result cannot be produced or written
pub async fn compose_with_mask(
    original: &str,
    mask: &str,
    config: &SilhouetteConfig,
) -> Result<String> {
    SilhouettePipeline::builder(config.clone())
        .with_model_runtime(None)
        .build()?
        .compose_with_mask(original, mask)
        .await
}
