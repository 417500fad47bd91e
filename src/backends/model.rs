//! On-device model backend
//!
//! Stretches the source into the model's fixed input box, normalizes to
//! `[0, 1]` without alpha, runs one inference pass and thresholds every output
//! value into a binary mask at the model's resolution.

use super::SegmentationBackend;
use crate::{
    error::BackendError,
    inference::ModelRuntime,
    model_cache::ModelCache,
    models::{ModelProfile, TensorLayout},
    types::{pixel_count, Mask, PixelBuffer, SourceImage},
};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use instant::Instant;
use ndarray::Array4;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Backend running a fixed-size segmentation model
#[derive(Clone)]
pub struct ModelBackend {
    runtime: Option<Arc<dyn ModelRuntime>>,
    cache: Arc<ModelCache>,
    profile: ModelProfile,
    model_dir: PathBuf,
    threshold: f32,
}

impl std::fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackend")
            .field("runtime", &self.runtime.as_ref().map(|r| r.name()))
            .field("profile", &self.profile)
            .field("model_dir", &self.model_dir)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl ModelBackend {
    pub const NAME: &'static str = "model";

    /// `runtime == None` means no inference engine is compiled in; every
    /// attempt then reports `ModelUnavailable`.
    #[must_use]
    pub fn new(
        runtime: Option<Arc<dyn ModelRuntime>>,
        cache: Arc<ModelCache>,
        profile: ModelProfile,
        model_dir: PathBuf,
        threshold: f32,
    ) -> Self {
        Self {
            runtime,
            cache,
            profile,
            model_dir,
            threshold,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    fn run(
        runtime: &dyn ModelRuntime,
        cache: &ModelCache,
        profile: &ModelProfile,
        model_dir: &std::path::Path,
        threshold: f32,
        source: &PixelBuffer,
    ) -> Result<Mask, BackendError> {
        let path = profile.asset_path(model_dir);
        let model = cache.get_or_load(runtime, profile, &path)?;

        let input = prepare_input(source, profile);
        let inference_start = Instant::now();
        let output = model.infer(&input)?;
        debug!(
            asset = profile.asset_id,
            values = output.len(),
            elapsed_ms = inference_start.elapsed().as_millis() as u64,
            "Model inference finished"
        );

        let (width, height) = profile.output_dimensions();
        threshold_output(&output, width, height, threshold)
    }
}

#[async_trait]
impl SegmentationBackend for ModelBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn attempt(&self, source: Arc<SourceImage>) -> Result<Mask, BackendError> {
        let Some(runtime) = self.runtime.clone() else {
            return Err(BackendError::model_unavailable(
                "no model runtime compiled into this build",
            ));
        };
        if source.buffer().pixel_count() == 0 {
            return Err(BackendError::InvalidSource(
                "cannot run a model on an empty image".to_string(),
            ));
        }

        let cache = Arc::clone(&self.cache);
        let profile = self.profile.clone();
        let model_dir = self.model_dir.clone();
        let threshold = self.threshold;

        tokio::task::spawn_blocking(move || {
            Self::run(
                runtime.as_ref(),
                &cache,
                &profile,
                &model_dir,
                threshold,
                source.buffer(),
            )
        })
        .await
        .map_err(|e| BackendError::inference(format!("inference task failed: {e}")))?
    }
}

/// Stretch `source` into the profile's input box and normalize to `[0, 1]`
///
/// Aspect ratio is not preserved. Alpha is dropped.
#[must_use]
pub fn prepare_input(source: &PixelBuffer, profile: &ModelProfile) -> Array4<f32> {
    let (width, height) = (profile.input_width, profile.input_height);
    let resized = imageops::resize(source.as_image(), width, height, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros(profile.input_shape());
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = f32::from(pixel[c]) / 255.0;
            match profile.layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }
    tensor
}

/// Threshold raw model output into a binary `width x height` mask
///
/// Values strictly greater than `threshold` become alpha 255, everything else 0.
/// Extra trailing values are ignored.
///
/// # Errors
/// `MalformedOutput` when fewer than `width * height` values are present.
pub fn threshold_output(
    output: &[f32],
    width: u32,
    height: u32,
    threshold: f32,
) -> Result<Mask, BackendError> {
    let expected = pixel_count(width, height);
    if output.len() < expected {
        return Err(BackendError::MalformedOutput {
            expected,
            actual: output.len(),
        });
    }

    let alpha: Vec<u8> = output[..expected]
        .iter()
        .map(|&v| if v > threshold { 255 } else { 0 })
        .collect();
    Mask::from_alpha(width, height, &alpha).map_err(|e| BackendError::render(e.to_string()))
}
