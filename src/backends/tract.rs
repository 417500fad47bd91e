//! Tract model runtime
//!
//! Pure Rust inference with no external dependencies. Models are loaded from
//! ONNX files, pinned to the profile's fixed input shape, optimized and made
//! runnable once; the resulting plan is immutable and shared between threads.

use crate::{
    error::BackendError,
    inference::{LoadedModel, ModelRuntime},
    models::ModelProfile,
};
use instant::Instant;
use ndarray::Array4;
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract runtime for on-device segmentation models
#[derive(Debug, Default, Clone, Copy)]
pub struct TractRuntime;

impl TractRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ModelRuntime for TractRuntime {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn load_model(
        &self,
        profile: &ModelProfile,
        path: &Path,
    ) -> Result<Arc<dyn LoadedModel>, BackendError> {
        if !path.is_file() {
            return Err(BackendError::model_unavailable(format!(
                "model asset '{}' not found at {}",
                profile.asset_id,
                path.display()
            )));
        }

        let load_start = Instant::now();
        log::info!("🚀 Loading {} with Tract", profile.asset_id);

        let (n, a, b, c) = profile.input_shape();
        let model = onnx()
            .model_for_path(path)
            .map_err(|e| {
                BackendError::model_unavailable(format!("Failed to load ONNX model: {e}"))
            })?
            .with_input_fact(0, f32::fact([n, a, b, c]).into())
            .map_err(|e| {
                BackendError::model_unavailable(format!("Failed to pin input shape: {e}"))
            })?
            .into_optimized()
            .map_err(|e| {
                BackendError::model_unavailable(format!("Failed to optimize model: {e}"))
            })?
            .into_runnable()
            .map_err(|e| {
                BackendError::model_unavailable(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "✅ Tract model {} ready in {}ms",
            profile.asset_id,
            load_start.elapsed().as_millis()
        );

        Ok(Arc::new(TractLoadedModel {
            model,
            asset_id: profile.asset_id,
        }))
    }
}

struct TractLoadedModel {
    model: TractModel,
    asset_id: &'static str,
}

impl LoadedModel for TractLoadedModel {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, BackendError> {
        log::debug!("🔮 Running Tract inference for {}", self.asset_id);
        log::debug!("  - Input tensor: {:?}", input.shape());

        let inference_start = Instant::now();

        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor = Tensor::from_shape(input.shape(), &data).map_err(|e| {
            BackendError::inference(format!("Failed to build input tensor: {e}"))
        })?;

        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BackendError::inference(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::inference("No output tensor found"))?;

        let values = output
            .to_array_view::<f32>()
            .map_err(|e| BackendError::inference(format!("Failed to convert output tensor: {e}")))?
            .iter()
            .copied()
            .collect::<Vec<f32>>();

        log::debug!(
            "✅ Tract inference completed in {}ms ({} values)",
            inference_start.elapsed().as_millis(),
            values.len()
        );

        Ok(values)
    }
}
