//! ONNX Runtime model runtime
//!
//! Sessions need exclusive access to run, so each loaded model keeps its
//! session behind a mutex. The model itself is never changed after load.

use crate::{
    error::BackendError,
    inference::{LoadedModel, ModelRuntime},
    models::ModelProfile,
};
use instant::Instant;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// ONNX Runtime for on-device segmentation models
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxRuntime {
    intra_threads: usize,
}

impl OnnxRuntime {
    /// `intra_threads == 0` lets ONNX Runtime pick
    #[must_use]
    pub fn new(intra_threads: usize) -> Self {
        Self { intra_threads }
    }
}

impl ModelRuntime for OnnxRuntime {
    fn name(&self) -> &'static str {
        "onnx"
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
        log::info!("🚀 Loading {} with ONNX Runtime", profile.asset_id);

        let mut builder = Session::builder()
            .map_err(|e| {
                BackendError::model_unavailable(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BackendError::model_unavailable(format!("Failed to set optimization level: {e}"))
            })?;

        if self.intra_threads > 0 {
            builder = builder.with_intra_threads(self.intra_threads).map_err(|e| {
                BackendError::model_unavailable(format!("Failed to set intra threads: {e}"))
            })?;
        }

        let session = builder.commit_from_file(path).map_err(|e| {
            BackendError::model_unavailable(format!("Failed to create session from model: {e}"))
        })?;

        log::info!(
            "✅ ONNX Runtime session for {} ready in {}ms",
            profile.asset_id,
            load_start.elapsed().as_millis()
        );

        Ok(Arc::new(OnnxLoadedModel {
            session: Mutex::new(session),
            asset_id: profile.asset_id,
        }))
    }
}

struct OnnxLoadedModel {
    session: Mutex<Session>,
    asset_id: &'static str,
}

impl LoadedModel for OnnxLoadedModel {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, BackendError> {
        log::debug!(
            "🔮 Running ONNX inference for {} with input shape {:?}",
            self.asset_id,
            input.dim()
        );
        let inference_start = Instant::now();

        let input_value = Value::from_array(input.clone())
            .map_err(|e| BackendError::inference(format!("Failed to convert input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| BackendError::inference("ONNX session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BackendError::inference(format!("ONNX inference failed: {e}")))?;

        // Positional access to the first output
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BackendError::inference("No output tensors found"))?;
        let values = outputs
            .get(first_key)
            .ok_or_else(|| BackendError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BackendError::inference(format!("Failed to extract output tensor: {e}")))?
            .iter()
            .copied()
            .collect::<Vec<f32>>();

        log::debug!(
            "✅ ONNX inference completed in {}ms ({} values)",
            inference_start.elapsed().as_millis(),
            values.len()
        );

        Ok(values)
    }
}
