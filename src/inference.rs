//! Model runtime abstraction
//!
//! A [`ModelRuntime`] turns a model asset into a [`LoadedModel`]. Loaded models
//! are immutable and shared read-only between concurrent invocations, see
//! [`crate::model_cache`].

use crate::{error::BackendError, models::ModelProfile};
use ndarray::Array4;
use std::path::Path;
use std::sync::Arc;

/// A loaded, immutable model that can run synchronous inference
pub trait LoadedModel: Send + Sync {
    /// Run one inference pass
    ///
    /// Returns the first output flattened in row-major order.
    ///
    /// # Errors
    /// - Runtime inference failures
    /// - Output tensor conversion failures
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, BackendError>;
}

/// Loads model assets into runnable models
pub trait ModelRuntime: Send + Sync {
    /// Short runtime name for logs and cache keys
    fn name(&self) -> &'static str;

    /// Load the model asset at `path` for `profile`
    ///
    /// # Errors
    /// - Missing or unreadable asset
    /// - Model parsing or optimization failures
    fn load_model(
        &self,
        profile: &ModelProfile,
        path: &Path,
    ) -> Result<Arc<dyn LoadedModel>, BackendError>;
}

/// The runtime compiled into this build, preferring the pure Rust one
#[must_use]
pub fn default_runtime(intra_threads: usize) -> Option<Arc<dyn ModelRuntime>> {
    #[cfg(feature = "tract")]
    let runtime: Option<Arc<dyn ModelRuntime>> = {
        // Tract sizes its own thread usage
        let _ = intra_threads;
        Some(Arc::new(crate::backends::tract::TractRuntime::new()))
    };

    #[cfg(all(feature = "onnx", not(feature = "tract")))]
    let runtime: Option<Arc<dyn ModelRuntime>> = Some(Arc::new(
        crate::backends::onnx::OnnxRuntime::new(intra_threads),
    ));

    #[cfg(not(any(feature = "tract", feature = "onnx")))]
    let runtime: Option<Arc<dyn ModelRuntime>> = {
        let _ = intra_threads;
        None
    };

    runtime
}
