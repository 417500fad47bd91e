//! Test utilities and mock collaborators for backend testing
//!
//! Mock implementations of [`ModelRuntime`], [`LoadedModel`] and
//! [`PersonSegmenter`] so the backend chain can be exercised without model
//! files, Tract, ONNX Runtime or a platform segmenter.

use crate::{
    error::BackendError,
    inference::{LoadedModel, ModelRuntime},
    models::ModelProfile,
    types::PixelBuffer,
};
use super::native::{NativeMask, NativeSegmentationError, PersonSegmenter};
use ndarray::Array4;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a [`MockLoadedModel`] answers with
#[derive(Debug, Clone)]
enum MockOutput {
    /// One value per output pixel, all equal
    Constant(f32),
    /// Exactly these values, whatever the profile
    Values(Vec<f32>),
    /// Inference error
    Fail,
}

/// Mock model runtime
#[derive(Debug)]
pub struct MockRuntime {
    output: MockOutput,
    should_fail_load: bool,
    loads: AtomicUsize,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockRuntime {
    fn with(output: MockOutput, should_fail_load: bool) -> Self {
        Self {
            output,
            should_fail_load,
            loads: AtomicUsize::new(0),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Runtime whose models answer `value` for every pixel
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self::with(MockOutput::Constant(value), false)
    }

    /// Runtime whose models answer exactly `values`
    #[must_use]
    pub fn with_values(values: Vec<f32>) -> Self {
        Self::with(MockOutput::Values(values), false)
    }

    /// Runtime that fails every load
    #[must_use]
    pub fn failing_load() -> Self {
        Self::with(MockOutput::Constant(0.0), true)
    }

    /// Runtime whose models fail every inference
    #[must_use]
    pub fn failing_inference() -> Self {
        Self::with(MockOutput::Fail, false)
    }

    /// Number of `load_model` calls so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    /// Record a method call for testing verification
    fn record_call(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }
}

impl ModelRuntime for MockRuntime {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn load_model(
        &self,
        profile: &ModelProfile,
        path: &Path,
    ) -> Result<Arc<dyn LoadedModel>, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.record_call(format!("load:{}", path.display()));

        if self.should_fail_load {
            return Err(BackendError::model_unavailable(format!(
                "mock asset {} missing",
                profile.asset_id
            )));
        }

        let (width, height) = profile.output_dimensions();
        Ok(Arc::new(MockLoadedModel {
            output: self.output.clone(),
            len: width as usize * height as usize,
            call_history: Arc::clone(&self.call_history),
        }))
    }
}

/// Mock loaded model
#[derive(Debug)]
pub struct MockLoadedModel {
    output: MockOutput,
    len: usize,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl LoadedModel for MockLoadedModel {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, BackendError> {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(format!("infer:{:?}", input.shape()));
        }
        match &self.output {
            MockOutput::Constant(value) => Ok(vec![*value; self.len]),
            MockOutput::Values(values) => Ok(values.clone()),
            MockOutput::Fail => Err(BackendError::inference("mock inference failure")),
        }
    }
}

/// Mock platform person segmenter
#[derive(Debug)]
pub struct MockSegmenter {
    result: Result<NativeMask, NativeSegmentationError>,
    calls: AtomicUsize,
}

impl MockSegmenter {
    #[must_use]
    pub fn returning(mask: NativeMask) -> Self {
        Self {
            result: Ok(mask),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(error: NativeSegmentationError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PersonSegmenter for MockSegmenter {
    fn segment_person(&self, _image: &PixelBuffer) -> Result<NativeMask, NativeSegmentationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SegmentationKind;
    use std::path::PathBuf;

    #[test]
    fn test_mock_runtime_records_calls() {
        let runtime = MockRuntime::constant(1.0);
        let profile = SegmentationKind::Body.profile();
        let model = runtime
            .load_model(&profile, &PathBuf::from("/m/selfie_segmentation.onnx"))
            .unwrap();
        let out = model.infer(&Array4::zeros((1, 256, 256, 3))).unwrap();

        assert_eq!(out.len(), 256 * 256);
        assert_eq!(
            runtime.get_call_history(),
            vec![
                "load:/m/selfie_segmentation.onnx".to_string(),
                "infer:[1, 256, 256, 3]".to_string()
            ]
        );
    }
}
