//! Shared test collaborators and fixtures
//!
//! Integration tests implement the library's seams directly instead of relying
//! on crate-internal mocks.

#![allow(dead_code)]

use ndarray::Array4;
use silhouette_extract::{
    config::OutputFormat,
    imaging::codec,
    BackendError, LoadedModel, ModelCache, ModelProfile, ModelRuntime, NativeMask,
    NativeSegmentationError, PersonSegmenter, PixelBuffer, SilhouetteConfig,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Model runtime that loads every asset and answers a constant per pixel
pub struct ConstantRuntime {
    pub value: f32,
    pub loads: AtomicUsize,
}

impl ConstantRuntime {
    pub fn new(value: f32) -> Self {
        Self {
            value,
            loads: AtomicUsize::new(0),
        }
    }
}

struct ConstantModel {
    value: f32,
    len: usize,
}

impl LoadedModel for ConstantModel {
    fn infer(&self, _input: &Array4<f32>) -> Result<Vec<f32>, BackendError> {
        Ok(vec![self.value; self.len])
    }
}

impl ModelRuntime for ConstantRuntime {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn load_model(
        &self,
        profile: &ModelProfile,
        _path: &Path,
    ) -> Result<Arc<dyn LoadedModel>, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let (w, h) = profile.output_dimensions();
        Ok(Arc::new(ConstantModel {
            value: self.value,
            len: w as usize * h as usize,
        }))
    }
}

/// Model runtime whose assets never load
pub struct MissingModelRuntime;

impl ModelRuntime for MissingModelRuntime {
    fn name(&self) -> &'static str {
        "missing"
    }

    fn load_model(
        &self,
        profile: &ModelProfile,
        path: &Path,
    ) -> Result<Arc<dyn LoadedModel>, BackendError> {
        Err(BackendError::model_unavailable(format!(
            "{} not found at {}",
            profile.asset_id,
            path.display()
        )))
    }
}

/// Person segmenter with a fixed answer
pub struct FixedSegmenter(pub Result<NativeMask, NativeSegmentationError>);

impl PersonSegmenter for FixedSegmenter {
    fn segment_person(&self, _image: &PixelBuffer) -> Result<NativeMask, NativeSegmentationError> {
        self.0.clone()
    }
}

/// 32x32 native mask with an opaque 16x16 top-left quadrant
pub fn quadrant_native_mask() -> NativeMask {
    let mut data = vec![0u8; 32 * 32];
    for y in 0..16 {
        for x in 0..16 {
            data[y * 32 + x] = 255;
        }
    }
    NativeMask::new(32, 32, data)
}

/// Temp workspace with separate input and output directories
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("in")).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        Self { dir }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn config(&self) -> SilhouetteConfig {
        SilhouetteConfig::builder()
            .output_dir(self.output_dir())
            .model_dir(self.dir.path().join("models"))
            .build()
            .unwrap()
    }

    /// Write a solid-color PNG and return its path as a locator string
    pub fn solid_png(&self, name: &str, width: u32, height: u32, rgba: [u8; 4]) -> String {
        self.write_png(name, &PixelBuffer::filled(width, height, rgba))
    }

    pub fn write_png(&self, name: &str, buffer: &PixelBuffer) -> String {
        let path = self.input_dir().join(name);
        std::fs::write(&path, codec::encode(buffer, OutputFormat::Png).unwrap()).unwrap();
        path.to_str().unwrap().to_string()
    }

    pub fn output_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.output_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
    }
}

/// Decode a written output
pub fn read_output(locator: &str) -> PixelBuffer {
    codec::decode(&std::fs::read(locator).unwrap()).unwrap()
}

/// Fresh, isolated model cache
pub fn cache() -> Arc<ModelCache> {
    Arc::new(ModelCache::new())
}
