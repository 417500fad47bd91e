//! Silhouette extraction pipeline
//!
//! The [`SilhouettePipeline`] owns an ordered backend chain and drives one
//! extraction end to end: decode the source once, try each backend in order until
//! one yields a mask, composite the source with that mask, encode, and write the
//! result to a fresh locator.
//!
//! Backend failures never reach the caller. Only a source that fails to decode,
//! or a failure after a mask was chosen (compositing, encoding, writing), is
//! reported as an error.

use crate::{
    backends::{
        ModelBackend, NativeBackend, OpaqueBackend, PersonSegmenter, SegmentationBackend,
    },
    config::{OutputFormat, SilhouetteConfig},
    error::{BackendError, Result, SilhouetteError},
    imaging::{codec, Compositor},
    inference::{default_runtime, ModelRuntime},
    model_cache::ModelCache,
    services::{
        io::{read_source, OutputStore},
        progress::{NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate},
    },
    types::{
        CompositeResult, ExtractionReport, Mask, ProcessingTimings, SegmentationOutcome,
        SourceImage,
    },
};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, debug_span, info, instrument, warn, Instrument};

/// Prefix of mask files produced by a real backend
pub const MASK_PREFIX: &str = "mask_";

/// Prefix of mask files produced by the opaque fallback
pub const FALLBACK_MASK_PREFIX: &str = "mask_fallback_";

/// Orchestrates decoding, the backend chain, compositing and output writing
pub struct SilhouettePipeline {
    config: SilhouetteConfig,
    backends: Vec<Arc<dyn SegmentationBackend>>,
    compositor: Compositor,
    store: OutputStore,
    progress: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for SilhouettePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SilhouettePipeline")
            .field("config", &self.config)
            .field("backends", &self.backend_names())
            .finish()
    }
}

impl SilhouettePipeline {
    /// Pipeline with the default chain for `config`
    ///
    /// # Errors
    /// `InvalidConfig` when `config` does not validate.
    pub fn new(config: SilhouetteConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    #[must_use]
    pub fn builder(config: SilhouetteConfig) -> SilhouettePipelineBuilder {
        SilhouettePipelineBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &SilhouetteConfig {
        &self.config
    }

    /// Names of the chained backends in attempt order
    #[must_use]
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Decode the image at `locator`
    ///
    /// # Errors
    /// `Decode` for non-local locators, unreadable files and invalid image bytes.
    pub async fn load_source(&self, locator: &str) -> Result<SourceImage> {
        read_source(locator).await
    }

    /// Run the backend chain on an already decoded source
    ///
    /// Backends are attempted strictly one after another. The first success wins;
    /// every failure is logged and absorbed.
    pub async fn segment(&self, source: Arc<SourceImage>) -> SegmentationOutcome {
        let start = Instant::now();
        let mut last_error: Option<BackendError> = None;

        for backend in &self.backends {
            let name = backend.name().to_string();
            self.report(ProcessingStage::Segmentation(name.clone()), start);

            let span = debug_span!("backend_attempt", backend = %name);
            match backend.attempt(Arc::clone(&source)).instrument(span).await {
                Ok(mask) if name == OpaqueBackend::NAME => {
                    debug!(backend = %name, "Using opaque fallback mask");
                    return SegmentationOutcome::degraded(mask, last_error.as_ref());
                },
                Ok(mask) => {
                    debug!(
                        backend = %name,
                        mask_width = mask.dimensions().0,
                        mask_height = mask.dimensions().1,
                        "Backend produced mask"
                    );
                    return SegmentationOutcome::Success {
                        mask,
                        backend: name,
                    };
                },
                Err(err) => {
                    warn!(
                        backend = %name,
                        kind = err.kind(),
                        reason = %err,
                        "Segmentation backend failed, falling through"
                    );
                    last_error = Some(err);
                },
            }
        }

        SegmentationOutcome::degraded(
            OpaqueBackend::mask_for(source.dimensions()),
            last_error.as_ref(),
        )
    }

    /// Decode `locator` and run the backend chain
    ///
    /// A source that fails to decode yields [`SegmentationOutcome::Failure`].
    pub async fn segment_locator(&self, locator: &str) -> SegmentationOutcome {
        match self.load_source(locator).await {
            Ok(source) => self.segment(Arc::new(source)).await,
            Err(err) => SegmentationOutcome::Failure(err),
        }
    }

    /// Extract the silhouette of the image at `locator`
    ///
    /// Returns the locator of a newly written RGBA image at the source
    /// resolution. If the source decodes, a result is always produced, possibly
    /// uncut when no backend could segment it.
    ///
    /// # Errors
    /// - `Decode` when the source is not a readable local image
    /// - `Render` / `Encode` when the chosen mask cannot be applied or encoded
    /// - `Io` when the output cannot be written
    pub async fn extract_silhouette(&self, locator: &str) -> Result<String> {
        self.extract_silhouette_with_report(locator)
            .await
            .map(|report| report.output_locator)
    }

    /// [`Self::extract_silhouette`] plus backend, dimensions and timings
    ///
    /// # Errors
    /// See [`Self::extract_silhouette`].
    #[instrument(skip(self), fields(kind = %self.config.kind))]
    pub async fn extract_silhouette_with_report(&self, locator: &str) -> Result<ExtractionReport> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        self.report(ProcessingStage::Decoding, total_start);
        let stage_start = Instant::now();
        let source = Arc::new(
            self.load_source(locator)
                .await
                .inspect_err(|e| self.progress.report_error(ProcessingStage::Decoding, &e.to_string()))?,
        );
        timings.decode_ms = elapsed_ms(stage_start);
        let source_dimensions = source.dimensions();

        let stage_start = Instant::now();
        let (mask, backend, degraded_reason) = match self.segment(Arc::clone(&source)).await {
            SegmentationOutcome::Success { mask, backend } => (mask, backend, None),
            SegmentationOutcome::Degraded { mask, reason } => {
                warn!(reason = %reason, "No backend could segment the source, output is uncut");
                (mask, OpaqueBackend::NAME.to_string(), Some(reason))
            },
            SegmentationOutcome::Failure(err) => return Err(err),
        };
        timings.segmentation_ms = elapsed_ms(stage_start);
        let mask_dimensions = mask.dimensions();

        self.report(ProcessingStage::Compositing, total_start);
        let stage_start = Instant::now();
        let composite = self
            .composite(source, mask)
            .await
            .inspect_err(|e| self.progress.report_error(ProcessingStage::Compositing, &e.to_string()))?;
        timings.compositing_ms = elapsed_ms(stage_start);

        self.report(ProcessingStage::Encoding, total_start);
        let stage_start = Instant::now();
        let format = self.config.output_format;
        let bytes = run_blocking(move || codec::encode(composite.buffer(), format))
            .await
            .inspect_err(|e| self.progress.report_error(ProcessingStage::Encoding, &e.to_string()))?;
        timings.encode_ms = elapsed_ms(stage_start);

        self.report(ProcessingStage::Writing, total_start);
        let stage_start = Instant::now();
        let path = self
            .store
            .write_new(&self.config.output_prefix, format.extension(), &bytes)
            .await
            .inspect_err(|e| self.progress.report_error(ProcessingStage::Writing, &e.to_string()))?;
        timings.write_ms = elapsed_ms(stage_start);
        timings.total_ms = elapsed_ms(total_start);

        self.report(ProcessingStage::Completed, total_start);
        self.progress.report_completion(&timings);

        let output_locator = locator_string(&path);
        info!(
            output = %output_locator,
            backend = %backend,
            degraded = degraded_reason.is_some(),
            total_ms = timings.total_ms,
            "Silhouette extracted"
        );

        Ok(ExtractionReport {
            output_locator,
            backend,
            degraded_reason,
            source_dimensions,
            mask_dimensions,
            timings,
        })
    }

    /// Run the chain and write only the chosen mask as PNG
    ///
    /// RGB is written white; the alpha channel is the mask.
    /// The file name starts with [`MASK_PREFIX`], or [`FALLBACK_MASK_PREFIX`]
    /// when the opaque fallback produced the mask.
    ///
    /// # Errors
    /// - `Decode` when the source is not a readable local image
    /// - `Encode` / `Io` when the mask cannot be written
    #[instrument(skip(self), fields(kind = %self.config.kind))]
    pub async fn generate_mask(&self, locator: &str) -> Result<String> {
        let outcome = self.segment_locator(locator).await;
        let prefix = if outcome.is_degraded() {
            FALLBACK_MASK_PREFIX
        } else {
            MASK_PREFIX
        };
        let mask = outcome.into_mask()?;

        let bytes =
            run_blocking(move || codec::encode(mask.to_white().buffer(), OutputFormat::Png)).await?;
        let path = self
            .store
            .write_new(prefix, OutputFormat::Png.extension(), &bytes)
            .await?;

        let output_locator = locator_string(&path);
        info!(output = %output_locator, "Mask written");
        Ok(output_locator)
    }

    /// Composite the image at `original` with the mask image at `mask`
    ///
    /// The mask file's alpha channel is the mask; it is resampled to the
    /// original's size.
    ///
    /// # Errors
    /// - `Decode` when either input is not a readable local image
    /// - `Render` / `Encode` / `Io` as for [`Self::extract_silhouette`]
    #[instrument(skip(self))]
    pub async fn compose_with_mask(&self, original: &str, mask: &str) -> Result<String> {
        let source = Arc::new(self.load_source(original).await?);
        let mask = Mask::from_rgba(self.load_source(mask).await?.buffer().clone());

        let composite = self.composite(source, mask).await?;
        let format = self.config.output_format;
        let bytes = run_blocking(move || codec::encode(composite.buffer(), format)).await?;
        let path = self
            .store
            .write_new(&self.config.output_prefix, format.extension(), &bytes)
            .await?;

        let output_locator = locator_string(&path);
        info!(output = %output_locator, "Composite written");
        Ok(output_locator)
    }

    async fn composite(&self, source: Arc<SourceImage>, mask: Mask) -> Result<CompositeResult> {
        let compositor = self.compositor;
        run_blocking(move || compositor.composite(&source, &mask)).await
    }

    fn report(&self, stage: ProcessingStage, start: Instant) {
        self.progress.report_progress(ProgressUpdate::new(stage, start));
    }
}

/// Builder for [`SilhouettePipeline`]
///
/// Without an explicit chain the pipeline uses, in order: the native backend
/// (only when a segmenter is registered and `native_enabled`), the model
/// backend (when `model_enabled`) and the opaque fallback.
pub struct SilhouettePipelineBuilder {
    config: SilhouetteConfig,
    segmenter: Option<Arc<dyn PersonSegmenter>>,
    runtime: Option<Option<Arc<dyn ModelRuntime>>>,
    cache: Option<Arc<ModelCache>>,
    chain: Option<Vec<Arc<dyn SegmentationBackend>>>,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl SilhouettePipelineBuilder {
    #[must_use]
    pub fn new(config: SilhouetteConfig) -> Self {
        Self {
            config,
            segmenter: None,
            runtime: None,
            cache: None,
            chain: None,
            progress: None,
        }
    }

    /// Register the platform person segmenter for the native backend
    #[must_use]
    pub fn with_person_segmenter(mut self, segmenter: Arc<dyn PersonSegmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    /// Override the model runtime; `None` disables inference entirely
    #[must_use]
    pub fn with_model_runtime(mut self, runtime: Option<Arc<dyn ModelRuntime>>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Use `cache` instead of the process-wide model cache
    #[must_use]
    pub fn with_model_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Append a backend to an explicit chain, replacing the default chain
    ///
    /// The opaque fallback is still appended at the end when missing.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn SegmentationBackend>) -> Self {
        self.chain.get_or_insert_with(Vec::new).push(backend);
        self
    }

    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration does not validate.
    pub fn build(self) -> Result<SilhouettePipeline> {
        self.config.validate()?;
        let config = self.config;

        let mut backends = match self.chain {
            Some(chain) => chain,
            None => {
                let mut chain: Vec<Arc<dyn SegmentationBackend>> = Vec::new();
                if config.native_enabled {
                    if let Some(segmenter) = self.segmenter {
                        chain.push(Arc::new(NativeBackend::new(
                            segmenter,
                            config.resample_filter,
                        )));
                    }
                }
                if config.model_enabled {
                    let runtime = self
                        .runtime
                        .unwrap_or_else(|| default_runtime(config.intra_threads));
                    chain.push(Arc::new(ModelBackend::new(
                        runtime,
                        self.cache.unwrap_or_else(ModelCache::global),
                        config.kind.profile(),
                        config.model_dir.clone(),
                        config.threshold,
                    )));
                }
                chain
            },
        };

        if backends.last().map(|b| b.name()) != Some(OpaqueBackend::NAME) {
            backends.push(Arc::new(OpaqueBackend::new()));
        }

        let pipeline = SilhouettePipeline {
            compositor: Compositor::new(config.resample_filter),
            store: OutputStore::new(config.output_dir.clone()),
            progress: self
                .progress
                .unwrap_or_else(|| Arc::new(NoOpProgressReporter)),
            backends,
            config,
        };
        debug!(backends = ?pipeline.backend_names(), "Pipeline ready");
        Ok(pipeline)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn locator_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SilhouetteError::internal(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockRuntime, MockSegmenter};
    use crate::backends::{NativeMask, NativeSegmentationError};
    use crate::types::PixelBuffer;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn config(dir: &Path) -> SilhouetteConfig {
        SilhouetteConfig::builder()
            .output_dir(dir)
            .model_dir(dir.join("models"))
            .build()
            .unwrap()
    }

    fn source(width: u32, height: u32) -> Arc<SourceImage> {
        Arc::new(SourceImage::new(
            PixelBuffer::filled(width, height, [0, 0, 255, 255]),
            PathBuf::from("blue.png"),
        ))
    }

    #[derive(Default)]
    struct RecordingReporter {
        stages: Mutex<Vec<ProcessingStage>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.stages.lock().unwrap().push(update.stage);
        }

        fn report_completion(&self, _timings: &ProcessingTimings) {}

        fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
    }

    #[test]
    fn test_default_chain_order() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SilhouettePipeline::builder(config(dir.path()))
            .with_person_segmenter(Arc::new(MockSegmenter::failing(
                NativeSegmentationError::NoSubjectFound,
            )))
            .with_model_runtime(None)
            .with_model_cache(Arc::new(ModelCache::new()))
            .build()
            .unwrap();
        assert_eq!(pipeline.backend_names(), vec!["native", "model", "opaque"]);

        let mut cfg = config(dir.path());
        cfg.native_enabled = false;
        cfg.model_enabled = false;
        let pipeline = SilhouettePipeline::builder(cfg)
            .with_person_segmenter(Arc::new(MockSegmenter::failing(
                NativeSegmentationError::NoSubjectFound,
            )))
            .build()
            .unwrap();
        assert_eq!(pipeline.backend_names(), vec!["opaque"]);
    }

    #[test]
    fn test_explicit_chain_gets_opaque_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SilhouettePipeline::builder(config(dir.path()))
            .with_backend(Arc::new(NativeBackend::unavailable()))
            .build()
            .unwrap();
        assert_eq!(pipeline.backend_names(), vec!["native", "opaque"]);

        let pipeline = SilhouettePipeline::builder(config(dir.path()))
            .with_backend(Arc::new(OpaqueBackend::new()))
            .build()
            .unwrap();
        assert_eq!(pipeline.backend_names(), vec!["opaque"]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut cfg = SilhouetteConfig::default();
        cfg.threshold = 1.5;
        assert!(matches!(
            SilhouettePipeline::new(cfg),
            Err(SilhouetteError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_no_subject_falls_through_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let segmenter = Arc::new(MockSegmenter::failing(NativeSegmentationError::NoSubjectFound));
        let pipeline = SilhouettePipeline::builder(config(dir.path()))
            .with_person_segmenter(segmenter.clone())
            .with_model_runtime(Some(Arc::new(MockRuntime::constant(0.8))))
            .with_model_cache(Arc::new(ModelCache::new()))
            .build()
            .unwrap();

        match pipeline.segment(source(64, 64)).await {
            SegmentationOutcome::Success { mask, backend } => {
                assert_eq!(backend, "model");
                assert_eq!(mask.dimensions(), (256, 256));
                assert!(mask.is_fully_opaque());
            },
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(segmenter.call_count(), 1);
    }

    #[tokio::test]
    async fn test_every_failure_degrades_to_opaque() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let pipeline = SilhouettePipeline::builder(config(dir.path()))
            .with_person_segmenter(Arc::new(MockSegmenter::failing(
                NativeSegmentationError::NotAvailable("no vision framework".to_string()),
            )))
            .with_model_runtime(Some(Arc::new(MockRuntime::failing_inference())))
            .with_model_cache(Arc::new(ModelCache::new()))
            .with_progress_reporter(reporter.clone())
            .build()
            .unwrap();

        match pipeline.segment(source(10, 6)).await {
            SegmentationOutcome::Degraded { mask, reason } => {
                assert_eq!(mask.dimensions(), (10, 6));
                assert!(mask.is_fully_opaque());
                assert!(reason.contains("inference failed"));
            },
            other => panic!("unexpected outcome: {other:?}"),
        }

        let stages = reporter.stages.lock().unwrap().clone();
        assert_eq!(
            stages,
            vec![
                ProcessingStage::Segmentation("native".to_string()),
                ProcessingStage::Segmentation("model".to_string()),
                ProcessingStage::Segmentation("opaque".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_native_success_skips_model() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(MockRuntime::constant(0.9));
        let pipeline = SilhouettePipeline::builder(config(dir.path()))
            .with_person_segmenter(Arc::new(MockSegmenter::returning(NativeMask::new(
                2,
                2,
                vec![255, 0, 0, 255],
            ))))
            .with_model_runtime(Some(runtime.clone()))
            .with_model_cache(Arc::new(ModelCache::new()))
            .build()
            .unwrap();

        let outcome = pipeline.segment(source(4, 4)).await;
        assert!(matches!(
            outcome,
            SegmentationOutcome::Success { ref backend, .. } if backend == "native"
        ));
        assert_eq!(runtime.load_count(), 0);
    }

    #[tokio::test]
    async fn test_segment_locator_reports_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SilhouettePipeline::builder(config(dir.path()))
            .with_model_runtime(None)
            .build()
            .unwrap();
        let outcome = pipeline.segment_locator("https://example.com/a.png").await;
        assert!(matches!(
            outcome,
            SegmentationOutcome::Failure(SilhouetteError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_mask_writes_white_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("blue.png");
        let png = codec::encode(&PixelBuffer::filled(2, 2, [0, 0, 255, 255]), OutputFormat::Png);
        std::fs::write(&input, png.unwrap()).unwrap();

        let pipeline = SilhouettePipeline::builder(config(&dir.path().join("out")))
            .with_person_segmenter(Arc::new(MockSegmenter::returning(NativeMask::new(
                2,
                2,
                vec![255, 0, 128, 255],
            ))))
            .with_model_runtime(None)
            .build()
            .unwrap();

        let locator = pipeline.generate_mask(input.to_str().unwrap()).await.unwrap();
        let written = codec::decode(&std::fs::read(&locator).unwrap()).unwrap();
        let pixels: Vec<[u8; 4]> = (0..4).filter_map(|i| written.pixel(i)).collect();
        assert_eq!(
            pixels,
            vec![
                [255, 255, 255, 255],
                [255, 255, 255, 0],
                [255, 255, 255, 128],
                [255, 255, 255, 255],
            ]
        );
    }
}
