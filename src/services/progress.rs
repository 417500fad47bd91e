//! Progress reporting service
//!
//! Keeps progress reporting out of the pipeline logic so each frontend can
//! render it its own way.

use crate::types::ProcessingTimings;
use instant::Instant;

/// Stages of one extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Reading and decoding the source image
    Decoding,
    /// Attempting the named segmentation backend
    Segmentation(String),
    /// Resampling the mask and merging channels
    Compositing,
    /// Encoding the output raster
    Encoding,
    /// Writing the output file
    Writing,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            ProcessingStage::Decoding => "Decoding source image".to_string(),
            ProcessingStage::Segmentation(backend) => format!("Segmenting with {backend} backend"),
            ProcessingStage::Compositing => "Compositing mask".to_string(),
            ProcessingStage::Encoding => "Encoding output".to_string(),
            ProcessingStage::Writing => "Writing output".to_string(),
            ProcessingStage::Completed => "Processing completed".to_string(),
        }
    }

    /// Typical progress percentage at the start of this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Decoding => 5,
            ProcessingStage::Segmentation(_) => 20,
            ProcessingStage::Compositing => 80,
            ProcessingStage::Encoding => 90,
            ProcessingStage::Writing => 97,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for reporting progress during extraction
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// Discards all progress updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Emits progress as `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter {
    verbose: bool,
}

impl TracingProgressReporter {
    /// `verbose` adds elapsed times and the per-stage timing breakdown
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            tracing::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            tracing::debug!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        if self.verbose {
            tracing::info!("✅ {}", timings.summary());
        } else {
            tracing::info!("✅ Silhouette extracted in {}ms", timings.total_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        tracing::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_stage_descriptions() {
        assert_eq!(
            ProcessingStage::Segmentation("native".to_string()).description(),
            "Segmenting with native backend"
        );
        assert_eq!(
            ProcessingStage::Completed.description(),
            "Processing completed"
        );
    }

    #[test]
    fn test_progress_percentages_increase() {
        let stages = [
            ProcessingStage::Decoding,
            ProcessingStage::Segmentation("model".to_string()),
            ProcessingStage::Compositing,
            ProcessingStage::Encoding,
            ProcessingStage::Writing,
            ProcessingStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
    }

    #[test]
    fn test_progress_update_creation() {
        let update = ProgressUpdate::new(ProcessingStage::Encoding, Instant::now());
        assert_eq!(update.progress, 90);
        assert_eq!(update.description, "Encoding output");
        assert_eq!(update.stage, ProcessingStage::Encoding);
    }

    #[test]
    fn test_reporters_accept_all_calls() {
        let timings = ProcessingTimings::default();
        for reporter in [
            Box::new(NoOpProgressReporter) as Box<dyn ProgressReporter>,
            Box::new(TracingProgressReporter::new(true)),
        ] {
            reporter.report_progress(ProgressUpdate::new(ProcessingStage::Decoding, Instant::now()));
            reporter.report_completion(&timings);
            reporter.report_error(ProcessingStage::Writing, "disk full");
        }
    }
}
