//! Error types for silhouette extraction
//!
//! Two layers exist. [`SilhouetteError`] is what callers of the pipeline can
//! observe. [`BackendError`] is produced by individual segmentation backends and
//! is always absorbed by the orchestrator through fallthrough to the next backend.

use thiserror::Error;

/// Result type alias for silhouette extraction operations
pub type Result<T> = std::result::Result<T, SilhouetteError>;

/// Caller-visible error kinds
#[derive(Error, Debug)]
pub enum SilhouetteError {
    /// Filesystem errors while writing output artifacts
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source bytes are not a valid image, or the locator is not a local file
    #[error("Decode error: {0}")]
    Decode(String),

    /// Output raster could not be built or encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Raster rendering failed after a mask was chosen
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SilhouetteError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new render error
    pub fn render<S: Into<String>>(msg: S) -> Self {
        Self::Render(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }
}

/// Failure of a single segmentation backend
///
/// Every variant triggers fallthrough to the next backend in the chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The capability is absent on this platform or build
    #[error("capability not available: {0}")]
    NotAvailable(String),

    /// The source reference or buffer cannot be handed to the backend
    #[error("invalid source: {0}")]
    InvalidSource(String),

    /// The backend could not load the source into its own representation
    #[error("image load failed: {0}")]
    LoadFailed(String),

    /// The backend's own segmentation step failed internally
    #[error("segmentation processing failed: {0}")]
    Processing(String),

    /// Segmentation ran but found no person/subject
    #[error("no subject found")]
    NoSubjectFound,

    /// Model asset is missing or failed to load
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Runtime inference failure
    #[error("inference failed: {0}")]
    Inference(String),

    /// Inference produced fewer values than the mask needs
    #[error("malformed model output: expected at least {expected} values, got {actual}")]
    MalformedOutput { expected: usize, actual: usize },

    /// Rendering the backend's mask raster failed
    #[error("mask render failed: {0}")]
    Render(String),
}

impl BackendError {
    pub fn not_available<S: Into<String>>(msg: S) -> Self {
        Self::NotAvailable(msg.into())
    }

    pub fn model_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    pub fn render<S: Into<String>>(msg: S) -> Self {
        Self::Render(msg.into())
    }

    /// Short machine-friendly tag for logs and reports
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAvailable(_) => "not_available",
            Self::InvalidSource(_) => "invalid_source",
            Self::LoadFailed(_) => "load_failed",
            Self::Processing(_) => "processing_error",
            Self::NoSubjectFound => "no_subject_found",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::Inference(_) => "inference_error",
            Self::MalformedOutput { .. } => "malformed_output",
            Self::Render(_) => "render_error",
        }
    }
}
