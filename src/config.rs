//! Configuration types for silhouette extraction

use crate::error::{Result, SilhouetteError};
use crate::models::SegmentationKind;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Interpolation used when a mask is resampled to another resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleFilter {
    /// Nearest source pixel; keeps binary masks binary
    Nearest,
    /// Bilinear interpolation; avoids jagged mask edges
    #[default]
    Bilinear,
}

impl std::fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}

impl From<ResampleFilter> for FilterType {
    fn from(filter: ResampleFilter) -> Self {
        match filter {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// Encoded output format; both keep the alpha channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Tiff,
}

impl OutputFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Tiff => "tiff",
        }
    }

    #[must_use]
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Configuration for silhouette extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilhouetteConfig {
    /// Which fixed model the on-device backend uses
    pub kind: SegmentationKind,

    /// Try the platform person segmenter first when one is registered
    pub native_enabled: bool,

    /// Try the on-device model backend
    pub model_enabled: bool,

    /// Directory holding `<asset_id>.onnx` model files
    pub model_dir: PathBuf,

    /// Directory new output artifacts are written to
    pub output_dir: PathBuf,

    /// File name prefix for cutouts
    pub output_prefix: String,

    pub output_format: OutputFormat,

    /// Filter used when masks are rescaled to source resolution
    pub resample_filter: ResampleFilter,

    /// Model outputs strictly greater than this are foreground
    pub threshold: f32,

    /// Threads for the model runtime (0 = runtime default)
    pub intra_threads: usize,
}

impl Default for SilhouetteConfig {
    fn default() -> Self {
        Self {
            kind: SegmentationKind::default(),
            native_enabled: true,
            model_enabled: true,
            model_dir: default_model_dir(),
            output_dir: std::env::temp_dir(),
            output_prefix: "sil_".to_string(),
            output_format: OutputFormat::default(),
            resample_filter: ResampleFilter::default(),
            threshold: 0.5,
            intra_threads: 0,
        }
    }
}

/// `~/.cache/silhouette-extract/models` (or the platform equivalent)
#[must_use]
pub fn default_model_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("silhouette-extract")
        .join("models")
}

impl SilhouetteConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use silhouette_extract::{ResampleFilter, SegmentationKind, SilhouetteConfig};
    ///
    /// let config = SilhouetteConfig::builder()
    ///     .kind(SegmentationKind::Clothes)
    ///     .resample_filter(ResampleFilter::Nearest)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.kind, SegmentationKind::Clothes);
    /// ```
    #[must_use]
    pub fn builder() -> SilhouetteConfigBuilder {
        SilhouetteConfigBuilder::default()
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SilhouetteError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SilhouetteError::invalid_config(format!(
                "Failed to parse '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Threshold outside the open interval (0, 1)
    /// - Empty output prefix
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(SilhouetteError::config_value_error(
                "threshold",
                self.threshold,
                "(0, 1)",
                Some(0.5),
            ));
        }

        if self.output_prefix.is_empty() {
            return Err(SilhouetteError::invalid_config(
                "output prefix must not be empty",
            ));
        }

        if self.output_prefix.contains(['/', '\\']) {
            return Err(SilhouetteError::invalid_config(format!(
                "output prefix '{}' must not contain path separators",
                self.output_prefix
            )));
        }

        Ok(())
    }
}

/// Builder for `SilhouetteConfig`
#[derive(Debug, Default)]
pub struct SilhouetteConfigBuilder {
    config: SilhouetteConfig,
}

impl SilhouetteConfigBuilder {
    #[must_use]
    pub fn kind(mut self, kind: SegmentationKind) -> Self {
        self.config.kind = kind;
        self
    }

    #[must_use]
    pub fn native_enabled(mut self, enabled: bool) -> Self {
        self.config.native_enabled = enabled;
        self
    }

    #[must_use]
    pub fn model_enabled(mut self, enabled: bool) -> Self {
        self.config.model_enabled = enabled;
        self
    }

    #[must_use]
    pub fn model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.model_dir = dir.into();
        self
    }

    #[must_use]
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn output_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn resample_filter(mut self, filter: ResampleFilter) -> Self {
        self.config.resample_filter = filter;
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.config.threshold = threshold;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<SilhouetteConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
