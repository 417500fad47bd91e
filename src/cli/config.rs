//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::SilhouetteConfig;
use anyhow::{Context, Result};

/// Convert CLI arguments to a `SilhouetteConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from `--config` (or defaults) and apply command line overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<SilhouetteConfig> {
        let mut config = match &cli.config {
            Some(path) => SilhouetteConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => SilhouetteConfig::default(),
        };

        if let Some(kind) = cli.kind {
            config.kind = kind.into();
        }
        if let Some(filter) = cli.filter {
            config.resample_filter = filter.into();
        }
        if let Some(format) = cli.format {
            config.output_format = format.into();
        }
        if let Some(dir) = &cli.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(dir) = &cli.model_dir {
            config.model_dir.clone_from(dir);
        }
        if cli.no_native {
            config.native_enabled = false;
        }
        if cli.no_model {
            config.model_enabled = false;
        }
        if let Some(threshold) = cli.threshold {
            config.threshold = threshold;
        }
        if let Some(threads) = cli.threads {
            config.intra_threads = threads;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
