//! Silhouette extraction CLI tool
//!
//! Thin front end over [`SilhouettePipeline`]: every subcommand prints the
//! locator of each file it writes on stdout, diagnostics go to stderr.

use super::config::CliConfigBuilder;
use crate::{
    config::{OutputFormat, ResampleFilter},
    models::SegmentationKind,
    pipeline::SilhouettePipeline,
    services::TracingProgressReporter,
    tracing_config::{init_cli_tracing, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Foreground silhouette extraction
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "silhouette")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// What to cut out; selects the on-device model
    #[arg(long, value_enum, global = true)]
    pub kind: Option<CliKind>,

    /// Directory new files are written to [default: system temp dir]
    #[arg(short, long, value_name = "DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding `<asset_id>.onnx` model files
    #[arg(long, value_name = "DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    /// Skip the platform person segmenter
    #[arg(long, global = true)]
    pub no_native: bool,

    /// Skip the on-device model
    #[arg(long, global = true)]
    pub no_model: bool,

    /// Mask resampling filter
    #[arg(long, value_enum, global = true)]
    pub filter: Option<CliFilter>,

    /// Output format for cutouts (masks are always PNG)
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliOutputFormat>,

    /// Model output threshold, exclusive, in (0, 1)
    #[arg(long, global = true)]
    pub threshold: Option<f32>,

    /// Model runtime threads (0 = auto)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format on stderr
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Cut the foreground out of one or more images
    Extract {
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<String>,
    },
    /// Write only the segmentation mask of an image
    Mask {
        #[arg(value_name = "INPUT")]
        input: String,
    },
    /// Apply an existing mask image to an original
    Compose {
        #[arg(value_name = "ORIGINAL")]
        original: String,
        #[arg(value_name = "MASK")]
        mask: String,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliKind {
    Body,
    Clothes,
}

impl From<CliKind> for SegmentationKind {
    fn from(kind: CliKind) -> Self {
        match kind {
            CliKind::Body => SegmentationKind::Body,
            CliKind::Clothes => SegmentationKind::Clothes,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliFilter {
    Nearest,
    Bilinear,
}

impl From<CliFilter> for ResampleFilter {
    fn from(filter: CliFilter) -> Self {
        match filter {
            CliFilter::Nearest => ResampleFilter::Nearest,
            CliFilter::Bilinear => ResampleFilter::Bilinear,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Tiff,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    /// Colored human-readable lines
    Console,
    /// Plain compact lines for CI logs
    Compact,
    /// One JSON object per event
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into()).context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    info!(
        kind = %config.kind,
        filter = %config.resample_filter,
        output_dir = %config.output_dir.display(),
        "Starting silhouette CLI"
    );

    let pipeline = SilhouettePipeline::builder(config)
        .with_progress_reporter(Arc::new(TracingProgressReporter::new(cli.verbose > 0)))
        .build()
        .context("Failed to create silhouette pipeline")?;

    match &cli.command {
        Command::Extract { inputs } => extract_all(&pipeline, inputs).await,
        Command::Mask { input } => {
            let locator = pipeline
                .generate_mask(input)
                .await
                .with_context(|| format!("Failed to generate mask for {input}"))?;
            print_locator(&locator)
        },
        Command::Compose { original, mask } => {
            let locator = pipeline
                .compose_with_mask(original, mask)
                .await
                .with_context(|| format!("Failed to compose {original} with {mask}"))?;
            print_locator(&locator)
        },
    }
}

async fn extract_all(pipeline: &SilhouettePipeline, inputs: &[String]) -> Result<()> {
    let start_time = Instant::now();
    let progress = if inputs.len() > 1 {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut failed = 0usize;
    let mut degraded = 0usize;
    for input in inputs {
        if let Some(pb) = &progress {
            pb.set_message(format!("Processing {input}"));
        }

        match pipeline.extract_silhouette_with_report(input).await {
            Ok(report) => {
                if report.is_degraded() {
                    degraded += 1;
                    warn!(input = %input, "No segmentation available, wrote uncut image");
                }
                info!(input = %input, "{}", report.timings.summary());
                match &progress {
                    Some(pb) => pb.println(&report.output_locator),
                    None => print_locator(&report.output_locator)?,
                }
            },
            Err(e) => {
                failed += 1;
                error!(input = %input, error = %e, "❌ Extraction failed");
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    info!(
        "Processed {} image(s) in {:.2}s ({} uncut, {} failed)",
        inputs.len() - failed,
        start_time.elapsed().as_secs_f64(),
        degraded,
        failed
    );

    if failed > 0 {
        anyhow::bail!("{failed} of {} input(s) failed", inputs.len());
    }
    Ok(())
}

fn print_locator(locator: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{locator}").context("Failed to write to stdout")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from(["silhouette", "extract", "a.png", "b.jpg"]);
        assert_eq!(
            cli.command,
            Command::Extract {
                inputs: vec!["a.png".to_string(), "b.jpg".to_string()]
            }
        );

        let cli = Cli::parse_from(["silhouette", "compose", "orig.png", "mask.png", "-vv"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Compose { .. }));
    }

    #[test]
    fn test_log_format_flag() {
        let cli = Cli::parse_from(["silhouette", "mask", "a.png"]);
        assert_eq!(cli.log_format, CliLogFormat::Console);

        let cli = Cli::parse_from(["silhouette", "--log-format", "compact", "mask", "a.png"]);
        assert_eq!(TracingFormat::from(cli.log_format), TracingFormat::Compact);

        assert!(Cli::try_parse_from(["silhouette", "--log-format", "xml", "mask", "a.png"]).is_err());
    }

    #[cfg(feature = "tracing-json")]
    #[test]
    fn test_json_log_format_flag() {
        let cli = Cli::parse_from(["silhouette", "mask", "a.png", "--log-format", "json"]);
        assert_eq!(TracingFormat::from(cli.log_format), TracingFormat::Json);
    }

    #[test]
    fn test_extract_requires_input() {
        assert!(Cli::try_parse_from(["silhouette", "extract"]).is_err());
    }
}
