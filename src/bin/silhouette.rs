//! Silhouette extraction CLI tool
//!
//! Command-line interface over the silhouette-extract library.

use silhouette_extract::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
