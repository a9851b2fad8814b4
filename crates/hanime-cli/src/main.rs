mod cli;
mod commands;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hanime_core::{HanimeScraper, ScraperConfig, ThumbnailPipeline};

use crate::cli::Cli;

/// Thumbnails older than this are leftovers of killed processes
const STALE_THUMBNAIL_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing; quiet unless RUST_LOG says otherwise
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{:?}", e);
            eprintln!("error: {}", commands::describe(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ScraperConfig::load(path)?,
        None => ScraperConfig::default(),
    };
    let scraper = HanimeScraper::with_config(&config)?;

    let pipeline = ThumbnailPipeline::from_config(scraper.transport(), &config);
    if let Err(e) = pipeline.sweep_stale(STALE_THUMBNAIL_AGE) {
        tracing::warn!("Failed to sweep {}: {}", pipeline.dir().display(), e);
    }

    commands::run(cli.command, &config, &scraper).await
}
