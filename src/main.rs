//! # newsfeedback
//!
//! Discovers article URLs on news homepages, filters out section and utility
//! pages, extracts article metadata and exports one CSV per homepage run.
//!
//! ## Features
//!
//! - Three discovery pipelines per homepage: RSS/Atom/sitemap feeds, anchor
//!   harvesting, and harvesting behind a consent wall ("Pur Abo") after a
//!   browser click
//! - URL normalization that repairs doubled slashes, locale and host segments
//! - Heuristic article filter with blacklist, whitelist and section denylist
//! - Metadata extraction from JSON-LD, Open Graph and plain HTML
//! - Fixed-interval scheduling of the whole batch
//!
//! ## Usage
//!
//! ```sh
//! newsfeedback init
//! newsfeedback add https://www.example.de/
//! newsfeedback run --every-minutes 60
//! ```
//!
//! ## Architecture
//!
//! Each homepage goes through the same stages, sequentially:
//! 1. **Discovery**: feed, harvest or consent-harvest, per config
//! 2. **Filtering**: drop URLs that are not articles
//! 3. **Extraction**: fetch each article and read its metadata
//! 4. **Export**: append the table to a CSV below `output_dir`

use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod discovery;
mod error;
mod extract;
mod fetch;
mod models;
mod outputs;
mod pipeline;
#[cfg(test)]
mod testing;
mod urls;
mod utils;

use browser::ChromiumDriver;
use cli::{Cli, Command};
use config::{Config, HomepageConfig};
use discovery::feeds::FeedFinder;
use extract::HtmlMetadataExtractor;
use fetch::HttpFetcher;
use models::HomepageContext;
use outputs::csv::CsvExporter;
use pipeline::Orchestrator;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(config = %args.config.display(), command = ?args.command, "Parsed CLI arguments");

    match args.command {
        Command::Init => init(&args.config)?,
        Command::Add {
            url,
            pipeline,
            filter,
            consent_selector,
        } => {
            let mut homepage = HomepageConfig::new(url, pipeline.into(), filter.into());
            homepage.consent_selector = consent_selector;
            add(&args.config, homepage)?;
        }
        Command::Run {
            homepages,
            every_minutes,
        } => {
            let config = Config::load(&args.config)?;
            run(&config, &homepages, every_minutes).await?;
        }
    }
    Ok(())
}

fn init(path: &Path) -> error::Result<()> {
    if path.exists() {
        info!(path = %path.display(), "Config already exists; leaving it untouched");
        return Ok(());
    }
    Config::default().save(path)
}

fn add(path: &Path, homepage: HomepageConfig) -> error::Result<()> {
    HomepageContext::parse(&homepage.url)?;
    let mut config = Config::load(path)?;
    info!(url = %homepage.url, pipeline = %homepage.pipeline, filter = %homepage.filter, "Registering homepage");
    config.upsert_homepage(homepage);
    config.save(path)
}

async fn run(config: &Config, homepages: &[String], every_minutes: Option<u64>) -> error::Result<()> {
    let start_time = std::time::Instant::now();
    info!("newsfeedback starting up");

    // Early check: the output dir must be writable before anything is fetched
    let output_dir = PathBuf::from(&config.output_dir);
    if let Err(e) = ensure_writable_dir(&output_dir).await {
        error!(
            path = %output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different output_dir)"
        );
        return Err(e);
    }

    let fetcher = HttpFetcher::new(&config.harvest)?;
    let feeds = FeedFinder::new(&fetcher);
    let browser = ChromiumDriver::new(config.consent.page_load());
    let extractor = HtmlMetadataExtractor;
    let exporter = CsvExporter::new(output_dir);
    let orchestrator = Orchestrator::new(config, &fetcher, &feeds, &browser, &extractor, &exporter);

    match every_minutes {
        None => {
            orchestrator.run_batch(homepages).await;
        }
        Some(minutes) => {
            let mut interval = tokio::time::interval(schedule_period(minutes));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(minutes, "Scheduling batch");
            loop {
                interval.tick().await;
                orchestrator.run_batch(homepages).await;
                info!(minutes, "Waiting for next scheduled run");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Period between scheduled batches.
fn schedule_period(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}
