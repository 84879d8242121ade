//! Command-line interface definitions for newsfeedback.
//!
//! Global options can be provided via flags or environment variables; the
//! work itself is chosen with a subcommand.

use crate::models::{DiscoveryStrategy, FilterMode};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for newsfeedback.
///
/// # Examples
///
/// ```sh
/// # Write a default config, register a homepage, run once
/// newsfeedback init
/// newsfeedback add https://www.example.de/ --pipeline harvest
/// newsfeedback run
///
/// # Re-run two homepages every 30 minutes
/// newsfeedback run https://www.example.de/ https://www.example.com/de/ --every-minutes 30
/// ```
/// Longest accepted scheduling interval: one week.
pub const MAX_EVERY_MINUTES: u64 = 7 * 24 * 60;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, env = "NEWSFEEDBACK_CONFIG", default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Discover, filter and export articles for configured homepages
    Run {
        /// Homepages to run (default: every configured homepage)
        homepages: Vec<String>,

        /// Repeat the whole batch every N minutes (at most one week)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_EVERY_MINUTES))]
        every_minutes: Option<u64>,
    },
    /// Write a default config file if none exists
    Init,
    /// Register (or update) a homepage
    Add {
        /// Homepage URL
        url: String,

        /// Discovery pipeline
        #[arg(long, value_enum, default_value_t = PipelineArg::Harvest)]
        pipeline: PipelineArg,

        /// Article filter
        #[arg(long, value_enum, default_value_t = FilterArg::On)]
        filter: FilterArg,

        /// CSS selector of the consent button (consent-harvest only)
        #[arg(long)]
        consent_selector: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineArg {
    Feed,
    Harvest,
    ConsentHarvest,
}

impl From<PipelineArg> for DiscoveryStrategy {
    fn from(arg: PipelineArg) -> Self {
        match arg {
            PipelineArg::Feed => DiscoveryStrategy::Feed,
            PipelineArg::Harvest => DiscoveryStrategy::Harvest,
            PipelineArg::ConsentHarvest => DiscoveryStrategy::ConsentHarvest,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterArg {
    On,
    Off,
}

impl From<FilterArg> for FilterMode {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::On => FilterMode::On,
            FilterArg::Off => FilterMode::Off,
        }
    }
}
