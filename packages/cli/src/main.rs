#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line entry point for transit demand synthesis.
//!
//! Loads `config.toml`, then processes every configured region (or the
//! subset named by `--regions`) concurrently, writing each region's
//! buildings index, demand dataset, and filtered road network.
//!
//! Uses `indicatif-log-bridge` (via [`transit_demand_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod run;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use transit_demand_region::{RegionPaths, load_config};

/// Synthesize commuter demand from map extracts.
#[derive(Parser)]
#[command(name = "transit_demand")]
#[command(about = "Synthesize commuter demand from map extracts")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory holding one `<code>/` folder of raw extracts per region.
    #[arg(long, default_value = "raw_data")]
    raw_dir: PathBuf,

    /// Directory receiving one `<code>/` folder of artifacts per region.
    #[arg(long, default_value = "processed_data")]
    output_dir: PathBuf,

    /// Comma-separated region codes to process. Defaults to all.
    #[arg(long, value_delimiter = ',')]
    regions: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = transit_demand_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    let config = load_config(&cli.config)?;
    let regions = run::select_regions(&config, &cli.regions)?;
    if regions.is_empty() {
        log::warn!("No regions configured in {}", cli.config.display());
        return Ok(());
    }

    std::fs::create_dir_all(&cli.output_dir)?;
    let paths = RegionPaths {
        raw_dir: cli.raw_dir,
        output_dir: cli.output_dir,
    };

    let total = regions.len();
    let (succeeded, failed) = run::run_regions(Arc::new(config), regions, &paths, &multi).await;

    log::info!(
        "Processed {}/{total} region(s) in {:.1}s",
        succeeded.len(),
        start.elapsed().as_secs_f64()
    );

    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "{} of {total} region(s) failed: {}",
            failed.len(),
            failed.join(", ")
        )
        .into())
    }
}
