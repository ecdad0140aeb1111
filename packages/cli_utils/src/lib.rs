#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the transit demand command line.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines are printed above the progress
//! bars instead of tearing them. [`IndicatifProgress`] renders the
//! pipeline's [`ProgressCallback`] reports as `indicatif` bars.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use transit_demand::progress::ProgressCallback;

pub use indicatif::{MultiProgress, ProgressDrawTarget};

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} [{prefix}] {msg}";
const ORIGINS_TEMPLATE: &str =
    "  [{prefix}] {msg} {wide_bar:.cyan/dim} {pos}/{len} origins {percent}% [{eta}]";
const REGIONS_TEMPLATE: &str = "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]";

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| fallback())
        .progress_chars("##-")
}

/// Progress of one region, or of the run as a whole, drawn with
/// `indicatif`.
///
/// A region bar is a spinner while inputs load and the index is built,
/// and turns into an origins counter once flow synthesis reports how many
/// origins it has.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied by `set_total()`.
    counting: ProgressStyle,
    /// Region code, `None` for the run-wide bar.
    region: Option<String>,
}

impl IndicatifProgress {
    /// Bar for one region, labelled with its code.
    #[must_use]
    pub fn region_bar(multi: &MultiProgress, code: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner));
        bar.set_prefix(code.to_string());
        bar.set_message("Loading extracts");

        Arc::new(Self {
            bar,
            counting: style(ORIGINS_TEMPLATE, ProgressStyle::default_bar),
            region: Some(code.to_string()),
        })
    }

    /// Bar counting finished regions out of `total`.
    #[must_use]
    pub fn regions_bar(multi: &MultiProgress, total: u64) -> Arc<dyn ProgressCallback> {
        let counting = style(REGIONS_TEMPLATE, ProgressStyle::default_bar);
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(counting.clone());
        bar.set_message("Regions");

        Arc::new(Self {
            bar,
            counting,
            region: None,
        })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.counting.clone());
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        if let Some(code) = &self.region {
            log::debug!("{code}: {msg}");
        }
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs the global logger, filtered by `RUST_LOG` and routed through
/// `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] that every progress bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already installed when called twice in one process.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
