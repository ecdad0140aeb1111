//! Region selection and the concurrent region loop.

use std::sync::Arc;

use tokio::task::JoinSet;
use transit_demand_cli_utils::{IndicatifProgress, MultiProgress};
use transit_demand_models::{Config, RegionConfig};
use transit_demand_region::{RegionPaths, RegionSummary, process_region};

/// Returns the configured regions whose codes appear in `codes`, in
/// configuration order. An empty `codes` selects every region.
///
/// # Errors
///
/// Returns the list of requested codes that no region has.
pub fn select_regions(config: &Config, codes: &[String]) -> Result<Vec<RegionConfig>, String> {
    if codes.is_empty() {
        return Ok(config.regions.clone());
    }

    let unknown: Vec<&str> = codes
        .iter()
        .map(|c| c.trim())
        .filter(|c| !config.regions.iter().any(|r| r.code == *c))
        .collect();
    if !unknown.is_empty() {
        return Err(format!("Unknown region code(s): {}", unknown.join(", ")));
    }

    Ok(config
        .regions
        .iter()
        .filter(|r| codes.iter().any(|c| c.trim() == r.code))
        .cloned()
        .collect())
}

/// Processes every region concurrently. A failed region is logged and
/// does not stop the others.
///
/// Returns the summaries of the regions that succeeded and the codes of
/// those that failed, both in configuration order.
pub async fn run_regions(
    config: Arc<Config>,
    regions: Vec<RegionConfig>,
    paths: &RegionPaths,
    multi: &MultiProgress,
) -> (Vec<RegionSummary>, Vec<String>) {
    let overall = IndicatifProgress::regions_bar(multi, regions.len() as u64);
    let mut tasks = JoinSet::new();

    for (position, region) in regions.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let paths = paths.clone();
        let progress = IndicatifProgress::region_bar(multi, &region.code);
        tasks.spawn(async move {
            let result = process_region(&region, &config, &paths, progress).await;
            (position, region.code, result)
        });
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        overall.inc(1);
        match joined {
            Ok((position, _, Ok(summary))) => {
                log::info!(
                    "{}: {} points, {} population groups, {} commuters",
                    summary.code,
                    summary.points,
                    summary.pops,
                    summary.commuters
                );
                succeeded.push((position, summary));
            }
            Ok((position, code, Err(e))) => {
                log::error!("Region {code} failed: {e}");
                failed.push((position, code));
                overall.set_message(format!("Regions ({} failed)", failed.len()));
            }
            Err(e) => {
                log::error!("Region task panicked: {e}");
                failed.push((usize::MAX, "<unknown>".to_string()));
                overall.set_message(format!("Regions ({} failed)", failed.len()));
            }
        }
    }
    overall.finish_and_clear();

    succeeded.sort_by_key(|(position, _)| *position);
    failed.sort_by_key(|(position, _)| *position);
    (
        succeeded.into_iter().map(|(_, s)| s).collect(),
        failed.into_iter().map(|(_, c)| c).collect(),
    )
}
