//! Commute flow synthesis.
//!
//! For each origin catchment, job catchments are scored and selected, the
//! origin's residents are apportioned over them, per-origin terminal and
//! minimum-size corrections are applied, and each allocation is chunked
//! into population groups. A dataset-wide terminal cap runs last.

pub mod apportion;
pub mod chunk;
pub mod rebalance;
pub mod weights;

use std::sync::Arc;

use transit_demand_models::{DistanceWeightingConfig, PopulationChunkingConfig};
use transit_demand_spatial::GeometryOps;

use crate::catchment::CatchmentSet;
use crate::progress::ProgressCallback;

use self::apportion::{apportion, correct_terminal_share, enforce_minimum_size};
use self::chunk::split_into_groups;
use self::rebalance::enforce_global_terminal_cap;
use self::weights::{
    Candidate, rebalance_terminal_weights, score_candidates, select_candidates, tier,
};

/// Estimated driving seconds per metre.
pub const SECONDS_PER_METRE: f64 = 0.12;

/// One population group travelling from an origin to a destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    /// Sequential id, unique within a run.
    pub id: u64,
    /// Origin catchment index.
    pub origin: usize,
    /// Destination catchment index.
    pub dest: usize,
    /// Number of commuters.
    pub size: u64,
    /// Great-circle distance in metres.
    pub distance_m: f64,
    /// Closeness of the destination as seen from the origin.
    pub closeness: f64,
}

/// Computes the final allocations for one origin. Allocations may have
/// size zero.
#[must_use]
pub fn allocate_origin(
    origin: usize,
    set: &CatchmentSet,
    chunking: &PopulationChunkingConfig,
    weighting: &DistanceWeightingConfig,
    geometry: &dyn GeometryOps,
) -> Vec<Candidate> {
    let population = set.catchments[origin].residents;
    let candidates = score_candidates(origin, set, weighting, geometry);
    if candidates.is_empty() {
        return candidates;
    }

    let tier = tier(population, &weighting.population_tiers);
    let quota = weighting
        .tier_local_quotas
        .get(tier)
        .copied()
        .unwrap_or(0)
        .min(chunking.max_connections_per_point);

    let mut selected = select_candidates(candidates, quota, chunking.max_connections_per_point);
    rebalance_terminal_weights(&mut selected, weighting);
    apportion(population, &mut selected);
    correct_terminal_share(population, &mut selected, weighting);
    enforce_minimum_size(&mut selected, chunking.minimum_finalize_size);
    selected
}

/// Synthesizes all flows for a catchment set. Returned flows all have a
/// positive size.
#[must_use]
pub fn synthesize_flows(
    set: &CatchmentSet,
    chunking: &PopulationChunkingConfig,
    weighting: &DistanceWeightingConfig,
    geometry: &dyn GeometryOps,
    progress: &Arc<dyn ProgressCallback>,
) -> Vec<Flow> {
    let origins: Vec<usize> = (0..set.catchments.len())
        .filter(|&i| set.catchments[i].is_origin())
        .collect();

    progress.set_total(origins.len() as u64);
    progress.set_position(0);
    progress.set_message("Synthesizing flows".to_string());

    let mut flows = Vec::new();
    let mut next_id = 0u64;

    for origin in origins {
        let from = &set.catchments[origin];
        let allocations = allocate_origin(origin, set, chunking, weighting, geometry);
        log::debug!(
            "Origin {} ({} residents): {} destinations",
            from.node_id,
            from.residents,
            allocations.iter().filter(|c| c.size > 0).count()
        );

        for allocation in allocations.into_iter().filter(|c| c.size > 0) {
            let seed = format!("{}-{}", from.node_id, set.catchments[allocation.dest].node_id);
            for size in split_into_groups(allocation.size, &seed, chunking) {
                flows.push(Flow {
                    id: next_id,
                    origin,
                    dest: allocation.dest,
                    size,
                    distance_m: allocation.distance_m,
                    closeness: allocation.closeness,
                });
                next_id += 1;
            }
        }
        progress.inc(1);
    }

    enforce_global_terminal_cap(&mut flows, set, weighting);
    flows.retain(|f| f.size > 0);

    progress.finish(format!("{} population groups", flows.len()));
    log::info!(
        "Synthesized {} population groups covering {} commuters",
        flows.len(),
        flows.iter().map(|f| f.size).sum::<u64>()
    );
    flows
}
