//! Destination scoring and candidate selection for one origin.

use transit_demand_models::DistanceWeightingConfig;
use transit_demand_spatial::GeometryOps;

use crate::catchment::CatchmentSet;

/// Smallest job share used in the attraction term.
const MIN_JOB_SHARE: f64 = 1e-6;

/// A scored destination for one origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Destination catchment index.
    pub dest: usize,
    /// Great-circle distance between node locations, in metres.
    pub distance_m: f64,
    /// Distance decay in `[closeness_floor, 1]`.
    pub closeness: f64,
    /// Apportionment weight.
    pub weight: f64,
    /// Whether the destination is an airport terminal.
    pub terminal: bool,
    /// Whether the candidate was picked by the nearest-distance quota.
    pub local: bool,
    /// Units of population assigned.
    pub size: u64,
}

/// Population tier of an origin: the number of tier thresholds it
/// reaches.
#[must_use]
pub fn tier(population: u64, thresholds: &[u64]) -> usize {
    thresholds.iter().filter(|&&t| population >= t).count()
}

/// Distance decay `max(floor, 1 / (1 + (d / scale)^exp))`.
#[must_use]
pub fn closeness(distance_km: f64, scale_km: f64, weighting: &DistanceWeightingConfig) -> f64 {
    let ratio = if scale_km > 0.0 { distance_km / scale_km } else { 0.0 };
    let decay = 1.0 / (1.0 + ratio.powf(weighting.distance_exponent));
    decay.max(weighting.closeness_floor)
}

/// Scores every job-bearing catchment as a destination for `origin`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_candidates(
    origin: usize,
    set: &CatchmentSet,
    weighting: &DistanceWeightingConfig,
    geometry: &dyn GeometryOps,
) -> Vec<Candidate> {
    let total_jobs = set.total_jobs();
    let source = &set.catchments[origin];
    let tier = tier(source.residents, &weighting.population_tiers);
    let scale_km = weighting
        .tier_scales_km
        .get(tier)
        .or_else(|| weighting.tier_scales_km.last())
        .copied()
        .unwrap_or(1.0);

    set.catchments
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_destination())
        .map(|(dest, target)| {
            let distance_km = geometry.distance_km(source.location, target.location);
            let closeness = closeness(distance_km, scale_km, weighting);
            let share = if total_jobs > 0 {
                target.jobs as f64 / total_jobs as f64
            } else {
                0.0
            };

            let terminal = target.terminal.is_some();
            let mut attraction = ((target.jobs + 1) as f64).powf(weighting.job_exponent)
                * share.max(MIN_JOB_SHARE).powf(weighting.cluster_exponent);
            let mut exponent = weighting.closeness_exponent;
            if terminal {
                attraction *= weighting.terminal_boost;
                exponent = exponent.min(weighting.terminal_closeness_exponent);
            }

            Candidate {
                dest,
                distance_m: distance_km * 1000.0,
                closeness,
                weight: attraction.mul_add(closeness.powf(exponent), weighting.base_weight),
                terminal,
                local: false,
                size: 0,
            }
        })
        .collect()
}

/// Picks the destinations an origin connects to.
///
/// The `local_quota` nearest candidates and every terminal are always
/// kept. The remaining slots, up to `max_connections` (or more if the
/// guaranteed picks already exceed it), go to the highest weights.
/// The result is ordered by destination index.
#[must_use]
pub fn select_candidates(
    mut candidates: Vec<Candidate>,
    local_quota: usize,
    max_connections: usize,
) -> Vec<Candidate> {
    let mut chosen = vec![false; candidates.len()];

    let mut by_distance: Vec<usize> = (0..candidates.len()).collect();
    by_distance.sort_by(|&a, &b| {
        candidates[a]
            .distance_m
            .total_cmp(&candidates[b].distance_m)
            .then(candidates[a].dest.cmp(&candidates[b].dest))
    });
    for &i in by_distance.iter().take(local_quota) {
        chosen[i] = true;
        candidates[i].local = true;
    }

    for (i, candidate) in candidates.iter().enumerate() {
        if candidate.terminal {
            chosen[i] = true;
        }
    }

    let guaranteed = chosen.iter().filter(|c| **c).count();
    let limit = max_connections.max(guaranteed);

    let mut by_weight: Vec<usize> = (0..candidates.len()).filter(|&i| !chosen[i]).collect();
    by_weight.sort_by(|&a, &b| {
        candidates[b]
            .weight
            .total_cmp(&candidates[a].weight)
            .then(candidates[a].dest.cmp(&candidates[b].dest))
    });
    for i in by_weight.into_iter().take(limit - guaranteed) {
        chosen[i] = true;
    }

    let mut selected: Vec<Candidate> = candidates
        .into_iter()
        .zip(chosen)
        .filter_map(|(c, keep)| keep.then_some(c))
        .collect();
    selected.sort_by_key(|c| c.dest);
    selected
}

/// Rescales terminal weights so the terminal share of total weight lies
/// within `[terminal_min_share, terminal_max_share]`.
///
/// Only terminal weights change, and none drops below a tenth of the base
/// weight. Nothing happens unless both terminal and ordinary candidates
/// are present.
pub fn rebalance_terminal_weights(selected: &mut [Candidate], weighting: &DistanceWeightingConfig) {
    let terminal: f64 = selected.iter().filter(|c| c.terminal).map(|c| c.weight).sum();
    let ordinary: f64 = selected.iter().filter(|c| !c.terminal).map(|c| c.weight).sum();
    if terminal <= 0.0 || ordinary <= 0.0 {
        return;
    }

    let share = terminal / (terminal + ordinary);
    let target = if share < weighting.terminal_min_share {
        weighting.terminal_min_share
    } else if share > weighting.terminal_max_share {
        weighting.terminal_max_share
    } else {
        return;
    };
    if target >= 1.0 {
        return;
    }

    let factor = (target * ordinary / (1.0 - target)) / terminal;
    let floor = weighting.base_weight / 10.0;
    for candidate in selected.iter_mut().filter(|c| c.terminal) {
        candidate.weight = (candidate.weight * factor).max(floor);
    }
}
