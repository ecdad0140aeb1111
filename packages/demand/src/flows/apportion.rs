//! Integer apportionment of an origin's population over its selected
//! destinations, followed by the per-origin correction passes.
//!
//! Every function here preserves the total assigned size exactly.

use transit_demand_models::DistanceWeightingConfig;

use super::weights::Candidate;

/// Indices of `candidates` matching `filter`, ordered by closeness
/// (`descending` picks the closest first), then by index.
fn by_closeness(candidates: &[Candidate], descending: bool, filter: impl Fn(&Candidate) -> bool) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..candidates.len()).filter(|&i| filter(&candidates[i])).collect();
    indices.sort_by(|&a, &b| {
        let ord = candidates[a].closeness.total_cmp(&candidates[b].closeness);
        let ord = if descending { ord.reverse() } else { ord };
        ord.then(a.cmp(&b))
    });
    indices
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn share_units(population: u64, share: f64) -> u64 {
    (population as f64 * share).round().max(0.0) as u64
}

/// Splits `population` over `candidates` in proportion to their weights
/// using largest-remainder rounding.
///
/// Leftover units go one at a time to candidates ranked by
/// `fractional remainder × closeness`, wrapping around if there are more
/// units than candidates. With no positive weight the split is even.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn apportion(population: u64, candidates: &mut [Candidate]) {
    if candidates.is_empty() {
        return;
    }

    let total: f64 = candidates.iter().map(|c| c.weight).sum();
    let even = !(total.is_finite() && total > 0.0);
    let count = candidates.len() as f64;

    let mut fractions = Vec::with_capacity(candidates.len());
    let mut assigned = 0u64;
    for candidate in candidates.iter_mut() {
        let raw = if even {
            population as f64 / count
        } else {
            candidate.weight.max(0.0) / total * population as f64
        };
        let whole = raw.floor();
        candidate.size = whole as u64;
        assigned += candidate.size;
        fractions.push((raw - whole) * candidate.closeness);
    }

    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| fractions[b].total_cmp(&fractions[a]).then(a.cmp(&b)));

    let remaining = population.saturating_sub(assigned);
    for k in 0..remaining {
        let slot = order[usize::try_from(k).unwrap_or(0) % order.len()];
        candidates[slot].size += 1;
    }
}

/// Keeps terminal-bound units within `[round(pop × min_share),
/// round(pop × max_share)]`.
///
/// Excess units leave the least-close terminals first and are handed to
/// the closest ordinary destinations. A shortfall is made up one unit at
/// a time from the least-close ordinary destinations that can spare one,
/// given to the closest terminals.
pub fn correct_terminal_share(
    population: u64,
    candidates: &mut [Candidate],
    weighting: &DistanceWeightingConfig,
) {
    let terminal_units = |c: &[Candidate]| -> u64 {
        c.iter().filter(|c| c.terminal).map(|c| c.size).sum()
    };

    let ordinary = by_closeness(candidates, true, |c| !c.terminal);
    let terminals = by_closeness(candidates, true, |c| c.terminal);
    if terminals.is_empty() || ordinary.is_empty() {
        return;
    }

    let max_units = share_units(population, weighting.terminal_max_share);
    let current = terminal_units(candidates);
    if current > max_units {
        let mut excess = current - max_units;
        let mut removed = 0u64;
        for &i in terminals.iter().rev() {
            let take = candidates[i].size.min(excess);
            candidates[i].size -= take;
            excess -= take;
            removed += take;
            if excess == 0 {
                break;
            }
        }
        for &i in ordinary.iter().cycle().take(usize::try_from(removed).unwrap_or(0)) {
            candidates[i].size += 1;
        }
        log::trace!("Moved {removed} units off terminals");
    }

    let min_units = share_units(population, weighting.terminal_min_share);
    let current = terminal_units(candidates);
    if current < min_units {
        let needed = min_units - current;
        let mut moved = 0u64;
        let mut receivers = terminals.iter().cycle();
        while moved < needed {
            let Some(&donor) = ordinary.iter().rev().find(|&&i| candidates[i].size > 1) else {
                break;
            };
            let Some(&receiver) = receivers.next() else {
                break;
            };
            candidates[donor].size -= 1;
            candidates[receiver].size += 1;
            moved += 1;
        }
        log::trace!("Moved {moved} units onto terminals");
    }
}

/// Enforces `minimum_finalize_size` across an origin's allocations.
///
/// Nearest-distance picks that received nothing are first given one unit
/// from the most distant allocation still above the minimum. Then each
/// allocation below the minimum is merged, smallest first, into the
/// allocation whose distance is closest to its own (ties go to the higher
/// closeness), until none is below the minimum or only one remains.
pub fn enforce_minimum_size(candidates: &mut [Candidate], minimum: u64) {
    for i in 0..candidates.len() {
        if !candidates[i].local || candidates[i].size > 0 {
            continue;
        }
        let donor = (0..candidates.len())
            .filter(|&j| j != i && candidates[j].size > minimum)
            .max_by(|&a, &b| {
                candidates[a]
                    .distance_m
                    .total_cmp(&candidates[b].distance_m)
                    .then(b.cmp(&a))
            });
        if let Some(donor) = donor {
            candidates[donor].size -= 1;
            candidates[i].size += 1;
        }
    }

    loop {
        let active: Vec<usize> = (0..candidates.len()).filter(|&i| candidates[i].size > 0).collect();
        if active.len() <= 1 {
            break;
        }
        let Some(&small) = active
            .iter()
            .filter(|&&i| candidates[i].size < minimum)
            .min_by(|&&a, &&b| candidates[a].size.cmp(&candidates[b].size).then(a.cmp(&b)))
        else {
            break;
        };

        let reference = candidates[small].distance_m;
        let Some(&target) = active.iter().filter(|&&j| j != small).min_by(|&&a, &&b| {
            let da = (candidates[a].distance_m - reference).abs();
            let db = (candidates[b].distance_m - reference).abs();
            da.total_cmp(&db)
                .then_with(|| candidates[b].closeness.total_cmp(&candidates[a].closeness))
                .then(a.cmp(&b))
        }) else {
            break;
        };

        let moved = candidates[small].size;
        candidates[small].size = 0;
        candidates[target].size += moved;
    }
}

/// Total units assigned.
#[must_use]
pub fn assigned(candidates: &[Candidate]) -> u64 {
    candidates.iter().map(|c| c.size).sum()
}
