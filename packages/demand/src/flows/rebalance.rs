//! Dataset-wide terminal traffic cap.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use transit_demand_models::DistanceWeightingConfig;

use super::Flow;
use crate::catchment::CatchmentSet;

fn least_close_first(indices: &mut [usize], flows: &[Flow]) {
    indices.sort_by(|&a, &b| {
        flows[a]
            .closeness
            .total_cmp(&flows[b].closeness)
            .then(a.cmp(&b))
    });
}

/// Caps terminal-bound units at `round(total residents × global share)`.
///
/// The largest terminal flows are shrunk one unit at a time, never below
/// one. If that cannot reach the cap, whole flows are dropped, least close
/// first. The cap is then divided among terminal groups in proportion to
/// their jobs, and each group over its share is trimmed from its least
/// close flows, again never below one unit per flow.
///
/// Returns the number of units removed.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn enforce_global_terminal_cap(
    flows: &mut [Flow],
    set: &CatchmentSet,
    weighting: &DistanceWeightingConfig,
) -> u64 {
    let key_of = |flow: &Flow| set.catchments[flow.dest].terminal.as_deref();

    let terminal: Vec<usize> = (0..flows.len()).filter(|&i| key_of(&flows[i]).is_some()).collect();
    if terminal.is_empty() {
        return 0;
    }

    let cap = (set.total_residents() as f64 * weighting.global_terminal_share)
        .round()
        .max(0.0) as u64;
    let before: u64 = terminal.iter().map(|&i| flows[i].size).sum();
    if before <= cap {
        return 0;
    }

    let mut total = before;
    let mut heap: BinaryHeap<(u64, Reverse<usize>)> = terminal
        .iter()
        .filter(|&&i| flows[i].size > 1)
        .map(|&i| (flows[i].size, Reverse(i)))
        .collect();
    while total > cap {
        let Some((_, Reverse(i))) = heap.pop() else {
            break;
        };
        flows[i].size -= 1;
        total -= 1;
        if flows[i].size > 1 {
            heap.push((flows[i].size, Reverse(i)));
        }
    }

    if total > cap {
        let mut order = terminal.clone();
        least_close_first(&mut order, flows);
        for i in order {
            if total <= cap {
                break;
            }
            total -= flows[i].size;
            flows[i].size = 0;
        }
    }

    let jobs = set.terminal_jobs();
    let all_jobs: u64 = jobs.values().sum();
    let mut by_key: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for &i in &terminal {
        if let Some(key) = key_of(&flows[i]) {
            by_key.entry(key).or_default().push(i);
        }
    }

    for (key, mut indices) in by_key {
        let share = if all_jobs > 0 {
            (cap as f64 * jobs.get(key).copied().unwrap_or(0) as f64 / all_jobs as f64).floor() as u64
        } else {
            cap
        };
        let mut units: u64 = indices.iter().map(|&i| flows[i].size).sum();
        if units <= share {
            continue;
        }
        least_close_first(&mut indices, flows);
        for i in indices {
            while units > share && flows[i].size > 1 {
                flows[i].size -= 1;
                units -= 1;
            }
            if units <= share {
                break;
            }
        }
        log::debug!("Terminal group {key}: {units} units (share {share})");
    }

    let after: u64 = terminal.iter().map(|&i| flows[i].size).sum();
    log::info!("Terminal traffic capped at {cap}: {before} -> {after} units");
    before - after
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catchment::{Catchment, IdMap};
    use geo::Point;

    fn catchment(id: &str, residents: u64, jobs: u64, terminal: Option<&str>) -> Catchment {
        Catchment {
            node_id: id.to_string(),
            name: None,
            terminal: terminal.map(str::to_string),
            location: Point::new(0.0, 0.0),
            population: residents,
            jobs,
            residents,
        }
    }

    fn flow(id: u64, dest: usize, size: u64, closeness: f64) -> Flow {
        Flow {
            id,
            origin: 0,
            dest,
            size,
            distance_m: 1000.0,
            closeness,
        }
    }

    fn set() -> CatchmentSet {
        CatchmentSet {
            catchments: vec![
                catchment("home", 1000, 0, None),
                catchment("work", 0, 100, None),
                catchment("terminal-1", 0, 300, Some("LJU")),
                catchment("terminal-2", 0, 100, Some("ZAG")),
            ],
            ids: IdMap::default(),
        }
    }

    #[test]
    fn under_cap_is_untouched() {
        let mut flows = vec![flow(0, 1, 900, 1.0), flow(1, 2, 40, 0.5)];
        assert_eq!(enforce_global_terminal_cap(&mut flows, &set(), &DistanceWeightingConfig::default()), 0);
        assert_eq!(flows[1].size, 40);
    }

    #[test]
    fn largest_terminal_flows_shrink_first() {
        let mut flows = vec![
            flow(0, 1, 800, 1.0),
            flow(1, 2, 60, 0.5),
            flow(2, 2, 30, 0.6),
            flow(3, 3, 10, 0.4),
        ];
        let removed = enforce_global_terminal_cap(&mut flows, &set(), &DistanceWeightingConfig::default());
        let terminal: u64 = flows[1..].iter().map(|f| f.size).sum();
        assert!(terminal <= 40, "terminal units {terminal}");
        assert_eq!(removed, 100 - terminal);
        assert_eq!(flows[0].size, 800);
        assert!(flows[1..].iter().all(|f| f.size >= 1));
        // ZAG's share is floor(40 * 100 / 400) = 10.
        assert!(flows[3].size <= 10);
    }

    #[test]
    fn whole_flows_drop_when_shrinking_is_not_enough() {
        let mut flows: Vec<Flow> = (0..60u32).map(|i| flow(u64::from(i), 2, 1, f64::from(i))).collect();
        enforce_global_terminal_cap(&mut flows, &set(), &DistanceWeightingConfig::default());
        let terminal: u64 = flows.iter().map(|f| f.size).sum();
        assert_eq!(terminal, 40);
        // The least close flows were the ones removed.
        assert!(flows[..20].iter().all(|f| f.size == 0));
    }
}
