//! Catchment tessellation and aggregation.
//!
//! Seeds are turned into Voronoi cells clipped to the region bounding box.
//! Every classified building is assigned to the first cell (in seed order)
//! containing its center, and each cell sums the population and jobs of
//! its buildings.

use std::collections::BTreeMap;

use geo::{BoundingRect, Point, Rect};
use transit_demand_models::DistanceWeightingConfig;
use transit_demand_spatial::{GeometryOps, PointIndex};

use crate::capacity::DemandBuilding;
use crate::seeds::Seed;

/// Bidirectional mapping between seed ids and output node ids.
///
/// Ordinary seeds keep their id. Terminals are given `terminal-<n>`
/// display ids from a monotonic counter.
#[derive(Debug, Default, Clone)]
pub struct IdMap {
    to_node: BTreeMap<String, String>,
    to_seed: BTreeMap<String, String>,
    terminals: usize,
}

impl IdMap {
    /// Registers `seed` and returns its node id.
    pub fn assign(&mut self, seed: &Seed) -> String {
        if let Some(existing) = self.to_node.get(&seed.id) {
            return existing.clone();
        }
        let node_id = if seed.terminal.is_some() {
            self.terminals += 1;
            format!("terminal-{}", self.terminals)
        } else {
            seed.id.clone()
        };
        self.to_node.insert(seed.id.clone(), node_id.clone());
        self.to_seed.insert(node_id.clone(), seed.id.clone());
        node_id
    }

    /// Node id for a seed id.
    #[must_use]
    pub fn node_id(&self, seed_id: &str) -> Option<&str> {
        self.to_node.get(seed_id).map(String::as_str)
    }

    /// Seed id for a node id.
    #[must_use]
    pub fn seed_id(&self, node_id: &str) -> Option<&str> {
        self.to_seed.get(node_id).map(String::as_str)
    }
}

/// Aggregated demand of one cell.
#[derive(Debug, Clone)]
pub struct Catchment {
    /// Output node id.
    pub node_id: String,
    /// Display name carried over from the seed.
    pub name: Option<String>,
    /// Terminal group key.
    pub terminal: Option<String>,
    /// Node location.
    pub location: Point<f64>,
    /// Residents summed over member buildings.
    pub population: u64,
    /// Jobs summed over member buildings.
    pub jobs: u64,
    /// Residents reported on the node. Zero for terminals and
    /// job-dominant catchments.
    pub residents: u64,
}

impl Catchment {
    /// Whether this catchment produces commute flows.
    #[must_use]
    pub const fn is_origin(&self) -> bool {
        self.residents > 0
    }

    /// Whether this catchment can receive commute flows.
    #[must_use]
    pub const fn is_destination(&self) -> bool {
        self.jobs > 0
    }
}

/// All catchments of a region, in seed order.
#[derive(Debug, Clone)]
pub struct CatchmentSet {
    /// One entry per seed.
    pub catchments: Vec<Catchment>,
    /// Seed id / node id mapping.
    pub ids: IdMap,
}

#[derive(Default)]
struct Accumulator {
    population: u64,
    jobs: u64,
    population_weighted: Vec<(Point<f64>, f64)>,
    job_weighted: Vec<(Point<f64>, f64)>,
}

impl CatchmentSet {
    /// Tessellates `bbox` around `seeds` and aggregates `buildings` into
    /// the cells.
    ///
    /// Seeds whose cell is degenerate still get a catchment, with no
    /// members.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(
        seeds: &[Seed],
        buildings: &[DemandBuilding<'_>],
        bbox: Rect<f64>,
        weighting: &DistanceWeightingConfig,
        geometry: &dyn GeometryOps,
    ) -> Self {
        let sites: Vec<Point<f64>> = seeds.iter().map(|s| s.location).collect();
        let cells = geometry.tessellate(&sites, bbox);
        let degenerate = cells.iter().filter(|c| c.is_none()).count();
        if degenerate > 0 {
            log::warn!("{degenerate} of {} seeds produced no catchment cell", seeds.len());
        }

        let centers: Vec<Point<f64>> = buildings.iter().map(|b| b.center).collect();
        let index = PointIndex::new(&centers);
        let mut claimed = vec![false; buildings.len()];
        let mut accumulators: Vec<Accumulator> = Vec::with_capacity(seeds.len());

        for cell in &cells {
            let mut acc = Accumulator::default();
            if let Some(polygon) = cell
                && let Some(rect) = polygon.bounding_rect()
            {
                for i in index.in_rect(rect) {
                    if claimed[i] || !geometry.contains(polygon, centers[i]) {
                        continue;
                    }
                    claimed[i] = true;
                    let capacity = buildings[i].capacity;
                    acc.population += capacity.residents();
                    acc.jobs += capacity.jobs();
                    if capacity.residents() > 0 {
                        acc.population_weighted
                            .push((centers[i], capacity.residents() as f64));
                    }
                    if capacity.jobs() > 0 {
                        acc.job_weighted.push((centers[i], capacity.jobs() as f64));
                    }
                }
            }
            accumulators.push(acc);
        }

        let unassigned = claimed.iter().filter(|c| !**c).count();
        if unassigned > 0 {
            log::debug!("{unassigned} buildings fell outside every catchment");
        }

        let mut ids = IdMap::default();
        let catchments = seeds
            .iter()
            .zip(accumulators)
            .map(|(seed, acc)| {
                let population_center = geometry.center_of_mass(&acc.population_weighted);
                let job_center = geometry.center_of_mass(&acc.job_weighted);

                let job_dominant = acc.population > 0
                    && acc.jobs as f64 >= weighting.job_dominance_ratio * acc.population as f64;
                let residents = if seed.terminal.is_some() || job_dominant {
                    0
                } else {
                    acc.population
                };

                let center = if seed.terminal.is_some() {
                    job_center
                } else if residents > 0 {
                    population_center
                } else if acc.jobs > 0 {
                    job_center
                } else {
                    None
                };
                let location = center.unwrap_or(seed.location);

                Catchment {
                    node_id: ids.assign(seed),
                    name: seed.name.clone(),
                    terminal: seed.terminal.clone(),
                    location,
                    population: acc.population,
                    jobs: acc.jobs,
                    residents,
                }
            })
            .collect::<Vec<_>>();

        log::info!(
            "Aggregated {} catchments: {} residents, {} jobs",
            catchments.len(),
            catchments.iter().map(|c| c.residents).sum::<u64>(),
            catchments.iter().map(|c| c.jobs).sum::<u64>()
        );

        Self { catchments, ids }
    }

    /// Total jobs across all catchments.
    #[must_use]
    pub fn total_jobs(&self) -> u64 {
        self.catchments.iter().map(|c| c.jobs).sum()
    }

    /// Total reported residents across all catchments.
    #[must_use]
    pub fn total_residents(&self) -> u64 {
        self.catchments.iter().map(|c| c.residents).sum()
    }

    /// Jobs summed per terminal group key.
    #[must_use]
    pub fn terminal_jobs(&self) -> BTreeMap<&str, u64> {
        let mut totals = BTreeMap::new();
        for catchment in &self.catchments {
            if let Some(key) = &catchment.terminal {
                *totals.entry(key.as_str()).or_insert(0) += catchment.jobs;
            }
        }
        totals
    }
}
