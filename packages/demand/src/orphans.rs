//! Synthetic seeds for residential buildings that no place claimed.
//!
//! Uncovered residential points are binned into a coarse degree grid.
//! Populous cells are density-clustered, and every resulting group that is
//! not already close to an existing seed becomes a new synthetic seed.

use std::collections::BTreeMap;

use geo::Point;
use transit_demand_models::OrphanClusteringConfig;
use transit_demand_spatial::{GeometryOps, PointIndex};

use crate::capacity::DemandBuilding;
use crate::cluster::{Clusterer, MIN_SPLIT_DISTANCE_KM};
use crate::seeds::{Seed, SeedSet};

/// Address tags consulted, in order, when naming an orphan cluster.
const ADDRESS_TAGS: [&str; 6] = [
    "addr:city",
    "addr:town",
    "addr:village",
    "addr:hamlet",
    "addr:suburb",
    "addr:place",
];

type CellKey = (i64, i64);

/// Population-weighted majority vote over the members' address tags.
/// A building without address tags votes with its `name`. Ties go to the
/// lexicographically smallest candidate.
#[must_use]
pub fn derive_name(clusterer: &Clusterer<'_>, group: &[usize], buildings: &[DemandBuilding<'_>]) -> Option<String> {
    let mut scores: BTreeMap<&str, u64> = BTreeMap::new();

    for &i in group {
        let point = clusterer.points()[i];
        let element = buildings[point.building].element;
        let mut candidates: Vec<&str> = ADDRESS_TAGS.iter().filter_map(|t| element.tag(t)).collect();
        if candidates.is_empty() {
            candidates.extend(element.tag("name"));
        }
        for candidate in candidates {
            *scores.entry(candidate).or_insert(0) += point.population;
        }
    }

    scores
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(name, _)| name.to_string())
}

#[allow(clippy::cast_possible_truncation)]
fn cell_key(location: Point<f64>, cell_size: f64) -> CellKey {
    (
        (location.x() / cell_size).floor() as i64,
        (location.y() / cell_size).floor() as i64,
    )
}

/// Clustering radius for a cell: its diagonal, bounded to
/// `[MIN_SPLIT_DISTANCE_KM, max_distance_km]`.
#[allow(clippy::cast_precision_loss)]
fn cell_radius_km(key: CellKey, config: &OrphanClusteringConfig, geometry: &dyn GeometryOps) -> f64 {
    let size = config.cell_size_degrees;
    let south_west = Point::new(key.0 as f64 * size, key.1 as f64 * size);
    let north_east = Point::new((key.0 + 1) as f64 * size, (key.1 + 1) as f64 * size);
    let diagonal = geometry.distance_km(south_west, north_east);
    diagonal.clamp(MIN_SPLIT_DISTANCE_KM, config.max_distance_km.max(MIN_SPLIT_DISTANCE_KM))
}

/// Adds synthetic seeds for uncovered residential points.
///
/// Cells are processed in descending population order. A group whose
/// centroid lies within `adoption_threshold_km` of any seed, including
/// seeds created earlier in this pass, is left to that seed's catchment.
pub fn add_orphan_seeds(
    clusterer: &Clusterer<'_>,
    covered: &[bool],
    buildings: &[DemandBuilding<'_>],
    seeds: &mut SeedSet,
    config: &OrphanClusteringConfig,
    geometry: &dyn GeometryOps,
) {
    let mut cells: BTreeMap<CellKey, Vec<usize>> = BTreeMap::new();
    for (i, point) in clusterer.points().iter().enumerate() {
        if !covered[i] {
            cells
                .entry(cell_key(point.location, config.cell_size_degrees))
                .or_default()
                .push(i);
        }
    }

    let mut candidates: Vec<(CellKey, Vec<usize>, u64)> = cells
        .into_iter()
        .map(|(key, members)| {
            let population = clusterer.population(&members);
            (key, members, population)
        })
        .filter(|(_, _, population)| *population >= config.min_population)
        .collect();
    candidates.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    log::debug!("{} orphan cells above {} residents", candidates.len(), config.min_population);

    let mut existing = PointIndex::new(&seeds.locations());
    let mut created = 0usize;
    let mut adopted = 0usize;

    for (key, members, _) in candidates {
        let radius = cell_radius_km(key, config, geometry);
        let groups = clusterer.cluster(&members, radius, config.min_points, false);

        for group in groups
            .into_iter()
            .flat_map(|g| clusterer.split_if_needed(g, config.base_distance_km))
        {
            if clusterer.population(&group) == 0 {
                continue;
            }
            let Some(center) = clusterer.centroid(&group) else {
                continue;
            };
            if existing
                .nearest_within_km(center, config.adoption_threshold_km)
                .is_some()
            {
                adopted += 1;
                continue;
            }

            created += 1;
            let name = derive_name(clusterer, &group, buildings)
                .unwrap_or_else(|| format!("Synthetic Cluster {created}"));
            let seed = Seed {
                id: format!("synthetic-{created}"),
                location: center,
                name: Some(name),
                synthetic: true,
                terminal: None,
            };
            if seeds.push(seed) {
                existing.insert(center, seeds.len() - 1);
            }
        }
    }

    log::info!("Orphan clustering: {created} synthetic seeds, {adopted} groups adopted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{Capacity, DemandBuilding, tests::square_building};
    use crate::cluster::ResidentialPoint;
    use transit_demand_models::OsmElement;
    use transit_demand_spatial::GeoBackend;

    fn fixture(elements: &[OsmElement], population: u64) -> (Vec<DemandBuilding<'_>>, Vec<ResidentialPoint>) {
        let buildings: Vec<DemandBuilding<'_>> = elements
            .iter()
            .map(|element| {
                let (lon, lat) = element.center().unwrap();
                DemandBuilding {
                    element,
                    center: Point::new(lon, lat),
                    capacity: Capacity::Residents(population),
                }
            })
            .collect();
        let points = buildings
            .iter()
            .enumerate()
            .map(|(i, b)| ResidentialPoint {
                building: i,
                location: b.center,
                population,
            })
            .collect();
        (buildings, points)
    }

    fn village(lon: f64, count: u64, town: &str) -> Vec<OsmElement> {
        (0..count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let offset = i as f64 * 0.0002;
                square_building(
                    i,
                    lon + offset,
                    0.001,
                    10.0,
                    &[("building", "house"), ("addr:village", town)],
                )
            })
            .collect()
    }

    #[test]
    fn dense_uncovered_cell_becomes_named_seed() {
        let elements = village(0.0005, 6, "Brezje");
        let (buildings, points) = fixture(&elements, 10);
        let clusterer = Clusterer::new(&GeoBackend, &points);
        let covered = vec![false; points.len()];
        let mut seeds = SeedSet::default();

        add_orphan_seeds(
            &clusterer,
            &covered,
            &buildings,
            &mut seeds,
            &OrphanClusteringConfig::default(),
            &GeoBackend,
        );

        assert_eq!(seeds.len(), 1);
        let seed = &seeds.as_slice()[0];
        assert_eq!(seed.id, "synthetic-1");
        assert_eq!(seed.name.as_deref(), Some("Brezje"));
        assert!(seed.synthetic);
    }

    #[test]
    fn nearby_seed_adopts_the_group() {
        let elements = village(0.0005, 6, "Brezje");
        let (buildings, points) = fixture(&elements, 10);
        let clusterer = Clusterer::new(&GeoBackend, &points);
        let covered = vec![false; points.len()];
        let mut seeds = SeedSet::default();
        seeds.push(Seed {
            id: "place".to_string(),
            location: Point::new(0.002, 0.002),
            name: None,
            synthetic: false,
            terminal: None,
        });

        add_orphan_seeds(
            &clusterer,
            &covered,
            &buildings,
            &mut seeds,
            &OrphanClusteringConfig::default(),
            &GeoBackend,
        );
        assert_eq!(seeds.len(), 1);
    }

    #[test]
    fn sparse_and_covered_points_are_ignored() {
        let elements = village(0.0005, 6, "Brezje");
        let (buildings, points) = fixture(&elements, 10);
        let clusterer = Clusterer::new(&GeoBackend, &points);
        let mut seeds = SeedSet::default();

        let covered = vec![true; points.len()];
        add_orphan_seeds(
            &clusterer,
            &covered,
            &buildings,
            &mut seeds,
            &OrphanClusteringConfig::default(),
            &GeoBackend,
        );
        assert!(seeds.is_empty());

        // Three points are below the default density minimum of four.
        let covered: Vec<bool> = (0..points.len()).map(|i| i >= 3).collect();
        add_orphan_seeds(
            &clusterer,
            &covered,
            &buildings,
            &mut seeds,
            &OrphanClusteringConfig::default(),
            &GeoBackend,
        );
        assert!(seeds.is_empty());
    }

    #[test]
    fn majority_vote_is_population_weighted() {
        let mut elements = village(0.0005, 3, "Brezje");
        elements.push(square_building(
            9,
            0.0012,
            0.001,
            10.0,
            &[("building", "house"), ("addr:village", "Lesce")],
        ));
        let (buildings, mut points) = fixture(&elements, 10);
        points[3].population = 50;
        let clusterer = Clusterer::new(&GeoBackend, &points);
        assert_eq!(
            derive_name(&clusterer, &[0, 1, 2, 3], &buildings).as_deref(),
            Some("Lesce")
        );
    }
}
