//! Neighborhood seed points.
//!
//! Seeds are built in a fixed order: direct places (quarters and
//! neighbourhoods), sprawl places, airport terminals, then synthetic orphan
//! clusters. If nothing produced a seed, a single fallback seed is placed
//! on the first classified building.

use std::collections::BTreeSet;

use geo::Point;
use transit_demand_models::{OrphanClusteringConfig, OsmElement};
use transit_demand_spatial::{GeometryOps, PointIndex};

use crate::capacity::{Capacity, DemandBuilding};
use crate::cluster::{Clusterer, ResidentialPoint};
use crate::orphans::add_orphan_seeds;
use crate::places::{PlaceKind, bucket_places, residential_members};
use crate::terminals::{TERMINAL_COVER_KM, terminal_seeds};

/// Id of the seed created when no other seed exists.
pub const FALLBACK_SEED_ID: &str = "generated-cluster";

/// A candidate neighborhood location.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    /// Source place id, `<placeId>-<n>` for split places, or a synthetic id.
    pub id: String,
    /// Site used for tessellation.
    pub location: Point<f64>,
    /// Display name.
    pub name: Option<String>,
    /// Whether the seed was generated rather than taken from a place.
    pub synthetic: bool,
    /// Terminal group key, for airport terminals.
    pub terminal: Option<String>,
}

/// Seeds in creation order with unique ids.
#[derive(Debug, Default)]
pub struct SeedSet {
    seeds: Vec<Seed>,
    ids: BTreeSet<String>,
}

impl SeedSet {
    /// Appends `seed` unless its id is already taken. Returns whether it
    /// was added.
    pub fn push(&mut self, seed: Seed) -> bool {
        if !self.ids.insert(seed.id.clone()) {
            log::debug!("Duplicate seed id {}, keeping the first", seed.id);
            return false;
        }
        self.seeds.push(seed);
        true
    }

    /// Number of seeds.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.seeds.len()
    }

    /// Whether there are no seeds.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Seeds in creation order.
    #[must_use]
    pub fn as_slice(&self) -> &[Seed] {
        &self.seeds
    }

    /// Seed locations in creation order.
    #[must_use]
    pub fn locations(&self) -> Vec<Point<f64>> {
        self.seeds.iter().map(|s| s.location).collect()
    }

    /// Consumes the set.
    #[must_use]
    pub fn into_vec(self) -> Vec<Seed> {
        self.seeds
    }
}

/// Clusters the residential members of one place into seeds.
///
/// Returns the members that were claimed, so they can be marked covered.
fn cluster_place(
    place: &OsmElement,
    kind: PlaceKind,
    clusterer: &Clusterer<'_>,
    locations: &[Point<f64>],
    index: &PointIndex,
    geometry: &dyn GeometryOps,
    seeds: &mut SeedSet,
) -> Vec<usize> {
    let base_name = place.tag("name").map(str::to_string);
    let members = residential_members(place, kind, locations, index, geometry);

    let groups: Vec<Vec<usize>> = if clusterer.population(&members) == 0 {
        Vec::new()
    } else {
        let distance = kind.cluster_distance_km();
        clusterer
            .cluster(&members, distance, 1, true)
            .into_iter()
            .flat_map(|group| clusterer.split_if_needed(group, distance))
            .filter(|group| clusterer.population(group) > 0)
            .collect()
    };

    if groups.is_empty() {
        if let Some((lon, lat)) = place.center() {
            seeds.push(Seed {
                id: place.id.to_string(),
                location: Point::new(lon, lat),
                name: base_name,
                synthetic: false,
                terminal: None,
            });
        }
        return members;
    }

    if groups.len() == 1 {
        if let Some(location) = clusterer.centroid(&groups[0]) {
            seeds.push(Seed {
                id: place.id.to_string(),
                location,
                name: base_name,
                synthetic: false,
                terminal: None,
            });
        }
        return members;
    }

    log::debug!("Place {} ({kind}) split into {} clusters", place.id, groups.len());
    for (n, group) in groups.iter().enumerate() {
        let Some(location) = clusterer.centroid(group) else {
            continue;
        };
        let label = format!("Cluster {}", n + 1);
        seeds.push(Seed {
            id: format!("{}-{}", place.id, n + 1),
            location,
            name: Some(
                base_name
                    .as_ref()
                    .map_or_else(|| label.clone(), |name| format!("{name} {label}")),
            ),
            synthetic: true,
            terminal: None,
        });
    }

    members
}

/// Builds the full seed set for a region.
#[must_use]
pub fn build_seeds(
    buildings: &[DemandBuilding<'_>],
    places: &[OsmElement],
    orphan_config: &OrphanClusteringConfig,
    geometry: &dyn GeometryOps,
) -> SeedSet {
    let points: Vec<ResidentialPoint> = buildings
        .iter()
        .enumerate()
        .filter_map(|(building, b)| match b.capacity {
            Capacity::Residents(population) if population > 0 => Some(ResidentialPoint {
                building,
                location: b.center,
                population,
            }),
            _ => None,
        })
        .collect();
    let locations: Vec<Point<f64>> = points.iter().map(|p| p.location).collect();
    let index = PointIndex::new(&locations);
    let clusterer = Clusterer::new(geometry, &points);
    let mut covered = vec![false; points.len()];

    let buckets = bucket_places(places);
    let mut seeds = SeedSet::default();

    for (place, kind) in buckets.direct.iter().chain(&buckets.sprawl) {
        for member in cluster_place(
            place, *kind, &clusterer, &locations, &index, geometry, &mut seeds,
        ) {
            covered[member] = true;
        }
    }
    log::info!("{} seeds from places", seeds.len());

    for seed in terminal_seeds(&buckets.terminals, &buckets.aerodromes, geometry) {
        for member in index.within_km(seed.location, TERMINAL_COVER_KM) {
            covered[member] = true;
        }
        seeds.push(seed);
    }

    add_orphan_seeds(
        &clusterer,
        &covered,
        buildings,
        &mut seeds,
        orphan_config,
        geometry,
    );

    if seeds.is_empty() {
        if let Some(first) = buildings.first() {
            log::warn!("No seeds found, using a single generated cluster");
            seeds.push(Seed {
                id: FALLBACK_SEED_ID.to_string(),
                location: first.center,
                name: Some("Generated Cluster".to_string()),
                synthetic: true,
                terminal: None,
            });
        }
    }

    log::info!("Built {} seeds", seeds.len());
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{classify, tests::square_building};
    use std::collections::BTreeMap;
    use transit_demand_models::ElementType;
    use transit_demand_spatial::GeoBackend;

    fn place_node(id: u64, lon: f64, lat: f64, tags: &[(&str, &str)]) -> OsmElement {
        OsmElement {
            element_type: ElementType::Node,
            id,
            lat: Some(lat),
            lon: Some(lon),
            bounds: None,
            geometry: Vec::new(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn houses(start_id: u64, lon: f64, count: u64) -> Vec<OsmElement> {
        (0..count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let offset = i as f64 * 0.0002;
                square_building(start_id + i, lon + offset, 0.0, 30.0, &[("building", "house")])
            })
            .collect()
    }

    #[test]
    fn single_group_keeps_place_identity() {
        let elements = houses(1, 0.0, 5);
        let buildings = classify(&elements, &GeoBackend);
        let places = vec![place_node(100, 0.0004, 0.0, &[("place", "hamlet"), ("name", "Vas")])];

        let seeds = build_seeds(&buildings, &places, &OrphanClusteringConfig::default(), &GeoBackend);
        assert_eq!(seeds.len(), 1);
        let seed = &seeds.as_slice()[0];
        assert_eq!(seed.id, "100");
        assert_eq!(seed.name.as_deref(), Some("Vas"));
        assert!(!seed.synthetic);
    }

    #[test]
    fn separated_groups_get_suffixed_ids() {
        // Two hamlets 1.1 km apart, both within the town's 3 km search radius.
        let mut elements = houses(1, 0.0, 4);
        elements.extend(houses(10, 0.01, 4));
        let buildings = classify(&elements, &GeoBackend);
        let places = vec![place_node(7, 0.005, 0.0, &[("place", "town"), ("name", "Mesto")])];

        let seeds = build_seeds(&buildings, &places, &OrphanClusteringConfig::default(), &GeoBackend);
        let ids: Vec<_> = seeds.as_slice().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["7-1", "7-2"]);
        assert_eq!(seeds.as_slice()[1].name.as_deref(), Some("Mesto Cluster 2"));
    }

    #[test]
    fn empty_place_seeds_at_its_center() {
        let places = vec![place_node(5, 1.0, 1.0, &[("place", "village")])];
        let seeds = build_seeds(&[], &places, &OrphanClusteringConfig::default(), &GeoBackend);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds.as_slice()[0].location, Point::new(1.0, 1.0));
    }

    #[test]
    fn terminals_become_seeds() {
        let places = vec![place_node(
            9,
            14.45,
            46.22,
            &[("aeroway", "terminal"), ("iata", "LJU")],
        )];
        let seeds = build_seeds(&[], &places, &OrphanClusteringConfig::default(), &GeoBackend);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds.as_slice()[0].terminal.as_deref(), Some("LJU"));
    }

    fn block(start_id: u64, lon: f64) -> Vec<OsmElement> {
        (0..6)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let offset = i as f64 * 0.0002;
                square_building(start_id + i, lon + offset, 0.001, 30.0, &[("building", "house")])
            })
            .collect()
    }

    #[test]
    fn residents_near_a_terminal_are_not_orphan_seeded() {
        // One block ~0.8 km east of the terminal, one ~2 km east.
        let mut elements = block(1, 0.0041);
        elements.extend(block(20, 0.0161));
        let buildings = classify(&elements, &GeoBackend);
        let terminal = place_node(
            99,
            -0.0025,
            0.0012,
            &[("aeroway", "terminal"), ("iata", "LJU")],
        );
        let config = OrphanClusteringConfig::default();

        let synthetic = |seeds: &SeedSet| -> Vec<Point<f64>> {
            seeds
                .as_slice()
                .iter()
                .filter(|s| s.id.starts_with("synthetic-"))
                .map(|s| s.location)
                .collect()
        };

        let without_terminal = build_seeds(&buildings, &[], &config, &GeoBackend);
        assert_eq!(synthetic(&without_terminal).len(), 2);

        let seeds = build_seeds(&buildings, &[terminal], &config, &GeoBackend);
        let orphans = synthetic(&seeds);
        assert_eq!(orphans.len(), 1, "{orphans:?}");
        assert!(orphans[0].x() > 0.016, "{orphans:?}");
        assert!(seeds.as_slice().iter().any(|s| s.terminal.as_deref() == Some("LJU")));
    }

    #[test]
    fn fallback_seed_when_nothing_else() {
        let elements = houses(1, 0.0, 1);
        let buildings = classify(&elements, &GeoBackend);
        let seeds = build_seeds(&buildings, &[], &OrphanClusteringConfig::default(), &GeoBackend);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds.as_slice()[0].id, FALLBACK_SEED_ID);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut set = SeedSet::default();
        let seed = Seed {
            id: "1".to_string(),
            location: Point::new(0.0, 0.0),
            name: None,
            synthetic: false,
            terminal: None,
        };
        assert!(set.push(seed.clone()));
        assert!(!set.push(seed));
        assert_eq!(set.len(), 1);
    }
}
