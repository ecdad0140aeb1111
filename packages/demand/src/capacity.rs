//! Building capacity estimation.
//!
//! A building's floor area (footprint × levels, in square feet) divided by
//! a per-type area allowance gives its resident or job capacity. Types
//! outside both tables, and buildings whose estimate rounds down to zero,
//! carry no demand.

use geo::Point;
use transit_demand_models::OsmElement;
use transit_demand_spatial::GeometryOps;

/// Square feet per square metre.
pub const SQ_FT_PER_SQ_M: f64 = 10.7639;

/// Floor area per capacity unit of an airport terminal, in square feet.
const TERMINAL_SQ_FT_PER_UNIT: f64 = 320.0;

/// Jobs per terminal capacity unit.
const TERMINAL_JOBS_PER_UNIT: u64 = 3;

/// Minimum job capacity of any terminal.
const TERMINAL_MIN_JOBS: u64 = 120;

/// Resident or job capacity of one building. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// Approximate resident count.
    Residents(u64),
    /// Approximate job count.
    Jobs(u64),
}

impl Capacity {
    /// Resident count, 0 for job buildings.
    #[must_use]
    pub const fn residents(self) -> u64 {
        match self {
            Self::Residents(n) => n,
            Self::Jobs(_) => 0,
        }
    }

    /// Job count, 0 for residential buildings.
    #[must_use]
    pub const fn jobs(self) -> u64 {
        match self {
            Self::Jobs(n) => n,
            Self::Residents(_) => 0,
        }
    }
}

/// A building that contributes demand.
#[derive(Debug, Clone)]
pub struct DemandBuilding<'a> {
    /// The source element (tags are read later for naming).
    pub element: &'a OsmElement,
    /// Representative point.
    pub center: Point<f64>,
    /// Estimated capacity.
    pub capacity: Capacity,
}

/// Square feet of floor space per resident, by `building` tag.
#[must_use]
pub fn sq_ft_per_resident(building: &str) -> Option<f64> {
    Some(match building {
        "apartments" | "annexe" | "ger" | "hotel" | "tree_house" | "trullo" => 240.0,
        "yes" | "bungalow" | "cabin" | "detached" | "farm" | "house" | "houseboat"
        | "residential" | "stilt_house" => 600.0,
        "barracks" => 100.0,
        "dormitory" => 125.0,
        "semidetached_house" => 400.0,
        "static_caravan" | "terrace" => 500.0,
        _ => return None,
    })
}

/// Square feet of floor space per job, by `building` tag.
#[must_use]
pub fn sq_ft_per_job(building: &str) -> Option<f64> {
    Some(match building {
        "kiosk" => 50.0,
        "religious" | "cathedral" | "chapel" | "church" | "kingdom_hall" | "monastery"
        | "mosque" | "presbytery" | "shrine" | "synagogue" | "temple" | "kindergarten"
        | "school" => 100.0,
        "commercial" | "office" | "government" | "gatehouse" | "hospital" | "grandstand"
        | "pavilion" | "riding_hall" | "sports_hall" | "sports_centre" | "stadium" => 150.0,
        "college" | "university" => 250.0,
        "retail" | "supermarket" | "bakehouse" | "museum" | "public" => 300.0,
        "industrial" | "warehouse" | "fire_station" => 500.0,
        "train_station" | "transportation" => 1000.0,
        _ => return None,
    })
}

/// Number of floors, from `building:levels`.
///
/// Missing, unparsable, or sub-1 values count as a single floor.
#[must_use]
pub fn levels(element: &OsmElement) -> f64 {
    element
        .tag("building:levels")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map_or(1.0, |v| v.max(1.0))
}

/// Total floor area in square feet, or `None` for a degenerate ring.
#[must_use]
pub fn floor_area_sq_ft(element: &OsmElement, geometry: &dyn GeometryOps) -> Option<f64> {
    let ring = element.closed_ring()?;
    Some(geometry.ring_area_m2(&ring) * SQ_FT_PER_SQ_M * levels(element))
}

/// Estimates the capacity of one building.
///
/// `aeroway=terminal` overrides the generic `building` tag with a job
/// capacity of `max(floor(area / 320) * 3, 120)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn estimate(element: &OsmElement, geometry: &dyn GeometryOps) -> Option<Capacity> {
    let area = floor_area_sq_ft(element, geometry)?;

    if element.tag("aeroway") == Some("terminal") {
        let units = (area / TERMINAL_SQ_FT_PER_UNIT).floor() as u64;
        return Some(Capacity::Jobs(
            (units * TERMINAL_JOBS_PER_UNIT).max(TERMINAL_MIN_JOBS),
        ));
    }

    let building = element.tag("building")?;
    let capacity = if let Some(per) = sq_ft_per_resident(building) {
        Capacity::Residents((area / per).floor() as u64)
    } else {
        Capacity::Jobs((area / sq_ft_per_job(building)?).floor() as u64)
    };

    match capacity {
        Capacity::Residents(0) | Capacity::Jobs(0) => None,
        c => Some(c),
    }
}

/// Classifies every building, keeping only those with demand.
///
/// Buildings with fewer than three ring vertices are skipped.
#[must_use]
pub fn classify<'a>(
    buildings: &'a [OsmElement],
    geometry: &dyn GeometryOps,
) -> Vec<DemandBuilding<'a>> {
    let mut degenerate = 0usize;
    let mut classified = Vec::new();

    for element in buildings {
        if element.closed_ring().is_none() {
            degenerate += 1;
            continue;
        }
        let Some(capacity) = estimate(element, geometry) else {
            continue;
        };
        let Some((lon, lat)) = element.center() else {
            continue;
        };
        classified.push(DemandBuilding {
            element,
            center: Point::new(lon, lat),
            capacity,
        });
    }

    if degenerate > 0 {
        log::warn!("Skipped {degenerate} buildings with degenerate geometry");
    }

    let residential = classified
        .iter()
        .filter(|b| matches!(b.capacity, Capacity::Residents(_)))
        .count();
    log::info!(
        "Classified {} of {} buildings ({residential} residential, {} job)",
        classified.len(),
        buildings.len(),
        classified.len() - residential
    );

    classified
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use transit_demand_models::{Bounds, ElementType, LatLon};
    use transit_demand_spatial::GeoBackend;

    /// Metres per degree of longitude at the equator on the WGS84 ellipsoid.
    const M_PER_DEG: f64 = 111_319.490_793;

    /// A square building of `side_m` metres at `(lon, lat)` near the equator.
    pub(crate) fn square_building(
        id: u64,
        lon: f64,
        lat: f64,
        side_m: f64,
        tags: &[(&str, &str)],
    ) -> OsmElement {
        let d = side_m / M_PER_DEG;
        let geometry = vec![
            LatLon { lat, lon },
            LatLon { lat, lon: lon + d },
            LatLon {
                lat: lat + d,
                lon: lon + d,
            },
            LatLon { lat: lat + d, lon },
        ];
        OsmElement {
            element_type: ElementType::Way,
            id,
            lat: None,
            lon: None,
            bounds: Some(Bounds {
                minlat: lat,
                minlon: lon,
                maxlat: lat + d,
                maxlon: lon + d,
            }),
            geometry,
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn house_population_follows_area_allowance() {
        // 400 m² ≈ 4305.6 ft², / 600 = 7.18
        let house = square_building(1, 0.0, 0.0, 20.0, &[("building", "house")]);
        assert_eq!(estimate(&house, &GeoBackend), Some(Capacity::Residents(7)));
    }

    #[test]
    fn levels_multiply_floor_area() {
        let house = square_building(
            1,
            0.0,
            0.0,
            20.0,
            &[("building", "house"), ("building:levels", "3")],
        );
        assert_eq!(estimate(&house, &GeoBackend), Some(Capacity::Residents(21)));
    }

    #[test]
    fn non_numeric_levels_default_to_one() {
        let house = square_building(
            1,
            0.0,
            0.0,
            20.0,
            &[("building", "house"), ("building:levels", "many")],
        );
        assert!((levels(&house) - 1.0).abs() < f64::EPSILON);
        assert_eq!(estimate(&house, &GeoBackend), Some(Capacity::Residents(7)));
    }

    #[test]
    fn office_yields_jobs() {
        // 4305.6 ft² / 150 = 28.7
        let office = square_building(1, 0.0, 0.0, 20.0, &[("building", "office")]);
        assert_eq!(estimate(&office, &GeoBackend), Some(Capacity::Jobs(28)));
    }

    #[test]
    fn terminal_override_has_minimum() {
        let terminal = square_building(
            1,
            0.0,
            0.0,
            20.0,
            &[("building", "yes"), ("aeroway", "terminal")],
        );
        assert_eq!(estimate(&terminal, &GeoBackend), Some(Capacity::Jobs(120)));

        // 100 m side: 107639 ft² / 320 = 336 units -> 1008 jobs
        let big = square_building(2, 0.0, 0.0, 100.0, &[("aeroway", "terminal")]);
        let Some(Capacity::Jobs(jobs)) = estimate(&big, &GeoBackend) else {
            panic!("terminal should carry jobs");
        };
        assert!((1000..=1015).contains(&jobs), "jobs were {jobs}");
    }

    #[test]
    fn unknown_types_and_tiny_buildings_contribute_nothing() {
        let shed = square_building(1, 0.0, 0.0, 20.0, &[("building", "shed")]);
        assert_eq!(estimate(&shed, &GeoBackend), None);

        let tiny = square_building(2, 0.0, 0.0, 3.0, &[("building", "house")]);
        assert_eq!(estimate(&tiny, &GeoBackend), None);
    }

    #[test]
    fn classify_skips_degenerate_rings() {
        let mut broken = square_building(1, 0.0, 0.0, 20.0, &[("building", "house")]);
        broken.geometry.truncate(2);
        let ok = square_building(2, 0.0, 0.0, 20.0, &[("building", "house")]);
        let buildings = vec![broken, ok];
        let classified = classify(&buildings, &GeoBackend);
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].element.id, 2);
    }

    #[test]
    fn residential_and_job_tables_are_disjoint() {
        for tag in ["yes", "apartments", "house", "terrace", "dormitory", "hotel"] {
            assert!(sq_ft_per_resident(tag).is_some());
            assert!(sq_ft_per_job(tag).is_none(), "{tag} in both tables");
        }
    }
}
