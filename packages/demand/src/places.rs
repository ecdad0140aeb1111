//! Place feature classification and residential membership lookup.

use geo::{Coord, LineString, Point, Polygon, Rect};
use strum_macros::{AsRefStr, Display, EnumString};
use transit_demand_models::{ElementType, OsmElement};
use transit_demand_spatial::{GeometryOps, PointIndex};

/// Recognized `place=*` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PlaceKind {
    /// `place=quarter`
    Quarter,
    /// `place=neighbourhood`
    Neighbourhood,
    /// `place=suburb`
    Suburb,
    /// `place=town`
    Town,
    /// `place=village`
    Village,
    /// `place=hamlet`
    Hamlet,
    /// `place=isolated_dwelling`
    IsolatedDwelling,
    /// `place=locality`
    Locality,
    /// `place=residential`
    Residential,
    /// `place=city`
    City,
}

impl PlaceKind {
    /// Whether this kind names a neighborhood directly rather than a
    /// settlement that sprawls over several.
    #[must_use]
    pub const fn is_direct(self) -> bool {
        matches!(self, Self::Quarter | Self::Neighbourhood)
    }

    /// DBSCAN radius for grouping the place's buildings.
    #[must_use]
    pub const fn cluster_distance_km(self) -> f64 {
        match self {
            Self::IsolatedDwelling => 0.35,
            Self::Hamlet | Self::Neighbourhood => 0.45,
            Self::Village => 0.6,
            Self::Town => 0.8,
            Self::Suburb => 0.75,
            Self::Residential => 0.7,
            Self::Locality | Self::Quarter => 0.5,
            Self::City => 0.9,
        }
    }

    /// Radius around the place's center searched when it has neither a
    /// ring nor bounds.
    #[must_use]
    pub const fn search_radius_km(self) -> f64 {
        match self {
            Self::IsolatedDwelling => 1.0,
            Self::Hamlet => 1.25,
            Self::Village | Self::Quarter => 2.0,
            Self::Town => 3.0,
            Self::Suburb => 2.5,
            Self::Residential => 2.25,
            Self::Locality => 1.5,
            Self::Neighbourhood => 1.75,
            Self::City => 4.0,
        }
    }
}

/// Place features sorted by role.
#[derive(Debug, Default)]
pub struct PlaceBuckets<'a> {
    /// Neighbourhoods and quarters, clustered first.
    pub direct: Vec<(&'a OsmElement, PlaceKind)>,
    /// Towns, suburbs, villages, and other sprawl.
    pub sprawl: Vec<(&'a OsmElement, PlaceKind)>,
    /// `aeroway=terminal`
    pub terminals: Vec<&'a OsmElement>,
    /// `aeroway=aerodrome`, used only for terminal naming.
    pub aerodromes: Vec<&'a OsmElement>,
}

/// Sorts `places` into buckets. Features with no recognized marker are
/// ignored.
#[must_use]
pub fn bucket_places(places: &[OsmElement]) -> PlaceBuckets<'_> {
    let mut buckets = PlaceBuckets::default();

    for place in places {
        match place.tag("aeroway") {
            Some("terminal") => {
                buckets.terminals.push(place);
                continue;
            }
            Some("aerodrome") => {
                buckets.aerodromes.push(place);
                continue;
            }
            _ => {}
        }

        let Some(kind) = place.tag("place").and_then(|p| p.parse::<PlaceKind>().ok()) else {
            continue;
        };
        if kind.is_direct() {
            buckets.direct.push((place, kind));
        } else {
            buckets.sprawl.push((place, kind));
        }
    }

    log::info!(
        "Places: {} direct, {} sprawl, {} terminals, {} aerodromes",
        buckets.direct.len(),
        buckets.sprawl.len(),
        buckets.terminals.len(),
        buckets.aerodromes.len()
    );

    buckets
}

/// The place's areal polygon, for ways and relations with a usable ring.
#[must_use]
pub fn place_polygon(place: &OsmElement) -> Option<Polygon<f64>> {
    if place.element_type == ElementType::Node {
        return None;
    }
    let ring = place.closed_ring()?;
    Some(Polygon::new(LineString::from(ring), vec![]))
}

/// Indices (into `index`'s point slice) of residential points belonging
/// to `place`: inside its ring, else inside its bounds, else within its
/// search radius of its center.
#[must_use]
pub fn residential_members(
    place: &OsmElement,
    kind: PlaceKind,
    points: &[Point<f64>],
    index: &PointIndex,
    geometry: &dyn GeometryOps,
) -> Vec<usize> {
    if index.is_empty() {
        return Vec::new();
    }

    if let Some(polygon) = place_polygon(place) {
        let Some(bounds) = place.ring_bounds() else {
            return Vec::new();
        };
        return index
            .in_rect(bounds_rect(bounds.minlon, bounds.minlat, bounds.maxlon, bounds.maxlat))
            .into_iter()
            .filter(|&i| geometry.contains(&polygon, points[i]))
            .collect();
    }

    if let Some(bounds) = place.bounds {
        return index.in_rect(bounds_rect(
            bounds.minlon,
            bounds.minlat,
            bounds.maxlon,
            bounds.maxlat,
        ));
    }

    place.center().map_or_else(Vec::new, |(lon, lat)| {
        index.within_km(Point::new(lon, lat), kind.search_radius_km())
    })
}

fn bounds_rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: min_lon,
            y: min_lat,
        },
        Coord {
            x: max_lon,
            y: max_lat,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use transit_demand_models::{Bounds, LatLon};
    use transit_demand_spatial::GeoBackend;

    fn place(id: u64, tags: &[(&str, &str)]) -> OsmElement {
        OsmElement {
            element_type: ElementType::Node,
            id,
            lat: Some(46.05),
            lon: Some(14.50),
            bounds: None,
            geometry: Vec::new(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn parses_place_kinds() {
        assert_eq!("isolated_dwelling".parse::<PlaceKind>().ok(), Some(PlaceKind::IsolatedDwelling));
        assert_eq!("neighbourhood".parse::<PlaceKind>().ok(), Some(PlaceKind::Neighbourhood));
        assert!("county".parse::<PlaceKind>().is_err());
    }

    #[test]
    fn buckets_by_marker() {
        let places = vec![
            place(1, &[("place", "quarter")]),
            place(2, &[("place", "town")]),
            place(3, &[("aeroway", "terminal")]),
            place(4, &[("aeroway", "aerodrome"), ("iata", "LJU")]),
            place(5, &[("place", "county")]),
            place(6, &[]),
        ];
        let buckets = bucket_places(&places);
        assert_eq!(buckets.direct.len(), 1);
        assert_eq!(buckets.sprawl.len(), 1);
        assert_eq!(buckets.terminals.len(), 1);
        assert_eq!(buckets.aerodromes.len(), 1);
    }

    #[test]
    fn membership_prefers_ring_then_bounds_then_radius() {
        let points = vec![
            Point::new(14.501, 46.051),
            Point::new(14.509, 46.051),
            Point::new(14.530, 46.050),
        ];
        let index = PointIndex::new(&points);

        let mut areal = place(1, &[("place", "quarter")]);
        areal.element_type = ElementType::Way;
        areal.lat = None;
        areal.lon = None;
        areal.geometry = vec![
            LatLon { lat: 46.050, lon: 14.500 },
            LatLon { lat: 46.050, lon: 14.505 },
            LatLon { lat: 46.055, lon: 14.505 },
            LatLon { lat: 46.055, lon: 14.500 },
        ];
        assert_eq!(
            residential_members(&areal, PlaceKind::Quarter, &points, &index, &GeoBackend),
            vec![0]
        );

        let mut boxed = place(2, &[("place", "town")]);
        boxed.element_type = ElementType::Relation;
        boxed.bounds = Some(Bounds {
            minlat: 46.0,
            minlon: 14.5,
            maxlat: 46.1,
            maxlon: 14.51,
        });
        assert_eq!(
            residential_members(&boxed, PlaceKind::Town, &points, &index, &GeoBackend),
            vec![0, 1]
        );

        let point = place(3, &[("place", "hamlet")]);
        assert_eq!(
            residential_members(&point, PlaceKind::Hamlet, &points, &index, &GeoBackend),
            vec![0, 1]
        );
    }
}
