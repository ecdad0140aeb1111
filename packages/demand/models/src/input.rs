//! Raw map-extract elements.
//!
//! Buildings and places arrive in the Overpass JSON shape: each element
//! has a type, a numeric id, a tag map, and some combination of a point
//! coordinate, a bounding box, and a vertex ring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// OSM element kind.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ElementType {
    /// A single point.
    Node,
    /// An ordered vertex list, closed for areas.
    Way,
    /// A grouping of other elements (multipolygons, boundaries).
    Relation,
}

/// A WGS84 coordinate as written by Overpass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Bounding box of an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Southern edge.
    pub minlat: f64,
    /// Western edge.
    pub minlon: f64,
    /// Northern edge.
    pub maxlat: f64,
    /// Eastern edge.
    pub maxlon: f64,
}

impl Bounds {
    /// Returns the centre of the box as `(lon, lat)`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::midpoint(self.minlon, self.maxlon),
            f64::midpoint(self.minlat, self.maxlat),
        )
    }

    /// Whether `(lon, lat)` lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.minlon && lon <= self.maxlon && lat >= self.minlat && lat <= self.maxlat
    }
}

/// One building, place, terminal, or aerodrome element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsmElement {
    /// Element kind.
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// OSM id, unique per element kind.
    pub id: u64,
    /// Point latitude (nodes only).
    #[serde(default)]
    pub lat: Option<f64>,
    /// Point longitude (nodes only).
    #[serde(default)]
    pub lon: Option<f64>,
    /// Bounding box (ways and relations).
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// Vertex ring (ways and relations).
    #[serde(default)]
    pub geometry: Vec<LatLon>,
    /// OSM tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OsmElement {
    /// Returns the value of `key`, if tagged.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns the ring as `(lon, lat)` pairs, closed, or `None` when it
    /// has fewer than three vertices.
    #[must_use]
    pub fn closed_ring(&self) -> Option<Vec<(f64, f64)>> {
        if self.geometry.len() < 3 {
            return None;
        }

        let mut ring: Vec<(f64, f64)> = self.geometry.iter().map(|p| (p.lon, p.lat)).collect();
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        Some(ring)
    }

    /// Bounding box of the vertex ring, used when `bounds` is missing.
    #[must_use]
    pub fn ring_bounds(&self) -> Option<Bounds> {
        let first = self.geometry.first()?;
        let init = Bounds {
            minlat: first.lat,
            minlon: first.lon,
            maxlat: first.lat,
            maxlon: first.lon,
        };
        Some(self.geometry.iter().fold(init, |b, p| Bounds {
            minlat: b.minlat.min(p.lat),
            minlon: b.minlon.min(p.lon),
            maxlat: b.maxlat.max(p.lat),
            maxlon: b.maxlon.max(p.lon),
        }))
    }

    /// Representative point as `(lon, lat)`.
    ///
    /// Nodes use their own coordinate; ways and relations use the centre
    /// of their bounds, falling back to the centre of the ring.
    #[must_use]
    pub fn center(&self) -> Option<(f64, f64)> {
        if let (Some(lon), Some(lat)) = (self.lon, self.lat) {
            return Some((lon, lat));
        }
        self.bounds
            .or_else(|| self.ring_bounds())
            .map(|b| b.center())
    }
}

/// An element list, either bare or wrapped in an Overpass response.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ElementCollection {
    /// `[ {...}, {...} ]`
    Bare(Vec<OsmElement>),
    /// `{ "elements": [ {...} ] }`
    Overpass {
        /// The wrapped elements.
        elements: Vec<OsmElement>,
    },
}

impl ElementCollection {
    /// Unwraps the element list.
    #[must_use]
    pub fn into_elements(self) -> Vec<OsmElement> {
        match self {
            Self::Bare(elements) | Self::Overpass { elements } => elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_parses_overpass_names() {
        assert_eq!("way".parse::<ElementType>().ok(), Some(ElementType::Way));
        assert_eq!("relation".parse::<ElementType>().ok(), Some(ElementType::Relation));
        assert!("area".parse::<ElementType>().is_err());
        assert_eq!(ElementType::Node.to_string(), "node");
        assert_eq!(ElementType::Way.as_ref(), "way");
    }
}
