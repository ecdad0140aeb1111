#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road network filtering.
//!
//! Drops road features the simulation does not draw: features without a
//! geometry, features whose `highway` class is excluded, and line
//! features shorter than a minimum length.

use std::collections::BTreeSet;

use geo::{Distance, Haversine, LineString, Point};
use geojson::{Feature, GeoJson};
use thiserror::Error;
use transit_demand_models::RoadFilterConfig;

/// Errors that can occur while filtering roads.
#[derive(Debug, Error)]
pub enum RoadsError {
    /// The input was not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// Haversine length of a line in metres.
fn line_length_m(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|segment| Haversine.distance(Point::from(segment.start), Point::from(segment.end)))
        .sum()
}

/// Length in metres of a line or multi-line feature. `None` for other
/// geometry types and for geometries that fail to convert.
#[must_use]
pub fn feature_length_m(feature: &Feature) -> Option<f64> {
    let geometry = feature.geometry.clone()?;
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geometry {
        geo::Geometry::LineString(line) => Some(line_length_m(&line)),
        geo::Geometry::MultiLineString(lines) => Some(lines.iter().map(line_length_m).sum()),
        _ => None,
    }
}

/// Decides which road features are kept.
#[derive(Debug, Clone, Default)]
pub struct RoadFilter {
    exclude_highways: BTreeSet<String>,
    min_length_m: Option<f64>,
}

impl RoadFilter {
    /// Creates a filter from the `[roads]` configuration section.
    #[must_use]
    pub fn new(config: &RoadFilterConfig) -> Self {
        Self {
            exclude_highways: config.exclude_highways.iter().cloned().collect(),
            min_length_m: config.min_length_meters.filter(|m| *m > 0.0),
        }
    }

    /// Whether `feature` survives the filter.
    #[must_use]
    pub fn keep(&self, feature: &Feature) -> bool {
        if feature.geometry.is_none() {
            return false;
        }

        if let Some(highway) = feature.property("highway").and_then(|v| v.as_str())
            && self.exclude_highways.contains(highway)
        {
            return false;
        }

        if let Some(min) = self.min_length_m
            && let Some(length) = feature_length_m(feature)
            && length < min
        {
            return false;
        }

        true
    }

    /// Filters a document. Documents other than feature
    /// collections are returned unchanged.
    #[must_use]
    pub fn apply(&self, geojson: GeoJson) -> GeoJson {
        match geojson {
            GeoJson::FeatureCollection(mut collection) => {
                let before = collection.features.len();
                collection.features.retain(|feature| self.keep(feature));
                log::info!(
                    "Kept {} of {before} road features",
                    collection.features.len()
                );
                GeoJson::FeatureCollection(collection)
            }
            other => other,
        }
    }
}

/// Parses `raw` and applies the filter configured by `config`.
///
/// # Errors
///
/// Returns [`RoadsError::GeoJson`] if `raw` is not valid `GeoJSON`.
pub fn filter_roads(raw: &str, config: &RoadFilterConfig) -> Result<GeoJson, RoadsError> {
    let geojson: GeoJson = raw.parse()?;
    Ok(RoadFilter::new(config).apply(geojson))
}
