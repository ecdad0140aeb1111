#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Demand synthesis for one region.
//!
//! Turns classified buildings and place features into neighborhood nodes
//! and commute flows:
//!
//! 1. [`capacity`] estimates resident or job capacity per building.
//! 2. [`seeds`] clusters residential buildings into neighborhood seeds
//!    using [`places`], [`cluster`], [`terminals`], and [`orphans`].
//! 3. [`catchment`] tessellates the region around the seeds and
//!    aggregates building capacity per cell.
//! 4. [`flows`] apportions each origin's residents over job catchments.
//!
//! All geometry goes through [`GeometryOps`], so the pipeline is
//! independent of the geometry backend.

pub mod capacity;
pub mod catchment;
pub mod cluster;
pub mod flows;
pub mod orphans;
pub mod places;
pub mod progress;
pub mod seeds;
pub mod terminals;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use geo::{Coord, Rect};
use thiserror::Error;
use transit_demand_models::{Config, DemandData, Neighborhood, OsmElement, PopulationGroup};
use transit_demand_spatial::GeometryOps;

use crate::catchment::CatchmentSet;
use crate::flows::{Flow, SECONDS_PER_METRE, synthesize_flows};
use crate::progress::ProgressCallback;

/// Errors that can occur during demand synthesis.
#[derive(Debug, Error)]
pub enum DemandError {
    /// Configuration values are inconsistent or out of range.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },

    /// A region bounding box is not finite or has no extent.
    #[error("Invalid bounding box {bbox:?}")]
    InvalidBbox {
        /// The rejected `[min_lon, min_lat, max_lon, max_lat]`.
        bbox: [f64; 4],
    },
}

fn invalid(message: impl Into<String>) -> DemandError {
    DemandError::InvalidConfig {
        message: message.into(),
    }
}

/// Converts `[min_lon, min_lat, max_lon, max_lat]` to a rectangle.
///
/// # Errors
///
/// Returns [`DemandError::InvalidBbox`] if a coordinate is not finite or
/// the box has no area.
pub fn bbox_rect(bbox: [f64; 4]) -> Result<Rect<f64>, DemandError> {
    let [min_lon, min_lat, max_lon, max_lat] = bbox;
    if bbox.iter().any(|v| !v.is_finite()) || min_lon >= max_lon || min_lat >= max_lat {
        return Err(DemandError::InvalidBbox { bbox });
    }
    Ok(Rect::new(
        Coord {
            x: min_lon,
            y: min_lat,
        },
        Coord {
            x: max_lon,
            y: max_lat,
        },
    ))
}

/// Checks a loaded configuration for internal consistency.
///
/// # Errors
///
/// Returns [`DemandError::InvalidConfig`] describing the first problem
/// found, or [`DemandError::InvalidBbox`] for a malformed region box.
pub fn validate_config(config: &Config) -> Result<(), DemandError> {
    let chunking = &config.population_chunking;
    if chunking.max_size == 0 || chunking.target_size == 0 {
        return Err(invalid("population_chunking sizes must be positive"));
    }
    if chunking.min_size > chunking.max_size {
        return Err(invalid(format!(
            "population_chunking.min_size ({}) exceeds max_size ({})",
            chunking.min_size, chunking.max_size
        )));
    }
    if chunking.max_connections_per_point == 0 {
        return Err(invalid("population_chunking.max_connections_per_point must be at least 1"));
    }

    let weighting = &config.distance_weighting;
    if !weighting.population_tiers.windows(2).all(|w| w[0] < w[1]) {
        return Err(invalid("distance_weighting.population_tiers must be strictly ascending"));
    }
    let tiers = weighting.population_tiers.len() + 1;
    if weighting.tier_scales_km.len() != tiers || weighting.tier_local_quotas.len() != tiers {
        return Err(invalid(format!(
            "distance_weighting needs {tiers} tier scales and quotas for {} thresholds",
            weighting.population_tiers.len()
        )));
    }
    if weighting
        .tier_scales_km
        .iter()
        .any(|s| !s.is_finite() || *s <= 0.0)
    {
        return Err(invalid("distance_weighting.tier_scales_km must be positive"));
    }
    for (name, share) in [
        ("terminal_min_share", weighting.terminal_min_share),
        ("terminal_max_share", weighting.terminal_max_share),
        ("global_terminal_share", weighting.global_terminal_share),
    ] {
        if !(0.0..=1.0).contains(&share) {
            return Err(invalid(format!("distance_weighting.{name} must be in [0, 1]")));
        }
    }
    if weighting.terminal_min_share > weighting.terminal_max_share {
        return Err(invalid("distance_weighting.terminal_min_share exceeds terminal_max_share"));
    }
    if weighting.base_weight < 0.0 || weighting.closeness_floor < 0.0 {
        return Err(invalid("distance_weighting weights must not be negative"));
    }

    let orphan = &config.orphan_clustering;
    if !(orphan.cell_size_degrees.is_finite() && orphan.cell_size_degrees > 0.0) {
        return Err(invalid("orphan_clustering.cell_size_degrees must be positive"));
    }
    if !(orphan.max_distance_km > 0.0 && orphan.base_distance_km > 0.0) {
        return Err(invalid("orphan_clustering distances must be positive"));
    }

    let mut codes = BTreeSet::new();
    for region in &config.regions {
        if region.code.trim().is_empty() {
            return Err(invalid(format!("region {:?} has an empty code", region.name)));
        }
        if !codes.insert(region.code.as_str()) {
            return Err(invalid(format!("duplicate region code {}", region.code)));
        }
        bbox_rect(region.bbox)?;
    }

    Ok(())
}

/// Runs the full demand pipeline for one region.
///
/// # Errors
///
/// Returns [`DemandError::InvalidBbox`] if `bbox` is malformed.
pub fn synthesize(
    bbox: [f64; 4],
    buildings: &[OsmElement],
    places: &[OsmElement],
    config: &Config,
    geometry: &dyn GeometryOps,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<DemandData, DemandError> {
    let rect = bbox_rect(bbox)?;

    let classified = capacity::classify(buildings, geometry);
    let seeds = seeds::build_seeds(&classified, places, &config.orphan_clustering, geometry);
    let set = CatchmentSet::build(
        seeds.as_slice(),
        &classified,
        rect,
        &config.distance_weighting,
        geometry,
    );
    let flows = synthesize_flows(
        &set,
        &config.population_chunking,
        &config.distance_weighting,
        geometry,
        progress,
    );

    Ok(assemble(&set, &flows))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn population_group(set: &CatchmentSet, flow: &Flow) -> PopulationGroup {
    PopulationGroup {
        residence_id: set.catchments[flow.origin].node_id.clone(),
        job_id: set.catchments[flow.dest].node_id.clone(),
        size: flow.size,
        driving_distance: flow.distance_m.round().max(0.0) as u64,
        driving_seconds: (flow.distance_m * SECONDS_PER_METRE).round().max(0.0) as u64,
        id: flow.id.to_string(),
    }
}

/// Builds the output dataset. Catchments with neither residents nor jobs
/// are dropped.
fn assemble(set: &CatchmentSet, flows: &[Flow]) -> DemandData {
    let mut pop_ids: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for flow in flows {
        let id = flow.id.to_string();
        pop_ids.entry(flow.origin).or_default().push(id.clone());
        if flow.dest != flow.origin {
            pop_ids.entry(flow.dest).or_default().push(id);
        }
    }

    let points: Vec<Neighborhood> = set
        .catchments
        .iter()
        .enumerate()
        .filter(|(_, c)| c.jobs > 0 || c.residents > 0)
        .map(|(i, c)| Neighborhood {
            id: c.node_id.clone(),
            location: [c.location.x(), c.location.y()],
            jobs: c.jobs,
            residents: c.residents,
            pop_ids: pop_ids.remove(&i).unwrap_or_default(),
            name: c.name.clone(),
        })
        .collect();

    let pops: Vec<PopulationGroup> = flows.iter().map(|f| population_group(set, f)).collect();

    log::info!("Demand dataset: {} points, {} population groups", points.len(), pops.len());
    DemandData { points, pops }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::tests::square_building;
    use crate::progress::null_progress;
    use std::collections::BTreeMap;
    use transit_demand_models::{ElementType, RegionConfig};
    use transit_demand_spatial::GeoBackend;

    fn place(id: u64, lon: f64, lat: f64, tags: &[(&str, &str)]) -> OsmElement {
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

    /// A residential village, an office park 2 km east, and an airport.
    fn region() -> (Vec<OsmElement>, Vec<OsmElement>) {
        let mut buildings = Vec::new();
        let mut id = 1;
        for row in 0..4u32 {
            for col in 0..5u32 {
                let lon = 0.01 + f64::from(col) * 0.0004;
                let lat = 0.01 + f64::from(row) * 0.0004;
                buildings.push(square_building(id, lon, lat, 20.0, &[("building", "apartments"), ("building:levels", "4")]));
                id += 1;
            }
        }
        for k in 0..3u32 {
            let lon = 0.028 + f64::from(k) * 0.0005;
            buildings.push(square_building(id, lon, 0.011, 40.0, &[("building", "office")]));
            id += 1;
        }
        buildings.push(square_building(id, 0.06, 0.06, 100.0, &[("aeroway", "terminal")]));

        let places = vec![
            place(500, 0.011, 0.011, &[("place", "village"), ("name", "Vas")]),
            place(501, 0.0285, 0.0115, &[("place", "locality"), ("name", "Park")]),
            place(502, 0.0605, 0.0605, &[("aeroway", "terminal"), ("iata", "TST")]),
        ];
        (buildings, places)
    }

    fn run() -> DemandData {
        let (buildings, places) = region();
        synthesize(
            [0.0, 0.0, 0.08, 0.08],
            &buildings,
            &places,
            &Config::default(),
            &GeoBackend,
            &null_progress(),
        )
        .unwrap()
    }

    #[test]
    fn flows_reference_emitted_points() {
        let data = run();
        assert!(!data.pops.is_empty());
        let ids: BTreeSet<&str> = data.points.iter().map(|p| p.id.as_str()).collect();
        for pop in &data.pops {
            assert!(ids.contains(pop.residence_id.as_str()));
            assert!(ids.contains(pop.job_id.as_str()));
            assert!(pop.size > 0 && pop.size <= 380);
        }
    }

    #[test]
    fn flows_never_exceed_residents() {
        let data = run();
        for point in &data.points {
            let total: u64 = data
                .pops
                .iter()
                .filter(|p| p.residence_id == point.id)
                .map(|p| p.size)
                .sum();
            assert!(total <= point.residents, "{}: {total} > {}", point.id, point.residents);
        }
    }

    #[test]
    fn pop_ids_link_both_endpoints() {
        let data = run();
        for pop in &data.pops {
            for endpoint in [&pop.residence_id, &pop.job_id] {
                let point = data.points.iter().find(|p| &p.id == endpoint).unwrap();
                assert!(point.pop_ids.contains(&pop.id));
            }
        }
    }

    #[test]
    fn terminal_gets_display_id_and_no_residents() {
        let data = run();
        let terminal = data.points.iter().find(|p| p.id == "terminal-1").unwrap();
        assert_eq!(terminal.residents, 0);
        assert!(terminal.jobs >= 120);
        assert_eq!(terminal.name.as_deref(), Some("TST Terminal 1"));
    }

    #[test]
    fn runs_are_byte_identical() {
        let a = run();
        let b = run();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_yields_empty_dataset() {
        let data = synthesize(
            [0.0, 0.0, 1.0, 1.0],
            &[],
            &[],
            &Config::default(),
            &GeoBackend,
            &null_progress(),
        )
        .unwrap();
        assert!(data.points.is_empty());
        assert!(data.pops.is_empty());
    }

    #[test]
    fn rejects_inverted_bbox() {
        assert!(matches!(bbox_rect([1.0, 0.0, 0.0, 1.0]), Err(DemandError::InvalidBbox { .. })));
        assert!(matches!(bbox_rect([0.0, f64::NAN, 1.0, 1.0]), Err(DemandError::InvalidBbox { .. })));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn validation_catches_inconsistent_tables() {
        let mut config = Config::default();
        config.distance_weighting.tier_scales_km.pop();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.population_chunking.min_size = 500;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.distance_weighting.terminal_min_share = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn full_terminal_share_disables_the_cap() {
        let mut config = Config::default();
        config.distance_weighting.terminal_max_share = 1.0;
        config.distance_weighting.global_terminal_share = 1.0;
        assert!(validate_config(&config).is_ok());

        config.distance_weighting.global_terminal_share = 1.01;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validation_rejects_duplicate_region_codes() {
        let region = RegionConfig {
            code: "LJ".to_string(),
            name: "Ljubljana".to_string(),
            description: None,
            bbox: [14.4, 46.0, 14.6, 46.1],
            population: None,
        };
        let config = Config {
            regions: vec![region.clone(), region],
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
