#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-region processing.
//!
//! Loads and validates `config.toml`, reads a region's raw extracts from
//! `<raw-dir>/<code>/`, runs the buildings index, demand synthesis, and
//! road filter, and writes the artifacts to `<output-dir>/<code>/`.
//!
//! Output is staged in `<code>.tmp` and only swapped into place once
//! every artifact has been written, so a failed run never leaves a
//! half-written region behind.

pub mod io;
pub mod round;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use transit_demand::DemandError;
use transit_demand::progress::ProgressCallback;
use transit_demand_buildings_index::{BuildingsIndexError, build_index};
use transit_demand_models::{Config, ElementCollection, OsmElement, RegionConfig};
use transit_demand_roads::{RoadsError, filter_roads};
use transit_demand_spatial::GeoBackend;

use crate::io::{StagedDir, io_error, read_json, write_json};

/// Raw building footprints.
pub const BUILDINGS_FILE: &str = "buildings.json";
/// Raw place and aerodrome elements.
pub const PLACES_FILE: &str = "places.json";
/// Raw road network, optional.
pub const ROADS_FILE: &str = "roads.geojson";
/// Grid index output.
pub const BUILDINGS_INDEX_FILE: &str = "buildings_index.json";
/// Demand dataset output.
pub const DEMAND_FILE: &str = "demand_data.json";

/// Errors that can occur while processing a region.
#[derive(Debug, Error)]
pub enum RegionError {
    /// A required input file does not exist.
    #[error("Missing input file: {path}")]
    MissingInput {
        /// The expected location.
        path: String,
    },

    /// File system operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// JSON parsing or serialization failed.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// The file involved.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// The configuration file did not parse.
    #[error("TOML error in {path}: {source}")]
    Toml {
        /// The configuration file.
        path: String,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// The road network did not parse.
    #[error("Roads error in {path}: {source}")]
    Roads {
        /// The road file.
        path: String,
        /// Underlying error.
        source: RoadsError,
    },

    /// Demand synthesis or configuration validation failed.
    #[error("Demand error: {0}")]
    Demand(#[from] DemandError),

    /// The buildings index could not be built.
    #[error("Buildings index error: {0}")]
    BuildingsIndex(#[from] BuildingsIndexError),

    /// Async task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Reads and validates a TOML configuration file.
///
/// # Errors
///
/// Returns [`RegionError::MissingInput`] if the file does not exist,
/// [`RegionError::Toml`] if it does not parse, or [`RegionError::Demand`]
/// if the values are inconsistent.
pub fn load_config(path: &Path) -> Result<Config, RegionError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RegionError::MissingInput {
                path: path.display().to_string(),
            }
        } else {
            io_error(path, e)
        }
    })?;
    let config = parse_config(&text).map_err(|e| match e {
        RegionError::Toml { source, .. } => RegionError::Toml {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })?;
    log::info!(
        "Loaded {} region(s) from {}",
        config.regions.len(),
        path.display()
    );
    Ok(config)
}

/// Parses and validates configuration text.
///
/// # Errors
///
/// Returns [`RegionError::Toml`] if the text does not parse or
/// [`RegionError::Demand`] if the values are inconsistent.
pub fn parse_config(text: &str) -> Result<Config, RegionError> {
    let config: Config = toml::from_str(text).map_err(|source| RegionError::Toml {
        path: "<inline>".to_string(),
        source,
    })?;
    transit_demand::validate_config(&config)?;
    Ok(config)
}

/// Input and output roots shared by every region.
#[derive(Debug, Clone)]
pub struct RegionPaths {
    /// Holds one `<code>/` directory of raw extracts per region.
    pub raw_dir: PathBuf,
    /// Receives one `<code>/` directory of artifacts per region.
    pub output_dir: PathBuf,
}

impl RegionPaths {
    /// Raw extract directory of `code`.
    #[must_use]
    pub fn input(&self, code: &str) -> PathBuf {
        self.raw_dir.join(code)
    }

    /// Artifact directory of `code`.
    #[must_use]
    pub fn output(&self, code: &str) -> PathBuf {
        self.output_dir.join(code)
    }
}

/// What one region run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSummary {
    /// Region code.
    pub code: String,
    /// Indexed buildings.
    pub buildings: usize,
    /// Emitted demand points.
    pub points: usize,
    /// Emitted population groups.
    pub pops: usize,
    /// Total commuters across all groups.
    pub commuters: u64,
    /// Whether `roads.geojson` was written.
    pub roads: bool,
    /// Final artifact directory.
    pub output: PathBuf,
}

async fn read_elements(path: PathBuf) -> Result<Vec<OsmElement>, RegionError> {
    tokio::task::spawn_blocking(move || {
        read_json::<ElementCollection>(&path).map(ElementCollection::into_elements)
    })
    .await?
}

async fn read_roads(path: PathBuf) -> Result<Option<String>, RegionError> {
    tokio::task::spawn_blocking(move || {
        if !path.exists() {
            log::debug!("No road network at {}", path.display());
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| io_error(&path, e))
    })
    .await?
}

/// Processes one region end to end.
///
/// Inputs are read concurrently. The buildings index, the demand
/// synthesis, and the road filter then run concurrently on blocking
/// threads. Artifacts are written to `<code>.tmp` and moved to `<code>`
/// only if all of them succeed.
///
/// # Errors
///
/// Returns [`RegionError`] if an input is missing or malformed, if any
/// stage fails, or if the output cannot be written.
pub async fn process_region(
    region: &RegionConfig,
    config: &Arc<Config>,
    paths: &RegionPaths,
    progress: Arc<dyn ProgressCallback>,
) -> Result<RegionSummary, RegionError> {
    let start = Instant::now();
    let input = paths.input(&region.code);
    log::info!("Reading raw data for {} ({})", region.code, region.name);

    let roads_path = input.join(ROADS_FILE);
    let (buildings, places, roads) = tokio::join!(
        read_elements(input.join(BUILDINGS_FILE)),
        read_elements(input.join(PLACES_FILE)),
        read_roads(roads_path.clone()),
    );
    let buildings = Arc::new(buildings?);
    let places = places?;
    let roads = roads?;
    log::info!(
        "{}: {} buildings, {} places",
        region.code,
        buildings.len(),
        places.len()
    );

    let index_task = {
        let buildings = Arc::clone(&buildings);
        tokio::task::spawn_blocking(move || build_index(&buildings))
    };
    let demand_task = {
        let buildings = Arc::clone(&buildings);
        let config = Arc::clone(config);
        let bbox = region.bbox;
        tokio::task::spawn_blocking(move || {
            transit_demand::synthesize(bbox, &buildings, &places, &config, &GeoBackend, &progress)
        })
    };
    let roads_task = {
        let filter = config.roads.clone();
        tokio::task::spawn_blocking(move || {
            roads
                .map(|raw| filter_roads(&raw, &filter))
                .transpose()
                .map_err(|source| RegionError::Roads {
                    path: roads_path.display().to_string(),
                    source,
                })
        })
    };

    let (index, demand, roads) = tokio::join!(index_task, demand_task, roads_task);
    let index = index??;
    let demand = demand??;
    let roads = roads??;

    let decimals = config.output.decimals;
    let staged = StagedDir::create(&paths.output(&region.code))?;
    let written = write_json(&staged.path(BUILDINGS_INDEX_FILE), &index, decimals)
        .and_then(|()| match &roads {
            Some(roads) => write_json(&staged.path(ROADS_FILE), roads, decimals),
            None => Ok(()),
        })
        .and_then(|()| write_json(&staged.path(DEMAND_FILE), &demand, decimals));
    if let Err(e) = written {
        staged.discard();
        return Err(e);
    }
    let output = staged.commit()?;

    log::info!(
        "Finished processing {} in {:.1}s",
        region.code,
        start.elapsed().as_secs_f64()
    );

    Ok(RegionSummary {
        code: region.code.clone(),
        buildings: index.stats.count,
        points: demand.points.len(),
        pops: demand.pops.len(),
        commuters: demand.total_flow(),
        roads: roads.is_some(),
        output,
    })
}
