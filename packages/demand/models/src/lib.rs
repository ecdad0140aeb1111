#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the transit demand toolchain.
//!
//! Defines the raw map-extract element schema consumed by every stage, the
//! demand dataset emitted for the simulation layer, and the TOML
//! configuration schema with its defaults.

pub mod config;
pub mod input;
pub mod output;

pub use config::{
    Config, DistanceWeightingConfig, OrphanClusteringConfig, OutputConfig,
    PopulationChunkingConfig, RegionConfig, RoadFilterConfig,
};
pub use input::{Bounds, ElementCollection, ElementType, LatLon, OsmElement};
pub use output::{DemandData, Neighborhood, PopulationGroup};
