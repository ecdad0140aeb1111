//! TOML configuration schema.
//!
//! Every section and every field is optional. Missing values take the
//! defaults below, which are the tuned values the demand model was
//! calibrated against.

use serde::{Deserialize, Serialize};

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output serialization settings.
    pub output: OutputConfig,
    /// Road network filtering.
    pub roads: RoadFilterConfig,
    /// Flow chunking bounds.
    pub population_chunking: PopulationChunkingConfig,
    /// Destination weighting tunables.
    pub distance_weighting: DistanceWeightingConfig,
    /// Synthetic seeds for uncovered residential buildings.
    pub orphan_clustering: OrphanClusteringConfig,
    /// Regions to process.
    pub regions: Vec<RegionConfig>,
}

/// A region to process, identified by its short code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Short code naming the input and output directories (e.g. `"LJU"`).
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// `[min_lon, min_lat, max_lon, max_lat]` clipping the tessellation.
    pub bbox: [f64; 4],
    /// Reported population, informational only.
    #[serde(default)]
    pub population: Option<u64>,
}

/// Numeric rounding of serialized output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Round every non-integer number to this many decimal places.
    /// `None` leaves numbers untouched.
    pub decimals: Option<u32>,
}

/// Which road features survive the filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadFilterConfig {
    /// `highway` tag values to drop.
    pub exclude_highways: Vec<String>,
    /// Line features shorter than this are dropped.
    pub min_length_meters: Option<f64>,
}

/// Bounds used when splitting flows into population groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationChunkingConfig {
    /// Preferred group size.
    pub target_size: u64,
    /// Smallest group produced by the initial split.
    pub min_size: u64,
    /// Groups below this are merged before emission.
    pub minimum_finalize_size: u64,
    /// Largest group ever emitted.
    pub max_size: u64,
    /// Maximum destinations per origin before quota raises.
    pub max_connections_per_point: usize,
}

impl Default for PopulationChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: 160,
            min_size: 20,
            minimum_finalize_size: 30,
            max_size: 380,
            max_connections_per_point: 24,
        }
    }
}

/// Destination scoring and terminal traffic bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceWeightingConfig {
    /// Upper population bounds of the first tiers. An origin falls into
    /// the first tier whose bound it does not exceed, or the last tier.
    pub population_tiers: Vec<u64>,
    /// Closeness decay scale per tier, in km.
    pub tier_scales_km: Vec<f64>,
    /// Nearest destinations always kept, per tier.
    pub tier_local_quotas: Vec<usize>,
    /// Exponent of the distance decay.
    pub distance_exponent: f64,
    /// Lower bound of closeness.
    pub closeness_floor: f64,
    /// Exponent applied to closeness in the final score.
    pub closeness_exponent: f64,
    /// Exponent applied to `jobs + 1`.
    pub job_exponent: f64,
    /// Exponent applied to the destination's share of all jobs.
    pub cluster_exponent: f64,
    /// Added to every score.
    pub base_weight: f64,
    /// Multiplier for terminal destinations.
    pub terminal_boost: f64,
    /// Closeness exponent cap for terminal destinations.
    pub terminal_closeness_exponent: f64,
    /// Lower bound of the terminal share of one origin's traffic.
    pub terminal_min_share: f64,
    /// Upper bound of the terminal share of one origin's traffic.
    pub terminal_max_share: f64,
    /// Upper bound of the terminal share of the whole region's traffic.
    pub global_terminal_share: f64,
    /// Catchments with `jobs >= ratio * residents` report no residents.
    pub job_dominance_ratio: f64,
}

impl Default for DistanceWeightingConfig {
    fn default() -> Self {
        Self {
            population_tiers: vec![400, 1200, 3000, 7000],
            tier_scales_km: vec![1.5, 2.5, 4.0, 6.0, 8.0],
            tier_local_quotas: vec![2, 2, 3, 3, 4],
            distance_exponent: 2.0,
            closeness_floor: 0.02,
            closeness_exponent: 1.0,
            job_exponent: 0.85,
            cluster_exponent: 0.15,
            base_weight: 1.0,
            terminal_boost: 1.5,
            terminal_closeness_exponent: 0.35,
            terminal_min_share: 0.01,
            terminal_max_share: 0.08,
            global_terminal_share: 0.04,
            job_dominance_ratio: 5.0,
        }
    }
}

/// Grid clustering of residential buildings no place claimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrphanClusteringConfig {
    /// Cells below this population are ignored.
    pub min_population: u64,
    /// Sub-clusters closer than this to an existing seed are dropped.
    pub adoption_threshold_km: f64,
    /// Starting radius when splitting over-populated sub-clusters.
    pub base_distance_km: f64,
    /// DBSCAN core-point threshold inside a cell.
    pub min_points: usize,
    /// Upper bound of the per-cell DBSCAN radius.
    pub max_distance_km: f64,
    /// Grid cell edge in degrees.
    pub cell_size_degrees: f64,
}

impl Default for OrphanClusteringConfig {
    fn default() -> Self {
        Self {
            min_population: 30,
            adoption_threshold_km: 0.9,
            base_distance_km: 1.2,
            min_points: 4,
            max_distance_km: 1.6,
            cell_size_degrees: 0.004,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_defaults_match_documented_values() {
        let chunking = PopulationChunkingConfig::default();
        assert_eq!(chunking.target_size, 160);
        assert_eq!(chunking.min_size, 20);
        assert_eq!(chunking.minimum_finalize_size, 30);
        assert_eq!(chunking.max_size, 380);
        assert_eq!(chunking.max_connections_per_point, 24);
    }

    #[test]
    fn tier_tables_agree_in_length() {
        let weighting = DistanceWeightingConfig::default();
        assert_eq!(
            weighting.tier_scales_km.len(),
            weighting.population_tiers.len() + 1
        );
        assert_eq!(
            weighting.tier_local_quotas.len(),
            weighting.tier_scales_km.len()
        );
    }

    #[test]
    fn orphan_defaults_match_documented_values() {
        let orphan = OrphanClusteringConfig::default();
        assert_eq!(orphan.min_population, 30);
        assert!((orphan.adoption_threshold_km - 0.9).abs() < f64::EPSILON);
        assert!((orphan.cell_size_degrees - 0.004).abs() < f64::EPSILON);
        assert_eq!(orphan.min_points, 4);
    }
}
