//! The demand dataset handed to the simulation layer.

use serde::{Deserialize, Serialize};

/// A weighted population/job node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighborhood {
    /// Node id. Place-derived, synthetic, or a terminal display id.
    pub id: String,
    /// `[lon, lat]` of the population- or job-weighted centroid.
    pub location: [f64; 2],
    /// Job capacity inside the catchment.
    pub jobs: u64,
    /// Resident population. Always 0 for terminal and job-dominant nodes.
    pub residents: u64,
    /// Ids of every population group starting or ending here.
    pub pop_ids: Vec<String>,
    /// Display name, when one could be derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A directed commute flow between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationGroup {
    /// Node the group lives in.
    pub residence_id: String,
    /// Node the group works in.
    pub job_id: String,
    /// Head count, always positive.
    pub size: u64,
    /// Straight-line distance between the two nodes, in metres.
    pub driving_distance: u64,
    /// Estimated travel time in seconds (`distance * 0.12`).
    pub driving_seconds: u64,
    /// Globally unique id within one region run.
    pub id: String,
}

/// `{ points, pops }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandData {
    /// Every node with jobs or residents.
    pub points: Vec<Neighborhood>,
    /// Every positive-size population group.
    pub pops: Vec<PopulationGroup>,
}

impl DemandData {
    /// Total head count across all groups.
    #[must_use]
    pub fn total_flow(&self) -> u64 {
        self.pops.iter().map(|p| p.size).sum()
    }
}
