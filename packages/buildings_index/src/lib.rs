#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial grid index over building footprints.
//!
//! The region's building bounding box is cut into cells of roughly
//! 100 m × 100 m. Every building is binned into the cell holding its
//! footprint centroid, and the result is emitted in the compact shape the
//! simulation client loads: short field names, cells as flat
//! `[x, y, ids...]` arrays, and footprints as `(lon, lat)` rings.

pub mod grid;

use std::collections::BTreeMap;

use geo::{Centroid, LineString, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use transit_demand_models::OsmElement;

pub use grid::Grid;

/// Tag giving the number of below-ground levels.
const UNDERGROUND_LEVELS_TAG: &str = "building:levels:underground";

/// Foundation depth assumed when a building is not tagged.
const DEFAULT_FOUNDATION_DEPTH: u32 = 1;

/// Errors that can occur while building the index.
#[derive(Debug, Error)]
pub enum BuildingsIndexError {
    /// No building had a footprint with at least three vertices.
    #[error("No usable building geometry among {total} elements")]
    NoBuildings {
        /// Number of elements inspected.
        total: usize,
    },
}

/// One indexed building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedBuilding {
    /// Footprint bounding box `[min_lon, min_lat, max_lon, max_lat]`.
    #[serde(rename = "b")]
    pub bbox: [f64; 4],
    /// Foundation depth in levels.
    #[serde(rename = "f")]
    pub foundation_depth: u32,
    /// Footprint rings of `[lon, lat]` pairs, closed.
    #[serde(rename = "p")]
    pub polygon: Vec<Vec<[f64; 2]>>,
}

/// Index summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of indexed buildings.
    pub count: usize,
    /// Deepest foundation in the index, at least 1.
    #[serde(rename = "maxDepth")]
    pub max_depth: u32,
}

/// The serialized `buildings_index.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingsIndex {
    /// Cell height in degrees of latitude.
    #[serde(rename = "cs")]
    pub cell_size: f64,
    /// Grid extent `[min_lon, min_lat, max_lon, max_lat]`. The northern
    /// edge is snapped to the top of the last row.
    pub bbox: [f64; 4],
    /// `[cols, rows]`.
    pub grid: [usize; 2],
    /// Occupied cells as `[x, y, building ids...]`, ordered by `(x, y)`.
    pub cells: Vec<Vec<usize>>,
    /// Buildings, addressed by position.
    pub buildings: Vec<IndexedBuilding>,
    /// Summary counts.
    pub stats: IndexStats,
}

impl BuildingsIndex {
    /// Building ids stored in cell `(x, y)`.
    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> Option<&[usize]> {
        self.cells
            .iter()
            .find(|cell| cell.len() >= 2 && cell[0] == x && cell[1] == y)
            .map(|cell| &cell[2..])
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn foundation_depth(element: &OsmElement) -> u32 {
    let Some(raw) = element.tag(UNDERGROUND_LEVELS_TAG) else {
        return DEFAULT_FOUNDATION_DEPTH;
    };
    match raw.trim().parse::<f64>() {
        Ok(levels) if levels.is_finite() && levels >= 0.0 => levels.round() as u32,
        _ => {
            log::debug!(
                "Building {} has unreadable {UNDERGROUND_LEVELS_TAG}={raw:?}",
                element.id
            );
            DEFAULT_FOUNDATION_DEPTH
        }
    }
}

struct Footprint {
    building: IndexedBuilding,
    centroid: (f64, f64),
}

fn footprint(element: &OsmElement) -> Option<Footprint> {
    let ring = element.closed_ring()?;
    let bounds = element.ring_bounds()?;
    let polygon = Polygon::new(LineString::from(ring.clone()), vec![]);
    let centroid = polygon
        .centroid()
        .map_or_else(|| bounds.center(), |c| (c.x(), c.y()));

    Some(Footprint {
        building: IndexedBuilding {
            bbox: [bounds.minlon, bounds.minlat, bounds.maxlon, bounds.maxlat],
            foundation_depth: foundation_depth(element),
            polygon: vec![ring.into_iter().map(|(lon, lat)| [lon, lat]).collect()],
        },
        centroid,
    })
}

/// Builds the grid index for `elements`.
///
/// The grid extent covers every vertex of every element, including
/// elements skipped for having fewer than three vertices.
///
/// # Errors
///
/// Returns [`BuildingsIndexError::NoBuildings`] if no element has a usable
/// footprint.
pub fn build_index(elements: &[OsmElement]) -> Result<BuildingsIndex, BuildingsIndexError> {
    let mut extent: Option<[f64; 4]> = None;
    for vertex in elements.iter().flat_map(|e| &e.geometry) {
        extent = Some(match extent {
            None => [vertex.lon, vertex.lat, vertex.lon, vertex.lat],
            Some([a, b, c, d]) => [
                a.min(vertex.lon),
                b.min(vertex.lat),
                c.max(vertex.lon),
                d.max(vertex.lat),
            ],
        });
    }

    let footprints: Vec<Footprint> = elements.iter().filter_map(footprint).collect();
    let skipped = elements.len() - footprints.len();
    if skipped > 0 {
        log::debug!("Skipped {skipped} buildings with fewer than three vertices");
    }

    let Some(extent) = extent.filter(|_| !footprints.is_empty()) else {
        return Err(BuildingsIndexError::NoBuildings {
            total: elements.len(),
        });
    };

    let grid = Grid::new(extent);
    let mut cells: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
    let mut buildings = Vec::with_capacity(footprints.len());
    let mut max_depth = DEFAULT_FOUNDATION_DEPTH;

    for (id, Footprint { building, centroid }) in footprints.into_iter().enumerate() {
        let cell = (grid.column_of(centroid.0), grid.row_of(centroid.1));
        cells.entry(cell).or_default().push(id);
        max_depth = max_depth.max(building.foundation_depth);
        buildings.push(building);
    }

    log::info!(
        "Indexed {} buildings into {} of {}x{} cells",
        buildings.len(),
        cells.len(),
        grid.cols(),
        grid.rows()
    );

    Ok(BuildingsIndex {
        cell_size: grid.cell_height,
        bbox: [extent[0], extent[1], extent[2], grid.max_lat()],
        grid: [grid.cols(), grid.rows()],
        cells: cells
            .into_iter()
            .map(|((x, y), ids)| [x, y].into_iter().chain(ids).collect())
            .collect(),
        stats: IndexStats {
            count: buildings.len(),
            max_depth,
        },
        buildings,
    })
}
