#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geometry primitives for demand synthesis.
//!
//! The demand pipeline never touches a geometry library directly. It goes
//! through [`GeometryOps`], which exposes exactly the capabilities it
//! needs: polygon area, point-in-polygon, great-circle distance,
//! density-based clustering, site tessellation, and center of mass.
//! [`GeoBackend`] implements the trait on top of `geo` and `rstar`.
//!
//! All coordinates are `(lon, lat)` in degrees, stored as `geo` points
//! with `x = lon` and `y = lat`.

pub mod dbscan;
pub mod index;
pub mod measure;
pub mod voronoi;

use geo::{ChamberlainDuquetteArea, Contains, Intersects, LineString, Point, Polygon, Rect};
use thiserror::Error;

pub use index::PointIndex;

/// Errors raised by the spatial primitives.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// A coordinate was NaN or infinite.
    #[error("Non-finite coordinate at index {index}")]
    NonFiniteCoordinate {
        /// Position of the offending point in the input slice.
        index: usize,
    },

    /// A clustering radius was zero, negative, or not finite.
    #[error("Invalid clustering radius: {radius_km} km")]
    InvalidRadius {
        /// The rejected radius.
        radius_km: f64,
    },
}

/// Geometry capabilities required by the demand pipeline.
///
/// Any implementation honouring these contracts can be substituted
/// without changing pipeline output semantics.
pub trait GeometryOps {
    /// Geodesic area of a closed `(lon, lat)` ring, in square metres.
    fn ring_area_m2(&self, ring: &[(f64, f64)]) -> f64;

    /// Whether `point` lies inside `polygon` or on its boundary.
    fn contains(&self, polygon: &Polygon<f64>, point: Point<f64>) -> bool;

    /// Great-circle distance in kilometres.
    fn distance_km(&self, a: Point<f64>, b: Point<f64>) -> f64;

    /// Density-based clustering. Returns one label per input point;
    /// `None` marks noise.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if a point is not finite or the radius is
    /// invalid.
    fn dbscan(
        &self,
        points: &[Point<f64>],
        max_distance_km: f64,
        min_points: usize,
    ) -> Result<Vec<Option<usize>>, SpatialError>;

    /// Partitions `bbox` into one cell per site. Duplicate or degenerate
    /// sites get `None`.
    fn tessellate(&self, sites: &[Point<f64>], bbox: Rect<f64>) -> Vec<Option<Polygon<f64>>>;

    /// Weight-averaged position. Falls back to the plain mean when all
    /// weights are zero; `None` for empty input.
    fn center_of_mass(&self, weighted: &[(Point<f64>, f64)]) -> Option<Point<f64>>;
}

/// [`GeometryOps`] backed by `geo` and `rstar`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoBackend;

impl GeometryOps for GeoBackend {
    fn ring_area_m2(&self, ring: &[(f64, f64)]) -> f64 {
        if ring.len() < 3 {
            return 0.0;
        }
        let polygon = Polygon::new(LineString::from(ring.to_vec()), vec![]);
        polygon.chamberlain_duquette_unsigned_area()
    }

    fn contains(&self, polygon: &Polygon<f64>, point: Point<f64>) -> bool {
        polygon.contains(&point) || polygon.exterior().intersects(&point)
    }

    fn distance_km(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        measure::haversine_km(a, b)
    }

    fn dbscan(
        &self,
        points: &[Point<f64>],
        max_distance_km: f64,
        min_points: usize,
    ) -> Result<Vec<Option<usize>>, SpatialError> {
        dbscan::dbscan(points, max_distance_km, min_points)
    }

    fn tessellate(&self, sites: &[Point<f64>], bbox: Rect<f64>) -> Vec<Option<Polygon<f64>>> {
        voronoi::tessellate(sites, bbox)
    }

    fn center_of_mass(&self, weighted: &[(Point<f64>, f64)]) -> Option<Point<f64>> {
        measure::center_of_mass(weighted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, polygon};

    #[test]
    fn contains_includes_boundary() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let backend = GeoBackend;
        assert!(backend.contains(&square, Point::new(0.5, 0.5)));
        assert!(backend.contains(&square, Point::new(1.0, 0.5)));
        assert!(!backend.contains(&square, Point::new(1.5, 0.5)));
    }

    #[test]
    fn ring_area_of_small_square_is_plausible() {
        // ~100 m x ~100 m at the equator
        let d = 100.0 / 111_319.5;
        let ring = vec![(0.0, 0.0), (d, 0.0), (d, d), (0.0, d), (0.0, 0.0)];
        let area = GeoBackend.ring_area_m2(&ring);
        assert!((area - 10_000.0).abs() < 100.0, "area was {area}");
    }

    #[test]
    fn degenerate_ring_has_no_area() {
        assert!(GeoBackend.ring_area_m2(&[(0.0, 0.0), (1.0, 1.0)]).abs() < f64::EPSILON);
    }

    #[test]
    fn tessellate_covers_bbox_with_two_sites() {
        let bbox = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 2.0, y: 1.0 });
        let cells = GeoBackend.tessellate(&[Point::new(0.5, 0.5), Point::new(1.5, 0.5)], bbox);
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().all(Option::is_some));
    }
}
