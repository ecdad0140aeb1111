//! R-tree over indexed points.
//!
//! Stores each point alongside its position in the caller's slice so that
//! lookups return indices, never references. Radius queries prefilter
//! with a padded degree envelope and then confirm with haversine distance.

use geo::{Point, Rect};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};

use crate::measure::{degree_padding, haversine_km};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Spatial index answering radius, nearest, and rectangle queries.
#[derive(Default)]
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    /// Bulk-loads `points`, indexed by their position in the slice.
    #[must_use]
    pub fn new(points: &[Point<f64>]) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.x(), p.y()], i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Adds one point under `index`.
    pub fn insert(&mut self, point: Point<f64>, index: usize) {
        self.tree
            .insert(GeomWithData::new([point.x(), point.y()], index));
    }

    /// Number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Indices of all points within `radius_km` of `center`, ascending.
    #[must_use]
    pub fn within_km(&self, center: Point<f64>, radius_km: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .candidates(center, radius_km)
            .into_iter()
            .filter(|entry| haversine_km(center, to_point(entry)) <= radius_km)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// The closest point within `radius_km`, with its distance in km.
    ///
    /// Ties resolve to the lowest index.
    #[must_use]
    pub fn nearest_within_km(&self, center: Point<f64>, radius_km: f64) -> Option<(usize, f64)> {
        self.candidates(center, radius_km)
            .into_iter()
            .map(|entry| (entry.data, haversine_km(center, to_point(entry))))
            .filter(|(_, d)| *d <= radius_km)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }

    /// Indices of points inside `rect`, ascending.
    #[must_use]
    pub fn in_rect(&self, rect: Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    fn candidates(&self, center: Point<f64>, radius_km: f64) -> Vec<&IndexedPoint> {
        let (d_lon, d_lat) = degree_padding(center, radius_km);
        let envelope = AABB::from_corners(
            [center.x() - d_lon, center.y() - d_lat],
            [center.x() + d_lon, center.y() + d_lat],
        );
        self.tree.locate_in_envelope(&envelope).collect()
    }
}

fn to_point(entry: &IndexedPoint) -> Point<f64> {
    let [x, y] = *entry.geom();
    Point::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn sample() -> PointIndex {
        PointIndex::new(&[
            Point::new(14.50, 46.05),
            Point::new(14.51, 46.05),
            Point::new(14.60, 46.05),
        ])
    }

    #[test]
    fn within_km_filters_by_great_circle_distance() {
        let index = sample();
        assert_eq!(index.within_km(Point::new(14.50, 46.05), 1.0), vec![0, 1]);
        assert_eq!(index.within_km(Point::new(14.50, 46.05), 0.1), vec![0]);
    }

    #[test]
    fn nearest_within_km_respects_radius() {
        let index = sample();
        let (idx, d) = index
            .nearest_within_km(Point::new(14.59, 46.05), 5.0)
            .unwrap();
        assert_eq!(idx, 2);
        assert!(d < 1.0);
        assert!(index.nearest_within_km(Point::new(15.5, 46.05), 5.0).is_none());
    }

    #[test]
    fn in_rect_returns_sorted_indices() {
        let index = sample();
        let rect = Rect::new(Coord { x: 14.0, y: 46.0 }, Coord { x: 14.55, y: 46.1 });
        assert_eq!(index.in_rect(rect), vec![0, 1]);
    }

    #[test]
    fn insert_extends_index() {
        let mut index = PointIndex::default();
        assert!(index.is_empty());
        index.insert(Point::new(1.0, 1.0), 7);
        assert_eq!(index.len(), 1);
        assert_eq!(index.within_km(Point::new(1.0, 1.0), 0.01), vec![7]);
    }
}
