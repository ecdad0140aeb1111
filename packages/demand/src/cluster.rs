//! Density clustering of residential points with population-bounded
//! recursive splitting.

use geo::Point;
use transit_demand_spatial::GeometryOps;
use transit_demand_spatial::dbscan::group_labels;

/// Clusters above this population are split further.
pub const MAX_CLUSTER_POPULATION: u64 = 7500;

/// Smallest radius used by recursive splitting.
pub const MIN_SPLIT_DISTANCE_KM: f64 = 0.15;

/// Radius shrink factor per split level.
const SPLIT_FACTOR: f64 = 0.7;

/// A residential building reduced to what clustering needs.
#[derive(Debug, Clone, Copy)]
pub struct ResidentialPoint {
    /// Index into the classified building list.
    pub building: usize,
    /// Building center.
    pub location: Point<f64>,
    /// Resident capacity, always positive.
    pub population: u64,
}

/// Clustering operations over a fixed residential point set. Groups are
/// lists of indices into that set.
pub struct Clusterer<'a> {
    geometry: &'a dyn GeometryOps,
    points: &'a [ResidentialPoint],
}

impl<'a> Clusterer<'a> {
    /// Creates a clusterer over `points`.
    #[must_use]
    pub const fn new(geometry: &'a dyn GeometryOps, points: &'a [ResidentialPoint]) -> Self {
        Self { geometry, points }
    }

    /// The underlying points.
    #[must_use]
    pub const fn points(&self) -> &'a [ResidentialPoint] {
        self.points
    }

    /// Summed population of `group`.
    #[must_use]
    pub fn population(&self, group: &[usize]) -> u64 {
        group.iter().map(|&i| self.points[i].population).sum()
    }

    /// Population-weighted centroid of `group`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self, group: &[usize]) -> Option<Point<f64>> {
        let weighted: Vec<(Point<f64>, f64)> = group
            .iter()
            .map(|&i| (self.points[i].location, self.points[i].population as f64))
            .collect();
        self.geometry.center_of_mass(&weighted)
    }

    /// Runs DBSCAN over `members` and returns the resulting groups.
    ///
    /// Noise points become singleton groups when `keep_noise` is set and
    /// are dropped otherwise. If clustering fails, all members are
    /// returned as one group.
    #[must_use]
    pub fn cluster(
        &self,
        members: &[usize],
        distance_km: f64,
        min_points: usize,
        keep_noise: bool,
    ) -> Vec<Vec<usize>> {
        if members.is_empty() {
            return Vec::new();
        }

        let locations: Vec<Point<f64>> = members.iter().map(|&i| self.points[i].location).collect();
        match self.geometry.dbscan(&locations, distance_km, min_points) {
            Ok(labels) => group_labels(&labels, keep_noise)
                .into_iter()
                .map(|group| group.into_iter().map(|k| members[k]).collect())
                .collect(),
            Err(e) => {
                log::warn!(
                    "Clustering {} points failed ({e}); keeping them as one cluster",
                    members.len()
                );
                vec![members.to_vec()]
            }
        }
    }

    /// Splits `group` until every part is at or below
    /// [`MAX_CLUSTER_POPULATION`].
    ///
    /// Each level re-clusters at 0.7× the radius, down to
    /// [`MIN_SPLIT_DISTANCE_KM`]. At that floor an over-populated group is
    /// bisected along its longer axis instead. A group that re-clustering
    /// returns unchanged is kept as-is.
    #[must_use]
    pub fn split_if_needed(&self, group: Vec<usize>, base_distance_km: f64) -> Vec<Vec<usize>> {
        let population = self.population(&group);
        let at_floor = base_distance_km <= MIN_SPLIT_DISTANCE_KM;

        if population <= MAX_CLUSTER_POPULATION || group.len() < 3 || at_floor {
            if population > MAX_CLUSTER_POPULATION && group.len() >= 2 && at_floor {
                let (left, right) = self.bisect(group);
                let mut parts = self.split_if_needed(left, base_distance_km);
                parts.extend(self.split_if_needed(right, base_distance_km));
                return parts;
            }
            return vec![group];
        }

        let next_distance = (base_distance_km * SPLIT_FACTOR).max(MIN_SPLIT_DISTANCE_KM);
        let parts = self.cluster(&group, next_distance, 1, true);
        if parts.len() == 1 && parts[0].len() == group.len() {
            return vec![group];
        }

        parts
            .into_iter()
            .flat_map(|part| self.split_if_needed(part, next_distance))
            .collect()
    }

    /// Halves `group` by count along its wider coordinate axis.
    fn bisect(&self, mut group: Vec<usize>) -> (Vec<usize>, Vec<usize>) {
        let (min_x, max_x, min_y, max_y) = group.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(a, b, c, d), &i| {
                let p = self.points[i].location;
                (a.min(p.x()), b.max(p.x()), c.min(p.y()), d.max(p.y()))
            },
        );
        let by_lon = max_x - min_x >= max_y - min_y;

        group.sort_by(|&a, &b| {
            let (pa, pb) = (self.points[a].location, self.points[b].location);
            let (ka, kb) = if by_lon { (pa.x(), pb.x()) } else { (pa.y(), pb.y()) };
            ka.total_cmp(&kb).then(a.cmp(&b))
        });

        let right = group.split_off(group.len().div_ceil(2));
        (group, right)
    }
}
