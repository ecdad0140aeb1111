//! Density-based clustering (DBSCAN) over geographic points.
//!
//! Neighbourhoods are great-circle discs of `max_distance_km`, and a point
//! counts itself toward `min_points`. With `min_points = 1` every point is
//! a core point and clusters are the connected components of the
//! distance graph.
//!
//! Visiting order is the input order and neighbour lists are sorted, so
//! labels are reproducible for identical input.

use std::collections::VecDeque;

use geo::Point;

use crate::SpatialError;
use crate::index::PointIndex;

/// Clusters `points`, returning one label per point (`None` = noise).
///
/// Labels are dense, starting at 0, in order of first discovery.
///
/// # Errors
///
/// Returns [`SpatialError::NonFiniteCoordinate`] for NaN/infinite input and
/// [`SpatialError::InvalidRadius`] for a non-positive radius.
pub fn dbscan(
    points: &[Point<f64>],
    max_distance_km: f64,
    min_points: usize,
) -> Result<Vec<Option<usize>>, SpatialError> {
    if !max_distance_km.is_finite() || max_distance_km <= 0.0 {
        return Err(SpatialError::InvalidRadius {
            radius_km: max_distance_km,
        });
    }
    if let Some(index) = points
        .iter()
        .position(|p| !p.x().is_finite() || !p.y().is_finite())
    {
        return Err(SpatialError::NonFiniteCoordinate { index });
    }

    let index = PointIndex::new(points);
    let min_points = min_points.max(1);
    let neighbors = |i: usize| index.within_km(points[i], max_distance_km);

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut next_label = 0;

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;

        let seeds = neighbors(start);
        if seeds.len() < min_points {
            continue;
        }

        let label = next_label;
        next_label += 1;
        labels[start] = Some(label);

        let mut queue: VecDeque<usize> = seeds.into_iter().collect();
        while let Some(j) = queue.pop_front() {
            if !visited[j] {
                visited[j] = true;
                let expansion = neighbors(j);
                if expansion.len() >= min_points {
                    queue.extend(expansion);
                }
            }
            if labels[j].is_none() {
                labels[j] = Some(label);
            }
        }
    }

    log::trace!(
        "dbscan: {} points, {next_label} clusters at {max_distance_km} km",
        points.len()
    );

    Ok(labels)
}

/// Groups point indices by label. Noise points become singleton groups
/// when `keep_noise` is set and are dropped otherwise.
///
/// Groups are ordered by label, then noise by index.
#[must_use]
pub fn group_labels(labels: &[Option<usize>], keep_noise: bool) -> Vec<Vec<usize>> {
    let cluster_count = labels.iter().flatten().max().map_or(0, |m| m + 1);
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
    let mut noise = Vec::new();

    for (i, label) in labels.iter().enumerate() {
        match label {
            Some(l) => groups[*l].push(i),
            None if keep_noise => noise.push(vec![i]),
            None => {}
        }
    }

    groups.retain(|g| !g.is_empty());
    groups.extend(noise);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_distant_groups() {
        let points = [
            Point::new(14.500, 46.050),
            Point::new(14.501, 46.050),
            Point::new(14.600, 46.050),
            Point::new(14.601, 46.050),
        ];
        let labels = dbscan(&points, 0.5, 1).unwrap();
        assert_eq!(labels, vec![Some(0), Some(0), Some(1), Some(1)]);
    }

    #[test]
    fn chains_through_neighbours() {
        // Each step ~77 m apart, end to end ~230 m.
        let points = [
            Point::new(14.500, 46.05),
            Point::new(14.501, 46.05),
            Point::new(14.502, 46.05),
            Point::new(14.503, 46.05),
        ];
        let labels = dbscan(&points, 0.1, 1).unwrap();
        assert!(labels.iter().all(|l| *l == Some(0)));
    }

    #[test]
    fn sparse_points_are_noise_with_high_min_points() {
        let points = [
            Point::new(14.500, 46.05),
            Point::new(14.5001, 46.05),
            Point::new(14.5002, 46.05),
            Point::new(14.700, 46.05),
        ];
        let labels = dbscan(&points, 0.1, 3).unwrap();
        assert_eq!(labels[3], None);
        assert_eq!(labels[0], Some(0));
        assert_eq!(group_labels(&labels, false), vec![vec![0, 1, 2]]);
        assert_eq!(group_labels(&labels, true), vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn rejects_non_finite_input() {
        let points = [Point::new(0.0, 0.0), Point::new(f64::NAN, 0.0)];
        assert!(matches!(
            dbscan(&points, 1.0, 1),
            Err(SpatialError::NonFiniteCoordinate { index: 1 })
        ));
        assert!(matches!(
            dbscan(&points[..1], 0.0, 1),
            Err(SpatialError::InvalidRadius { .. })
        ));
    }
}
