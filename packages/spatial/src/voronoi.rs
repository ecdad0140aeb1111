//! Planar Voronoi tessellation clipped to a bounding box.
//!
//! Each cell starts as the bounding rectangle and is clipped by the
//! perpendicular bisector half-plane of every other site, nearest first.
//! Clipping stops once the next site is more than twice as far as the
//! farthest remaining cell vertex, since no further bisector can cut the
//! cell. Distances are planar in degree space.

use geo::{Coord, LineString, Point, Polygon, Rect};

/// Computes one cell per site.
///
/// A site that repeats an earlier site's exact coordinates, lies on a
/// non-finite coordinate, or whose clipped cell collapses gets `None`.
#[must_use]
pub fn tessellate(sites: &[Point<f64>], bbox: Rect<f64>) -> Vec<Option<Polygon<f64>>> {
    let mut seen = std::collections::BTreeSet::new();
    let usable: Vec<bool> = sites
        .iter()
        .map(|p| {
            p.x().is_finite()
                && p.y().is_finite()
                && seen.insert((p.x().to_bits(), p.y().to_bits()))
        })
        .collect();

    let active: Vec<usize> = (0..sites.len()).filter(|&i| usable[i]).collect();

    sites
        .iter()
        .enumerate()
        .map(|(i, site)| {
            if !usable[i] {
                return None;
            }
            cell_for(*site, i, sites, &active, bbox)
        })
        .collect()
}

fn cell_for(
    site: Point<f64>,
    own: usize,
    sites: &[Point<f64>],
    active: &[usize],
    bbox: Rect<f64>,
) -> Option<Polygon<f64>> {
    let (min, max) = (bbox.min(), bbox.max());
    let mut cell = vec![
        min,
        Coord { x: max.x, y: min.y },
        max,
        Coord { x: min.x, y: max.y },
    ];

    let mut others: Vec<(f64, usize)> = active
        .iter()
        .filter(|&&j| j != own)
        .map(|&j| (planar_sq(site.0, sites[j].0), j))
        .collect();
    others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    for (dist_sq, j) in others {
        let reach_sq = cell
            .iter()
            .map(|c| planar_sq(site.0, *c))
            .fold(0.0, f64::max);
        if dist_sq > 4.0 * reach_sq {
            break;
        }
        cell = clip(&cell, site.0, sites[j].0);
        if cell.len() < 3 {
            return None;
        }
    }

    if cell.len() < 3 {
        return None;
    }
    let mut ring = cell;
    ring.push(ring[0]);
    Some(Polygon::new(LineString::new(ring), vec![]))
}

/// Keeps the part of `cell` closer to `site` than to `other`.
fn clip(cell: &[Coord<f64>], site: Coord<f64>, other: Coord<f64>) -> Vec<Coord<f64>> {
    let normal = Coord {
        x: other.x - site.x,
        y: other.y - site.y,
    };
    let mid = Coord {
        x: f64::midpoint(site.x, other.x),
        y: f64::midpoint(site.y, other.y),
    };
    let side = |p: Coord<f64>| (p.x - mid.x).mul_add(normal.x, (p.y - mid.y) * normal.y);

    let mut out = Vec::with_capacity(cell.len() + 1);
    for (k, &cur) in cell.iter().enumerate() {
        let next = cell[(k + 1) % cell.len()];
        let (dc, dn) = (side(cur), side(next));
        if dc <= 0.0 {
            out.push(cur);
        }
        if (dc < 0.0 && dn > 0.0) || (dc > 0.0 && dn < 0.0) {
            let t = dc / (dc - dn);
            out.push(Coord {
                x: t.mul_add(next.x - cur.x, cur.x),
                y: t.mul_add(next.y - cur.y, cur.y),
            });
        }
    }
    out
}

fn planar_sq(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (dx, dy) = (a.x - b.x, a.y - b.y);
    dx.mul_add(dx, dy * dy)
}
