//! Geodesic measures and degree/kilometre conversions.

use geo::{Distance, Haversine, Point};

/// Kilometres per degree of latitude.
const KM_PER_DEGREE_LAT: f64 = 110.574;

/// Kilometres per degree of longitude at the equator.
const KM_PER_DEGREE_LON: f64 = 111.320;

/// Great-circle distance in kilometres.
#[must_use]
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b) / 1000.0
}

/// Great-circle distance in metres.
#[must_use]
pub fn haversine_m(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// Half-widths `(d_lon, d_lat)` in degrees of a box that contains every
/// point within `radius_km` of `center`.
///
/// Slightly padded so that haversine filtering never misses a point the
/// box should have caught.
#[must_use]
pub fn degree_padding(center: Point<f64>, radius_km: f64) -> (f64, f64) {
    let d_lat = radius_km / KM_PER_DEGREE_LAT * 1.01;
    let worst_lat = (center.y().abs() + d_lat).min(89.0);
    let cos = worst_lat.to_radians().cos();
    let d_lon = if cos <= f64::EPSILON {
        360.0
    } else {
        (radius_km / (KM_PER_DEGREE_LON * cos) * 1.01).min(360.0)
    };
    (d_lon, d_lat)
}

/// Weight-averaged position of `weighted`.
///
/// Falls back to the unweighted mean when the weights sum to zero.
#[must_use]
pub fn center_of_mass(weighted: &[(Point<f64>, f64)]) -> Option<Point<f64>> {
    if weighted.is_empty() {
        return None;
    }

    let total: f64 = weighted.iter().map(|(_, w)| w.max(0.0)).sum();
    if total > 0.0 {
        let (x, y) = weighted.iter().fold((0.0, 0.0), |(x, y), (p, w)| {
            let w = w.max(0.0);
            (x + p.x() * w, y + p.y() * w)
        });
        return Some(Point::new(x / total, y / total));
    }

    #[allow(clippy::cast_precision_loss)]
    let n = weighted.len() as f64;
    let (x, y) = weighted
        .iter()
        .fold((0.0, 0.0), |(x, y), (p, _)| (x + p.x(), y + p.y()));
    Some(Point::new(x / n, y / n))
}
