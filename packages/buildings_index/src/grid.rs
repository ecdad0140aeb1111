//! Grid lines laid out in fixed metric steps from the south-west corner.

use geo::{Destination, Distance, Haversine, InterpolatePoint, Point};

/// Edge length of one grid cell in metres.
pub const CELL_SIZE_M: f64 = 100.0;

/// Rounds to four decimal places.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Column and row origins of the index grid.
///
/// Column origins are measured along the southern edge of the region
/// and row origins along its western edge, one every [`CELL_SIZE_M`].
/// Each origin is inclusive. The last column is open to the east; the
/// last row ends one cell height above its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Western edge of each column, in degrees of longitude.
    pub columns: Vec<f64>,
    /// Southern edge of each row, in degrees of latitude.
    pub rows: Vec<f64>,
    /// Height of one cell in degrees of latitude, rounded to 4 places.
    pub cell_height: f64,
}

impl Grid {
    /// Lays out the grid over `[min_lon, min_lat, max_lon, max_lat]`.
    #[must_use]
    pub fn new(bbox: [f64; 4]) -> Self {
        let [min_lon, min_lat, max_lon, max_lat] = bbox;
        let south_west = Point::new(min_lon, min_lat);
        let south_east = Point::new(max_lon, min_lat);
        let north_west = Point::new(min_lon, max_lat);

        let width = Haversine.distance(south_west, south_east);
        let height = Haversine.distance(south_west, north_west);

        let mut columns = Vec::new();
        let mut along = 0.0;
        while along <= width {
            let point = Haversine.point_at_distance_between(south_west, south_east, along);
            columns.push(point.x());
            along += CELL_SIZE_M;
        }

        let mut rows = Vec::new();
        let mut along = 0.0;
        while along <= height {
            rows.push(Haversine.destination(south_west, 0.0, along).y());
            along += CELL_SIZE_M;
        }

        let step = Haversine.destination(south_west, 0.0, CELL_SIZE_M).y() - min_lat;

        Self {
            columns,
            rows,
            cell_height: round4(step),
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Northern edge of the last row.
    #[must_use]
    pub fn max_lat(&self) -> f64 {
        self.rows.last().copied().unwrap_or_default() + self.cell_height
    }

    /// Column holding longitude `lon`.
    #[must_use]
    pub fn column_of(&self, lon: f64) -> usize {
        self.columns.partition_point(|&c| c <= lon).saturating_sub(1)
    }

    /// Row holding latitude `lat`.
    #[must_use]
    pub fn row_of(&self, lat: f64) -> usize {
        self.rows.partition_point(|&r| r <= lat).saturating_sub(1)
    }
}
