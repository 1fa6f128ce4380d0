//! Great-circle distance and distance-indexed lookups along a polyline.
//!
//! Everything here is pure. Functions that take a [`RouteGeometry`] can rely
//! on it holding at least 2 points.

use geo::{Coord, LineString};

use crate::models::{Coordinate, RouteGeometry};

/// Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A point found by [`coordinate_at_distance`] together with its index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointAtDistance {
    pub coordinate: Coordinate,
    pub index: usize,
}

/// Haversine distance in meters.
pub fn distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_M * c
}

/// Running distance from the first point; same length as the input, starts at 0.
pub fn cumulative_distances(points: &[Coordinate]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            total += distance(&points[i - 1], point);
        }
        out.push(total);
    }
    out
}

pub fn total_distance(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

/// First vertex whose cumulative distance reaches or exceeds `target_meters`.
///
/// Clamps: anything at or below 0 (or NaN) gives the first point, anything
/// past the end gives the last.
pub fn coordinate_at_distance(geometry: &RouteGeometry, target_meters: f64) -> PointAtDistance {
    let cumulative = cumulative_distances(geometry);
    let index = index_at_distance(&cumulative, target_meters);
    PointAtDistance {
        coordinate: geometry[index],
        index,
    }
}

fn index_at_distance(cumulative: &[f64], target_meters: f64) -> usize {
    let last = cumulative.len().saturating_sub(1);
    if target_meters.is_nan() || target_meters <= 0.0 {
        return 0;
    }
    // Cumulative distances are sorted, so this is a partition point.
    let index = cumulative.partition_point(|d| *d < target_meters);
    index.min(last)
}

/// Sub-geometry between two distances, in original order.
///
/// Keeps vertices from the first one at or beyond `start_meters` through the
/// first one at or beyond `end_meters`. An inverted range yields the single
/// vertex at `start_meters`.
pub fn slice(geometry: &RouteGeometry, start_meters: f64, end_meters: f64) -> Vec<Coordinate> {
    let cumulative = cumulative_distances(geometry);
    let start = index_at_distance(&cumulative, start_meters);
    let end = index_at_distance(&cumulative, end_meters).max(start);
    geometry[start..=end].to_vec()
}

/// Vertices whose along-route distance lies in `[start_meters, end_meters]`.
///
/// Both ends snap inward, so no kept vertex lies outside the range. Empty
/// when no vertex falls inside it.
pub fn slice_within(
    geometry: &RouteGeometry,
    start_meters: f64,
    end_meters: f64,
) -> Vec<Coordinate> {
    let cumulative = cumulative_distances(geometry);
    geometry
        .iter()
        .zip(&cumulative)
        .filter(|(_, d)| **d >= start_meters && **d <= end_meters)
        .map(|(point, _)| *point)
        .collect()
}

impl From<&RouteGeometry> for LineString<f64> {
    fn from(geometry: &RouteGeometry) -> Self {
        geometry
            .iter()
            .map(|c| Coord { x: c.lon, y: c.lat })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> RouteGeometry {
        // Roughly 1.1 km steps north along a meridian.
        RouteGeometry::new(
            (0..6)
                .map(|i| Coordinate::new(-105.27, 40.0 + 0.01 * f64::from(i)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);
        let expected = EARTH_RADIUS_M * 1f64.to_radians();
        assert!((distance(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = Coordinate::new(-105.27, 40.01);
        let b = Coordinate::new(-105.20, 40.05);
        assert!((distance(&a, &b) - distance(&b, &a)).abs() < 1e-9);
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_cumulative_monotonic_and_sums() {
        let geometry = line();
        let cumulative = cumulative_distances(&geometry);
        assert_eq!(cumulative.len(), geometry.len());
        assert_eq!(cumulative[0], 0.0);
        assert!(cumulative.windows(2).all(|w| w[1] >= w[0]));
        let summed: f64 = geometry.windows(2).map(|w| distance(&w[0], &w[1])).sum();
        assert!((cumulative[cumulative.len() - 1] - summed).abs() < 1e-6);
        assert!((total_distance(&geometry) - summed).abs() < 1e-6);
    }

    #[test]
    fn test_cumulative_with_repeated_points() {
        let p = Coordinate::new(-105.27, 40.01);
        let cumulative = cumulative_distances(&[p, p, Coordinate::new(-105.27, 40.02)]);
        assert_eq!(cumulative[1], 0.0);
        assert!(cumulative[2] > 1000.0);
    }

    #[test]
    fn test_coordinate_at_distance_clamps() {
        let geometry = line();
        let total = total_distance(&geometry);

        assert_eq!(coordinate_at_distance(&geometry, -50.0).index, 0);
        assert_eq!(coordinate_at_distance(&geometry, 0.0).index, 0);
        assert_eq!(coordinate_at_distance(&geometry, f64::NAN).index, 0);
        assert_eq!(coordinate_at_distance(&geometry, total).index, 5);
        assert_eq!(coordinate_at_distance(&geometry, total * 3.0).index, 5);
    }

    #[test]
    fn test_coordinate_at_distance_exact_vertex() {
        let geometry = line();
        let cumulative = cumulative_distances(&geometry);
        let hit = coordinate_at_distance(&geometry, cumulative[2]);
        assert_eq!(hit.index, 2);
        assert_eq!(hit.coordinate, geometry[2]);
    }

    #[test]
    fn test_coordinate_at_distance_picks_first_reaching() {
        let geometry = line();
        let cumulative = cumulative_distances(&geometry);
        let between = (cumulative[1] + cumulative[2]) / 2.0;
        assert_eq!(coordinate_at_distance(&geometry, between).index, 2);
    }

    #[test]
    fn test_coordinate_at_distance_duplicate_vertices_take_first() {
        let p = Coordinate::new(-105.27, 40.01);
        let q = Coordinate::new(-105.27, 40.02);
        let geometry = RouteGeometry::new(vec![p, q, q, Coordinate::new(-105.27, 40.03)]).unwrap();
        let cumulative = cumulative_distances(&geometry);
        assert_eq!(coordinate_at_distance(&geometry, cumulative[1]).index, 1);
    }

    #[test]
    fn test_slice_preserves_order() {
        let geometry = line();
        let cumulative = cumulative_distances(&geometry);
        let sub = slice(&geometry, cumulative[1] - 10.0, cumulative[3] + 10.0);
        assert_eq!(sub, geometry[1..=4].to_vec());
    }

    #[test]
    fn test_slice_full_range() {
        let geometry = line();
        let sub = slice(&geometry, 0.0, total_distance(&geometry));
        assert_eq!(sub, geometry.points().to_vec());
    }

    #[test]
    fn test_slice_inverted_range() {
        let geometry = line();
        let cumulative = cumulative_distances(&geometry);
        let sub = slice(&geometry, cumulative[3], cumulative[1]);
        assert_eq!(sub, vec![geometry[3]]);
    }

    #[test]
    fn test_slice_within_snaps_inward() {
        let geometry = line();
        let cumulative = cumulative_distances(&geometry);
        let sub = slice_within(&geometry, cumulative[1] - 10.0, cumulative[4] - 10.0);
        assert_eq!(sub, geometry[1..=3].to_vec());
        let exact = slice_within(&geometry, cumulative[1], cumulative[4]);
        assert_eq!(exact, geometry[1..=4].to_vec());
    }

    #[test]
    fn test_slice_within_empty_between_vertices() {
        let geometry = line();
        let cumulative = cumulative_distances(&geometry);
        let sub = slice_within(&geometry, cumulative[1] + 10.0, cumulative[2] - 10.0);
        assert!(sub.is_empty());
    }

    #[test]
    fn test_line_string_conversion() {
        let geometry = line();
        let ls: LineString<f64> = (&geometry).into();
        assert_eq!(ls.0.len(), geometry.len());
        assert_eq!(ls.0[0].x, geometry[0].lon);
        assert_eq!(ls.0[0].y, geometry[0].lat);
    }
}
