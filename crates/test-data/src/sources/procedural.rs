//! Procedural route geometry.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use route_engine::ValidationError;
use route_engine::geometry::{EARTH_RADIUS_M, distance};
use route_engine::models::{Coordinate, RouteGeometry};

use crate::config::{BoundingBox, Region};

/// Meters per degree of latitude on the engine's sphere.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Target distance in meters.
    pub distance_meters: f64,
    /// If None, random within bounds.
    pub start_point: Option<Coordinate>,
    pub bounds: BoundingBox,
    /// Approximate distance between points in meters.
    pub point_spacing_m: f64,
    /// Position jitter standard deviation in meters.
    pub jitter_m: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            distance_meters: 10_000.0,
            start_point: None,
            bounds: Region::BOULDER,
            point_spacing_m: 50.0,
            jitter_m: 0.0,
        }
    }
}

/// Random-walk routes with momentum, kept inside a bounding box.
pub struct ProceduralGenerator {
    config: RouteConfig,
}

impl Default for ProceduralGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProceduralGenerator {
    pub fn new() -> Self {
        Self {
            config: RouteConfig::default(),
        }
    }

    pub fn for_region(bounds: BoundingBox) -> Self {
        Self {
            config: RouteConfig {
                bounds,
                ..Default::default()
            },
        }
    }

    pub fn with_distance(mut self, meters: f64) -> Self {
        self.config.distance_meters = meters;
        self
    }

    pub fn with_start(mut self, start: Coordinate) -> Self {
        self.config.start_point = Some(start);
        self
    }

    pub fn with_point_spacing(mut self, meters: f64) -> Self {
        self.config.point_spacing_m = meters.max(1.0);
        self
    }

    pub fn with_jitter(mut self, meters: f64) -> Self {
        self.config.jitter_m = meters;
        self
    }

    /// Walks until the measured length reaches the target distance.
    pub fn generate(&self, rng: &mut impl Rng) -> Result<RouteGeometry, ValidationError> {
        let start = self
            .config
            .start_point
            .unwrap_or_else(|| self.config.bounds.random_point(rng));
        let jitter = Normal::new(0.0, self.config.jitter_m.max(0.0) / METERS_PER_DEGREE).ok();

        let mut points = vec![start];
        let mut current = start;
        let mut walked = 0.0;
        let mut heading = rng.gen_range(0.0..std::f64::consts::TAU);

        while walked < self.config.distance_meters || points.len() < 2 {
            heading += rng.gen_range(-0.3..0.3);
            let step = self.config.point_spacing_m * rng.gen_range(0.8..1.2);

            let lat_delta = step * heading.cos() / METERS_PER_DEGREE;
            let lon_delta =
                step * heading.sin() / (METERS_PER_DEGREE * current.lat.to_radians().cos());

            let (mut next, bounced) = self.bounce(
                Coordinate::new(current.lon + lon_delta, current.lat + lat_delta),
                heading,
            );
            heading = bounced;

            if let Some(noise) = &jitter {
                next.lat += noise.sample(rng);
                next.lon += noise.sample(rng);
            }

            walked += distance(&current, &next);
            current = next;
            points.push(current);
        }

        RouteGeometry::new(points)
    }

    /// Reflects the heading off whichever edge was crossed.
    fn bounce(&self, point: Coordinate, heading: f64) -> (Coordinate, f64) {
        let b = &self.config.bounds;
        let mut heading = heading;
        let mut point = point;

        if point.lat < b.min_lat || point.lat > b.max_lat {
            heading = std::f64::consts::PI - heading;
            point.lat = point.lat.clamp(b.min_lat, b.max_lat);
        }
        if point.lon < b.min_lon || point.lon > b.max_lon {
            heading = -heading;
            point.lon = point.lon.clamp(b.min_lon, b.max_lon);
        }
        (point, heading)
    }
}

/// A route heading due north, `meters` long, split into `segments` equal parts.
///
/// Along a meridian the haversine length is exact, so the total matches
/// `meters` to floating-point precision.
pub fn straight_route(
    start: Coordinate,
    meters: f64,
    segments: usize,
) -> Result<RouteGeometry, ValidationError> {
    let segments = segments.max(1);
    let step_deg = meters / METERS_PER_DEGREE / segments as f64;
    RouteGeometry::new(
        (0..=segments)
            .map(|i| Coordinate::new(start.lon, start.lat + step_deg * i as f64))
            .collect(),
    )
}

/// Evenly spaced waypoints from a route, always including both ends.
pub fn sample_waypoints(route: &RouteGeometry, count: usize) -> Vec<Coordinate> {
    let count = count.clamp(2, route.len());
    (0..count)
        .map(|i| route[i * (route.len() - 1) / (count - 1)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use route_engine::geometry::total_distance;

    #[test]
    fn test_generate_reaches_target_distance() {
        let mut rng = StdRng::seed_from_u64(42);
        let route = ProceduralGenerator::new()
            .with_distance(5_000.0)
            .generate(&mut rng)
            .unwrap();

        let length = total_distance(&route);
        assert!(length >= 5_000.0);
        assert!(length < 5_000.0 + 2.0 * 60.0);
        assert!(route.len() > 50);
    }

    #[test]
    fn test_generate_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = BoundingBox::new(40.0, -105.3, 40.01, -105.29);
        let route = ProceduralGenerator::for_region(bounds)
            .with_start(bounds.center())
            .with_distance(20_000.0)
            .generate(&mut rng)
            .unwrap();
        assert!(route.iter().all(|p| bounds.contains(p)));
    }

    #[test]
    fn test_same_seed_same_route() {
        let generator = ProceduralGenerator::new().with_distance(2_000.0).with_jitter(3.0);
        let a = generator.generate(&mut StdRng::seed_from_u64(1)).unwrap();
        let b = generator.generate(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_straight_route_exact_length() {
        let route = straight_route(Coordinate::new(-105.27, 40.0), 2_000.0, 40).unwrap();
        assert_eq!(route.len(), 41);
        assert!((total_distance(&route) - 2_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_waypoints_keeps_ends() {
        let route = straight_route(Coordinate::new(-105.27, 40.0), 5_000.0, 100).unwrap();
        let waypoints = sample_waypoints(&route, 3);
        assert_eq!(waypoints.len(), 3);
        assert_eq!(waypoints[0], route.start());
        assert_eq!(waypoints[2], route.end());
    }
}
