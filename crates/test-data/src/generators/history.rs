//! Rider route histories.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::Rng;
use route_engine::EngineError;
use route_engine::models::{Coordinate, RouteEndpoints};
use route_engine::privacy::RouteHistory;
use uuid::Uuid;

use crate::config::BoundingBox;
use crate::sources::METERS_PER_DEGREE;

/// Where a rider's past rides tend to start and end.
#[derive(Debug, Clone)]
pub struct HistoryGenConfig {
    /// Usual start point (home).
    pub home: Coordinate,
    /// Usual end point; None means rides end somewhere random.
    pub work: Option<Coordinate>,
    /// How far a "home" start may sit from `home`, in meters.
    pub scatter_m: f64,
    /// Share of rides that start at home, 0.0-1.0.
    pub home_fraction: f64,
    /// Area for the random ends of rides.
    pub area: BoundingBox,
}

impl HistoryGenConfig {
    pub fn commuter(home: Coordinate, work: Coordinate, area: BoundingBox) -> Self {
        Self {
            home,
            work: Some(work),
            scatter_m: 50.0,
            home_fraction: 1.0,
            area,
        }
    }
}

pub struct HistoryGenerator {
    config: HistoryGenConfig,
}

impl HistoryGenerator {
    pub fn new(home: Coordinate, area: BoundingBox) -> Self {
        Self {
            config: HistoryGenConfig {
                home,
                work: None,
                scatter_m: 50.0,
                home_fraction: 1.0,
                area,
            },
        }
    }

    pub fn with_config(config: HistoryGenConfig) -> Self {
        Self { config }
    }

    pub fn with_scatter(mut self, meters: f64) -> Self {
        self.config.scatter_m = meters;
        self
    }

    pub fn with_home_fraction(mut self, fraction: f64) -> Self {
        self.config.home_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn generate(&self, count: usize, rng: &mut impl Rng) -> Vec<RouteEndpoints> {
        (0..count)
            .map(|_| {
                let start = if rng.gen_bool(self.config.home_fraction) {
                    scatter(self.config.home, self.config.scatter_m, rng)
                } else {
                    self.config.area.random_point(rng)
                };
                let end = match self.config.work {
                    Some(work) => scatter(work, self.config.scatter_m, rng),
                    None => self.config.area.random_point(rng),
                };
                RouteEndpoints { start, end }
            })
            .collect()
    }
}

/// A point uniformly inside a circle of `radius_m` around `center`.
pub fn scatter(center: Coordinate, radius_m: f64, rng: &mut impl Rng) -> Coordinate {
    if radius_m <= 0.0 {
        return center;
    }
    // sqrt keeps the density uniform over the disc.
    let r = radius_m * rng.gen_range(0.0f64..1.0).sqrt();
    let theta = rng.gen_range(0.0..std::f64::consts::TAU);
    let lat = center.lat + r * theta.cos() / METERS_PER_DEGREE;
    let lon = center.lon + r * theta.sin() / (METERS_PER_DEGREE * center.lat.to_radians().cos());
    Coordinate::new(lon, lat)
}

/// In-memory stand-in for the rider-history store.
#[derive(Default)]
pub struct InMemoryHistory {
    routes: Mutex<HashMap<Uuid, Vec<RouteEndpoints>>>,
    unavailable: bool,
    queries: AtomicUsize,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query fails, as when the store is down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_rider(self, rider_id: Uuid, routes: Vec<RouteEndpoints>) -> Self {
        self.record(rider_id, routes);
        self
    }

    /// Adds rides for a rider, as a newly uploaded activity would.
    pub fn record(&self, rider_id: Uuid, routes: Vec<RouteEndpoints>) {
        if let Ok(mut map) = self.routes.lock() {
            map.entry(rider_id).or_default().extend(routes);
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteHistory for InMemoryHistory {
    async fn list_route_endpoints(
        &self,
        rider_id: Uuid,
    ) -> Result<Vec<RouteEndpoints>, EngineError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(EngineError::History("history store unavailable".into()));
        }
        let map = self
            .routes
            .lock()
            .map_err(|_| EngineError::History("history store poisoned".into()))?;
        Ok(map.get(&rider_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use route_engine::geometry::distance;

    #[test]
    fn test_scatter_within_radius() {
        let mut rng = StdRng::seed_from_u64(11);
        let center = Region::BOULDER.center();
        for _ in 0..200 {
            let p = scatter(center, 50.0, &mut rng);
            assert!(distance(&p, &center) <= 50.5);
        }
    }

    #[test]
    fn test_all_home_starts() {
        let mut rng = StdRng::seed_from_u64(5);
        let home = Region::BOULDER.center();
        let history = HistoryGenerator::new(home, Region::BOULDER).generate(10, &mut rng);
        assert_eq!(history.len(), 10);
        assert!(history.iter().all(|h| distance(&h.start, &home) <= 50.5));
    }

    #[tokio::test]
    async fn test_in_memory_history() {
        let rider = Uuid::new_v4();
        let home = Region::BOULDER.center();
        let store = InMemoryHistory::new().with_rider(
            rider,
            vec![RouteEndpoints {
                start: home,
                end: home,
            }],
        );
        assert_eq!(store.list_route_endpoints(rider).await.unwrap().len(), 1);
        assert!(store.list_route_endpoints(Uuid::new_v4()).await.unwrap().is_empty());
        assert_eq!(store.queries(), 2);

        let down = InMemoryHistory::unavailable();
        assert!(down.list_route_endpoints(rider).await.is_err());
    }
}
