//! Redacting route geometry before it is shared.
//!
//! Recurring start and end points in a rider's history (likely home or work)
//! become privacy zones, and every point inside a zone is dropped. The start
//! and end of the route can additionally be clipped.
//!
//! This is a best-effort measure and gives no anonymity guarantee. Clipped
//! and filtered routes still reveal the general area, and a determined
//! observer with several shared routes can narrow it further.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EngineError, ValidationError};
use crate::geometry::{cumulative_distances, distance, slice_within, total_distance};
use crate::models::{
    Coordinate, PrivacyReason, PrivacyZone, RouteEndpoints, RouteGeometry, SanitizedGeometry,
};

/// Read-only query over a rider's past routes.
#[async_trait]
pub trait RouteHistory: Send + Sync {
    async fn list_route_endpoints(
        &self,
        rider_id: Uuid,
    ) -> Result<Vec<RouteEndpoints>, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Clip `clip_meters` off both ends of routes longer than `min_clip_route_meters`.
    pub obscure_start_end: bool,
    pub clip_meters: f64,
    pub min_clip_route_meters: f64,
    /// A historical endpoint this close to the candidate's endpoint counts as a match.
    pub match_radius_meters: f64,
    pub min_matches: usize,
    pub zone_radius_meters: f64,
    /// Zones supplied by the caller, applied alongside the detected ones.
    pub zones: Vec<PrivacyZone>,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            obscure_start_end: false,
            clip_meters: 500.0,
            min_clip_route_meters: 1000.0,
            match_radius_meters: 100.0,
            min_matches: 3,
            zone_radius_meters: 500.0,
            zones: Vec::new(),
        }
    }
}

impl SanitizeOptions {
    pub fn obscured() -> Self {
        Self {
            obscure_start_end: true,
            ..Self::default()
        }
    }

    pub fn with_zone(mut self, center: Coordinate, radius_meters: f64) -> Self {
        self.zones.push(PrivacyZone {
            center,
            radius_meters,
            reason: PrivacyReason::Supplied,
        });
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let radii = [self.match_radius_meters, self.zone_radius_meters]
            .into_iter()
            .chain(self.zones.iter().map(|z| z.radius_meters));
        for radius in radii {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ValidationError::InvalidRadius(radius));
            }
        }
        if !self.clip_meters.is_finite() || self.clip_meters < 0.0 {
            return Err(ValidationError::InvalidRadius(self.clip_meters));
        }
        Ok(())
    }
}

/// Finds recurring start/end locations for the candidate route.
///
/// At most one zone per endpoint. On a loop the end zone is skipped when it
/// would sit on top of the start zone.
pub fn detect_privacy_zones(
    route: &RouteGeometry,
    history: &[RouteEndpoints],
    options: &SanitizeOptions,
) -> Vec<PrivacyZone> {
    let mut zones: Vec<PrivacyZone> = Vec::new();

    for (point, reason) in [
        (route.start(), PrivacyReason::FrequentStart),
        (route.end(), PrivacyReason::FrequentEnd),
    ] {
        let near = |c: &Coordinate| distance(c, &point) <= options.match_radius_meters;
        let matches = history
            .iter()
            .filter(|h| near(&h.start) || near(&h.end))
            .count();
        if matches < options.min_matches {
            continue;
        }
        if zones.iter().any(|z| near(&z.center)) {
            continue;
        }

        tracing::debug!(
            "Privacy zone at ({:.5}, {:.5}): {} historical matches",
            point.lon,
            point.lat,
            matches
        );
        zones.push(PrivacyZone {
            center: point,
            radius_meters: options.zone_radius_meters,
            reason,
        });
    }

    zones
}

/// Clips and filters `route` against detected and supplied zones.
///
/// Only ever removes points: the output is an order-preserving subsequence
/// of the input.
pub fn sanitize(
    route: &RouteGeometry,
    history: &[RouteEndpoints],
    options: &SanitizeOptions,
) -> Result<SanitizedGeometry, ValidationError> {
    options.validate()?;

    let mut zones = detect_privacy_zones(route, history, options);
    zones.extend(options.zones.iter().copied());

    let total = total_distance(route);
    let clipped = options.obscure_start_end && total > options.min_clip_route_meters;
    let candidates = if clipped {
        slice_within(route, options.clip_meters, total - options.clip_meters)
    } else {
        route.to_vec()
    };

    let keep: Vec<bool> = candidates
        .iter()
        .map(|p| !zones.iter().any(|z| distance(&z.center, p) <= z.radius_meters))
        .collect();
    let fragmented = has_interior_gap(&keep);

    let points: Vec<Coordinate> = candidates
        .into_iter()
        .zip(&keep)
        .filter_map(|(p, kept)| kept.then_some(p))
        .collect();
    let removed_points = route.len() - points.len();

    if removed_points > 0 {
        tracing::debug!(
            "Sanitized route: removed {} of {} points ({} zones, clipped: {})",
            removed_points,
            route.len(),
            zones.len(),
            clipped
        );
    }

    Ok(SanitizedGeometry {
        points,
        zones_applied: zones,
        clipped,
        removed_points,
        fragmented,
    })
}

/// True when a dropped point sits between two kept ones.
fn has_interior_gap(keep: &[bool]) -> bool {
    let first = keep.iter().position(|k| *k);
    let last = keep.iter().rposition(|k| *k);
    match (first, last) {
        (Some(first), Some(last)) => keep[first..=last].iter().any(|k| !k),
        _ => false,
    }
}

/// Looks up the rider's history and sanitizes against it.
///
/// Zones are recomputed on every call so newly recorded rides are picked up.
pub struct PrivacySanitizer {
    history: Arc<dyn RouteHistory>,
}

impl PrivacySanitizer {
    pub fn new(history: Arc<dyn RouteHistory>) -> Self {
        Self { history }
    }

    pub async fn sanitize(
        &self,
        rider_id: Uuid,
        route: &RouteGeometry,
        options: &SanitizeOptions,
    ) -> Result<SanitizedGeometry, EngineError> {
        let endpoints = self.history.list_route_endpoints(rider_id).await?;
        tracing::debug!(
            "Loaded {} historical routes for rider {}",
            endpoints.len(),
            rider_id
        );
        Ok(sanitize(route, &endpoints, options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EARTH_RADIUS_M;

    const P: Coordinate = Coordinate::new(-105.27, 40.0);

    /// North from P in ~55.6 m steps.
    fn route_from_p(steps: usize) -> RouteGeometry {
        RouteGeometry::new(
            (0..=steps)
                .map(|i| Coordinate::new(P.lon, P.lat + 0.0005 * i as f64))
                .collect(),
        )
        .unwrap()
    }

    fn history_near_p(count: usize) -> Vec<RouteEndpoints> {
        (0..count)
            .map(|i| RouteEndpoints {
                // 0.0003 degrees of latitude is about 33 m.
                start: Coordinate::new(P.lon, P.lat + 0.0003 * (i % 2) as f64),
                end: Coordinate::new(-105.10, 40.20 + 0.01 * i as f64),
            })
            .collect()
    }

    fn is_subsequence(sub: &[Coordinate], full: &[Coordinate]) -> bool {
        let mut it = full.iter();
        sub.iter().all(|p| it.any(|q| q == p))
    }

    #[test]
    fn test_frequent_start_detected_and_removed() {
        let route = route_from_p(60);
        let result = sanitize(&route, &history_near_p(5), &SanitizeOptions::default()).unwrap();

        assert_eq!(result.zones_applied.len(), 1);
        let zone = result.zones_applied[0];
        assert_eq!(zone.reason, PrivacyReason::FrequentStart);
        assert_eq!(zone.radius_meters, 500.0);
        assert!(distance(&zone.center, &P) < 1.0);

        assert!(result.points.iter().all(|p| distance(p, &P) > 500.0));
        assert!(result.removed_points > 0);
        assert!(!result.fragmented);
        assert!(!result.clipped);
    }

    #[test]
    fn test_below_threshold_no_zone() {
        let route = route_from_p(30);
        let result = sanitize(&route, &history_near_p(2), &SanitizeOptions::default()).unwrap();
        assert!(result.zones_applied.is_empty());
        assert_eq!(result.points, route.to_vec());
        assert_eq!(result.removed_points, 0);
    }

    #[test]
    fn test_loop_route_gets_one_zone() {
        let mut points = route_from_p(20).into_inner();
        points.push(P);
        let route = RouteGeometry::new(points).unwrap();
        let zones = detect_privacy_zones(&route, &history_near_p(4), &SanitizeOptions::default());
        assert_eq!(zones.len(), 1);
    }

    /// Along-route distance of each kept point, looked up in the original route.
    fn kept_distances(kept: &[Coordinate], route: &RouteGeometry) -> Vec<f64> {
        let cumulative = cumulative_distances(route);
        kept.iter()
            .map(|p| {
                let index = route.iter().position(|q| q == p).unwrap();
                cumulative[index]
            })
            .collect()
    }

    #[test]
    fn test_obscure_clips_both_ends() {
        let route = route_from_p(60);
        let total = total_distance(&route);
        let result = sanitize(&route, &[], &SanitizeOptions::obscured()).unwrap();

        assert!(result.clipped);
        assert!(!result.points.is_empty());
        for d in kept_distances(&result.points, &route) {
            assert!(d >= 500.0);
            assert!(total - d >= 500.0);
        }
        assert!(is_subsequence(&result.points, &route));
    }

    #[test]
    fn test_obscure_drops_real_end_on_sparse_route() {
        // Vertices at 0, 600, 1200 and 2000 m north of P.
        let meters_per_degree = EARTH_RADIUS_M.to_radians();
        let route = RouteGeometry::new(
            [0.0, 600.0, 1200.0, 2000.0]
                .iter()
                .map(|m| Coordinate::new(P.lon, P.lat + m / meters_per_degree))
                .collect(),
        )
        .unwrap();
        let total = total_distance(&route);
        let result = sanitize(&route, &[], &SanitizeOptions::obscured()).unwrap();

        assert!(result.clipped);
        assert_eq!(result.points, vec![route[1], route[2]]);
        assert!(!result.points.contains(&route.end()));
        assert!(!result.points.contains(&route.start()));
        assert_eq!(result.removed_points, 2);
        for d in kept_distances(&result.points, &route) {
            assert!(d >= 500.0 && total - d >= 500.0);
        }
    }

    #[test]
    fn test_short_route_not_clipped() {
        let route = route_from_p(10);
        assert!(total_distance(&route) < 1000.0);
        let result = sanitize(&route, &[], &SanitizeOptions::obscured()).unwrap();
        assert!(!result.clipped);
        assert_eq!(result.points.len(), route.len());
    }

    #[test]
    fn test_mid_route_zone_fragments() {
        let route = route_from_p(60);
        let options = SanitizeOptions::default().with_zone(route[30], 200.0);
        let result = sanitize(&route, &[], &options).unwrap();
        assert!(result.fragmented);
        assert!(result.is_usable());
        assert_eq!(result.zones_applied[0].reason, PrivacyReason::Supplied);
        assert!(is_subsequence(&result.points, &route));
    }

    #[test]
    fn test_never_expands() {
        let route = route_from_p(40);
        let zone_sets = [
            SanitizeOptions::default(),
            SanitizeOptions::obscured(),
            SanitizeOptions::default().with_zone(route[5], 50.0),
            SanitizeOptions::obscured()
                .with_zone(route[0], 5_000.0)
                .with_zone(route[20], 10.0),
        ];
        for options in &zone_sets {
            let result = sanitize(&route, &history_near_p(3), options).unwrap();
            assert!(result.points.len() <= route.len());
            assert!(is_subsequence(&result.points, &route));
        }
    }

    #[test]
    fn test_everything_removed_is_not_an_error() {
        let route = route_from_p(10);
        let options = SanitizeOptions::default().with_zone(P, 10_000.0);
        let result = sanitize(&route, &[], &options).unwrap();
        assert!(result.points.is_empty());
        assert!(!result.is_usable());
        assert!(!result.fragmented);
    }

    #[test]
    fn test_rejects_bad_radius() {
        let route = route_from_p(10);
        let options = SanitizeOptions::default().with_zone(P, -1.0);
        assert_eq!(
            sanitize(&route, &[], &options).unwrap_err(),
            ValidationError::InvalidRadius(-1.0)
        );
    }

    struct FixedHistory(Vec<RouteEndpoints>);

    #[async_trait]
    impl RouteHistory for FixedHistory {
        async fn list_route_endpoints(
            &self,
            _rider_id: Uuid,
        ) -> Result<Vec<RouteEndpoints>, EngineError> {
            Ok(self.0.clone())
        }
    }

    struct DownHistory;

    #[async_trait]
    impl RouteHistory for DownHistory {
        async fn list_route_endpoints(
            &self,
            _rider_id: Uuid,
        ) -> Result<Vec<RouteEndpoints>, EngineError> {
            Err(EngineError::History("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_sanitizer_queries_history() {
        let sanitizer = PrivacySanitizer::new(Arc::new(FixedHistory(history_near_p(5))));
        let result = sanitizer
            .sanitize(Uuid::new_v4(), &route_from_p(60), &SanitizeOptions::default())
            .await
            .unwrap();
        assert_eq!(result.zones_applied.len(), 1);
    }

    #[tokio::test]
    async fn test_sanitizer_surfaces_history_failure() {
        let sanitizer = PrivacySanitizer::new(Arc::new(DownHistory));
        let err = sanitizer
            .sanitize(Uuid::new_v4(), &route_from_p(60), &SanitizeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::History(_)));
    }
}
