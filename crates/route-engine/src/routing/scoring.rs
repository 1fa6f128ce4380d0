//! Confidence heuristic for a routed result.

use crate::models::{Preferences, Profile, TrafficTolerance};
use crate::routing::providers::{ProviderCapabilities, ProviderRoute};

const BASE: f64 = 0.5;
const REASONABLE_DISTANCE_BONUS: f64 = 0.2;
const REASONABLE_DISTANCE_M: std::ops::RangeInclusive<f64> = 1_000.0..=200_000.0;
const REPORTED_CONFIDENCE_BONUS: f64 = 0.1;
const HIGH_REPORTED_CONFIDENCE: f64 = 0.8;
const MAX_IDENTITY_BONUS: f64 = 0.25;
const LOW_TRAFFIC_BONUS: f64 = 0.15;
const BIKE_INFRASTRUCTURE_BONUS: f64 = 0.20;
const GRAVEL_MATCH_BONUS: f64 = 0.25;

/// Scores a provider's route in [0, 1].
///
/// Informational only: the router never retries on a low score.
pub fn score_confidence(
    route: &ProviderRoute,
    capabilities: &ProviderCapabilities,
    profile: Profile,
    preferences: &Preferences,
) -> f64 {
    let mut score = BASE;

    if REASONABLE_DISTANCE_M.contains(&route.distance_meters) {
        score += REASONABLE_DISTANCE_BONUS;
    }
    if route
        .reported_confidence
        .is_some_and(|c| c >= HIGH_REPORTED_CONFIDENCE)
    {
        score += REPORTED_CONFIDENCE_BONUS;
    }

    score += capabilities.identity_bonus.clamp(0.0, MAX_IDENTITY_BONUS);

    if preferences.traffic_tolerance == TrafficTolerance::Low && capabilities.honors_low_traffic {
        score += LOW_TRAFFIC_BONUS;
    }
    if preferences.require_bike_infrastructure && capabilities.honors_bike_infrastructure {
        score += BIKE_INFRASTRUCTURE_BONUS;
    }
    if profile == Profile::Gravel && capabilities.gravel_specialized {
        score += GRAVEL_MATCH_BONUS;
    }

    score.clamp(0.0, 1.0)
}
