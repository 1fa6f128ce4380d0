//! Waypoint routing across unreliable providers.
//!
//! The priority order for each profile is a [`ProviderChain`]: plain data
//! evaluated by [`run_chain`]. Reordering or adding providers means building
//! a different chain, never touching the runner.

mod providers;
mod scoring;

pub use providers::{
    BRouterProvider, OsrmProvider, ProviderCapabilities, ProviderRoute, RouteRequest,
    RoutingProvider, ValhallaProvider,
};
pub use scoring::score_confidence;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::errors::{AttemptFailure, EngineError, ProviderError};
use crate::http::with_timeout;
use crate::models::{Coordinate, Preferences, Profile, Provenance, RouteGeometry, RoutedResult};

/// Fewer geometry points than this and a result is treated as a failure.
pub const MIN_ROUTE_POINTS: usize = 10;

/// Confidence taken off a general-purpose fallback's own score.
pub const FALLBACK_PENALTY: f64 = 0.12;

pub const RURAL_FALLBACK_WARNING: &str =
    "rural area, no dedicated path: routed on normal roads";

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptRole {
    Primary,
    Fallback {
        penalty: f64,
        warning: Option<String>,
    },
}

#[derive(Clone)]
pub struct Attempt {
    pub provider: Arc<dyn RoutingProvider>,
    pub role: AttemptRole,
}

/// Providers in the order they are tried.
#[derive(Clone, Default)]
pub struct ProviderChain {
    attempts: Vec<Attempt>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary(mut self, provider: Arc<dyn RoutingProvider>) -> Self {
        self.attempts.push(Attempt {
            provider,
            role: AttemptRole::Primary,
        });
        self
    }

    pub fn fallback(
        mut self,
        provider: Arc<dyn RoutingProvider>,
        penalty: f64,
        warning: Option<&str>,
    ) -> Self {
        self.attempts.push(Attempt {
            provider,
            role: AttemptRole::Fallback {
                penalty,
                warning: warning.map(str::to_string),
            },
        });
        self
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

/// Tries each attempt in order and returns the first usable route.
///
/// Hard failures (errors, timeouts, fewer than [`MIN_ROUTE_POINTS`] points,
/// invalid coordinates) move on to the next attempt. If nothing is usable
/// the result is [`EngineError::NoRoute`], never an empty route.
pub async fn run_chain(
    chain: &ProviderChain,
    request: &RouteRequest<'_>,
    call_timeout: Duration,
) -> Result<RoutedResult, EngineError> {
    let mut failures: Vec<AttemptFailure> = Vec::new();

    for attempt in chain.attempts() {
        let tag = attempt.provider.tag();
        tracing::debug!("Requesting {:?} route from {tag}", request.profile);

        let outcome = with_timeout(call_timeout, attempt.provider.fetch_route(request))
            .await
            .and_then(|route| {
                if route.geometry.len() < MIN_ROUTE_POINTS {
                    Err(ProviderError::TooShort {
                        points: route.geometry.len(),
                    })
                } else {
                    Ok(route)
                }
            });

        let route = match outcome {
            Ok(route) => route,
            Err(e) => {
                tracing::warn!("Routing provider {tag} failed: {e}");
                failures.push(AttemptFailure {
                    provider: tag,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let score = score_confidence(
            &route,
            &attempt.provider.capabilities(),
            request.profile,
            &request.preferences,
        );

        let geometry = match RouteGeometry::new(route.geometry) {
            Ok(geometry) => geometry,
            Err(e) => {
                tracing::warn!("Routing provider {tag} returned unusable geometry: {e}");
                failures.push(AttemptFailure {
                    provider: tag,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let mut warnings: Vec<String> = failures
            .iter()
            .map(|f| format!("{} unavailable: {}", f.provider, f.reason))
            .collect();

        let (confidence, provenance) = match &attempt.role {
            AttemptRole::Primary => (score, Provenance::Primary),
            AttemptRole::Fallback { penalty, warning } => {
                if let Some(w) = warning {
                    warnings.push(w.clone());
                }
                ((score - penalty).clamp(0.0, 1.0), Provenance::Fallback)
            }
        };

        tracing::info!(
            "Routed with {tag}: {:.0} m, {} points, confidence {confidence:.2}",
            route.distance_meters,
            geometry.len()
        );

        return Ok(RoutedResult {
            geometry,
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
            elevation_gain_meters: route.elevation_gain_meters,
            elevation_loss_meters: route.elevation_loss_meters,
            confidence,
            provider: tag,
            provenance,
            warnings,
        });
    }

    Err(EngineError::NoRoute { attempts: failures })
}

pub struct WaypointRouter {
    chains: HashMap<Profile, ProviderChain>,
    call_timeout: Duration,
}

impl WaypointRouter {
    /// Default priority order for each profile.
    ///
    /// Gravel starts on the unpaved-surface provider and falls back to the
    /// general router with a rural warning; the paved cycling provider is
    /// never its primary. Every other profile starts on the cycling provider.
    pub fn new(
        cycling: Arc<dyn RoutingProvider>,
        gravel: Arc<dyn RoutingProvider>,
        general: Arc<dyn RoutingProvider>,
    ) -> Self {
        let paved = ProviderChain::new()
            .primary(cycling)
            .fallback(general.clone(), FALLBACK_PENALTY, None);
        let unpaved = ProviderChain::new().primary(gravel).fallback(
            general,
            FALLBACK_PENALTY,
            Some(RURAL_FALLBACK_WARNING),
        );

        let mut chains = HashMap::new();
        chains.insert(Profile::Road, paved.clone());
        chains.insert(Profile::Commute, paved);
        chains.insert(Profile::Gravel, unpaved);

        Self {
            chains,
            call_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_chain(mut self, profile: Profile, chain: ProviderChain) -> Self {
        self.chains.insert(profile, chain);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn chain(&self, profile: Profile) -> Option<&ProviderChain> {
        self.chains.get(&profile)
    }

    pub async fn route(
        &self,
        waypoints: &[Coordinate],
        profile: Profile,
        preferences: Preferences,
    ) -> Result<RoutedResult, EngineError> {
        // Same rules as geometry: at least 2 valid points.
        RouteGeometry::new(waypoints.to_vec())?;

        let Some(chain) = self.chains.get(&profile) else {
            return Err(EngineError::NoRoute {
                attempts: Vec::new(),
            });
        };

        let request = RouteRequest {
            waypoints,
            profile,
            preferences,
        };
        run_chain(chain, &request, self.call_timeout).await
    }

    /// Routes one suggestion per preference variant concurrently.
    ///
    /// Results come back in the order of `variants`; one variant failing
    /// does not affect the others.
    pub async fn route_variants(
        &self,
        waypoints: &[Coordinate],
        profile: Profile,
        variants: &[Preferences],
    ) -> Vec<Result<RoutedResult, EngineError>> {
        join_all(
            variants
                .iter()
                .map(|preferences| self.route(waypoints, profile, *preferences)),
        )
        .await
    }
}
