//! The per-request workflow: route, then elevation, then workout cues.
//!
//! Runs under a wall-clock budget and stops as soon as the caller's
//! [`CancellationToken`] fires. Dropping the in-flight future drops the
//! outstanding HTTP requests with it. Nothing here writes durable state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::elevation::{
    ElevationResolver, ElevationSource, OpenElevationSource, OpenTopoDataSource, TerrainEstimator,
    climb_summary,
};
use crate::errors::EngineError;
use crate::geometry::total_distance;
use crate::http::build_client;
use crate::intervals::{
    SpeedOverride, ZoneSpeedTable, estimate_distance_meters, map_intervals_with, validate_workout,
};
use crate::models::{Coordinate, Preferences, Profile, RouteArtifact, WorkoutStructure};
use crate::routing::{BRouterProvider, OsrmProvider, ValhallaProvider, WaypointRouter};

/// One route-planning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub waypoints: Vec<Coordinate>,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout: Option<WorkoutStructure>,
    /// Rider-specific zone speeds replacing entries of the default table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_profile: Option<Vec<SpeedOverride>>,
}

impl BuildRequest {
    pub fn new(waypoints: Vec<Coordinate>, profile: Profile) -> Self {
        Self {
            waypoints,
            profile,
            preferences: Preferences::default(),
            workout: None,
            speed_profile: None,
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_workout(mut self, workout: WorkoutStructure) -> Self {
        self.workout = Some(workout);
        self
    }

    pub fn with_speed_profile(mut self, overrides: Vec<SpeedOverride>) -> Self {
        self.speed_profile = Some(overrides);
        self
    }
}

pub struct RouteEngine {
    router: WaypointRouter,
    elevation: ElevationResolver,
    speeds: ZoneSpeedTable,
    budget: Duration,
}

impl RouteEngine {
    pub fn new(router: WaypointRouter, elevation: ElevationResolver) -> Self {
        Self {
            router,
            elevation,
            speeds: ZoneSpeedTable::default(),
            budget: Duration::from_secs(30),
        }
    }

    /// Wires the public providers from `config`, sharing one HTTP client.
    pub fn from_config(config: &EngineConfig) -> Self {
        let client = build_client(config.provider_timeout(), config.connect_timeout());

        let router = WaypointRouter::new(
            Arc::new(ValhallaProvider::new(
                client.clone(),
                config.valhalla_url.clone(),
                config.valhalla_api_key.clone(),
            )),
            Arc::new(BRouterProvider::new(client.clone(), config.brouter_url.clone())),
            Arc::new(OsrmProvider::new(client.clone(), config.osrm_url.clone())),
        )
        .with_call_timeout(config.provider_timeout());

        let sources: Vec<Arc<dyn ElevationSource>> = vec![
            Arc::new(OpenElevationSource::new(
                client.clone(),
                config.open_elevation_url.clone(),
            )),
            Arc::new(OpenTopoDataSource::new(
                client,
                config.opentopodata_url.clone(),
                config.opentopodata_pacing(),
            )),
        ];
        let elevation = ElevationResolver::new(sources, TerrainEstimator::default())
            .with_max_samples(config.elevation_max_samples)
            .with_call_timeout(config.provider_timeout());

        Self::new(router, elevation).with_budget(config.pipeline_budget())
    }

    pub fn with_speed_table(mut self, speeds: ZoneSpeedTable) -> Self {
        self.speeds = speeds;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn router(&self) -> &WaypointRouter {
        &self.router
    }

    pub fn elevation(&self) -> &ElevationResolver {
        &self.elevation
    }

    pub async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<RouteArtifact, EngineError> {
        let budget = self.budget;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Route build cancelled by caller");
                Err(EngineError::Cancelled)
            }
            result = tokio::time::timeout(budget, self.run(request)) => {
                result.map_err(|_| EngineError::BudgetExceeded(budget))?
            }
        }
    }

    async fn run(&self, request: &BuildRequest) -> Result<RouteArtifact, EngineError> {
        // Reject bad input before spending any provider quota.
        let speeds = match &request.speed_profile {
            Some(overrides) => self.speeds.clone().with_overrides(overrides)?,
            None => self.speeds.clone(),
        };
        if let Some(workout) = &request.workout {
            validate_workout(workout)?;
        }

        let route = self
            .router
            .route(&request.waypoints, request.profile, request.preferences)
            .await?;
        tracing::info!(
            "Routed {:.1} km via {} (confidence {:.2}, {:?})",
            route.distance_meters / 1000.0,
            route.provider,
            route.confidence,
            route.provenance
        );

        let elevation = self.elevation.resolve(&route.geometry).await;
        let climb = climb_summary(&elevation.elevations());

        let mut warnings = route.warnings.clone();
        warnings.extend(elevation.warnings.iter().cloned());

        let cues = match &request.workout {
            Some(workout) => {
                let cues = map_intervals_with(&route.geometry, workout, &speeds)?;
                let needed = estimate_distance_meters(workout, &speeds);
                let available = total_distance(&route.geometry);
                if needed > available {
                    warnings.push(format!(
                        "workout needs about {:.1} km but the route is {:.1} km; cues stop early",
                        needed / 1000.0,
                        available / 1000.0
                    ));
                }
                cues
            }
            None => Vec::new(),
        };

        tracing::info!(
            "Built route artifact: {} points, {} cues, {} warnings",
            route.geometry.len(),
            cues.len(),
            warnings.len()
        );

        Ok(RouteArtifact {
            route,
            elevation,
            climb,
            cues,
            warnings,
        })
    }
}
