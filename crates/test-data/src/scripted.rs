//! Scripted routing providers and elevation sources.
//!
//! Stand-ins for the third-party services with a fixed, inspectable
//! behavior and a call counter, so scenarios can assert which provider was
//! consulted and how often.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use route_engine::ProviderError;
use route_engine::elevation::{ElevationSource, climb_summary};
use route_engine::geometry::total_distance;
use route_engine::models::{Coordinate, ElevationSourceTag, ProviderTag, RouteGeometry};
use route_engine::routing::{ProviderCapabilities, ProviderRoute, RouteRequest, RoutingProvider};

/// What a scripted provider does when asked for a route.
#[derive(Debug, Clone)]
pub enum RouteScript {
    /// Returns this geometry.
    Route(RouteGeometry),
    /// Returns the first `n` points of this geometry.
    Truncated(RouteGeometry, usize),
    /// Fails with an HTTP status.
    Status(u16),
    RateLimited,
    /// Never answers within any reasonable timeout.
    Hang,
}

pub struct ScriptedProvider {
    tag: ProviderTag,
    capabilities: ProviderCapabilities,
    script: RouteScript,
    reported_confidence: Option<f64>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &str, script: RouteScript) -> Self {
        Self {
            tag: ProviderTag::Custom(name.to_string()),
            capabilities: ProviderCapabilities::default(),
            script,
            reported_confidence: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Purpose-built cycling router that honors every preference.
    pub fn cycling(script: RouteScript) -> Arc<Self> {
        Arc::new(
            Self::new("cycling", script)
                .with_capabilities(ProviderCapabilities {
                    identity_bonus: 0.25,
                    honors_low_traffic: true,
                    honors_bike_infrastructure: true,
                    gravel_specialized: false,
                })
                .with_reported_confidence(1.0),
        )
    }

    /// Unpaved-surface router.
    pub fn gravel(script: RouteScript) -> Arc<Self> {
        Arc::new(Self::new("gravel", script).with_capabilities(ProviderCapabilities {
            identity_bonus: 0.15,
            honors_low_traffic: true,
            honors_bike_infrastructure: false,
            gravel_specialized: true,
        }))
    }

    /// General-purpose car/road router.
    pub fn general(script: RouteScript) -> Arc<Self> {
        Arc::new(Self::new("general", script).with_reported_confidence(0.85))
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_reported_confidence(mut self, confidence: f64) -> Self {
        self.reported_confidence = Some(confidence);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn to_route(&self, points: Vec<Coordinate>) -> ProviderRoute {
        let distance_meters = total_distance(&points);
        let elevations: Vec<f64> = points.iter().filter_map(|p| p.elevation).collect();
        let climb = climb_summary(&elevations);
        ProviderRoute {
            geometry: points,
            distance_meters,
            // 20 km/h average.
            duration_seconds: distance_meters / (20.0 / 3.6),
            elevation_gain_meters: climb.ascent_meters,
            elevation_loss_meters: climb.descent_meters,
            reported_confidence: self.reported_confidence,
        }
    }
}

#[async_trait]
impl RoutingProvider for ScriptedProvider {
    fn tag(&self) -> ProviderTag {
        self.tag.clone()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn fetch_route(
        &self,
        request: &RouteRequest<'_>,
    ) -> Result<ProviderRoute, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "{} asked for a {:?} route through {} waypoints",
            self.tag,
            request.profile,
            request.waypoints.len()
        );
        match &self.script {
            RouteScript::Route(geometry) => Ok(self.to_route(geometry.to_vec())),
            RouteScript::Truncated(geometry, n) => {
                Ok(self.to_route(geometry.iter().take(*n).copied().collect()))
            }
            RouteScript::Status(code) => Err(ProviderError::Status(*code)),
            RouteScript::RateLimited => Err(ProviderError::RateLimited),
            RouteScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Status(504))
            }
        }
    }
}

/// What a scripted elevation source does with a batch.
#[derive(Debug, Clone)]
pub enum ElevationScript {
    /// Every point at this elevation.
    Constant(f64),
    /// Elevation rises linearly with latitude, `meters_per_degree`, from `base`.
    Slope { base: f64, meters_per_degree: f64 },
    /// Fails every batch.
    Down,
    /// Succeeds for the first `n` batches, then fails.
    FailAfter(usize),
    /// Returns one value too few.
    ShortBatch,
}

pub struct ScriptedElevation {
    name: String,
    script: ElevationScript,
    batch_size: usize,
    calls: AtomicUsize,
}

impl ScriptedElevation {
    pub fn new(name: &str, script: ElevationScript) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            batch_size: 100,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_batch_size(name: &str, script: ElevationScript, batch_size: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            batch_size,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of batches requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ElevationSource for ScriptedElevation {
    fn tag(&self) -> ElevationSourceTag {
        ElevationSourceTag::Custom(self.name.clone())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn fetch_batch(&self, points: &[Coordinate]) -> Result<Vec<f64>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            ElevationScript::Constant(meters) => Ok(vec![*meters; points.len()]),
            ElevationScript::Slope {
                base,
                meters_per_degree,
            } => Ok(points
                .iter()
                .map(|p| base + p.lat * meters_per_degree)
                .collect()),
            ElevationScript::Down => Err(ProviderError::Status(503)),
            ElevationScript::FailAfter(n) if call >= *n => Err(ProviderError::RateLimited),
            ElevationScript::FailAfter(_) => Ok(vec![1500.0; points.len()]),
            ElevationScript::ShortBatch => Ok(vec![1500.0; points.len().saturating_sub(1)]),
        }
    }
}
