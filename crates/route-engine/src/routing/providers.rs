//! Routing provider adapters.
//!
//! Each adapter owns its request format and response parsing and hands back a
//! [`ProviderRoute`]. The router only ever sees that shape plus the adapter's
//! [`ProviderCapabilities`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::elevation::climb_summary;
use crate::errors::ProviderError;
use crate::http::check_status;
use crate::models::{Coordinate, Preferences, Profile, ProviderTag, TrafficTolerance};

/// What the router asks of a provider.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub waypoints: &'a [Coordinate],
    pub profile: Profile,
    pub preferences: Preferences,
}

/// A provider response parsed into the engine's own terms.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRoute {
    pub geometry: Vec<Coordinate>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub elevation_gain_meters: f64,
    pub elevation_loss_meters: f64,
    /// The provider's own certainty in [0, 1], when it has one.
    pub reported_confidence: Option<f64>,
}

/// Static facts about a provider that feed the confidence score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProviderCapabilities {
    /// Bonus for cycling-specialized providers, capped at 0.25.
    pub identity_bonus: f64,
    pub honors_low_traffic: bool,
    pub honors_bike_infrastructure: bool,
    pub gravel_specialized: bool,
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    fn tag(&self) -> ProviderTag;

    fn capabilities(&self) -> ProviderCapabilities;

    async fn fetch_route(
        &self,
        request: &RouteRequest<'_>,
    ) -> Result<ProviderRoute, ProviderError>;
}

// ---------------------------------------------------------------------------
// Valhalla: purpose-built bicycle costing.
// ---------------------------------------------------------------------------

pub struct ValhallaProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ValhallaProvider {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[derive(Debug, Serialize)]
struct ValhallaRequest {
    locations: Vec<ValhallaLocation>,
    costing: &'static str,
    costing_options: ValhallaCostingOptions,
    units: &'static str,
    directions_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct ValhallaCostingOptions {
    bicycle: ValhallaBicycleOptions,
}

#[derive(Debug, Serialize)]
struct ValhallaBicycleOptions {
    bicycle_type: &'static str,
    use_roads: f64,
    avoid_bad_surfaces: f64,
}

#[derive(Debug, Deserialize)]
struct ValhallaResponse {
    trip: ValhallaTrip,
}

#[derive(Debug, Deserialize)]
struct ValhallaTrip {
    legs: Vec<ValhallaLeg>,
    summary: ValhallaSummary,
}

#[derive(Debug, Deserialize)]
struct ValhallaLeg {
    shape: String,
}

#[derive(Debug, Deserialize)]
struct ValhallaSummary {
    /// Kilometers.
    length: f64,
    /// Seconds.
    time: f64,
}

fn valhalla_options(profile: Profile, preferences: &Preferences) -> ValhallaBicycleOptions {
    let bicycle_type = match profile {
        Profile::Road => "Road",
        Profile::Gravel => "Cross",
        Profile::Commute => "Hybrid",
    };
    let mut use_roads: f64 = match preferences.traffic_tolerance {
        TrafficTolerance::Low => 0.1,
        TrafficTolerance::Medium => 0.5,
        TrafficTolerance::High => 0.9,
    };
    if preferences.require_bike_infrastructure {
        use_roads = use_roads.min(0.1);
    }
    let avoid_bad_surfaces = match profile {
        Profile::Gravel => 0.0,
        Profile::Commute => 0.5,
        Profile::Road => 0.9,
    };
    ValhallaBicycleOptions {
        bicycle_type,
        use_roads,
        avoid_bad_surfaces,
    }
}

#[async_trait]
impl RoutingProvider for ValhallaProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Valhalla
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            identity_bonus: 0.25,
            honors_low_traffic: true,
            honors_bike_infrastructure: true,
            gravel_specialized: false,
        }
    }

    async fn fetch_route(
        &self,
        request: &RouteRequest<'_>,
    ) -> Result<ProviderRoute, ProviderError> {
        let body = ValhallaRequest {
            locations: request
                .waypoints
                .iter()
                .map(|c| ValhallaLocation {
                    lat: c.lat,
                    lon: c.lon,
                })
                .collect(),
            costing: "bicycle",
            costing_options: ValhallaCostingOptions {
                bicycle: valhalla_options(request.profile, &request.preferences),
            },
            units: "kilometers",
            directions_type: "none",
        };

        let url = format!("{}/route", self.base_url.trim_end_matches('/'));
        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.query(&[("api_key", key)]);
        }
        let response = builder.send().await?;
        let text = check_status(response)?.text().await?;
        let parsed: ValhallaResponse = serde_json::from_str(&text)?;

        let mut geometry: Vec<Coordinate> = Vec::new();
        for leg in &parsed.trip.legs {
            let decoded = polyline::decode_polyline(&leg.shape, 6)
                .map_err(|e| ProviderError::Malformed(format!("invalid shape: {e}")))?;
            for c in decoded.coords() {
                let point = Coordinate::new(c.x, c.y);
                // Consecutive legs share their joining point.
                if geometry.last() != Some(&point) {
                    geometry.push(point);
                }
            }
        }

        Ok(ProviderRoute {
            geometry,
            distance_meters: parsed.trip.summary.length * 1000.0,
            duration_seconds: parsed.trip.summary.time,
            elevation_gain_meters: 0.0,
            elevation_loss_meters: 0.0,
            reported_confidence: Some(1.0),
        })
    }
}

// ---------------------------------------------------------------------------
// BRouter: free provider with unpaved-surface profiles.
// ---------------------------------------------------------------------------

pub struct BRouterProvider {
    client: Client,
    base_url: String,
}

impl BRouterProvider {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BRouterResponse {
    features: Vec<BRouterFeature>,
}

#[derive(Debug, Deserialize)]
struct BRouterFeature {
    geometry: BRouterGeometry,
    #[serde(default)]
    properties: BRouterProperties,
}

#[derive(Debug, Deserialize)]
struct BRouterGeometry {
    coordinates: Vec<Vec<f64>>,
}

/// BRouter reports its summary numbers as strings.
#[derive(Debug, Default, Deserialize)]
struct BRouterProperties {
    #[serde(rename = "track-length")]
    track_length: Option<String>,
    #[serde(rename = "total-time")]
    total_time: Option<String>,
    #[serde(rename = "filtered ascend")]
    filtered_ascend: Option<String>,
}

fn brouter_profile(profile: Profile, preferences: &Preferences) -> &'static str {
    match (profile, preferences.traffic_tolerance) {
        (Profile::Gravel, _) => "gravel",
        (_, TrafficTolerance::Low) => "safety",
        (Profile::Road, _) => "fastbike",
        (Profile::Commute, _) => "trekking",
    }
}

fn parse_number(value: &Option<String>) -> Option<f64> {
    value.as_deref().and_then(|v| v.trim().parse::<f64>().ok())
}

#[async_trait]
impl RoutingProvider for BRouterProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Brouter
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            identity_bonus: 0.15,
            honors_low_traffic: true,
            honors_bike_infrastructure: false,
            gravel_specialized: true,
        }
    }

    async fn fetch_route(
        &self,
        request: &RouteRequest<'_>,
    ) -> Result<ProviderRoute, ProviderError> {
        let lonlats = request
            .waypoints
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lon, c.lat))
            .collect::<Vec<_>>()
            .join("|");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lonlats", lonlats.as_str()),
                ("profile", brouter_profile(request.profile, &request.preferences)),
                ("alternativeidx", "0"),
                ("format", "geojson"),
            ])
            .send()
            .await?;
        let text = check_status(response)?.text().await?;
        let parsed: BRouterResponse = serde_json::from_str(&text)?;

        let feature = parsed
            .features
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no features in response".to_string()))?;

        let geometry = feature
            .geometry
            .coordinates
            .iter()
            .map(|pos| match pos.as_slice() {
                [lon, lat] => Ok(Coordinate::new(*lon, *lat)),
                [lon, lat, ele, ..] => Ok(Coordinate::new(*lon, *lat).with_elevation(*ele)),
                _ => Err(ProviderError::Malformed("short position".to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let elevations: Vec<f64> = geometry.iter().filter_map(|c| c.elevation).collect();
        let climb = climb_summary(&elevations);
        let distance_meters = parse_number(&feature.properties.track_length)
            .unwrap_or_else(|| crate::geometry::total_distance(&geometry));

        Ok(ProviderRoute {
            distance_meters,
            duration_seconds: parse_number(&feature.properties.total_time).unwrap_or(0.0),
            elevation_gain_meters: parse_number(&feature.properties.filtered_ascend)
                .unwrap_or(climb.ascent_meters),
            elevation_loss_meters: climb.descent_meters,
            reported_confidence: None,
            geometry,
        })
    }
}

// ---------------------------------------------------------------------------
// OSRM: general-purpose router on the normal road network.
// ---------------------------------------------------------------------------

pub struct OsrmProvider {
    client: Client,
    base_url: String,
    profile: String,
}

impl OsrmProvider {
    /// Confidence OSRM is credited with for an `Ok` response; it reports none itself.
    pub const REPORTED_CONFIDENCE: f64 = 0.85;

    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            profile: "bike".to_string(),
        }
    }

    /// OSRM routing profile segment of the URL (e.g. "bike", "driving").
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[async_trait]
impl RoutingProvider for OsrmProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Osrm
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    async fn fetch_route(
        &self,
        request: &RouteRequest<'_>,
    ) -> Result<ProviderRoute, ProviderError> {
        let coords = request
            .waypoints
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lon, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        let url = format!(
            "{}/route/v1/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.profile,
            coords
        );

        let response = self
            .client
            .get(&url)
            .query(&[("overview", "full"), ("geometries", "geojson")])
            .send()
            .await?;
        let text = check_status(response)?.text().await?;
        let parsed: OsrmResponse = serde_json::from_str(&text)?;

        if parsed.code != "Ok" {
            return Err(ProviderError::Malformed(format!(
                "{}: {}",
                parsed.code,
                parsed.message.unwrap_or_default()
            )));
        }
        let route = parsed
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no routes in response".to_string()))?;

        Ok(ProviderRoute {
            geometry: route
                .geometry
                .coordinates
                .iter()
                .map(|[lon, lat]| Coordinate::new(*lon, *lat))
                .collect(),
            distance_meters: route.distance,
            duration_seconds: route.duration,
            elevation_gain_meters: 0.0,
            elevation_loss_meters: 0.0,
            reported_confidence: Some(Self::REPORTED_CONFIDENCE),
        })
    }
}
