use std::fmt;
use std::ops::Deref;

use enum_map::Enum;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// A (longitude, latitude) pair in degrees, optionally with elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
}

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            elevation: None,
        }
    }

    pub const fn with_elevation(mut self, meters: f64) -> Self {
        self.elevation = Some(meters);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Ordered coordinates in travel order. Always holds at least 2 valid points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct RouteGeometry(Vec<Coordinate>);

impl RouteGeometry {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, ValidationError> {
        if points.len() < 2 {
            return Err(ValidationError::TooFewPoints(points.len()));
        }
        if let Some((index, bad)) = points.iter().enumerate().find(|(_, c)| !c.is_valid()) {
            return Err(ValidationError::InvalidCoordinate {
                index,
                lon: bad.lon,
                lat: bad.lat,
            });
        }
        Ok(Self(points))
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn start(&self) -> Coordinate {
        self.0[0]
    }

    pub fn end(&self) -> Coordinate {
        self.0[self.0.len() - 1]
    }

    pub fn into_inner(self) -> Vec<Coordinate> {
        self.0
    }
}

impl Deref for RouteGeometry {
    type Target = [Coordinate];

    fn deref(&self) -> &[Coordinate] {
        &self.0
    }
}

impl TryFrom<Vec<Coordinate>> for RouteGeometry {
    type Error = ValidationError;

    fn try_from(points: Vec<Coordinate>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<RouteGeometry> for Vec<Coordinate> {
    fn from(geometry: RouteGeometry) -> Self {
        geometry.0
    }
}

/// Which adapter produced a routed result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    Valhalla,
    Brouter,
    Osrm,
    Custom(String),
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderTag::Valhalla => write!(f, "valhalla"),
            ProviderTag::Brouter => write!(f, "brouter"),
            ProviderTag::Osrm => write!(f, "osrm"),
            ProviderTag::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Whether a result came from the first provider in the chain or a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Primary,
    Fallback,
}

/// Riding profile requested by the rider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    #[serde(alias = "paved")]
    Road,
    Gravel,
    Commute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficTolerance {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub traffic_tolerance: TrafficTolerance,
    #[serde(default)]
    pub require_bike_infrastructure: bool,
}

/// One accepted routing attempt. Built once, never modified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedResult {
    pub geometry: RouteGeometry,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub elevation_gain_meters: f64,
    pub elevation_loss_meters: f64,
    /// Heuristic in [0, 1], not a probability.
    pub confidence: f64,
    pub provider: ProviderTag,
    pub provenance: Provenance,
    pub warnings: Vec<String>,
}

impl RoutedResult {
    /// A fallback provider produced this route; callers should flag reduced certainty.
    pub fn is_degraded(&self) -> bool {
        self.provenance == Provenance::Fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationPoint {
    pub coordinate: Coordinate,
    pub elevation_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationSourceTag {
    OpenElevation,
    OpenTopoData,
    TerrainEstimate,
    Custom(String),
}

impl fmt::Display for ElevationSourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationSourceTag::OpenElevation => write!(f, "open-elevation"),
            ElevationSourceTag::OpenTopoData => write!(f, "opentopodata"),
            ElevationSourceTag::TerrainEstimate => write!(f, "terrain-estimate"),
            ElevationSourceTag::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Fully populated elevation profile, one point per route coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationProfile {
    pub points: Vec<ElevationPoint>,
    pub source: ElevationSourceTag,
    /// Number of points actually sent to the source.
    pub sampled_points: usize,
    pub warnings: Vec<String>,
}

impl ElevationProfile {
    pub fn elevations(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.elevation_meters).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimbSummary {
    pub ascent_meters: f64,
    pub descent_meters: f64,
}

/// Training zone. Serialized as its number (3.5 for sweet spot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum Zone {
    Z1,
    Z2,
    Z3,
    SweetSpot,
    Z4,
    Z5,
}

impl Zone {
    pub fn value(self) -> f64 {
        match self {
            Zone::Z1 => 1.0,
            Zone::Z2 => 2.0,
            Zone::Z3 => 3.0,
            Zone::SweetSpot => 3.5,
            Zone::Z4 => 4.0,
            Zone::Z5 => 5.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Zone::Z1 => "Recovery",
            Zone::Z2 => "Endurance",
            Zone::Z3 => "Tempo",
            Zone::SweetSpot => "Sweet Spot",
            Zone::Z4 => "Threshold",
            Zone::Z5 => "VO2 Max",
        }
    }
}

impl TryFrom<f64> for Zone {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        const TOLERANCE: f64 = 1e-9;
        [
            Zone::Z1,
            Zone::Z2,
            Zone::Z3,
            Zone::SweetSpot,
            Zone::Z4,
            Zone::Z5,
        ]
        .into_iter()
        .find(|z| (z.value() - value).abs() < TOLERANCE)
        .ok_or(ValidationError::InvalidZone(value))
    }
}

impl From<Zone> for f64 {
    fn from(zone: Zone) -> Self {
        zone.value()
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::SweetSpot => write!(f, "Sweet Spot"),
            zone => write!(f, "Zone {}", zone.value()),
        }
    }
}

/// A steady piece of work at one intensity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub duration_minutes: f64,
    pub zone: Zone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_percent_ftp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence_target: Option<u32>,
}

impl Segment {
    pub fn new(duration_minutes: f64, zone: Zone) -> Self {
        Self {
            duration_minutes,
            zone,
            power_percent_ftp: None,
            cadence_target: None,
        }
    }

    pub fn with_power(mut self, percent_ftp: f64) -> Self {
        self.power_percent_ftp = Some(percent_ftp);
        self
    }

    pub fn with_cadence(mut self, rpm: u32) -> Self {
        self.cadence_target = Some(rpm);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatBlock {
    pub sets: u32,
    pub work: Vec<WorkoutStep>,
    #[serde(default)]
    pub rest: Option<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkoutStep {
    Segment(Segment),
    Repeat(RepeatBlock),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkoutStructure {
    #[serde(default)]
    pub warmup: Option<Segment>,
    #[serde(default)]
    pub main: Vec<WorkoutStep>,
    #[serde(default)]
    pub cooldown: Option<Segment>,
}

impl WorkoutStructure {
    pub fn is_empty(&self) -> bool {
        self.warmup.is_none() && self.main.is_empty() && self.cooldown.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CueType {
    Warmup,
    Main,
    IntervalHard,
    IntervalRecovery,
    Cooldown,
    Steady,
}

/// A distance-indexed instruction binding a training zone to a stretch of route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalCue {
    pub cue_type: CueType,
    pub zone: Zone,
    pub color: String,
    pub start_distance_meters: f64,
    pub end_distance_meters: f64,
    pub end_coordinate: Coordinate,
    pub instruction: String,
    /// Clipped to the end of the route instead of its estimated length.
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyReason {
    FrequentStart,
    FrequentEnd,
    Supplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrivacyZone {
    pub center: Coordinate,
    pub radius_meters: f64,
    pub reason: PrivacyReason,
}

/// Start and end of one historical route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteEndpoints {
    pub start: Coordinate,
    pub end: Coordinate,
}

/// Route points left after clipping and zone filtering.
///
/// May hold fewer than 2 points, or be fragmented where a zone overlapped
/// the middle of the route; callers decide whether it is still worth sharing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedGeometry {
    pub points: Vec<Coordinate>,
    pub zones_applied: Vec<PrivacyZone>,
    pub clipped: bool,
    pub removed_points: usize,
    /// Points were removed from somewhere other than the two ends.
    pub fragmented: bool,
}

impl SanitizedGeometry {
    pub fn is_usable(&self) -> bool {
        self.points.len() >= 2
    }
}

/// Everything the persistence and export layers need for one planned route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteArtifact {
    pub route: RoutedResult,
    pub elevation: ElevationProfile,
    pub climb: ClimbSummary,
    pub cues: Vec<IntervalCue>,
    pub warnings: Vec<String>,
}
