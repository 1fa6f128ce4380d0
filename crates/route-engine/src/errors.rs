use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::models::ProviderTag;

/// Failure of a single call to a third-party routing or elevation service.
///
/// These never reach callers directly: the router moves on to the next
/// provider and the elevation resolver to the next source, recording the
/// failure as a warning.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider returned status {0}")]
    Status(u16),

    #[error("Rate limited, try again later")]
    RateLimited,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Route too short: {points} points")]
    TooShort { points: usize },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Structural input errors, rejected at the function boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Geometry needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("Invalid coordinate at index {index}: ({lon}, {lat})")]
    InvalidCoordinate { index: usize, lon: f64, lat: f64 },

    #[error("Workout structure has no segments")]
    EmptyWorkout,

    #[error("Segment duration must be a positive number of minutes, got {0}")]
    InvalidDuration(f64),

    #[error("Invalid training zone {0}, expected 1-5 or 3.5")]
    InvalidZone(f64),

    #[error("Repeat block needs at least 1 set")]
    InvalidSets,

    #[error("Repeat block has no work segments")]
    EmptyRepeat,

    #[error("Repeat blocks nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("Invalid speed {0} km/h")]
    InvalidSpeed(f64),

    #[error("Privacy zone radius must be positive, got {0}")]
    InvalidRadius(f64),
}

/// One failed provider attempt, kept so a terminal failure can explain itself.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptFailure {
    pub provider: ProviderTag,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("No suitable route found, try a different area or relax preferences")]
    NoRoute { attempts: Vec<AttemptFailure> },

    #[error("Route history unavailable: {0}")]
    History(String),

    #[error("Pipeline exceeded its budget of {0:?}")]
    BudgetExceeded(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Terminal routing failure, as opposed to a degraded-but-usable route.
    pub fn is_no_route(&self) -> bool {
        matches!(self, EngineError::NoRoute { .. })
    }
}
