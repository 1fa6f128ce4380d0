pub mod config;
pub mod elevation;
pub mod errors;
pub mod geometry;
pub mod http;
pub mod intervals;
pub mod models;
pub mod pipeline;
pub mod privacy;
pub mod routing;

pub use config::EngineConfig;
pub use elevation::ElevationResolver;
pub use errors::{EngineError, ProviderError, ValidationError};
pub use intervals::{ZoneSpeedTable, map_intervals, map_intervals_with};
pub use pipeline::{BuildRequest, RouteEngine};
pub use privacy::{PrivacySanitizer, RouteHistory, SanitizeOptions, sanitize};
pub use routing::WaypointRouter;
