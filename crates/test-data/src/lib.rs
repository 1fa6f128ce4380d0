//! Test data for route-engine.
//!
//! Generates route geometry, rider histories and workout structures, and
//! provides scripted stand-ins for the third-party routing and elevation
//! services so the whole pipeline can run without a network.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let route = ProceduralGenerator::for_region(Region::BOULDER)
//!     .with_distance(25_000.0)
//!     .generate(&mut rng)?;
//!
//! let router = WaypointRouter::new(
//!     ScriptedProvider::cycling(RouteScript::Route(route.clone())),
//!     ScriptedProvider::gravel(RouteScript::Status(503)),
//!     ScriptedProvider::general(RouteScript::Route(route)),
//! );
//! ```

pub mod config;
pub mod generators;
pub mod profiles;
pub mod scripted;
pub mod sources;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{BoundingBox, Region};
    pub use crate::generators::workouts;
    pub use crate::generators::{HistoryGenConfig, HistoryGenerator, InMemoryHistory, scatter};
    pub use crate::profiles::CyclistProfile;
    pub use crate::scripted::{ElevationScript, RouteScript, ScriptedElevation, ScriptedProvider};
    pub use crate::sources::{ProceduralGenerator, sample_waypoints, straight_route};
    pub use rand::SeedableRng;
    pub use rand::rngs::StdRng;
}
