//! Route geometry sources.
//!
//! - [`ProceduralGenerator`]: seeded random-walk routes inside a region
//! - [`straight_route`]: exact-length routes for distance-sensitive tests

mod procedural;

pub use procedural::{
    METERS_PER_DEGREE, ProceduralGenerator, RouteConfig, sample_waypoints, straight_route,
};
