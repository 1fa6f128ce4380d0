//! Generators for engine inputs.
//!
//! - [`HistoryGenerator`]: rider route histories clustered around home/work
//! - [`InMemoryHistory`]: a [`route_engine::privacy::RouteHistory`] backed by a map
//! - [`workouts`]: canned and random workout structures

pub mod history;
pub mod workouts;

pub use history::{HistoryGenConfig, HistoryGenerator, InMemoryHistory, scatter};
