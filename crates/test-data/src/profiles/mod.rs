//! Rider profiles.
//!
//! The engine places workout cues with a fixed zone speed table. These profiles
//! produce per-rider overrides for that table so tests can check how cue
//! positions move for faster and slower riders.

mod cyclist;

pub use cyclist::CyclistProfile;
