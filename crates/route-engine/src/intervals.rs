//! Placing a time-based workout onto a route.
//!
//! Workout segments are written in minutes and training zones, but cues have
//! to live at distances along the route. Each segment's duration is turned
//! into a length with a fixed zone → speed table, and a running cursor walks
//! the route as the structure is expanded:
//!
//! 1. warmup, if any
//! 2. the main list, where a repeat block expands `sets` times into its work
//!    steps followed by the rest segment on every set but the last (work
//!    steps may themselves be repeat blocks)
//! 3. cooldown, if any
//!
//! A segment that would run past the end of the route is not emitted, and
//! expansion stops there. If the whole structure fits, any leftover distance
//! gets a zone 2 "steady" filler cue.
//!
//! # Limitations
//!
//! Speeds are assumed per zone rather than measured, so cue positions drift
//! on hilly terrain or for riders much slower or faster than the table. The
//! mapping is approximate by contract. A per-rider table can be supplied via
//! [`ZoneSpeedTable::with_overrides`] to reduce the drift.

use enum_map::{EnumMap, enum_map};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::geometry::{coordinate_at_distance, total_distance};
use crate::models::{
    CueType, IntervalCue, RouteGeometry, Segment, WorkoutStep, WorkoutStructure, Zone,
};

/// Deepest allowed nesting of repeat blocks.
pub const MAX_NESTING: usize = 8;

/// Upper bound on emitted cues, whatever the structure says.
pub const MAX_CUES: usize = 2_000;

/// Leftover distance below this does not get a filler cue.
const MIN_FILLER_METERS: f64 = 1.0;

const DISTANCE_EPSILON: f64 = 1e-6;

/// A rider-specific speed for one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedOverride {
    pub zone: Zone,
    pub speed_kmh: f64,
}

/// Assumed riding speed per training zone, in km/h.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSpeedTable {
    speeds: EnumMap<Zone, f64>,
}

impl Default for ZoneSpeedTable {
    fn default() -> Self {
        Self {
            speeds: enum_map! {
                Zone::Z1 => 22.0,
                Zone::Z2 => 25.0,
                Zone::Z3 => 27.0,
                Zone::SweetSpot => 27.5,
                Zone::Z4 => 28.0,
                Zone::Z5 => 30.0,
            },
        }
    }
}

impl ZoneSpeedTable {
    pub fn speed_kmh(&self, zone: Zone) -> f64 {
        self.speeds[zone]
    }

    pub fn with_speed(mut self, zone: Zone, speed_kmh: f64) -> Result<Self, ValidationError> {
        if !speed_kmh.is_finite() || speed_kmh <= 0.0 {
            return Err(ValidationError::InvalidSpeed(speed_kmh));
        }
        self.speeds[zone] = speed_kmh;
        Ok(self)
    }

    pub fn with_overrides(self, overrides: &[SpeedOverride]) -> Result<Self, ValidationError> {
        overrides
            .iter()
            .try_fold(self, |table, o| table.with_speed(o.zone, o.speed_kmh))
    }

    /// Meters covered riding `segment` at its zone's speed.
    pub fn segment_distance_meters(&self, segment: &Segment) -> f64 {
        self.speed_kmh(segment.zone) * 1000.0 / 60.0 * segment.duration_minutes
    }
}

/// Rendering color for a zone.
pub fn zone_color(zone: Zone) -> &'static str {
    match zone {
        Zone::Z1 => "#9E9E9E",
        Zone::Z2 => "#2196F3",
        Zone::Z3 => "#4CAF50",
        Zone::SweetSpot => "#CDDC39",
        Zone::Z4 => "#FF9800",
        Zone::Z5 => "#F44336",
    }
}

/// Total distance the fully expanded workout would need.
pub fn estimate_distance_meters(workout: &WorkoutStructure, table: &ZoneSpeedTable) -> f64 {
    fn step_distance(step: &WorkoutStep, table: &ZoneSpeedTable, depth: usize) -> f64 {
        match step {
            WorkoutStep::Segment(segment) => table.segment_distance_meters(segment),
            WorkoutStep::Repeat(_) if depth >= MAX_NESTING => 0.0,
            WorkoutStep::Repeat(block) => {
                let work: f64 = block
                    .work
                    .iter()
                    .map(|s| step_distance(s, table, depth + 1))
                    .sum();
                let rest = block
                    .rest
                    .as_ref()
                    .map_or(0.0, |r| table.segment_distance_meters(r));
                let sets = f64::from(block.sets);
                work * sets + rest * (sets - 1.0).max(0.0)
            }
        }
    }

    let warmup = workout
        .warmup
        .as_ref()
        .map_or(0.0, |s| table.segment_distance_meters(s));
    let cooldown = workout
        .cooldown
        .as_ref()
        .map_or(0.0, |s| table.segment_distance_meters(s));
    let main: f64 = workout
        .main
        .iter()
        .map(|s| step_distance(s, table, 0))
        .sum();
    warmup + main + cooldown
}

/// Rejects structures the mapper cannot place.
pub fn validate_workout(workout: &WorkoutStructure) -> Result<(), ValidationError> {
    fn validate_segment(segment: &Segment) -> Result<(), ValidationError> {
        if !segment.duration_minutes.is_finite() || segment.duration_minutes <= 0.0 {
            return Err(ValidationError::InvalidDuration(segment.duration_minutes));
        }
        Ok(())
    }

    fn validate_step(step: &WorkoutStep, depth: usize) -> Result<(), ValidationError> {
        match step {
            WorkoutStep::Segment(segment) => validate_segment(segment),
            WorkoutStep::Repeat(_) if depth >= MAX_NESTING => {
                Err(ValidationError::NestingTooDeep(MAX_NESTING))
            }
            WorkoutStep::Repeat(block) => {
                if block.sets < 1 {
                    return Err(ValidationError::InvalidSets);
                }
                if block.work.is_empty() {
                    return Err(ValidationError::EmptyRepeat);
                }
                if let Some(rest) = &block.rest {
                    validate_segment(rest)?;
                }
                block
                    .work
                    .iter()
                    .try_for_each(|s| validate_step(s, depth + 1))
            }
        }
    }

    if workout.is_empty() {
        return Err(ValidationError::EmptyWorkout);
    }
    if let Some(warmup) = &workout.warmup {
        validate_segment(warmup)?;
    }
    workout.main.iter().try_for_each(|s| validate_step(s, 0))?;
    if let Some(cooldown) = &workout.cooldown {
        validate_segment(cooldown)?;
    }
    Ok(())
}

/// Maps a workout onto a route using the default speed table.
pub fn map_intervals(
    route: &RouteGeometry,
    workout: &WorkoutStructure,
) -> Result<Vec<IntervalCue>, ValidationError> {
    map_intervals_with(route, workout, &ZoneSpeedTable::default())
}

/// Maps a workout onto a route.
///
/// Cues come back with strictly increasing, non-overlapping distance ranges
/// and never end past the route. For a route with positive length the list
/// is never empty: if not even the first segment fits, that segment is
/// emitted clipped to the route and marked `truncated`.
pub fn map_intervals_with(
    route: &RouteGeometry,
    workout: &WorkoutStructure,
    table: &ZoneSpeedTable,
) -> Result<Vec<IntervalCue>, ValidationError> {
    validate_workout(workout)?;

    let mut placer = CuePlacer::new(route, table);

    if let Some(warmup) = &workout.warmup {
        placer.place(warmup, CueType::Warmup, None);
    }
    for step in &workout.main {
        if placer.exhausted {
            break;
        }
        placer.expand(step, None, 0);
    }
    if let Some(cooldown) = &workout.cooldown {
        placer.place(cooldown, CueType::Cooldown, None);
    }

    if !placer.exhausted {
        placer.fill_remainder();
    } else if placer.cues.is_empty() {
        if let Some((segment, cue_type)) = first_segment(workout) {
            placer.place_clipped(segment, cue_type);
        }
    }

    tracing::debug!(
        "Placed {} cues over {:.0} m (cursor at {:.0} m)",
        placer.cues.len(),
        placer.total,
        placer.cursor
    );
    Ok(placer.cues)
}

/// Position of a work step inside its innermost repeat block.
#[derive(Debug, Clone, Copy)]
struct SetPosition {
    set: u32,
    sets: u32,
}

struct CuePlacer<'a> {
    route: &'a RouteGeometry,
    table: &'a ZoneSpeedTable,
    total: f64,
    cursor: f64,
    cues: Vec<IntervalCue>,
    /// Set once a segment did not fit; nothing more is placed after that.
    exhausted: bool,
}

impl<'a> CuePlacer<'a> {
    fn new(route: &'a RouteGeometry, table: &'a ZoneSpeedTable) -> Self {
        Self {
            route,
            table,
            total: total_distance(route),
            cursor: 0.0,
            cues: Vec::new(),
            exhausted: false,
        }
    }

    fn expand(&mut self, step: &WorkoutStep, position: Option<SetPosition>, depth: usize) {
        if self.exhausted {
            return;
        }
        match step {
            WorkoutStep::Segment(segment) => {
                let cue_type = if position.is_some() {
                    CueType::IntervalHard
                } else {
                    CueType::Main
                };
                self.place(segment, cue_type, position);
            }
            WorkoutStep::Repeat(_) if depth >= MAX_NESTING => {
                self.exhausted = true;
            }
            WorkoutStep::Repeat(block) => {
                for set in 1..=block.sets {
                    let position = SetPosition {
                        set,
                        sets: block.sets,
                    };
                    for work in &block.work {
                        self.expand(work, Some(position), depth + 1);
                        if self.exhausted {
                            return;
                        }
                    }
                    if set < block.sets {
                        if let Some(rest) = &block.rest {
                            self.place(rest, CueType::IntervalRecovery, Some(position));
                        }
                    }
                    if self.exhausted {
                        return;
                    }
                }
            }
        }
    }

    /// Places one segment at the cursor, or marks the route exhausted.
    fn place(&mut self, segment: &Segment, cue_type: CueType, position: Option<SetPosition>) {
        if self.exhausted {
            return;
        }
        if self.cues.len() >= MAX_CUES {
            tracing::warn!("Workout expansion hit the {MAX_CUES} cue limit");
            self.exhausted = true;
            return;
        }

        let length = self.table.segment_distance_meters(segment);
        if self.cursor >= self.total - DISTANCE_EPSILON
            || self.cursor + length > self.total + DISTANCE_EPSILON
        {
            self.exhausted = true;
            return;
        }

        let start = self.cursor;
        let end = (start + length).min(self.total);
        if end - start <= DISTANCE_EPSILON {
            // Too short to cue without repeating a start distance.
            tracing::debug!("Skipping {length:.9} m segment at {start:.1} m");
            return;
        }
        let instruction = instruction(cue_type, segment, position);
        self.push(cue_type, segment.zone, start, end, instruction, false);
        self.cursor = end;
    }

    fn place_clipped(&mut self, segment: &Segment, cue_type: CueType) {
        if self.total <= DISTANCE_EPSILON {
            return;
        }
        let instruction = format!(
            "{} (shortened to fit the route)",
            instruction(cue_type, segment, None)
        );
        self.push(cue_type, segment.zone, 0.0, self.total, instruction, true);
        self.cursor = self.total;
    }

    fn fill_remainder(&mut self) {
        let remaining = self.total - self.cursor;
        if remaining < MIN_FILLER_METERS {
            return;
        }
        let zone = Zone::Z2;
        let instruction = format!("Ride steady in {} to the finish", describe_zone(zone));
        self.push(
            CueType::Steady,
            zone,
            self.cursor,
            self.total,
            instruction,
            false,
        );
        self.cursor = self.total;
    }

    fn push(
        &mut self,
        cue_type: CueType,
        zone: Zone,
        start: f64,
        end: f64,
        instruction: String,
        truncated: bool,
    ) {
        let at_end = coordinate_at_distance(self.route, end);
        self.cues.push(IntervalCue {
            cue_type,
            zone,
            color: zone_color(zone).to_string(),
            start_distance_meters: start,
            end_distance_meters: end,
            end_coordinate: at_end.coordinate,
            instruction,
            truncated,
        });
    }
}

/// First segment in traversal order, with the cue type it would get.
fn first_segment(workout: &WorkoutStructure) -> Option<(&Segment, CueType)> {
    fn first_in_step(step: &WorkoutStep, in_repeat: bool) -> Option<(&Segment, CueType)> {
        match step {
            WorkoutStep::Segment(segment) => Some((
                segment,
                if in_repeat {
                    CueType::IntervalHard
                } else {
                    CueType::Main
                },
            )),
            WorkoutStep::Repeat(block) => block.work.first().and_then(|s| first_in_step(s, true)),
        }
    }

    workout
        .warmup
        .as_ref()
        .map(|s| (s, CueType::Warmup))
        .or_else(|| workout.main.iter().find_map(|s| first_in_step(s, false)))
        .or_else(|| workout.cooldown.as_ref().map(|s| (s, CueType::Cooldown)))
}

fn describe_zone(zone: Zone) -> String {
    match zone {
        Zone::SweetSpot => "Sweet Spot".to_string(),
        zone => format!("{zone} ({})", zone.label()),
    }
}

fn format_minutes(minutes: f64) -> String {
    if (minutes - minutes.round()).abs() < 1e-9 {
        format!("{minutes:.0} min")
    } else if minutes < 1.0 {
        format!("{:.0} s", minutes * 60.0)
    } else {
        format!("{minutes:.1} min")
    }
}

fn instruction(cue_type: CueType, segment: &Segment, position: Option<SetPosition>) -> String {
    let effort = format!(
        "{} {}",
        format_minutes(segment.duration_minutes),
        describe_zone(segment.zone)
    );
    let mut text = match (cue_type, position) {
        (CueType::Warmup, _) => format!("Warm up: {effort}"),
        (CueType::Cooldown, _) => format!("Cool down: {effort}"),
        (CueType::IntervalHard, Some(p)) => format!("Interval {}/{}: {effort}", p.set, p.sets),
        (CueType::IntervalRecovery, _) => format!("Recover: {effort}"),
        _ => format!("Ride {effort}"),
    };
    if let Some(power) = segment.power_percent_ftp {
        text.push_str(&format!(" @ {power:.0}% FTP"));
    }
    if let Some(cadence) = segment.cadence_target {
        text.push_str(&format!(", {cadence} rpm"));
    }
    text
}
