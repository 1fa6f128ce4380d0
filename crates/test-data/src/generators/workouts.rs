//! Canned workout structures, as a workout library would supply them.

use rand::Rng;
use route_engine::models::{RepeatBlock, Segment, WorkoutStep, WorkoutStructure, Zone};

pub fn seg(minutes: f64, zone: Zone) -> Segment {
    Segment::new(minutes, zone)
}

pub fn steady(minutes: f64, zone: Zone) -> WorkoutStep {
    WorkoutStep::Segment(seg(minutes, zone))
}

pub fn repeat(sets: u32, work: Vec<WorkoutStep>, rest: Option<Segment>) -> WorkoutStep {
    WorkoutStep::Repeat(RepeatBlock { sets, work, rest })
}

/// 10 min warmup, 60 min zone 2, 5 min cooldown.
pub fn endurance() -> WorkoutStructure {
    WorkoutStructure {
        warmup: Some(seg(10.0, Zone::Z1)),
        main: vec![steady(60.0, Zone::Z2)],
        cooldown: Some(seg(5.0, Zone::Z1)),
    }
}

/// 5 x 4 min VO2 with 3 min recoveries.
pub fn vo2_intervals() -> WorkoutStructure {
    WorkoutStructure {
        warmup: Some(seg(15.0, Zone::Z2)),
        main: vec![repeat(
            5,
            vec![WorkoutStep::Segment(
                seg(4.0, Zone::Z5).with_power(118.0).with_cadence(100),
            )],
            Some(seg(3.0, Zone::Z1)),
        )],
        cooldown: Some(seg(10.0, Zone::Z1)),
    }
}

/// 2 x 20 min sweet spot.
pub fn sweet_spot() -> WorkoutStructure {
    WorkoutStructure {
        warmup: Some(seg(10.0, Zone::Z2)),
        main: vec![repeat(
            2,
            vec![WorkoutStep::Segment(seg(20.0, Zone::SweetSpot).with_power(90.0))],
            Some(seg(5.0, Zone::Z1)),
        )],
        cooldown: Some(seg(10.0, Zone::Z1)),
    }
}

/// 3 sets of (3 x (2 min over / 1 min under)), nested repeat blocks.
pub fn over_unders() -> WorkoutStructure {
    let block = repeat(
        3,
        vec![steady(2.0, Zone::Z5), steady(1.0, Zone::Z4)],
        None,
    );
    WorkoutStructure {
        warmup: Some(seg(10.0, Zone::Z2)),
        main: vec![repeat(3, vec![block], Some(seg(5.0, Zone::Z1)))],
        cooldown: Some(seg(5.0, Zone::Z1)),
    }
}

/// warmup 5 min Z2, main 10 min Z4, cooldown 5 min Z1.
pub fn short_tempo() -> WorkoutStructure {
    WorkoutStructure {
        warmup: Some(seg(5.0, Zone::Z2)),
        main: vec![steady(10.0, Zone::Z4)],
        cooldown: Some(seg(5.0, Zone::Z1)),
    }
}

/// Random structure up to `max_depth` levels of repeats.
pub fn random_workout(rng: &mut impl Rng, max_depth: usize) -> WorkoutStructure {
    fn random_zone(rng: &mut impl Rng) -> Zone {
        [
            Zone::Z1,
            Zone::Z2,
            Zone::Z3,
            Zone::SweetSpot,
            Zone::Z4,
            Zone::Z5,
        ][rng.gen_range(0..6)]
    }

    fn random_step(rng: &mut impl Rng, depth: usize) -> WorkoutStep {
        if depth > 0 && rng.gen_bool(0.3) {
            let work = (0..rng.gen_range(1..=3))
                .map(|_| random_step(rng, depth - 1))
                .collect();
            let rest = rng
                .gen_bool(0.5)
                .then(|| seg(rng.gen_range(0.5..5.0), Zone::Z1));
            repeat(rng.gen_range(1..=6), work, rest)
        } else {
            steady(rng.gen_range(0.5..20.0), random_zone(rng))
        }
    }

    WorkoutStructure {
        warmup: rng
            .gen_bool(0.8)
            .then(|| seg(rng.gen_range(5.0..15.0), Zone::Z2)),
        main: (0..rng.gen_range(1..=4))
            .map(|_| random_step(rng, max_depth))
            .collect(),
        cooldown: rng
            .gen_bool(0.8)
            .then(|| seg(rng.gen_range(5.0..10.0), Zone::Z1)),
    }
}
