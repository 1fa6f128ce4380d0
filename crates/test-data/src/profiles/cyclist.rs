//! Rider speed profiles.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use route_engine::intervals::{SpeedOverride, ZoneSpeedTable};
use route_engine::models::Zone;

const ZONES: [Zone; 6] = [
    Zone::Z1,
    Zone::Z2,
    Zone::Z3,
    Zone::SweetSpot,
    Zone::Z4,
    Zone::Z5,
];

/// A rider whose pace-by-zone differs from the engine's default table.
///
/// Speeds scale with threshold speed: the default table assumes 28 km/h in
/// zone 4, so a rider with a 21 km/h threshold rides every zone at 75%.
#[derive(Debug, Clone)]
pub struct CyclistProfile {
    threshold_kmh: f64,
    /// Day-to-day variation as a coefficient of variation.
    variance: f64,
}

impl Default for CyclistProfile {
    fn default() -> Self {
        Self {
            threshold_kmh: 28.0,
            variance: 0.10,
        }
    }
}

impl CyclistProfile {
    pub fn with_threshold(speed_kmh: f64) -> Self {
        Self {
            threshold_kmh: speed_kmh,
            ..Default::default()
        }
    }

    /// ~35 km/h at threshold.
    pub fn elite() -> Self {
        Self::with_threshold(35.0)
    }

    /// ~21 km/h at threshold.
    pub fn recreational() -> Self {
        Self::with_threshold(21.0)
    }

    /// Slow and inconsistent, as on rough gravel.
    pub fn gravel_tourer() -> Self {
        Self {
            threshold_kmh: 18.0,
            variance: 0.15,
        }
    }

    pub fn threshold_kmh(&self) -> f64 {
        self.threshold_kmh
    }

    fn scale(&self) -> f64 {
        self.threshold_kmh / ZoneSpeedTable::default().speed_kmh(Zone::Z4)
    }

    /// Per-zone speeds for a build request.
    pub fn speed_overrides(&self) -> Vec<SpeedOverride> {
        self.overrides_scaled(self.scale())
    }

    /// Same as [`Self::speed_overrides`] with this day's form applied.
    pub fn sample_day(&self, rng: &mut impl Rng) -> Vec<SpeedOverride> {
        let form = match Normal::new(1.0, self.variance) {
            Ok(normal) if self.variance > 0.0 => normal.sample(rng).clamp(0.7, 1.4),
            _ => 1.0,
        };
        self.overrides_scaled(self.scale() * form)
    }

    fn overrides_scaled(&self, scale: f64) -> Vec<SpeedOverride> {
        let defaults = ZoneSpeedTable::default();
        ZONES
            .iter()
            .map(|&zone| SpeedOverride {
                zone,
                speed_kmh: defaults.speed_kmh(zone) * scale,
            })
            .collect()
    }
}
