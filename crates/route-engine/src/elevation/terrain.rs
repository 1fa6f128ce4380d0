//! Perlin noise terrain estimate, the last-resort elevation source.

use noise::{NoiseFn, Perlin};

use crate::models::Coordinate;

/// Deterministic elevation estimate from coordinates alone.
///
/// Multiple octaves of Perlin noise give smooth rolling terrain around a base
/// elevation. The output is clamped to `[min_elevation, max_elevation]` so it
/// stays plausible for the deployment region. Never fails.
#[derive(Debug, Clone)]
pub struct TerrainEstimator {
    perlin: Perlin,
    /// Base elevation in meters (e.g., valley floor).
    base_elevation: f64,
    /// Amplitude of the variation around the base.
    height_scale: f64,
    /// Noise cycles per degree.
    frequency: f64,
    octaves: u32,
    min_elevation: f64,
    max_elevation: f64,
}

impl TerrainEstimator {
    /// Front Range foothills, the default deployment region.
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_elevation: 1650.0,
            height_scale: 400.0,
            frequency: 20.0,
            octaves: 4,
            min_elevation: 1000.0,
            max_elevation: 3000.0,
        }
    }

    /// Rolling lowland terrain.
    pub fn flat(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_elevation: 300.0,
            height_scale: 50.0,
            frequency: 40.0,
            octaves: 2,
            min_elevation: 0.0,
            max_elevation: 600.0,
        }
    }

    pub fn with_base_elevation(mut self, elevation: f64) -> Self {
        self.base_elevation = elevation;
        self
    }

    pub fn with_height_scale(mut self, scale: f64) -> Self {
        self.height_scale = scale;
        self
    }

    pub fn with_bounds(mut self, min_elevation: f64, max_elevation: f64) -> Self {
        self.min_elevation = min_elevation.min(max_elevation);
        self.max_elevation = max_elevation.max(min_elevation);
        self
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min_elevation, self.max_elevation)
    }

    /// Fractal Brownian motion over (lat, lon), scaled and clamped.
    pub fn elevation_at(&self, coordinate: &Coordinate) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_amplitude = 0.0;

        for _ in 0..self.octaves {
            let noise_val = self
                .perlin
                .get([coordinate.lat * frequency, coordinate.lon * frequency]);
            total += noise_val * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        let normalized = if max_amplitude > 0.0 {
            total / max_amplitude
        } else {
            0.0
        };
        (self.base_elevation + normalized * self.height_scale)
            .clamp(self.min_elevation, self.max_elevation)
    }

    pub fn profile(&self, points: &[Coordinate]) -> Vec<f64> {
        points.iter().map(|c| self.elevation_at(c)).collect()
    }
}

impl Default for TerrainEstimator {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_consistency() {
        let estimator = TerrainEstimator::new(42);
        let c = Coordinate::new(-105.27, 40.01);
        assert!((estimator.elevation_at(&c) - estimator.elevation_at(&c)).abs() < 0.001);
    }

    #[test]
    fn test_estimate_range() {
        let estimator = TerrainEstimator::new(42);
        let (min, max) = estimator.bounds();
        for i in 0..100 {
            let c = Coordinate::new(-105.5 + 0.003 * f64::from(i), 39.9 + 0.002 * f64::from(i));
            let elev = estimator.elevation_at(&c);
            assert!(elev.is_finite());
            assert!(elev >= min && elev <= max);
        }
    }

    #[test]
    fn test_estimate_clamped_to_bounds() {
        let estimator = TerrainEstimator::new(7)
            .with_height_scale(5000.0)
            .with_bounds(100.0, 200.0);
        let elev = estimator.elevation_at(&Coordinate::new(-105.31, 40.07));
        assert!((100.0..=200.0).contains(&elev));
    }

    #[test]
    fn test_profile_length() {
        let estimator = TerrainEstimator::flat(1);
        let points = vec![
            Coordinate::new(-105.3, 40.0),
            Coordinate::new(-105.29, 40.01),
            Coordinate::new(-105.28, 40.02),
        ];
        assert_eq!(estimator.profile(&points).len(), 3);
    }
}
