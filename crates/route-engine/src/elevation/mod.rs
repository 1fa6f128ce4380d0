//! Per-point elevation for a route.
//!
//! Long routes are downsampled before querying so provider load stays
//! bounded, then linearly interpolated back to full resolution. Sources are
//! consulted in priority order; a source either covers the whole sampled set
//! or counts as failed. The terrain estimator closes the chain, so
//! [`ElevationResolver::resolve`] always returns a complete profile.

mod sources;
mod terrain;

pub use sources::{ElevationSource, OpenElevationSource, OpenTopoDataSource};
pub use terrain::TerrainEstimator;

use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::http::with_timeout;
use crate::models::{
    ClimbSummary, Coordinate, ElevationPoint, ElevationProfile, ElevationSourceTag, RouteGeometry,
};

pub const DEFAULT_MAX_SAMPLES: usize = 200;

pub struct ElevationResolver {
    sources: Vec<Arc<dyn ElevationSource>>,
    estimator: TerrainEstimator,
    max_samples: usize,
    call_timeout: Duration,
}

impl ElevationResolver {
    /// Sources are tried in the order given.
    pub fn new(sources: Vec<Arc<dyn ElevationSource>>, estimator: TerrainEstimator) -> Self {
        Self {
            sources,
            estimator,
            max_samples: DEFAULT_MAX_SAMPLES,
            call_timeout: Duration::from_secs(10),
        }
    }

    /// At least 2, so first and last can both be kept.
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples.max(2);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub async fn resolve(&self, geometry: &RouteGeometry) -> ElevationProfile {
        let indices = downsample_indices(geometry.len(), self.max_samples);
        let sampled: Vec<Coordinate> = indices.iter().map(|&i| geometry[i]).collect();
        let mut warnings = Vec::new();

        let mut resolved: Option<(Vec<f64>, ElevationSourceTag)> = None;
        for source in &self.sources {
            match self.fetch_all(source.as_ref(), &sampled).await {
                Ok(values) => {
                    tracing::debug!(
                        "Resolved {} elevations from {}",
                        values.len(),
                        source.tag()
                    );
                    resolved = Some((values, source.tag()));
                    break;
                }
                Err(e) => {
                    tracing::warn!("Elevation source {} failed: {e}", source.tag());
                    warnings.push(format!("elevation source {} failed: {e}", source.tag()));
                }
            }
        }

        let (values, source) = resolved.unwrap_or_else(|| {
            tracing::info!("All elevation sources failed, using terrain estimate");
            (
                self.estimator.profile(&sampled),
                ElevationSourceTag::TerrainEstimate,
            )
        });

        let elevations = if indices.len() == geometry.len() {
            values
        } else {
            interpolate(geometry.len(), &indices, &values)
        };

        ElevationProfile {
            points: geometry
                .iter()
                .zip(elevations)
                .map(|(c, e)| ElevationPoint {
                    coordinate: *c,
                    elevation_meters: e,
                })
                .collect(),
            source,
            sampled_points: sampled.len(),
            warnings,
        }
    }

    /// Fetches every batch from one source; any failed batch fails the source.
    async fn fetch_all(
        &self,
        source: &dyn ElevationSource,
        points: &[Coordinate],
    ) -> Result<Vec<f64>, ProviderError> {
        let batch_size = source.batch_size().max(1);
        let mut out = Vec::with_capacity(points.len());

        for (i, batch) in points.chunks(batch_size).enumerate() {
            if i > 0 && !source.pacing().is_zero() {
                tokio::time::sleep(source.pacing()).await;
            }
            let values = with_timeout(self.call_timeout, source.fetch_batch(batch)).await?;
            if values.len() != batch.len() || values.iter().any(|v| !v.is_finite()) {
                return Err(ProviderError::Malformed(format!(
                    "batch {i} returned {} usable values for {} points",
                    values.iter().filter(|v| v.is_finite()).count(),
                    batch.len()
                )));
            }
            out.extend(values);
        }
        Ok(out)
    }
}

/// Uniform stride over indices, keeping the first and last exactly.
pub fn downsample_indices(len: usize, max_samples: usize) -> Vec<usize> {
    if len <= max_samples || max_samples < 2 {
        return (0..len).collect();
    }
    let last = len - 1;
    let steps = max_samples - 1;
    let mut indices: Vec<usize> = (0..max_samples)
        .map(|k| ((k * last) as f64 / steps as f64).round() as usize)
        .collect();
    indices.dedup();
    indices
}

/// Fills a full-length sequence from values known at sorted `known_indices`.
///
/// Interior gaps are linear in index between the two resolved neighbors;
/// positions before the first or after the last known index repeat the
/// nearest known value.
pub fn interpolate(len: usize, known_indices: &[usize], known_values: &[f64]) -> Vec<f64> {
    let pairs: Vec<(usize, f64)> = known_indices
        .iter()
        .copied()
        .zip(known_values.iter().copied())
        .filter(|(i, _)| *i < len)
        .collect();

    let Some(&(first_idx, first_val)) = pairs.first() else {
        return vec![0.0; len];
    };

    let mut out = vec![first_val; len];
    for window in pairs.windows(2) {
        let (i0, v0) = window[0];
        let (i1, v1) = window[1];
        let span = (i1 - i0) as f64;
        for (j, slot) in out.iter_mut().enumerate().take(i1 + 1).skip(i0) {
            let t = (j - i0) as f64 / span;
            *slot = v0 + (v1 - v0) * t;
        }
    }

    if let Some(&(last_idx, last_val)) = pairs.last() {
        for slot in out.iter_mut().skip(last_idx + 1) {
            *slot = last_val;
        }
    }
    for slot in out.iter_mut().take(first_idx) {
        *slot = first_val;
    }
    out
}

/// Total ascent and descent over a resolved profile.
pub fn climb_summary(elevations: &[f64]) -> ClimbSummary {
    let mut summary = ClimbSummary::default();
    for window in elevations.windows(2) {
        let diff = window[1] - window[0];
        if diff > 0.0 {
            summary.ascent_meters += diff;
        } else {
            summary.descent_meters += diff.abs();
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        value: f64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ElevationSource for FixedSource {
        fn tag(&self) -> ElevationSourceTag {
            ElevationSourceTag::Custom("fixed".to_string())
        }
        fn batch_size(&self) -> usize {
            100
        }
        async fn fetch_batch(&self, points: &[Coordinate]) -> Result<Vec<f64>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(points.iter().map(|_| self.value).collect())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ElevationSource for BrokenSource {
        fn tag(&self) -> ElevationSourceTag {
            ElevationSourceTag::Custom("broken".to_string())
        }
        fn batch_size(&self) -> usize {
            100
        }
        async fn fetch_batch(&self, _points: &[Coordinate]) -> Result<Vec<f64>, ProviderError> {
            Err(ProviderError::Status(500))
        }
    }

    /// Succeeds on the first batch only.
    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ElevationSource for FlakySource {
        fn tag(&self) -> ElevationSourceTag {
            ElevationSourceTag::Custom("flaky".to_string())
        }
        fn batch_size(&self) -> usize {
            100
        }
        async fn fetch_batch(&self, points: &[Coordinate]) -> Result<Vec<f64>, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![10.0; points.len()])
            } else {
                Err(ProviderError::RateLimited)
            }
        }
    }

    fn route(n: usize) -> RouteGeometry {
        RouteGeometry::new(
            (0..n)
                .map(|i| Coordinate::new(-105.27 + 0.0001 * i as f64, 40.01))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_downsample_short_is_identity() {
        assert_eq!(downsample_indices(5, 200), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_downsample_keeps_endpoints() {
        let indices = downsample_indices(1234, 200);
        assert!(indices.len() <= 200);
        assert_eq!(indices[0], 0);
        assert_eq!(*indices.last().unwrap(), 1233);
        assert!(indices.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_downsample_just_over_limit() {
        let indices = downsample_indices(201, 200);
        assert_eq!(indices.len(), 200);
        assert_eq!(*indices.last().unwrap(), 200);
    }

    #[test]
    fn test_interpolate_linear() {
        let out = interpolate(5, &[0, 4], &[100.0, 200.0]);
        assert_eq!(out, vec![100.0, 125.0, 150.0, 175.0, 200.0]);
    }

    #[test]
    fn test_interpolate_extrapolates_flat() {
        let out = interpolate(6, &[1, 3], &[10.0, 30.0]);
        assert_eq!(out, vec![10.0, 10.0, 20.0, 30.0, 30.0, 30.0]);
    }

    #[test]
    fn test_climb_summary() {
        let summary = climb_summary(&[100.0, 120.0, 110.0, 150.0]);
        assert!((summary.ascent_meters - 60.0).abs() < 1e-9);
        assert!((summary.descent_meters - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_resolve_uses_first_working_source() {
        let fixed = Arc::new(FixedSource {
            value: 42.0,
            calls: AtomicUsize::new(0),
        });
        let sources: Vec<Arc<dyn ElevationSource>> = vec![Arc::new(BrokenSource), fixed.clone()];
        let resolver = ElevationResolver::new(sources, TerrainEstimator::default());

        let profile = resolver.resolve(&route(10)).await;
        assert_eq!(profile.points.len(), 10);
        assert!(profile.points.iter().all(|p| p.elevation_meters == 42.0));
        assert_eq!(profile.source, ElevationSourceTag::Custom("fixed".to_string()));
        assert_eq!(profile.warnings.len(), 1);
        assert_eq!(fixed.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_downsamples_long_routes() {
        let fixed = Arc::new(FixedSource {
            value: 5.0,
            calls: AtomicUsize::new(0),
        });
        let sources: Vec<Arc<dyn ElevationSource>> = vec![fixed.clone()];
        let resolver = ElevationResolver::new(sources, TerrainEstimator::default());

        let profile = resolver.resolve(&route(1000)).await;
        assert_eq!(profile.points.len(), 1000);
        assert_eq!(profile.sampled_points, 200);
        // 200 samples at 100 per batch.
        assert_eq!(fixed.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_partial_batch_failure_fails_source() {
        let sources: Vec<Arc<dyn ElevationSource>> = vec![Arc::new(FlakySource {
            calls: AtomicUsize::new(0),
        })];
        let resolver = ElevationResolver::new(sources, TerrainEstimator::default());

        let profile = resolver.resolve(&route(150)).await;
        assert_eq!(profile.source, ElevationSourceTag::TerrainEstimate);
        assert_eq!(profile.points.len(), 150);
    }

    #[tokio::test]
    async fn test_resolve_with_no_sources_estimates() {
        let resolver = ElevationResolver::new(Vec::new(), TerrainEstimator::default());
        let profile = resolver.resolve(&route(2)).await;
        assert_eq!(profile.points.len(), 2);
        assert_eq!(profile.source, ElevationSourceTag::TerrainEstimate);
        assert!(profile.points.iter().all(|p| p.elevation_meters.is_finite()));
    }
}
