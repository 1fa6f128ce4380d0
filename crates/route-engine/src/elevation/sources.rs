//! Network elevation sources.
//!
//! Each adapter turns a batch of coordinates into one elevation per point or
//! fails the whole batch. Nothing provider-specific leaks past this module.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::http::check_status;
use crate::models::{Coordinate, ElevationSourceTag};

/// A service that returns one elevation per requested point.
#[async_trait]
pub trait ElevationSource: Send + Sync {
    fn tag(&self) -> ElevationSourceTag;

    /// Largest number of points sent in one request.
    fn batch_size(&self) -> usize;

    /// Delay between consecutive batches of the same request.
    fn pacing(&self) -> Duration {
        Duration::ZERO
    }

    /// Elevations for exactly `points.len()` points, in order.
    async fn fetch_batch(&self, points: &[Coordinate]) -> Result<Vec<f64>, ProviderError>;
}

/// Open-Elevation style `POST /lookup` API.
pub struct OpenElevationSource {
    client: Client,
    endpoint: String,
}

impl OpenElevationSource {
    pub const BATCH_SIZE: usize = 100;

    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LookupRequest {
    locations: Vec<LookupLocation>,
}

#[derive(Debug, Serialize)]
struct LookupLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    elevation: Option<f64>,
}

#[async_trait]
impl ElevationSource for OpenElevationSource {
    fn tag(&self) -> ElevationSourceTag {
        ElevationSourceTag::OpenElevation
    }

    fn batch_size(&self) -> usize {
        Self::BATCH_SIZE
    }

    async fn fetch_batch(&self, points: &[Coordinate]) -> Result<Vec<f64>, ProviderError> {
        let body = LookupRequest {
            locations: points
                .iter()
                .map(|c| LookupLocation {
                    latitude: c.lat,
                    longitude: c.lon,
                })
                .collect(),
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let text = check_status(response)?.text().await?;
        let parsed: LookupResponse = serde_json::from_str(&text)?;

        collect_elevations(parsed.results.into_iter().map(|r| r.elevation), points.len())
    }
}

/// OpenTopoData style `GET ?locations=lat,lon|lat,lon` API.
///
/// The public instance allows one request per second, so batches are kept
/// small and spaced by `pacing`.
pub struct OpenTopoDataSource {
    client: Client,
    endpoint: String,
    pacing: Duration,
}

impl OpenTopoDataSource {
    pub const BATCH_SIZE: usize = 50;

    pub fn new(client: Client, endpoint: impl Into<String>, pacing: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            pacing,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TopoResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Vec<TopoResult>,
}

#[derive(Debug, Deserialize)]
struct TopoResult {
    elevation: Option<f64>,
}

#[async_trait]
impl ElevationSource for OpenTopoDataSource {
    fn tag(&self) -> ElevationSourceTag {
        ElevationSourceTag::OpenTopoData
    }

    fn batch_size(&self) -> usize {
        Self::BATCH_SIZE
    }

    fn pacing(&self) -> Duration {
        self.pacing
    }

    async fn fetch_batch(&self, points: &[Coordinate]) -> Result<Vec<f64>, ProviderError> {
        let locations = points
            .iter()
            .map(|c| format!("{:.6},{:.6}", c.lat, c.lon))
            .collect::<Vec<_>>()
            .join("|");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("locations", locations)])
            .send()
            .await?;
        let text = check_status(response)?.text().await?;
        let parsed: TopoResponse = serde_json::from_str(&text)?;

        if parsed.status != "OK" {
            return Err(ProviderError::Malformed(
                parsed.error.unwrap_or(parsed.status),
            ));
        }

        collect_elevations(parsed.results.into_iter().map(|r| r.elevation), points.len())
    }
}

/// Accepts a batch only if every point has a finite elevation.
fn collect_elevations(
    values: impl Iterator<Item = Option<f64>>,
    expected: usize,
) -> Result<Vec<f64>, ProviderError> {
    let elevations: Vec<f64> = values
        .map(|v| v.filter(|e| e.is_finite()))
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| ProviderError::Malformed("missing elevation in batch".to_string()))?;

    if elevations.len() != expected {
        return Err(ProviderError::Malformed(format!(
            "expected {expected} elevations, got {}",
            elevations.len()
        )));
    }
    Ok(elevations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn points() -> Vec<Coordinate> {
        vec![
            Coordinate::new(-105.27, 40.01),
            Coordinate::new(-105.26, 40.02),
        ]
    }

    #[tokio::test]
    async fn test_open_elevation_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"latitude": 40.01, "longitude": -105.27, "elevation": 1655.0},
                    {"latitude": 40.02, "longitude": -105.26, "elevation": 1702.5}
                ]
            })))
            .mount(&server)
            .await;

        let source =
            OpenElevationSource::new(Client::new(), format!("{}/api/v1/lookup", server.uri()));
        let elevations = source.fetch_batch(&points()).await.unwrap();
        assert_eq!(elevations, vec![1655.0, 1702.5]);
    }

    #[tokio::test]
    async fn test_open_elevation_short_batch_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"latitude": 40.01, "longitude": -105.27, "elevation": 1655.0}]
            })))
            .mount(&server)
            .await;

        let source = OpenElevationSource::new(Client::new(), server.uri());
        let err = source.fetch_batch(&points()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_open_elevation_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = OpenElevationSource::new(Client::new(), server.uri());
        let err = source.fetch_batch(&points()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status(503)));
    }

    #[tokio::test]
    async fn test_opentopodata_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/srtm90m"))
            .and(query_param(
                "locations",
                "40.010000,-105.270000|40.020000,-105.260000",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [
                    {"elevation": 1650.0, "location": {"lat": 40.01, "lng": -105.27}},
                    {"elevation": 1690.0, "location": {"lat": 40.02, "lng": -105.26}}
                ]
            })))
            .mount(&server)
            .await;

        let source = OpenTopoDataSource::new(
            Client::new(),
            format!("{}/v1/srtm90m", server.uri()),
            Duration::ZERO,
        );
        let elevations = source.fetch_batch(&points()).await.unwrap();
        assert_eq!(elevations, vec![1650.0, 1690.0]);
    }

    #[tokio::test]
    async fn test_opentopodata_null_elevation_fails_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [{"elevation": 1650.0}, {"elevation": null}]
            })))
            .mount(&server)
            .await;

        let source = OpenTopoDataSource::new(Client::new(), server.uri(), Duration::ZERO);
        assert!(source.fetch_batch(&points()).await.is_err());
    }

    #[tokio::test]
    async fn test_opentopodata_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = OpenTopoDataSource::new(Client::new(), server.uri(), Duration::ZERO);
        let err = source.fetch_batch(&points()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }
}
