//! Engine configuration, read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Valhalla-compatible endpoint used for purpose-built cycling routes.
    pub valhalla_url: String,
    pub valhalla_api_key: Option<String>,
    /// BRouter endpoint used for unpaved/gravel routes.
    pub brouter_url: String,
    /// OSRM endpoint used as the general-purpose fallback.
    pub osrm_url: String,
    pub open_elevation_url: String,
    pub opentopodata_url: String,
    pub provider_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Wall-clock budget for one whole pipeline run.
    pub pipeline_budget_secs: u64,
    pub elevation_max_samples: usize,
    pub opentopodata_pacing_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            valhalla_url: "https://valhalla1.openstreetmap.de".to_string(),
            valhalla_api_key: None,
            brouter_url: "https://brouter.de/brouter".to_string(),
            osrm_url: "https://router.project-osrm.org".to_string(),
            open_elevation_url: "https://api.open-elevation.com/api/v1/lookup".to_string(),
            opentopodata_url: "https://api.opentopodata.org/v1/srtm90m".to_string(),
            provider_timeout_secs: 10,
            connect_timeout_secs: 5,
            pipeline_budget_secs: 30,
            elevation_max_samples: 200,
            opentopodata_pacing_ms: 1000,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from environment variables; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        let defaults = Self::default();
        Ok(Self {
            valhalla_url: env::var("VALHALLA_URL").unwrap_or(defaults.valhalla_url),
            valhalla_api_key: env::var("VALHALLA_API_KEY").ok().filter(|k| !k.is_empty()),
            brouter_url: env::var("BROUTER_URL").unwrap_or(defaults.brouter_url),
            osrm_url: env::var("OSRM_URL").unwrap_or(defaults.osrm_url),
            open_elevation_url: env::var("OPEN_ELEVATION_URL")
                .unwrap_or(defaults.open_elevation_url),
            opentopodata_url: env::var("OPENTOPODATA_URL").unwrap_or(defaults.opentopodata_url),
            provider_timeout_secs: parse_var(
                "PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            )?,
            connect_timeout_secs: parse_var("CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs)?,
            pipeline_budget_secs: parse_var("PIPELINE_BUDGET_SECS", defaults.pipeline_budget_secs)?,
            elevation_max_samples: parse_var(
                "ELEVATION_MAX_SAMPLES",
                defaults.elevation_max_samples,
            )?,
            opentopodata_pacing_ms: parse_var(
                "OPENTOPODATA_PACING_MS",
                defaults.opentopodata_pacing_ms,
            )?,
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn pipeline_budget(&self) -> Duration {
        Duration::from_secs(self.pipeline_budget_secs)
    }

    pub fn opentopodata_pacing(&self) -> Duration {
        Duration::from_millis(self.opentopodata_pacing_ms)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, EngineError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::Config(format!("{name} has invalid value {raw:?}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.provider_timeout(), Duration::from_secs(10));
        assert_eq!(config.elevation_max_samples, 200);
        assert!(config.valhalla_api_key.is_none());
    }

    #[test]
    fn test_parse_var_missing_uses_default() {
        let value: u64 = parse_var("ROUTE_ENGINE_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
