//! Remote composite score from the data service
//!
//! `GET {base}/api/v1/health/{region_id}?name=&lat=&lon=` returns a
//! precomputed score built from environmental and species observations.
//! [`CachedRemoteProvider`] puts a TTL cache and single-flight in front of any
//! remote provider, and keeps serving the last good envelope when a refresh
//! fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::providers::{ProviderError, RemoteCompositeScoreProvider};
use super::types::{EnvironmentalDetail, EnvironmentalReading};
use crate::cache::{Clock, FlightAborted, SingleFlight, SystemClock, TtlCache};
use crate::gateway::{encode_query, ClientError};

// ============================================================================
// Envelope
// ============================================================================

/// Component scores as computed by the data service
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteBreakdown {
    pub biodiversity: f64,
    pub water_quality: f64,
    /// Already inverted: higher means less stress
    pub thermal_stress: f64,
    pub productivity: f64,
}

impl RemoteBreakdown {
    pub const BIODIVERSITY_WEIGHT: f64 = 0.30;
    pub const WATER_QUALITY_WEIGHT: f64 = 0.25;
    pub const THERMAL_STRESS_WEIGHT: f64 = 0.25;
    pub const PRODUCTIVITY_WEIGHT: f64 = 0.20;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteEnvironmental {
    pub sst: Option<f64>,
    pub sst_anomaly: Option<f64>,
    pub chlorophyll: Option<f64>,
    pub oxygen: Option<f64>,
    pub ph: Option<f64>,
    pub salinity: Option<f64>,
    pub measured_at: Option<String>,
}

impl RemoteEnvironmental {
    /// Readings present in this envelope
    pub fn readings(&self) -> Vec<EnvironmentalReading> {
        [
            (self.sst.is_some(), EnvironmentalReading::Temperature),
            (self.chlorophyll.is_some(), EnvironmentalReading::Chlorophyll),
            (self.oxygen.is_some(), EnvironmentalReading::DissolvedOxygen),
            (self.ph.is_some(), EnvironmentalReading::Ph),
            (self.salinity.is_some(), EnvironmentalReading::Salinity),
        ]
        .into_iter()
        .filter_map(|(present, reading)| present.then_some(reading))
        .collect()
    }

    pub fn has_water_quality(&self) -> bool {
        self.oxygen.is_some() || self.ph.is_some() || self.salinity.is_some()
    }

    pub fn detail(&self) -> EnvironmentalDetail {
        EnvironmentalDetail {
            temperature: self.sst,
            temperature_anomaly: self.sst_anomaly,
            chlorophyll: self.chlorophyll,
            dissolved_oxygen: self.oxygen,
            ph: self.ph,
            salinity: self.salinity,
            measured_at: self.measured_at.clone(),
            readings_used: self.readings(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSpecies {
    pub total_species: u32,
    pub total_observations: u32,
    pub endemic_species: u32,
    pub threatened_species: u32,
    pub recent_observations: u32,
    pub biodiversity_index: Option<f64>,
}

/// Score envelope returned by the data service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteHealthScore {
    pub mpa_id: String,
    #[serde(default)]
    pub mpa_name: String,
    pub score: f64,
    #[serde(default)]
    pub confidence: Option<String>,
    pub breakdown: RemoteBreakdown,
    #[serde(default)]
    pub environmental: RemoteEnvironmental,
    #[serde(default)]
    pub species: RemoteSpecies,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub calculated_at: Option<String>,
    /// Set when the service answered but could not compute a score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteHealthScore {
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && self.score.is_finite()
    }
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Debug, Clone)]
pub struct DataServiceConfig {
    pub base_url: String,
    /// Timeout for each request (default: 30 seconds)
    pub request_timeout: Duration,
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Remote composite provider over HTTP
pub struct DataServiceClient {
    config: DataServiceConfig,
    http: reqwest::Client,
}

impl DataServiceClient {
    pub fn new(config: DataServiceConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::generic(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &DataServiceConfig {
        &self.config
    }

    fn health_url(&self, region_id: &str, name: &str, lat: f64, lon: f64) -> String {
        let query = encode_query(&[
            ("name".to_string(), name.to_string()),
            ("lat".to_string(), lat.to_string()),
            ("lon".to_string(), lon.to_string()),
        ]);
        format!(
            "{}/api/v1/health/{}?{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(region_id),
            query
        )
    }
}

#[async_trait]
impl RemoteCompositeScoreProvider for DataServiceClient {
    async fn get(
        &self,
        region_id: &str,
        name: &str,
        lat: f64,
        lon: f64,
    ) -> Result<RemoteHealthScore, ProviderError> {
        let url = self.health_url(region_id, name, lat, lon);
        debug!(region_id = %region_id, "Requesting remote health score");

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::timeout(e.to_string())
            } else {
                ClientError::transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(region_id = %region_id, status = status.as_u16(), "Data service rejected health request");
            return Err(ClientError::from_status(status.as_u16(), body).into());
        }

        let envelope: RemoteHealthScore = response
            .json()
            .await
            .map_err(|e| ClientError::decode(Some(status.as_u16()), e.to_string()))?;
        Ok(envelope)
    }
}

// ============================================================================
// Cached provider
// ============================================================================

impl From<FlightAborted> for ProviderError {
    fn from(err: FlightAborted) -> Self {
        ProviderError::Unavailable(err.to_string())
    }
}

/// TTL cache and single-flight around a remote provider
pub struct CachedRemoteProvider {
    inner: Arc<dyn RemoteCompositeScoreProvider>,
    cache: TtlCache<RemoteHealthScore>,
    flights: SingleFlight<RemoteHealthScore, ProviderError>,
}

impl CachedRemoteProvider {
    pub fn new(inner: Arc<dyn RemoteCompositeScoreProvider>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, clock),
            flights: SingleFlight::new(),
        }
    }

    pub fn with_ttl(inner: Arc<dyn RemoteCompositeScoreProvider>, ttl: Duration) -> Self {
        Self::new(inner, ttl, Arc::new(SystemClock))
    }

    pub fn cache(&self) -> &TtlCache<RemoteHealthScore> {
        &self.cache
    }
}

#[async_trait]
impl RemoteCompositeScoreProvider for CachedRemoteProvider {
    async fn get(
        &self,
        region_id: &str,
        name: &str,
        lat: f64,
        lon: f64,
    ) -> Result<RemoteHealthScore, ProviderError> {
        let cached = self.cache.get(region_id);
        if let Some(hit) = &cached {
            if hit.fresh {
                return Ok(hit.value.clone());
            }
        }

        let inner = self.inner.clone();
        let (id, name) = (region_id.to_string(), name.to_string());
        let fetched = self
            .flights
            .run(region_id, move || async move { inner.get(&id, &name, lat, lon).await })
            .await;

        match (fetched, cached) {
            (Ok(envelope), _) => {
                if envelope.is_usable() {
                    self.cache.set(region_id, envelope.clone());
                    info!(region_id = %region_id, score = envelope.score, "Remote health score cached");
                }
                Ok(envelope)
            }
            (Err(e), Some(stale)) => {
                debug!(region_id = %region_id, error = %e, "Remote refresh failed, serving stale score");
                Ok(stale.value)
            }
            (Err(e), None) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn envelope(score: f64) -> RemoteHealthScore {
        serde_json::from_value(serde_json::json!({
            "mpa_id": "mpa-1",
            "mpa_name": "Test Reef",
            "score": score,
            "confidence": "high",
            "breakdown": {
                "biodiversity": 80,
                "water_quality": 70,
                "thermal_stress": 60,
                "productivity": 50
            },
            "environmental": {"sst": 24.5, "chlorophyll": 0.8, "ph": 8.1},
            "species": {"total_species": 120, "total_observations": 900},
            "data_sources": ["obis", "copernicus"],
            "calculated_at": "2024-06-01T12:00:00.123456"
        }))
        .unwrap()
    }

    struct Scripted {
        calls: AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl RemoteCompositeScoreProvider for Scripted {
        async fn get(&self, _: &str, _: &str, _: f64, _: f64) -> Result<RemoteHealthScore, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_after {
                Err(ProviderError::Unavailable("down".into()))
            } else {
                Ok(envelope(70.0 + call as f64))
            }
        }
    }

    #[test]
    fn test_envelope_parses_service_shape() {
        let env = envelope(72.0);
        assert!(env.is_usable());
        assert_eq!(env.species.total_species, 120);
        assert_eq!(env.species.threatened_species, 0);
        assert_eq!(env.environmental.oxygen, None);
        assert_eq!(
            env.environmental.readings(),
            vec![
                EnvironmentalReading::Temperature,
                EnvironmentalReading::Chlorophyll,
                EnvironmentalReading::Ph
            ]
        );
        assert!(env.environmental.has_water_quality());
    }

    #[test]
    fn test_error_envelope_not_usable() {
        let mut env = envelope(72.0);
        env.error = Some("upstream failed".into());
        assert!(!env.is_usable());
    }

    #[test]
    fn test_health_url_encodes_params() {
        let client = DataServiceClient::new(DataServiceConfig {
            base_url: "http://svc/".into(),
            ..Default::default()
        })
        .unwrap();
        let url = client.health_url("mpa 1", "Reef & Bay", 10.5, -20.25);
        assert_eq!(url, "http://svc/api/v1/health/mpa%201?name=Reef%20%26%20Bay&lat=10.5&lon=-20.25");
    }

    #[tokio::test]
    async fn test_cached_provider_serves_fresh_then_stale_on_failure() {
        let clock = Arc::new(ManualClock::new());
        let inner = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
            fail_after: 1,
        });
        let provider = CachedRemoteProvider::new(inner.clone(), Duration::from_secs(3600), clock.clone());

        let first = provider.get("mpa-1", "Reef", 0.0, 0.0).await.unwrap();
        let second = provider.get("mpa-1", "Reef", 0.0, 0.0).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(3601));
        let stale = provider.get("mpa-1", "Reef", 0.0, 0.0).await.unwrap();
        assert_eq!(stale.score, 70.0);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_provider_surfaces_error_without_cache() {
        let inner = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
            fail_after: 0,
        });
        let provider = CachedRemoteProvider::with_ttl(inner, Duration::from_secs(60));
        assert!(provider.get("mpa-1", "Reef", 0.0, 0.0).await.is_err());
    }
}
