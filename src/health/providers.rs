//! Upstream collaborators feeding the health score
//!
//! Each provider is a trait so the monitor can run against HTTP clients,
//! in-memory fixtures, or nothing at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::remote::RemoteHealthScore;
use crate::gateway::ClientError;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider not configured")]
    NotConfigured,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

// ============================================================================
// Data
// ============================================================================

/// Classified population trend for one species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendClass {
    Increasing,
    Stable,
    Decreasing,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesTrend {
    pub species: String,
    pub trend: TrendClass,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationSummary {
    #[serde(default)]
    pub species_trends: Vec<SpeciesTrend>,
    /// Upstream biodiversity index, 0-100
    pub overall_biodiversity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitatParameter {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitatSummary {
    #[serde(default)]
    pub parameters: Vec<HabitatParameter>,
    /// Upstream habitat quality, 0-100
    pub habitat_quality_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSummary {
    pub tracked_individuals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityAverage {
    /// Mean participant rating, 1-10
    pub average_score: Option<f64>,
    pub count: u32,
}

// ============================================================================
// Traits
// ============================================================================

#[async_trait]
pub trait PopulationTrendProvider: Send + Sync {
    async fn get_summary(&self, region_id: &str) -> Result<PopulationSummary, ProviderError>;
}

#[async_trait]
pub trait HabitatProvider: Send + Sync {
    async fn get_summary(&self, region_id: &str) -> Result<HabitatSummary, ProviderError>;
}

#[async_trait]
pub trait TrackingProvider: Send + Sync {
    async fn get_summary(&self, region_id: &str) -> Result<TrackingSummary, ProviderError>;
}

#[async_trait]
pub trait CommunityAssessmentStore: Send + Sync {
    async fn get_average(&self, region_id: &str) -> Result<CommunityAverage, ProviderError>;
}

/// Precomputed composite score for a region
#[async_trait]
pub trait RemoteCompositeScoreProvider: Send + Sync {
    async fn get(
        &self,
        region_id: &str,
        name: &str,
        lat: f64,
        lon: f64,
    ) -> Result<RemoteHealthScore, ProviderError>;
}

/// Stand-in for a collaborator that is not wired up
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredProvider;

#[async_trait]
impl PopulationTrendProvider for UnconfiguredProvider {
    async fn get_summary(&self, _region_id: &str) -> Result<PopulationSummary, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}

#[async_trait]
impl HabitatProvider for UnconfiguredProvider {
    async fn get_summary(&self, _region_id: &str) -> Result<HabitatSummary, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}

#[async_trait]
impl TrackingProvider for UnconfiguredProvider {
    async fn get_summary(&self, _region_id: &str) -> Result<TrackingSummary, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}

#[async_trait]
impl CommunityAssessmentStore for UnconfiguredProvider {
    async fn get_average(&self, _region_id: &str) -> Result<CommunityAverage, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}

#[async_trait]
impl RemoteCompositeScoreProvider for UnconfiguredProvider {
    async fn get(
        &self,
        _region_id: &str,
        _name: &str,
        _lat: f64,
        _lon: f64,
    ) -> Result<RemoteHealthScore, ProviderError> {
        Err(ProviderError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_class_wire_names() {
        let trend: TrendClass = serde_json::from_str("\"insufficient_data\"").unwrap();
        assert_eq!(trend, TrendClass::InsufficientData);
    }

    #[test]
    fn test_population_summary_defaults() {
        let summary: PopulationSummary = serde_json::from_str(r#"{"overallBiodiversity": 62.5}"#).unwrap();
        assert!(summary.species_trends.is_empty());
        assert_eq!(summary.overall_biodiversity, Some(62.5));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let provider = UnconfiguredProvider;
        let err = CommunityAssessmentStore::get_average(&provider, "mpa-1").await.unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured);
    }
}
