//! Composite health score types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::fishing::{Confidence, Trend};

/// The seven named sub-scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubScore {
    PopulationTrend,
    HabitatQuality,
    SpeciesDiversity,
    /// Inverted upstream: more thermal stress means a lower score
    ThermalStress,
    Productivity,
    CommunityAssessment,
    FishingCompliance,
}

impl SubScore {
    pub const ALL: [SubScore; 7] = [
        SubScore::PopulationTrend,
        SubScore::HabitatQuality,
        SubScore::SpeciesDiversity,
        SubScore::ThermalStress,
        SubScore::Productivity,
        SubScore::CommunityAssessment,
        SubScore::FishingCompliance,
    ];
}

/// One sub-score's contribution
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    /// 0-100
    pub score: f64,
    pub weight: f64,
    pub available: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

impl BreakdownEntry {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn available(score: f64, weight: f64) -> Self {
        Self {
            score,
            weight,
            available: true,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }
}

pub type HealthBreakdown = BTreeMap<SubScore, BreakdownEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Precomputed remote composite, locally blended
    Remote,
    /// Computed from local summaries only
    Local,
}

/// Environmental reading that can feed the remote tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentalReading {
    Temperature,
    Chlorophyll,
    DissolvedOxygen,
    Ph,
    Salinity,
}

/// Environmental readings behind a remote score
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalDetail {
    /// Sea surface temperature, degrees C
    pub temperature: Option<f64>,
    pub temperature_anomaly: Option<f64>,
    /// mg/m3
    pub chlorophyll: Option<f64>,
    /// ml/l
    pub dissolved_oxygen: Option<f64>,
    pub ph: Option<f64>,
    /// PSU
    pub salinity: Option<f64>,
    pub measured_at: Option<String>,
    /// Readings actually present, in fixed order
    pub readings_used: Vec<EnvironmentalReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityDetail {
    /// Mean participant rating, 1-10
    pub average_score: f64,
    pub assessment_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishingDetail {
    pub compliance_score: f64,
    pub violations: u32,
    pub trend: Trend,
    pub fishing_hours_inside: f64,
}

/// Output of one health computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeHealthScore {
    /// 0-100
    pub score: u8,
    pub confidence: Confidence,
    pub data_sources_available: u8,
    pub source: ScoreSource,
    pub breakdown: HealthBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environmental: Option<EnvironmentalDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community: Option<CommunityDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fishing: Option<FishingDetail>,
    /// True while any constituent input is still outstanding
    pub loading: bool,
}
