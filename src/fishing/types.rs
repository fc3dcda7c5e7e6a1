//! Fishing effort data model

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Request inputs
// ============================================================================

/// Inclusive date range for a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The twelve months ending on `today`
    pub fn trailing_year(today: NaiveDate) -> Self {
        Self {
            start: today - ChronoDuration::days(365),
            end: today,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

/// Axis-aligned bounds: min_lon, min_lat, max_lon, max_lat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Closed polygon ring around the box
    pub fn to_polygon(&self) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [self.min_lon, self.min_lat],
                [self.max_lon, self.min_lat],
                [self.max_lon, self.max_lat],
                [self.min_lon, self.max_lat],
                [self.min_lon, self.min_lat],
            ]]
        })
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    /// Parse `min_lon,min_lat,max_lon,max_lat`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid bounding box '{}': {}", s, e))?;
        let [min_lon, min_lat, max_lon, max_lat] = parts[..] else {
            return Err(format!(
                "bounding box needs 4 values (min_lon,min_lat,max_lon,max_lat), got {}",
                parts.len()
            ));
        };
        if min_lon > max_lon || min_lat > max_lat {
            return Err(format!("bounding box '{}' has min greater than max", s));
        }
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err(format!("bounding box '{}' latitude out of range", s));
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

/// Region shape sent to the report endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum RegionArea {
    /// GeoJSON Polygon or MultiPolygon geometry
    Geometry(Value),
    /// Bounds, converted to a polygon
    Bounds(BoundingBox),
}

impl RegionArea {
    pub fn to_geometry(&self) -> Value {
        match self {
            RegionArea::Geometry(geometry) => geometry.clone(),
            RegionArea::Bounds(bounds) => bounds.to_polygon(),
        }
    }
}

/// Protection regime of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionLevel {
    /// All extraction prohibited; any fishing is a violation
    NoTake,
    /// Some fishing permitted
    Partial,
}

impl FromStr for ProtectionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "no_take" | "notake" | "full" | "fully_protected" => Ok(ProtectionLevel::NoTake),
            "partial" | "partially_protected" | "multiple_use" => Ok(ProtectionLevel::Partial),
            other => Err(format!("unknown protection level: {}", other)),
        }
    }
}

// ============================================================================
// Flattened records
// ============================================================================

/// One row of the report after flattening the per-dataset envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffortRecord {
    /// Report bucket, `YYYY-MM` or `YYYY-MM-DD`
    pub date: Option<String>,
    pub hours: f64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub flag: Option<String>,
    pub gear_type: Option<String>,
    /// Vessel identifiers, when the provider lists them
    pub vessel_ids: Vec<String>,
    /// Vessels represented by the row
    pub vessel_count: u32,
}

// ============================================================================
// Summary
// ============================================================================

/// Effort attributed to one flag state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEffort {
    pub flag: String,
    pub hours: f64,
    pub vessel_count: u32,
    pub percentage: f64,
}

/// Effort attributed to one gear type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GearEffort {
    pub gear_type: String,
    pub hours: f64,
    pub vessel_count: u32,
    pub percentage: f64,
}

/// Share-of-effort tier for a hotspot cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityTier {
    Medium,
    High,
    VeryHigh,
}

impl IntensityTier {
    /// Tier for a cell holding `share` (0..1) of total effort; `None` below 5%
    pub fn for_share(share: f64) -> Option<Self> {
        if share >= 0.20 {
            Some(IntensityTier::VeryHigh)
        } else if share >= 0.10 {
            Some(IntensityTier::High)
        } else if share >= 0.05 {
            Some(IntensityTier::Medium)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub lat: f64,
    pub lon: f64,
    pub hours: f64,
    pub intensity: IntensityTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEffort {
    /// `YYYY-MM`
    pub month: String,
    pub hours: f64,
}

/// Fishing effort in a region over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishingEffortSummary {
    pub total_hours: f64,
    pub total_vessels: u32,
    /// Distinct flag states seen, counted before `by_flag` is truncated
    #[serde(default)]
    pub flag_count: u32,
    pub date_range: DateRange,
    /// Top flags by hours, descending
    pub by_flag: Vec<FlagEffort>,
    /// Gear types by hours, descending
    pub by_gear_type: Vec<GearEffort>,
    pub hotspots: Vec<Hotspot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_trend: Option<Vec<MonthlyEffort>>,
    pub last_updated: DateTime<Utc>,
}

impl FishingEffortSummary {
    /// No effort and no vessels: insufficient data, not a clean bill of health
    pub fn is_empty(&self) -> bool {
        self.total_hours == 0.0 && self.total_vessels == 0
    }

    /// Number of monthly buckets available for trend analysis
    pub fn monthly_samples(&self) -> usize {
        self.monthly_trend.as_ref().map_or(0, Vec::len)
    }
}

// ============================================================================
// Derived artifacts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Fishing compliance of a protected region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceScore {
    pub region_id: String,
    /// 0-100, higher is better
    pub score: f64,
    pub fishing_hours_inside: f64,
    pub violations: u32,
    pub trend: Trend,
    pub confidence: Confidence,
    /// 0-75
    pub protection_effectiveness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn for_score(score: f64) -> Self {
        if score >= 70.0 {
            RiskLevel::Critical
        } else if score >= 40.0 {
            RiskLevel::High
        } else if score >= 20.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    HighFishingActivity,
    MultipleFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    #[serde(rename = "type")]
    pub kind: RiskFactorKind,
    pub description: String,
    pub count: u32,
    pub severity: Severity,
}

/// Illegal, unreported and unregulated fishing risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IuuRiskAssessment {
    pub region_id: String,
    pub risk_level: RiskLevel,
    /// 0-100
    pub risk_score: f64,
    pub factors: Vec<RiskFactor>,
    pub vessel_count: u32,
}

/// Everything derived from one physical report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishingActivity {
    pub summary: FishingEffortSummary,
    pub compliance: Option<ComplianceScore>,
    pub iuu_risk: Option<IuuRiskAssessment>,
}

/// Current calendar year, for protection-age calculations
pub fn current_year() -> i32 {
    Utc::now().year()
}
