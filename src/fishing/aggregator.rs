//! Fishing-effort aggregation from a single grouped report
//!
//! ## Request economy
//!
//! The provider allows almost no concurrency, so one region costs exactly one
//! physical call: a report grouped by flag *and* gear type together, at monthly
//! temporal and coarse spatial resolution. Flag totals, gear totals, hotspots
//! and the monthly trend are all folded locally from that one response.
//!
//! ```text
//! POST /4wings/report?group-by=FLAGANDGEARTYPE&...   (1 call)
//!        │
//!        ▼
//! {entries: [{"dataset:version": [row, ...]}]}
//!        │ flatten_report
//!        ▼
//! Vec<EffortRecord> ── summarize ──► FishingEffortSummary
//! ```

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::*;
use crate::gateway::{feature_body, indexed_array, ClientError, GatewayClient};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the fishing aggregator
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Report endpoint path
    pub endpoint: String,
    /// Effort dataset, `name:version`
    pub dataset: String,
    /// Flags kept in the breakdown
    pub max_flags: usize,
    /// Hotspot cells kept
    pub max_hotspots: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            endpoint: "/4wings/report".to_string(),
            dataset: "public-global-fishing-effort:latest".to_string(),
            max_flags: 10,
            max_hotspots: 20,
        }
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReportEnvelope {
    #[serde(default)]
    entries: Vec<BTreeMap<String, Option<Vec<RawRecord>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    hours: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    flag: Option<String>,
    #[serde(default, alias = "geartype", alias = "gear_type")]
    gear_type: Option<String>,
    #[serde(default, alias = "vessel-ids", alias = "vesselIDs", alias = "vessel_ids")]
    vessel_ids: Option<VesselIds>,
}

/// Providers send either the identifiers or only their count
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VesselIds {
    Ids(Vec<String>),
    Count(u32),
}

/// Flatten the nested per-dataset envelope into plain records
pub fn flatten_report(value: &Value) -> Result<Vec<EffortRecord>, ClientError> {
    let envelope = ReportEnvelope::deserialize(value)
        .map_err(|e| ClientError::decode(None, format!("unexpected report shape: {}", e)))?;

    let records = envelope
        .entries
        .into_iter()
        .flat_map(|entry| entry.into_values())
        .flatten()
        .flatten()
        .map(|raw| {
            let (vessel_ids, vessel_count) = match raw.vessel_ids {
                Some(VesselIds::Ids(ids)) => {
                    let count = ids.len() as u32;
                    (ids, count)
                }
                Some(VesselIds::Count(count)) => (Vec::new(), count),
                None => (Vec::new(), 0),
            };
            EffortRecord {
                date: raw.date,
                hours: raw.hours.unwrap_or(0.0).max(0.0),
                lat: raw.lat,
                lon: raw.lon,
                flag: raw.flag.filter(|f| !f.is_empty()),
                gear_type: raw.gear_type.filter(|g| !g.is_empty()),
                vessel_ids,
                vessel_count,
            }
        })
        .collect();

    Ok(records)
}

// ============================================================================
// Local aggregation
// ============================================================================

#[derive(Default)]
struct GroupTotals {
    hours: f64,
    ids: BTreeSet<String>,
    counted: u32,
}

impl GroupTotals {
    fn add(&mut self, record: &EffortRecord) {
        self.hours += record.hours;
        self.ids.extend(record.vessel_ids.iter().cloned());
        self.counted = self.counted.saturating_add(record.vessel_count);
    }

    /// Distinct identifiers when known, otherwise the summed row counts
    fn vessel_count(&self) -> u32 {
        if self.ids.is_empty() {
            self.counted
        } else {
            self.ids.len() as u32
        }
    }
}

fn percentage(hours: f64, total: f64) -> f64 {
    if total > 0.0 {
        hours / total * 100.0
    } else {
        0.0
    }
}

fn by_hours_desc(a_hours: f64, a_name: &str, b_hours: f64, b_name: &str) -> Ordering {
    b_hours
        .partial_cmp(&a_hours)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_name.cmp(b_name))
}

/// Month bucket (`YYYY-MM`) of a report date
fn month_of(date: &str) -> Option<String> {
    let month = date.get(..7)?;
    let bytes = month.as_bytes();
    (bytes[4] == b'-' && bytes[..4].iter().all(u8::is_ascii_digit)).then(|| month.to_string())
}

/// Fold flattened records into a summary
pub fn summarize(
    records: &[EffortRecord],
    date_range: DateRange,
    config: &AggregatorConfig,
    now: DateTime<Utc>,
) -> FishingEffortSummary {
    let total_hours: f64 = records.iter().map(|r| r.hours).sum();

    let mut flags: BTreeMap<String, GroupTotals> = BTreeMap::new();
    let mut gears: BTreeMap<String, GroupTotals> = BTreeMap::new();
    let mut cells: BTreeMap<(i64, i64), (f64, f64, f64)> = BTreeMap::new();
    let mut months: BTreeMap<String, f64> = BTreeMap::new();
    let mut all_ids: BTreeSet<&str> = BTreeSet::new();

    for record in records {
        let flag = record.flag.clone().unwrap_or_else(|| "UNKNOWN".to_string());
        flags.entry(flag).or_default().add(record);

        let gear = record.gear_type.clone().unwrap_or_else(|| "unknown".to_string());
        gears.entry(gear).or_default().add(record);

        if let (Some(lat), Some(lon)) = (record.lat, record.lon) {
            let key = ((lat * 1e4).round() as i64, (lon * 1e4).round() as i64);
            let cell = cells.entry(key).or_insert((lat, lon, 0.0));
            cell.2 += record.hours;
        }

        if let Some(month) = record.date.as_deref().and_then(month_of) {
            *months.entry(month).or_insert(0.0) += record.hours;
        }

        all_ids.extend(record.vessel_ids.iter().map(String::as_str));
    }

    let mut by_flag: Vec<FlagEffort> = flags
        .iter()
        .map(|(flag, totals)| FlagEffort {
            flag: flag.clone(),
            hours: totals.hours,
            vessel_count: totals.vessel_count(),
            percentage: percentage(totals.hours, total_hours),
        })
        .collect();
    by_flag.sort_by(|a, b| by_hours_desc(a.hours, &a.flag, b.hours, &b.flag));

    // Approximation when the provider sends no identifiers: the busiest
    // single flag's count stands in for distinct vessels across flags.
    let total_vessels = if all_ids.is_empty() {
        by_flag.iter().map(|f| f.vessel_count).max().unwrap_or(0)
    } else {
        all_ids.len() as u32
    };

    let flag_count = by_flag.len() as u32;
    by_flag.truncate(config.max_flags);

    let mut by_gear_type: Vec<GearEffort> = gears
        .iter()
        .map(|(gear, totals)| GearEffort {
            gear_type: gear.clone(),
            hours: totals.hours,
            vessel_count: totals.vessel_count(),
            percentage: percentage(totals.hours, total_hours),
        })
        .collect();
    by_gear_type.sort_by(|a, b| by_hours_desc(a.hours, &a.gear_type, b.hours, &b.gear_type));

    let mut hotspots: Vec<Hotspot> = if total_hours > 0.0 {
        cells
            .values()
            .filter_map(|&(lat, lon, hours)| {
                IntensityTier::for_share(hours / total_hours).map(|intensity| Hotspot {
                    lat,
                    lon,
                    hours,
                    intensity,
                })
            })
            .collect()
    } else {
        Vec::new()
    };
    hotspots.sort_by(|a, b| b.hours.partial_cmp(&a.hours).unwrap_or(Ordering::Equal));
    hotspots.truncate(config.max_hotspots);

    let monthly_trend = (!months.is_empty()).then(|| {
        months
            .into_iter()
            .map(|(month, hours)| MonthlyEffort { month, hours })
            .collect()
    });

    FishingEffortSummary {
        total_hours,
        total_vessels,
        flag_count,
        date_range,
        by_flag,
        by_gear_type,
        hotspots,
        monthly_trend,
        last_updated: now,
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Fetches one grouped report per region and summarizes it locally
pub struct FishingAggregator {
    client: Arc<GatewayClient>,
    config: AggregatorConfig,
}

impl FishingAggregator {
    pub fn new(client: Arc<GatewayClient>, config: AggregatorConfig) -> Self {
        Self { client, config }
    }

    /// Create with default configuration
    pub fn with_defaults(client: Arc<GatewayClient>) -> Self {
        Self::new(client, AggregatorConfig::default())
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Query parameters for the grouped report
    pub fn report_query(&self, date_range: &DateRange) -> Vec<(String, String)> {
        let mut query = vec![
            ("spatial-resolution".to_string(), "LOW".to_string()),
            ("temporal-resolution".to_string(), "MONTHLY".to_string()),
            ("group-by".to_string(), "FLAGANDGEARTYPE".to_string()),
            ("format".to_string(), "JSON".to_string()),
            ("date-range".to_string(), date_range.to_string()),
        ];
        query.extend(indexed_array("datasets", &[self.config.dataset.as_str()]));
        query
    }

    /// Fetch and summarize effort for one region with a single physical call
    pub async fn fetch_summary(
        &self,
        area: &RegionArea,
        date_range: DateRange,
    ) -> Result<FishingEffortSummary, ClientError> {
        let query = self.report_query(&date_range);
        let body = feature_body(&area.to_geometry());

        let response = self
            .client
            .request(&self.config.endpoint, Method::POST, &query, Some(&body))
            .await?;

        let records = flatten_report(&response)?;
        debug!(records = records.len(), "Report flattened");

        let summary = summarize(&records, date_range, &self.config, Utc::now());
        info!(
            total_hours = summary.total_hours,
            total_vessels = summary.total_vessels,
            flags = summary.flag_count,
            hotspots = summary.hotspots.len(),
            "Fishing effort summarized"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
    }

    fn record(flag: &str, gear: &str, hours: f64, vessels: u32) -> EffortRecord {
        EffortRecord {
            flag: Some(flag.to_string()),
            gear_type: Some(gear.to_string()),
            hours,
            vessel_count: vessels,
            ..Default::default()
        }
    }

    #[test]
    fn test_flatten_nested_envelope() {
        let report = json!({
            "entries": [{
                "public-global-fishing-effort:v3.0": [
                    {"date": "2024-01", "hours": 12.5, "lat": 1.0, "lon": 2.0, "flag": "ESP", "geartype": "trawlers", "vesselIDs": 3},
                    {"date": "2024-02", "hours": 7.5, "flag": "FRA", "gearType": "longliners", "vesselIds": ["a", "b"]},
                    {"date": "2024-02", "hours": null, "flag": "", "vessel-ids": ["c"]}
                ]
            }]
        });

        let records = flatten_report(&report).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].gear_type.as_deref(), Some("trawlers"));
        assert_eq!(records[0].vessel_count, 3);
        assert!(records[0].vessel_ids.is_empty());
        assert_eq!(records[1].vessel_ids, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(records[1].vessel_count, 2);
        assert_eq!(records[2].hours, 0.0);
        assert_eq!(records[2].flag, None);
    }

    #[test]
    fn test_flatten_empty_and_malformed() {
        assert!(flatten_report(&json!({"entries": []})).unwrap().is_empty());
        assert!(flatten_report(&json!({})).unwrap().is_empty());
        assert!(flatten_report(&json!({"entries": "nope"})).is_err());
    }

    #[test]
    fn test_breakdowns_sorted_with_percentages() {
        let records = vec![
            record("ESP", "trawlers", 30.0, 2),
            record("FRA", "longliners", 50.0, 1),
            record("ESP", "longliners", 20.0, 4),
        ];
        let summary = summarize(&records, range(), &AggregatorConfig::default(), Utc::now());

        assert_eq!(summary.total_hours, 100.0);
        assert_eq!(summary.by_flag[0].flag, "ESP");
        assert_eq!(summary.by_flag[0].hours, 50.0);
        assert_eq!(summary.by_flag[0].vessel_count, 6);
        assert_eq!(summary.by_flag[0].percentage, 50.0);
        assert_eq!(summary.by_gear_type[0].gear_type, "longliners");
        assert_eq!(summary.by_gear_type[0].percentage, 70.0);

        let sum: f64 = summary.by_flag.iter().map(|f| f.percentage).sum();
        assert!(sum <= 100.0 + 1e-9);
        assert!(summary
            .by_flag
            .windows(2)
            .all(|w| w[0].hours >= w[1].hours));
    }

    #[test]
    fn test_flag_breakdown_capped_to_ten() {
        let records: Vec<EffortRecord> = (0..15)
            .map(|i| record(&format!("F{:02}", i), "trawlers", (i + 1) as f64, 1))
            .collect();
        let summary = summarize(&records, range(), &AggregatorConfig::default(), Utc::now());

        assert_eq!(summary.by_flag.len(), 10);
        assert_eq!(summary.by_flag[0].flag, "F14");
        assert_eq!(summary.flag_count, 15);
        let sum: f64 = summary.by_flag.iter().map(|f| f.percentage).sum();
        assert!(sum < 100.0);
    }

    #[test]
    fn test_iuu_flag_factor_counts_every_flag() {
        let records: Vec<EffortRecord> = (0..15)
            .map(|i| record(&format!("F{:02}", i), "trawlers", 10.0, 1))
            .collect();
        let summary = summarize(&records, range(), &AggregatorConfig::default(), Utc::now());
        let risk = crate::fishing::iuu_risk("mpa-1", &summary).unwrap();

        let flags = risk
            .factors
            .iter()
            .find(|f| f.kind == RiskFactorKind::MultipleFlags)
            .unwrap();
        assert_eq!(flags.count, 15);
        assert_eq!(flags.severity, Severity::High);
    }

    #[test]
    fn test_hotspot_classification_and_cap() {
        let mut records = vec![
            EffortRecord { lat: Some(1.0), lon: Some(1.0), hours: 50.0, ..Default::default() },
            EffortRecord { lat: Some(1.0), lon: Some(1.0), hours: 10.0, ..Default::default() },
            EffortRecord { lat: Some(2.0), lon: Some(2.0), hours: 12.0, ..Default::default() },
            EffortRecord { lat: Some(3.0), lon: Some(3.0), hours: 6.0, ..Default::default() },
        ];
        // 22 small cells of 1h each, below the 5% threshold
        for i in 0..22 {
            records.push(EffortRecord {
                lat: Some(10.0 + i as f64),
                lon: Some(10.0),
                hours: 1.0,
                ..Default::default()
            });
        }
        let summary = summarize(&records, range(), &AggregatorConfig::default(), Utc::now());

        assert_eq!(summary.total_hours, 100.0);
        assert_eq!(summary.hotspots.len(), 3);
        assert_eq!(summary.hotspots[0].hours, 60.0);
        assert_eq!(summary.hotspots[0].intensity, IntensityTier::VeryHigh);
        assert_eq!(summary.hotspots[1].intensity, IntensityTier::High);
        assert_eq!(summary.hotspots[2].intensity, IntensityTier::Medium);

        let even: Vec<EffortRecord> = (0..5)
            .map(|i| EffortRecord {
                lat: Some(i as f64),
                lon: Some(0.0),
                hours: 20.0,
                ..Default::default()
            })
            .collect();
        let config = AggregatorConfig {
            max_hotspots: 2,
            ..Default::default()
        };
        let capped = summarize(&even, range(), &config, Utc::now());
        assert_eq!(capped.hotspots.len(), 2);
        assert!(capped.hotspots.iter().all(|h| h.intensity == IntensityTier::VeryHigh));
    }

    #[test]
    fn test_vessel_count_prefers_distinct_ids() {
        let records = vec![
            EffortRecord {
                flag: Some("ESP".into()),
                vessel_ids: vec!["a".into(), "b".into()],
                vessel_count: 2,
                hours: 1.0,
                ..Default::default()
            },
            EffortRecord {
                flag: Some("FRA".into()),
                vessel_ids: vec!["b".into(), "c".into()],
                vessel_count: 2,
                hours: 1.0,
                ..Default::default()
            },
        ];
        let summary = summarize(&records, range(), &AggregatorConfig::default(), Utc::now());
        assert_eq!(summary.total_vessels, 3);
    }

    #[test]
    fn test_vessel_count_falls_back_to_max_flag() {
        let records = vec![
            record("ESP", "trawlers", 10.0, 4),
            record("ESP", "trawlers", 10.0, 3),
            record("FRA", "trawlers", 10.0, 5),
        ];
        let summary = summarize(&records, range(), &AggregatorConfig::default(), Utc::now());
        assert_eq!(summary.total_vessels, 7);
    }

    #[test]
    fn test_monthly_trend_buckets() {
        let records = vec![
            EffortRecord { date: Some("2024-02".into()), hours: 2.0, ..Default::default() },
            EffortRecord { date: Some("2024-01-15".into()), hours: 1.0, ..Default::default() },
            EffortRecord { date: Some("2024-01".into()), hours: 3.0, ..Default::default() },
        ];
        let summary = summarize(&records, range(), &AggregatorConfig::default(), Utc::now());
        let trend = summary.monthly_trend.unwrap();
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].month, "2024-01");
        assert_eq!(trend[0].hours, 4.0);

        let undated = summarize(&[record("ESP", "x", 1.0, 1)], range(), &AggregatorConfig::default(), Utc::now());
        assert!(undated.monthly_trend.is_none());
    }

    #[test]
    fn test_empty_report_summary() {
        let summary = summarize(&[], range(), &AggregatorConfig::default(), Utc::now());
        assert!(summary.is_empty());
        assert!(summary.by_flag.is_empty());
        assert!(summary.hotspots.is_empty());
    }

    #[test]
    fn test_report_query_uses_combined_grouping() {
        let client = Arc::new(GatewayClient::new(Default::default()).unwrap());
        let aggregator = FishingAggregator::with_defaults(client);
        let query = aggregator.report_query(&range());
        assert!(query.contains(&("group-by".to_string(), "FLAGANDGEARTYPE".to_string())));
        assert!(query.contains(&(
            "datasets[0]".to_string(),
            "public-global-fishing-effort:latest".to_string()
        )));
        assert!(query.contains(&("date-range".to_string(), "2024-01-01,2024-12-31".to_string())));
    }
}
