//! IUU (illegal, unreported, unregulated) fishing risk
//!
//! Additive heuristic over the summary: effort, flag diversity and vessel
//! count each contribute a capped share of the 0-100 score.

use super::types::*;

const HIGH_ACTIVITY_HOURS: f64 = 1000.0;
const SEVERE_ACTIVITY_HOURS: f64 = 5000.0;
const MULTIPLE_FLAGS: usize = 5;
const SEVERE_FLAGS: usize = 10;

/// Assess IUU risk; `None` when the summary holds no data
pub fn iuu_risk(region_id: &str, summary: &FishingEffortSummary) -> Option<IuuRiskAssessment> {
    if summary.is_empty() {
        return None;
    }

    let hours = summary.total_hours;
    let flag_count = summary.flag_count as usize;
    let vessels = summary.total_vessels;

    let risk_score = ((hours / 100.0).min(50.0)
        + (flag_count as f64 * 3.0).min(30.0)
        + (vessels as f64).min(20.0))
    .clamp(0.0, 100.0);

    let mut factors = Vec::new();
    if hours > HIGH_ACTIVITY_HOURS {
        factors.push(RiskFactor {
            kind: RiskFactorKind::HighFishingActivity,
            description: format!("{:.0} hours of fishing activity detected", hours),
            count: hours.round() as u32,
            severity: if hours > SEVERE_ACTIVITY_HOURS {
                Severity::High
            } else {
                Severity::Medium
            },
        });
    }
    if flag_count > MULTIPLE_FLAGS {
        factors.push(RiskFactor {
            kind: RiskFactorKind::MultipleFlags,
            description: format!("Vessels from {} flag states operating in the area", flag_count),
            count: flag_count as u32,
            severity: if flag_count > SEVERE_FLAGS {
                Severity::High
            } else {
                Severity::Medium
            },
        });
    }

    Some(IuuRiskAssessment {
        region_id: region_id.to_string(),
        risk_level: RiskLevel::for_score(risk_score),
        risk_score,
        factors,
        vessel_count: vessels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn summary(hours: f64, vessels: u32, flags: usize) -> FishingEffortSummary {
        FishingEffortSummary {
            total_hours: hours,
            total_vessels: vessels,
            flag_count: flags as u32,
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ),
            by_flag: (0..flags)
                .map(|i| FlagEffort {
                    flag: format!("F{}", i),
                    hours: hours / flags as f64,
                    vessel_count: 1,
                    percentage: 100.0 / flags as f64,
                })
                .collect(),
            by_gear_type: vec![],
            hotspots: vec![],
            monthly_trend: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_no_data_yields_none() {
        assert!(iuu_risk("mpa-1", &summary(0.0, 0, 0)).is_none());
    }

    #[test]
    fn test_low_risk_without_factors() {
        let risk = iuu_risk("mpa-1", &summary(500.0, 2, 2)).unwrap();
        // 5 + 6 + 2
        assert_eq!(risk.risk_score, 13.0);
        assert_eq!(risk.risk_level, RiskLevel::Low);
        assert!(risk.factors.is_empty());
        assert_eq!(risk.vessel_count, 2);
    }

    #[test]
    fn test_components_are_capped() {
        let risk = iuu_risk("mpa-1", &summary(20_000.0, 80, 10)).unwrap();
        assert_eq!(risk.risk_score, 100.0);
        assert_eq!(risk.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_factor_severity() {
        let moderate = iuu_risk("mpa-1", &summary(2000.0, 5, 6)).unwrap();
        assert_eq!(moderate.factors.len(), 2);
        assert_eq!(moderate.factors[0].kind, RiskFactorKind::HighFishingActivity);
        assert_eq!(moderate.factors[0].severity, Severity::Medium);
        assert_eq!(moderate.factors[1].kind, RiskFactorKind::MultipleFlags);
        assert_eq!(moderate.factors[1].count, 6);
        assert_eq!(moderate.factors[1].severity, Severity::Medium);
        // 20 + 18 + 5
        assert_eq!(moderate.risk_level, RiskLevel::High);

        let severe = iuu_risk("mpa-1", &summary(6000.0, 5, 11)).unwrap();
        assert!(severe.factors.iter().all(|f| f.severity == Severity::High));
    }

    #[test]
    fn test_thresholds_are_strict() {
        let at_limit = iuu_risk("mpa-1", &summary(1000.0, 1, 5)).unwrap();
        assert!(at_limit.factors.is_empty());
    }
}
