//! Compliance score derived from a fishing effort summary
//!
//! No network access: everything comes from the already-fetched summary.
//! An empty summary yields `None`, because absence of data must never read
//! as perfect compliance.

use super::types::*;

/// Relative change in mean effort that counts as a real trend
const TREND_THRESHOLD: f64 = 0.20;
/// Months compared on each side of the trend window
const TREND_WINDOW: usize = 3;

/// Score fishing compliance for a protected region
pub fn compliance_score(
    region_id: &str,
    summary: &FishingEffortSummary,
    protection: ProtectionLevel,
    established_year: Option<i32>,
    current_year: i32,
) -> Option<ComplianceScore> {
    if summary.is_empty() {
        return None;
    }

    let hours = summary.total_hours;
    let (score, violations) = match protection {
        ProtectionLevel::NoTake => ((100.0 - hours * 0.5).max(0.0), summary.total_vessels),
        ProtectionLevel::Partial => {
            let pressure = (hours / 1000.0).min(1.0);
            ((100.0 - pressure * 50.0).max(0.0), (hours / 500.0).floor() as u32)
        }
    };

    Some(ComplianceScore {
        region_id: region_id.to_string(),
        score,
        fishing_hours_inside: hours,
        violations,
        trend: effort_trend(summary),
        confidence: sample_confidence(summary.monthly_samples()),
        protection_effectiveness: protection_effectiveness(established_year, current_year),
    })
}

/// Compare the latest three months against the three before them.
///
/// Less fishing inside a protected area is an improvement.
pub fn effort_trend(summary: &FishingEffortSummary) -> Trend {
    let Some(months) = summary.monthly_trend.as_deref() else {
        return Trend::Stable;
    };
    if months.len() < TREND_WINDOW * 2 {
        return Trend::Stable;
    }

    let mean = |window: &[MonthlyEffort]| {
        window.iter().map(|m| m.hours).sum::<f64>() / window.len() as f64
    };
    let recent = mean(&months[months.len() - TREND_WINDOW..]);
    let prior = mean(&months[months.len() - TREND_WINDOW * 2..months.len() - TREND_WINDOW]);

    if prior == 0.0 {
        return if recent > 0.0 { Trend::Declining } else { Trend::Stable };
    }

    let change = (recent - prior) / prior;
    if change < -TREND_THRESHOLD {
        Trend::Improving
    } else if change > TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// 25 at designation, +5 per year protected, capped at 75
pub fn protection_effectiveness(established_year: Option<i32>, current_year: i32) -> f64 {
    let years = established_year.map_or(0, |year| (current_year - year).max(0));
    (25.0 + years as f64 * 5.0).min(75.0)
}

fn sample_confidence(samples: usize) -> Confidence {
    if samples >= 12 {
        Confidence::High
    } else if samples >= 6 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn summary(hours: f64, vessels: u32, monthly: Option<Vec<f64>>) -> FishingEffortSummary {
        FishingEffortSummary {
            total_hours: hours,
            total_vessels: vessels,
            flag_count: 0,
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ),
            by_flag: vec![],
            by_gear_type: vec![],
            hotspots: vec![],
            monthly_trend: monthly.map(|values| {
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, hours)| MonthlyEffort {
                        month: format!("2024-{:02}", i + 1),
                        hours,
                    })
                    .collect()
            }),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_no_data_is_not_compliance() {
        let empty = summary(0.0, 0, None);
        assert!(compliance_score("mpa-1", &empty, ProtectionLevel::NoTake, None, 2024).is_none());
        assert!(compliance_score("mpa-1", &empty, ProtectionLevel::Partial, None, 2024).is_none());
    }

    #[test]
    fn test_no_take_scoring() {
        let s = summary(200.0, 5, None);
        let score = compliance_score("mpa-1", &s, ProtectionLevel::NoTake, None, 2024).unwrap();
        assert_eq!(score.score, 0.0);
        assert_eq!(score.violations, 5);
        assert_eq!(score.fishing_hours_inside, 200.0);

        let light = summary(40.0, 1, None);
        let score = compliance_score("mpa-1", &light, ProtectionLevel::NoTake, None, 2024).unwrap();
        assert_eq!(score.score, 80.0);
    }

    #[test]
    fn test_partial_scoring() {
        let s = summary(500.0, 3, None);
        let score = compliance_score("mpa-1", &s, ProtectionLevel::Partial, None, 2024).unwrap();
        assert_eq!(score.score, 75.0);
        assert_eq!(score.violations, 1);

        let heavy = summary(4000.0, 3, None);
        let score = compliance_score("mpa-1", &heavy, ProtectionLevel::Partial, None, 2024).unwrap();
        assert_eq!(score.score, 50.0);
        assert_eq!(score.violations, 8);
    }

    #[test]
    fn test_vessels_without_hours_still_scored() {
        let s = summary(0.0, 2, None);
        let score = compliance_score("mpa-1", &s, ProtectionLevel::NoTake, None, 2024).unwrap();
        assert_eq!(score.score, 100.0);
        assert_eq!(score.violations, 2);
    }

    #[test]
    fn test_trend_needs_six_months() {
        let short = summary(10.0, 1, Some(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(effort_trend(&short), Trend::Stable);
    }

    #[test]
    fn test_trend_direction() {
        let falling = summary(10.0, 1, Some(vec![10.0, 10.0, 10.0, 5.0, 5.0, 5.0]));
        assert_eq!(effort_trend(&falling), Trend::Improving);

        let rising = summary(10.0, 1, Some(vec![10.0, 10.0, 10.0, 15.0, 15.0, 15.0]));
        assert_eq!(effort_trend(&rising), Trend::Declining);

        let flat = summary(10.0, 1, Some(vec![10.0, 10.0, 10.0, 11.0, 11.0, 11.0]));
        assert_eq!(effort_trend(&flat), Trend::Stable);

        // only the last six months matter
        let long = summary(
            10.0,
            1,
            Some(vec![100.0, 100.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0]),
        );
        assert_eq!(effort_trend(&long), Trend::Stable);

        let from_zero = summary(10.0, 1, Some(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]));
        assert_eq!(effort_trend(&from_zero), Trend::Declining);
    }

    #[test]
    fn test_protection_effectiveness_capped() {
        assert_eq!(protection_effectiveness(None, 2024), 25.0);
        assert_eq!(protection_effectiveness(Some(2020), 2024), 45.0);
        assert_eq!(protection_effectiveness(Some(1990), 2024), 75.0);
        assert_eq!(protection_effectiveness(Some(2030), 2024), 25.0);
    }

    #[test]
    fn test_confidence_from_samples() {
        let twelve = summary(10.0, 1, Some(vec![1.0; 12]));
        let six = summary(10.0, 1, Some(vec![1.0; 6]));
        let none = summary(10.0, 1, None);
        let score = |s: &FishingEffortSummary| {
            compliance_score("mpa-1", s, ProtectionLevel::Partial, None, 2024)
                .unwrap()
                .confidence
        };
        assert_eq!(score(&twelve), Confidence::High);
        assert_eq!(score(&six), Confidence::Medium);
        assert_eq!(score(&none), Confidence::Low);
    }
}
