//! Composite health score computation
//!
//! `compute_health` is a pure function of the current inputs. It is called
//! again every time any input settles, so partial results appear as soon as
//! the first provider answers.
//!
//! ## Tiers
//!
//! ```text
//! remote usable?
//!   yes ─► remote score ─► blend community (10%) ─► blend fishing (10%)
//!   no  ─► weighted mean of local sub-scores, renormalized over what exists
//! ```

use serde_json::json;

use super::providers::{CommunityAverage, HabitatSummary, PopulationSummary, TrackingSummary, TrendClass};
use super::remote::{RemoteBreakdown, RemoteHealthScore};
use super::types::*;
use crate::fishing::{ComplianceScore, Confidence};

const POPULATION_WEIGHT: f64 = 0.35;
const HABITAT_WEIGHT: f64 = 0.30;
const DIVERSITY_WEIGHT: f64 = 0.25;
const BASE_WEIGHT_TOTAL: f64 = POPULATION_WEIGHT + HABITAT_WEIGHT + DIVERSITY_WEIGHT;

/// Fixed share given to community assessments and fishing compliance
const BLEND_WEIGHT: f64 = 0.10;

/// Used when a provider answered without a usable figure
const NEUTRAL_SCORE: f64 = 50.0;

const INCREASING_SCORE: f64 = 100.0;
const STABLE_SCORE: f64 = 70.0;
const DECREASING_SCORE: f64 = 30.0;

const POINTS_PER_INDICATOR_SPECIES: f64 = 5.0;
const TRACKING_BONUS: f64 = 10.0;

// ============================================================================
// Inputs
// ============================================================================

/// Lifecycle of one input
#[derive(Debug, Clone, PartialEq)]
pub enum InputState<T> {
    /// Not requested
    Absent,
    /// Request outstanding
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> Default for InputState<T> {
    fn default() -> Self {
        InputState::Absent
    }
}

impl<T> InputState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            InputState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, InputState::Pending)
    }
}

/// Current state of every input for one region
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthInputs {
    pub remote: InputState<RemoteHealthScore>,
    pub population: InputState<PopulationSummary>,
    pub habitat: InputState<HabitatSummary>,
    pub tracking: InputState<TrackingSummary>,
    pub community: InputState<CommunityAverage>,
    /// `Ready(None)` when the fishing summary held no data
    pub fishing: InputState<Option<ComplianceScore>>,
    /// Indicator species known for the region
    pub indicator_species_count: u32,
}

impl HealthInputs {
    pub fn any_pending(&self) -> bool {
        self.remote.is_pending()
            || self.population.is_pending()
            || self.habitat.is_pending()
            || self.tracking.is_pending()
            || self.community.is_pending()
            || self.fishing.is_pending()
    }

    fn community_score(&self) -> Option<(f64, &CommunityAverage)> {
        let community = self.community.ready()?;
        if community.count == 0 {
            return None;
        }
        let average = community.average_score?;
        Some(((average * 10.0).clamp(0.0, 100.0), community))
    }

    fn compliance(&self) -> Option<&ComplianceScore> {
        self.fishing.ready()?.as_ref()
    }
}

// ============================================================================
// Sub-scores
// ============================================================================

/// Upstream biodiversity index, else mean of classified species trends
pub fn population_score(summary: &PopulationSummary) -> f64 {
    if let Some(index) = summary.overall_biodiversity {
        return index.clamp(0.0, 100.0);
    }

    let classified: Vec<f64> = summary
        .species_trends
        .iter()
        .filter_map(|t| match t.trend {
            TrendClass::Increasing => Some(INCREASING_SCORE),
            TrendClass::Stable => Some(STABLE_SCORE),
            TrendClass::Decreasing => Some(DECREASING_SCORE),
            TrendClass::InsufficientData => None,
        })
        .collect();

    if classified.is_empty() {
        NEUTRAL_SCORE
    } else {
        classified.iter().sum::<f64>() / classified.len() as f64
    }
}

pub fn habitat_score(summary: &HabitatSummary) -> f64 {
    summary
        .habitat_quality_score
        .map_or(NEUTRAL_SCORE, |s| s.clamp(0.0, 100.0))
}

pub fn diversity_score(indicator_species: u32, has_tracked_individuals: bool) -> f64 {
    let base = (indicator_species as f64 * POINTS_PER_INDICATOR_SPECIES).min(100.0);
    let bonus = if has_tracked_individuals { TRACKING_BONUS } else { 0.0 };
    (base + bonus).min(100.0)
}

/// Same thresholds for both tiers
pub fn confidence_for(sources: u8) -> Confidence {
    match sources {
        n if n >= 4 => Confidence::High,
        n if n >= 2 => Confidence::Medium,
        _ => Confidence::Low,
    }
}

// ============================================================================
// Composite
// ============================================================================

/// Compute the composite score for the current inputs
pub fn compute_health(inputs: &HealthInputs) -> CompositeHealthScore {
    let community = inputs.community_score().map(|(score, avg)| {
        (
            score,
            CommunityDetail {
                average_score: avg.average_score.unwrap_or_default(),
                assessment_count: avg.count,
            },
        )
    });
    let fishing = inputs.compliance().map(|c| {
        (
            c.score,
            FishingDetail {
                compliance_score: c.score,
                violations: c.violations,
                trend: c.trend,
                fishing_hours_inside: c.fishing_hours_inside,
            },
        )
    });

    let community_score = community.as_ref().map(|(s, _)| *s);
    let fishing_score = fishing.as_ref().map(|(s, _)| *s);

    let mut result = match inputs.remote.ready().filter(|r| r.is_usable()) {
        Some(remote) => remote_tier(remote, inputs, community_score, fishing_score),
        None => local_tier(inputs, community_score, fishing_score),
    };

    result.community = community.map(|(_, detail)| detail);
    result.fishing = fishing.map(|(_, detail)| detail);
    result.loading = inputs.any_pending();
    result
}

fn remote_tier(
    remote: &RemoteHealthScore,
    inputs: &HealthInputs,
    community: Option<f64>,
    fishing: Option<f64>,
) -> CompositeHealthScore {
    let mut score = remote.score;
    let mut retained = 1.0;

    // Community first, then fishing
    if let Some(community) = community {
        score = score * (1.0 - BLEND_WEIGHT) + community * BLEND_WEIGHT;
        retained *= 1.0 - BLEND_WEIGHT;
    }
    if let Some(fishing) = fishing {
        score = score * (1.0 - BLEND_WEIGHT) + fishing * BLEND_WEIGHT;
        retained *= 1.0 - BLEND_WEIGHT;
    }

    let parts = &remote.breakdown;
    let env = &remote.environmental;
    let remote_entry = |value: f64, weight: f64, available: bool| {
        let entry = BreakdownEntry::available(value, weight * retained);
        BreakdownEntry { available, ..entry }
    };

    let mut breakdown = empty_breakdown();
    breakdown.insert(
        SubScore::SpeciesDiversity,
        remote_entry(
            parts.biodiversity,
            RemoteBreakdown::BIODIVERSITY_WEIGHT,
            remote.species.total_species > 0,
        )
        .with_extra("totalSpecies", remote.species.total_species),
    );
    breakdown.insert(
        SubScore::HabitatQuality,
        remote_entry(
            parts.water_quality,
            RemoteBreakdown::WATER_QUALITY_WEIGHT,
            env.has_water_quality(),
        ),
    );
    breakdown.insert(
        SubScore::ThermalStress,
        remote_entry(
            parts.thermal_stress,
            RemoteBreakdown::THERMAL_STRESS_WEIGHT,
            env.sst_anomaly.is_some(),
        ),
    );
    breakdown.insert(
        SubScore::Productivity,
        remote_entry(
            parts.productivity,
            RemoteBreakdown::PRODUCTIVITY_WEIGHT,
            env.chlorophyll.is_some(),
        ),
    );

    if let Some(community) = community {
        let weight = if fishing.is_some() {
            BLEND_WEIGHT * (1.0 - BLEND_WEIGHT)
        } else {
            BLEND_WEIGHT
        };
        breakdown.insert(SubScore::CommunityAssessment, BreakdownEntry::available(community, weight));
    }
    if let Some(fishing) = fishing {
        breakdown.insert(SubScore::FishingCompliance, BreakdownEntry::available(fishing, BLEND_WEIGHT));
    }
    if let Some(population) = inputs.population.ready() {
        breakdown.insert(
            SubScore::PopulationTrend,
            BreakdownEntry::available(population_score(population), 0.0).with_extra("informational", true),
        );
    }

    let sources = available_count(&breakdown);
    CompositeHealthScore {
        score: to_score(score),
        confidence: confidence_for(sources),
        data_sources_available: sources,
        source: ScoreSource::Remote,
        breakdown,
        environmental: Some(env.detail()),
        community: None,
        fishing: None,
        loading: false,
    }
}

fn local_tier(inputs: &HealthInputs, community: Option<f64>, fishing: Option<f64>) -> CompositeHealthScore {
    let tracked = inputs.tracking.ready().map(|t| t.tracked_individuals);
    let diversity = (inputs.indicator_species_count > 0 || tracked.is_some())
        .then(|| diversity_score(inputs.indicator_species_count, tracked.unwrap_or(0) > 0));

    // Base three shrink to make room for whichever blend sources exist
    let blend_share = BLEND_WEIGHT * [community, fishing].iter().filter(|s| s.is_some()).count() as f64;
    let base_scale = (1.0 - blend_share) / BASE_WEIGHT_TOTAL;

    let candidates = [
        (
            SubScore::PopulationTrend,
            inputs.population.ready().map(population_score),
            POPULATION_WEIGHT * base_scale,
        ),
        (
            SubScore::HabitatQuality,
            inputs.habitat.ready().map(habitat_score),
            HABITAT_WEIGHT * base_scale,
        ),
        (SubScore::SpeciesDiversity, diversity, DIVERSITY_WEIGHT * base_scale),
        (SubScore::CommunityAssessment, community, BLEND_WEIGHT),
        (SubScore::FishingCompliance, fishing, BLEND_WEIGHT),
    ];

    let available_weight: f64 = candidates
        .iter()
        .filter(|(_, score, _)| score.is_some())
        .map(|(_, _, weight)| weight)
        .sum();

    let mut breakdown = empty_breakdown();
    if available_weight <= 0.0 {
        return CompositeHealthScore {
            score: 0,
            confidence: Confidence::Low,
            data_sources_available: 0,
            source: ScoreSource::Local,
            breakdown,
            environmental: None,
            community: None,
            fishing: None,
            loading: false,
        };
    }

    let mut total = 0.0;
    for (sub_score, score, weight) in candidates {
        if let Some(score) = score {
            let weight = weight / available_weight;
            total += score * weight;
            breakdown.insert(sub_score, BreakdownEntry::available(score, weight));
        }
    }

    if let Some(entry) = breakdown.get_mut(&SubScore::SpeciesDiversity) {
        if entry.available {
            entry.extras.insert("indicatorSpecies".into(), json!(inputs.indicator_species_count));
            entry.extras.insert("trackedIndividuals".into(), json!(tracked.unwrap_or(0)));
        }
    }

    let sources = available_count(&breakdown);
    CompositeHealthScore {
        score: to_score(total),
        confidence: confidence_for(sources),
        data_sources_available: sources,
        source: ScoreSource::Local,
        breakdown,
        environmental: None,
        community: None,
        fishing: None,
        loading: false,
    }
}

fn empty_breakdown() -> HealthBreakdown {
    SubScore::ALL
        .iter()
        .map(|s| (*s, BreakdownEntry::unavailable()))
        .collect()
}

fn available_count(breakdown: &HealthBreakdown) -> u8 {
    breakdown.values().filter(|e| e.available).count() as u8
}

fn to_score(value: f64) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}
