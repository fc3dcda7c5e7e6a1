//! Fishing activity for a region
//!
//! ## Pipeline
//!
//! - **Aggregator**: one grouped report call, flattened and summarized locally
//! - **Compliance**: protection-aware score derived from the summary
//! - **IUU risk**: additive risk assessment derived from the summary
//!
//! The two derived artifacts never touch the network.

pub mod aggregator;
pub mod compliance;
pub mod iuu;
pub mod types;

pub use aggregator::{flatten_report, summarize, AggregatorConfig, FishingAggregator};
pub use compliance::{compliance_score, effort_trend, protection_effectiveness};
pub use iuu::iuu_risk;
pub use types::*;

/// Derive compliance and IUU risk from one summary, with zero extra calls
pub fn derive_activity(
    region_id: &str,
    summary: FishingEffortSummary,
    protection: Option<ProtectionLevel>,
    established_year: Option<i32>,
    current_year: i32,
) -> FishingActivity {
    let compliance = compliance_score(
        region_id,
        &summary,
        protection.unwrap_or(ProtectionLevel::Partial),
        established_year,
        current_year,
    );
    let iuu_risk = iuu_risk(region_id, &summary);
    FishingActivity {
        summary,
        compliance,
        iuu_risk,
    }
}
