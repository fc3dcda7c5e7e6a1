//! Region health score
//!
//! Up to seven sub-scores are fused into one 0-100 score with a confidence
//! rating. A precomputed remote score is preferred when reachable; otherwise
//! the score is computed locally from whatever providers answered.

pub mod monitor;
pub mod providers;
pub mod remote;
pub mod scoring;
pub mod types;

pub use monitor::{HealthMonitor, HealthProviders, InputEvent, RegionTarget};
pub use providers::{
    CommunityAssessmentStore, CommunityAverage, HabitatParameter, HabitatProvider, HabitatSummary,
    PopulationSummary, PopulationTrendProvider, ProviderError, RemoteCompositeScoreProvider,
    SpeciesTrend, TrackingProvider, TrackingSummary, TrendClass, UnconfiguredProvider,
};
pub use remote::{
    CachedRemoteProvider, DataServiceClient, DataServiceConfig, RemoteBreakdown,
    RemoteEnvironmental, RemoteHealthScore, RemoteSpecies,
};
pub use scoring::{
    compute_health, confidence_for, diversity_score, habitat_score, population_score,
    HealthInputs, InputState,
};
pub use types::*;
