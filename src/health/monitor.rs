//! Concurrent input collection with recompute-on-every-event
//!
//! ```text
//! remote ─────┐
//! population ─┤
//! habitat ────┤  InputEvent   ┌──────────────┐  watch   ┌─────────────┐
//! tracking ───┼────(mpsc)────►│ monitor loop │────────►│ subscribers │
//! community ──┤               │ compute()    │          └─────────────┘
//! fishing ────┘               └──────────────┘
//! ```
//!
//! Every provider runs as its own task. The loop owns the inputs, applies
//! each event as it arrives and publishes a fresh composite.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::providers::*;
use super::remote::RemoteHealthScore;
use super::scoring::{compute_health, HealthInputs, InputState};
use super::types::CompositeHealthScore;
use crate::cache::{FishingDataService, FishingRequest};
use crate::fishing::{compliance_score, current_year, ComplianceScore, ProtectionLevel, RegionArea};
use crate::gateway::ClientError;

/// Region whose health is being computed
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTarget {
    pub region_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Needed for fishing compliance; without it fishing is skipped
    pub area: Option<RegionArea>,
    pub protection: Option<ProtectionLevel>,
    pub established_year: Option<i32>,
    pub indicator_species_count: u32,
}

impl RegionTarget {
    pub fn new(region_id: impl Into<String>, name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            region_id: region_id.into(),
            name: name.into(),
            lat,
            lon,
            area: None,
            protection: None,
            established_year: None,
            indicator_species_count: 0,
        }
    }
}

/// Collaborators to query; `None` leaves that input absent
#[derive(Default, Clone)]
pub struct HealthProviders {
    pub remote: Option<Arc<dyn RemoteCompositeScoreProvider>>,
    pub population: Option<Arc<dyn PopulationTrendProvider>>,
    pub habitat: Option<Arc<dyn HabitatProvider>>,
    pub tracking: Option<Arc<dyn TrackingProvider>>,
    pub community: Option<Arc<dyn CommunityAssessmentStore>>,
    pub fishing: Option<Arc<FishingDataService>>,
}

/// One input settling
#[derive(Debug)]
pub enum InputEvent {
    Remote(Result<RemoteHealthScore, ProviderError>),
    Population(Result<PopulationSummary, ProviderError>),
    Habitat(Result<HabitatSummary, ProviderError>),
    Tracking(Result<TrackingSummary, ProviderError>),
    Community(Result<CommunityAverage, ProviderError>),
    Fishing(Result<Option<ComplianceScore>, ClientError>),
}

impl InputEvent {
    fn name(&self) -> &'static str {
        match self {
            InputEvent::Remote(_) => "remote",
            InputEvent::Population(_) => "population",
            InputEvent::Habitat(_) => "habitat",
            InputEvent::Tracking(_) => "tracking",
            InputEvent::Community(_) => "community",
            InputEvent::Fishing(_) => "fishing",
        }
    }

    fn apply(self, inputs: &mut HealthInputs) {
        fn settle<T, E: std::fmt::Display>(result: Result<T, E>) -> InputState<T> {
            match result {
                Ok(value) => InputState::Ready(value),
                Err(e) => InputState::Failed(e.to_string()),
            }
        }

        match self {
            InputEvent::Remote(r) => inputs.remote = settle(r),
            InputEvent::Population(r) => inputs.population = settle(r),
            InputEvent::Habitat(r) => inputs.habitat = settle(r),
            InputEvent::Tracking(r) => inputs.tracking = settle(r),
            InputEvent::Community(r) => inputs.community = settle(r),
            InputEvent::Fishing(r) => inputs.fishing = settle(r),
        }
    }
}

/// Live composite score for one region
pub struct HealthMonitor {
    receiver: watch::Receiver<CompositeHealthScore>,
    tasks: Vec<JoinHandle<()>>,
}

impl HealthMonitor {
    /// Issue every fetch concurrently and start recomputing
    pub fn spawn(providers: HealthProviders, target: RegionTarget) -> Self {
        let (events, mut incoming) = mpsc::channel::<InputEvent>(16);
        let mut tasks = Vec::new();
        let mut inputs = HealthInputs {
            indicator_species_count: target.indicator_species_count,
            ..Default::default()
        };

        let target = Arc::new(target);

        if let Some(provider) = providers.remote {
            inputs.remote = InputState::Pending;
            let (events, target) = (events.clone(), target.clone());
            tasks.push(tokio::spawn(async move {
                let result = provider
                    .get(&target.region_id, &target.name, target.lat, target.lon)
                    .await;
                let _ = events.send(InputEvent::Remote(result)).await;
            }));
        }
        if let Some(provider) = providers.population {
            inputs.population = InputState::Pending;
            let (events, target) = (events.clone(), target.clone());
            tasks.push(tokio::spawn(async move {
                let result = provider.get_summary(&target.region_id).await;
                let _ = events.send(InputEvent::Population(result)).await;
            }));
        }
        if let Some(provider) = providers.habitat {
            inputs.habitat = InputState::Pending;
            let (events, target) = (events.clone(), target.clone());
            tasks.push(tokio::spawn(async move {
                let result = provider.get_summary(&target.region_id).await;
                let _ = events.send(InputEvent::Habitat(result)).await;
            }));
        }
        if let Some(provider) = providers.tracking {
            inputs.tracking = InputState::Pending;
            let (events, target) = (events.clone(), target.clone());
            tasks.push(tokio::spawn(async move {
                let result = provider.get_summary(&target.region_id).await;
                let _ = events.send(InputEvent::Tracking(result)).await;
            }));
        }
        if let Some(provider) = providers.community {
            inputs.community = InputState::Pending;
            let (events, target) = (events.clone(), target.clone());
            tasks.push(tokio::spawn(async move {
                let result = provider.get_average(&target.region_id).await;
                let _ = events.send(InputEvent::Community(result)).await;
            }));
        }
        match (providers.fishing, target.area.clone()) {
            (Some(service), Some(area)) if service.is_configured() => {
                inputs.fishing = InputState::Pending;
                let (events, target) = (events.clone(), target.clone());
                tasks.push(tokio::spawn(async move {
                    let result = fetch_compliance(&service, &target, area).await;
                    let _ = events.send(InputEvent::Fishing(result)).await;
                }));
            }
            (Some(_), _) => debug!(region_id = %target.region_id, "Fishing input skipped"),
            (None, _) => {}
        }
        drop(events);

        let (sender, receiver) = watch::channel(compute_health(&inputs));
        let region_id = target.region_id.clone();

        tasks.push(tokio::spawn(async move {
            while let Some(event) = incoming.recv().await {
                let name = event.name();
                event.apply(&mut inputs);
                let score = compute_health(&inputs);
                debug!(
                    region_id = %region_id,
                    input = name,
                    score = score.score,
                    loading = score.loading,
                    "Health score recomputed"
                );
                if sender.send(score).is_err() {
                    break;
                }
            }

            let last = sender.borrow();
            info!(
                region_id = %region_id,
                score = last.score,
                confidence = ?last.confidence,
                sources = last.data_sources_available,
                "Health inputs settled"
            );
        }));

        Self { receiver, tasks }
    }

    pub fn subscribe(&self) -> watch::Receiver<CompositeHealthScore> {
        self.receiver.clone()
    }

    pub fn current(&self) -> CompositeHealthScore {
        self.receiver.borrow().clone()
    }

    /// Wait until no input is outstanding
    pub async fn settled(&self) -> CompositeHealthScore {
        let mut receiver = self.receiver.clone();
        let score = match receiver.wait_for(|s| !s.loading).await {
            Ok(score) => score.clone(),
            Err(_) => {
                warn!("Health monitor stopped before settling");
                self.current()
            }
        };
        score
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn fetch_compliance(
    service: &FishingDataService,
    target: &RegionTarget,
    area: RegionArea,
) -> Result<Option<ComplianceScore>, ClientError> {
    let request = FishingRequest {
        region_id: target.region_id.clone(),
        area,
        date_range: None,
        protection: target.protection,
        established_year: target.established_year,
    };
    let read = service.get_summary(&request.query(), false).await?;
    Ok(compliance_score(
        &target.region_id,
        &read.summary,
        target.protection.unwrap_or(ProtectionLevel::Partial),
        target.established_year,
        current_year(),
    ))
}
