//! Caller-facing fishing state for the region currently in view
//!
//! Each request gets a token; a completing task publishes only while its
//! token is still current, so a late response never overwrites the state of
//! a newer request. Switching regions aborts the superseded task.

use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::fishing::{FishingDataService, FishingQuery, ReadSource, SharedSummary};
use crate::fishing::{
    compliance_score, current_year, iuu_risk, DateRange, FishingActivity, ProtectionLevel,
    RegionArea,
};
use crate::gateway::ClientError;

/// Progress published once the summary is in hand
const PROGRESS_STARTED: u8 = 10;
const PROGRESS_SUMMARY: u8 = 70;
const PROGRESS_COMPLIANCE: u8 = 85;
const PROGRESS_RISK: u8 = 95;
const PROGRESS_DONE: u8 = 100;

/// One region to track
#[derive(Debug, Clone, PartialEq)]
pub struct FishingRequest {
    pub region_id: String,
    pub area: RegionArea,
    /// Defaults to the trailing year
    pub date_range: Option<DateRange>,
    /// Defaults to partial protection
    pub protection: Option<ProtectionLevel>,
    pub established_year: Option<i32>,
}

impl FishingRequest {
    pub fn new(region_id: impl Into<String>, area: RegionArea) -> Self {
        Self {
            region_id: region_id.into(),
            area,
            date_range: None,
            protection: None,
            established_year: None,
        }
    }

    pub fn query(&self) -> FishingQuery {
        FishingQuery {
            region_id: self.region_id.clone(),
            area: self.area.clone(),
            date_range: self
                .date_range
                .unwrap_or_else(|| DateRange::trailing_year(Utc::now().date_naive())),
        }
    }
}

/// Published state of the tracked region
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FishingDataState {
    pub region_id: Option<String>,
    pub data: Option<FishingActivity>,
    pub loading: bool,
    pub error: Option<ClientError>,
    /// Advisory, 0-100
    pub progress: u8,
    pub is_configured: bool,
}

struct TrackerShared {
    service: Arc<FishingDataService>,
    state: watch::Sender<FishingDataState>,
    token: Mutex<Option<Uuid>>,
}

impl TrackerShared {
    /// Apply `update` only if `token` still owns the state
    fn publish(&self, token: Uuid, update: impl FnOnce(&mut FishingDataState)) -> bool {
        let current = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if *current != Some(token) {
            return false;
        }
        self.state.send_modify(update);
        true
    }
}

/// Tracks fishing activity for one region at a time
pub struct FishingActivityTracker {
    shared: Arc<TrackerShared>,
    task: Mutex<Option<JoinHandle<()>>>,
    last_request: Mutex<Option<FishingRequest>>,
}

impl FishingActivityTracker {
    pub fn new(service: Arc<FishingDataService>) -> Self {
        let (state, _) = watch::channel(FishingDataState {
            is_configured: service.is_configured(),
            ..Default::default()
        });
        Self {
            shared: Arc::new(TrackerShared {
                service,
                state,
                token: Mutex::new(None),
            }),
            task: Mutex::new(None),
            last_request: Mutex::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.shared.service.is_configured()
    }

    pub fn subscribe(&self) -> watch::Receiver<FishingDataState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> FishingDataState {
        self.shared.state.borrow().clone()
    }

    /// Start tracking `request`, superseding any earlier request
    pub fn fetch_fishing_data(&self, request: FishingRequest) {
        self.start(request, false);
    }

    /// Re-run the last request, bypassing cache freshness
    pub fn refetch(&self) {
        let last = self
            .last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match last {
            Some(request) => self.start(request, true),
            None => debug!("Refetch requested with nothing tracked"),
        }
    }

    /// Wait until the current request stops loading
    pub async fn settled(&self) -> FishingDataState {
        let mut receiver = self.subscribe();
        let state = match receiver.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    fn start(&self, request: FishingRequest, force_refresh: bool) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        let same_key = self.shared.state.borrow().region_id.as_deref() == Some(request.region_id.as_str());

        if same_key && !force_refresh {
            if let Some(handle) = task.as_ref() {
                if !handle.is_finished() {
                    debug!(region_id = %request.region_id, "Fetch already running for region");
                    return;
                }
            }
        }
        if let Some(handle) = task.take() {
            handle.abort();
        }

        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        let configured = self.shared.service.is_configured();
        let token = Uuid::new_v4();
        {
            let mut current = self.shared.token.lock().unwrap_or_else(|e| e.into_inner());
            *current = Some(token);
            self.shared.state.send_modify(|state| {
                if !same_key {
                    state.data = None;
                }
                state.region_id = Some(request.region_id.clone());
                state.is_configured = configured;
                if configured {
                    state.loading = true;
                    state.error = None;
                    state.progress = PROGRESS_STARTED;
                } else {
                    state.loading = false;
                    state.error = Some(ClientError::not_configured());
                    state.progress = 0;
                }
            });
        }

        if !configured {
            warn!(region_id = %request.region_id, "Fishing API token not configured, skipping fetch");
            return;
        }

        let shared = self.shared.clone();
        *task = Some(tokio::spawn(run_request(shared, token, request, force_refresh)));
    }
}

impl Drop for FishingActivityTracker {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}

async fn run_request(shared: Arc<TrackerShared>, token: Uuid, request: FishingRequest, force_refresh: bool) {
    let query = request.query();

    match shared.service.get_summary(&query, force_refresh).await {
        Ok(read) => {
            publish_activity(&shared, token, &request, read.summary);

            if read.source == ReadSource::Stale {
                let refreshed = match shared.service.await_refresh(&request.region_id).await {
                    Some(Ok(summary)) => Some(summary),
                    Some(Err(_)) => None,
                    None => shared
                        .service
                        .cached(&request.region_id)
                        .filter(|hit| hit.fresh)
                        .map(|hit| hit.value),
                };
                if let Some(summary) = refreshed {
                    publish_activity(&shared, token, &request, summary);
                }
            }
        }
        Err(error) => {
            shared.publish(token, |state| {
                state.loading = false;
                state.progress = PROGRESS_DONE;
                if state.data.is_some() {
                    debug!(region_id = %request.region_id, error = %error, "Fetch failed, keeping existing data");
                } else {
                    warn!(region_id = %request.region_id, kind = %error.kind, "Fishing data unavailable");
                    state.error = Some(error);
                }
            });
        }
    }
}

fn publish_activity(shared: &TrackerShared, token: Uuid, request: &FishingRequest, summary: SharedSummary) {
    if !shared.publish(token, |state| state.progress = PROGRESS_SUMMARY) {
        return;
    }

    let protection = request.protection.unwrap_or(ProtectionLevel::Partial);
    let compliance = compliance_score(
        &request.region_id,
        &summary,
        protection,
        request.established_year,
        current_year(),
    );
    shared.publish(token, |state| state.progress = PROGRESS_COMPLIANCE);

    let risk = iuu_risk(&request.region_id, &summary);
    shared.publish(token, |state| state.progress = PROGRESS_RISK);

    let activity = FishingActivity {
        summary: summary.as_ref().clone(),
        compliance,
        iuu_risk: risk,
    };
    let published = shared.publish(token, |state| {
        state.data = Some(activity);
        state.error = None;
        state.loading = false;
        state.progress = PROGRESS_DONE;
    });
    if published {
        info!(region_id = %request.region_id, "Fishing activity published");
    }
}
