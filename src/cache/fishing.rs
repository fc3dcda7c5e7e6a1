//! Cached access to fishing summaries
//!
//! Fresh entries are served without touching the network. Stale entries are
//! served immediately while a background refresh runs. Misses block on a
//! single-flight fetch, so concurrent callers for one region share one call.

use std::sync::Arc;
use tracing::{debug, info};

use super::single_flight::{SingleFlight, Waiter};
use super::ttl::{CacheLookup, CacheTtls, Clock, SystemClock, TtlCache};
use crate::fishing::{
    derive_activity, DateRange, FishingActivity, FishingAggregator, FishingEffortSummary,
    ProtectionLevel, RegionArea,
};
use crate::gateway::ClientError;

pub type SharedSummary = Arc<FishingEffortSummary>;

/// What to fetch for one region
#[derive(Debug, Clone, PartialEq)]
pub struct FishingQuery {
    /// Cache and single-flight key
    pub region_id: String,
    pub area: RegionArea,
    pub date_range: DateRange,
}

/// Where a summary came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Cache hit within TTL
    Fresh,
    /// Expired or force-refreshed cache hit; a refresh is running
    Stale,
    /// Fetched from upstream for this call
    Network,
}

#[derive(Debug, Clone)]
pub struct FishingRead {
    pub summary: SharedSummary,
    pub source: ReadSource,
}

/// Cache plus single-flight in front of the aggregator
pub struct FishingDataService {
    aggregator: Arc<FishingAggregator>,
    cache: Arc<TtlCache<SharedSummary>>,
    flights: Arc<SingleFlight<SharedSummary, ClientError>>,
}

impl FishingDataService {
    pub fn new(aggregator: Arc<FishingAggregator>, ttls: &CacheTtls, clock: Arc<dyn Clock>) -> Self {
        Self {
            aggregator,
            cache: Arc::new(TtlCache::new(ttls.fishing, clock)),
            flights: Arc::new(SingleFlight::new()),
        }
    }

    /// Create with default TTLs and the system clock
    pub fn with_defaults(aggregator: Arc<FishingAggregator>) -> Self {
        Self::new(aggregator, &CacheTtls::default(), Arc::new(SystemClock))
    }

    /// Whether upstream credentials exist; no call is made otherwise
    pub fn is_configured(&self) -> bool {
        self.aggregator.client().is_configured()
    }

    pub fn cache(&self) -> &TtlCache<SharedSummary> {
        &self.cache
    }

    pub fn cached(&self, region_id: &str) -> Option<CacheLookup<SharedSummary>> {
        self.cache.get(region_id)
    }

    /// Whether a fetch for `region_id` is running
    pub fn is_fetching(&self, region_id: &str) -> bool {
        self.flights.is_in_flight(region_id)
    }

    /// Read a region's summary through the cache
    pub async fn get_summary(
        &self,
        query: &FishingQuery,
        force_refresh: bool,
    ) -> Result<FishingRead, ClientError> {
        match self.cache.get(&query.region_id) {
            Some(hit) if hit.fresh && !force_refresh => {
                debug!(region_id = %query.region_id, "Fishing cache hit");
                Ok(FishingRead {
                    summary: hit.value,
                    source: ReadSource::Fresh,
                })
            }
            Some(hit) => {
                debug!(
                    region_id = %query.region_id,
                    age_secs = hit.age.as_secs(),
                    forced = force_refresh,
                    "Serving stale fishing summary, refreshing in background"
                );
                self.spawn_refresh(query);
                Ok(FishingRead {
                    summary: hit.value,
                    source: ReadSource::Stale,
                })
            }
            None => {
                let summary = self.start_fetch(query).wait().await?;
                Ok(FishingRead {
                    summary,
                    source: ReadSource::Network,
                })
            }
        }
    }

    /// Wait for the refresh running for `region_id`, if any
    pub async fn await_refresh(&self, region_id: &str) -> Option<Result<SharedSummary, ClientError>> {
        let waiter = self.flights.attach(region_id)?;
        Some(waiter.wait().await)
    }

    /// Summary plus derived compliance and IUU risk
    pub async fn activity(
        &self,
        query: &FishingQuery,
        protection: Option<ProtectionLevel>,
        established_year: Option<i32>,
        current_year: i32,
    ) -> Result<FishingActivity, ClientError> {
        let read = self.get_summary(query, false).await?;
        Ok(derive_activity(
            &query.region_id,
            read.summary.as_ref().clone(),
            protection,
            established_year,
            current_year,
        ))
    }

    fn start_fetch(&self, query: &FishingQuery) -> Waiter<SharedSummary, ClientError> {
        let aggregator = self.aggregator.clone();
        let cache = self.cache.clone();
        let query = query.clone();
        let key = query.region_id.clone();

        self.flights.join(&key, move || async move {
            let summary = Arc::new(aggregator.fetch_summary(&query.area, query.date_range).await?);
            cache.set(&query.region_id, summary.clone());
            info!(region_id = %query.region_id, "Fishing summary cached");
            Ok(summary)
        })
    }

    fn spawn_refresh(&self, query: &FishingQuery) {
        let waiter = self.start_fetch(query);
        let region_id = query.region_id.clone();
        tokio::spawn(async move {
            if let Err(e) = waiter.wait().await {
                debug!(region_id = %region_id, error = %e, "Background refresh failed, keeping stale entry");
            }
        });
    }
}
