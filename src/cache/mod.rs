//! Request-level caching for upstream data
//!
//! ## Layers
//!
//! - [`TtlCache`]: per-entity entries with an injected clock, served stale past TTL
//! - [`SingleFlight`]: one physical fetch per key, shared by every concurrent caller
//! - [`FishingDataService`]: stale-while-revalidate over the fishing aggregator
//! - [`FishingActivityTracker`]: watch-channel state for the region in view
//!
//! Everything here is owned by the composition root. Nothing is global.

pub mod fishing;
pub mod single_flight;
pub mod tracker;
pub mod ttl;

pub use fishing::{FishingDataService, FishingQuery, FishingRead, ReadSource, SharedSummary};
pub use single_flight::{FlightAborted, SingleFlight, Waiter};
pub use tracker::{FishingActivityTracker, FishingDataState, FishingRequest};
pub use ttl::{CacheLookup, CacheStats, CacheTtls, Clock, ManualClock, SystemClock, TtlCache};
