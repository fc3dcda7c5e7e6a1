//! Ocean PULSE - marine protected area health fusion
//!
//! Fuses several unreliable upstream providers into one per-region health
//! score with a confidence rating, degrading gracefully when any source is
//! slow, rate-limited, failing or missing.
//!
//! ## Modules
//!
//! - **Gateway**: authenticated, retrying client for the fishing surveillance API
//! - **Fishing**: one report call per region, summarized into effort, compliance and IUU risk
//! - **Cache**: TTL cache, single-flight fetches and stale-while-revalidate
//! - **Health**: remote-preferred composite score with local fallback

pub mod cache;
pub mod config;
pub mod fishing;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod types;

pub use config::Args;
pub use types::{PulseError, Result};
