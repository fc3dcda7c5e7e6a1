//! Resilient client for the fishing-activity surveillance API
//!
//! Authenticated calls with a hard client-side timeout and a bounded retry
//! budget. Rate limits back off exponentially (or per `Retry-After`), gateway
//! timeouts retry after a fixed delay, and every other failure returns at once.

pub mod client;
pub mod error;
pub mod query;

pub use client::{
    GatewayClient, GatewayConfig, RetryPolicy, Secret, Sleeper, TokioSleeper, DEFAULT_BASE_URL,
};
pub use error::{ClientError, ErrorCategory, ErrorKind};
pub use query::{encode_query, feature_body, indexed_array, QueryParams};
