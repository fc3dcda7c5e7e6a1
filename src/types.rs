//! Crate-wide error and result types

use thiserror::Error;

use crate::gateway::ClientError;
use crate::health::ProviderError;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PulseError>;
