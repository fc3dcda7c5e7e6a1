//! Structured errors for the surveillance API boundary
//!
//! The error kind is decided once, where the HTTP response (or transport
//! failure) is observed. Callers branch on [`ErrorKind`], never on message text.

use serde::Serialize;
use thiserror::Error;

/// Classification of a failed upstream call
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream is down or unreachable (5xx other than 504, connect failure)
    #[error("service unavailable")]
    ServiceUnavailable,
    /// Request rejected as malformed (400, 404, 422)
    #[error("malformed request")]
    MalformedRequest,
    /// Credentials rejected (401, 403)
    #[error("authentication failed")]
    AuthFailure,
    /// Rate limit hit (429)
    #[error("rate limited")]
    RateLimited,
    /// Gateway timeout (504) or client-side timeout
    #[error("timeout")]
    Timeout,
    /// No credentials configured, no call was made
    #[error("not configured")]
    NotConfigured,
    /// Anything else, including undecodable bodies
    #[error("request failed")]
    Generic,
}

/// Coarse grouping used for propagation and user messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Retried within budget, then surfaced as temporarily unavailable
    TransientRetryable,
    /// Surfaced immediately, never retried
    NonRetryableRemote,
    /// Short-circuited before any network activity
    NotConfigured,
}

impl ErrorKind {
    /// Map an HTTP status to a kind
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 404 | 422 => ErrorKind::MalformedRequest,
            401 | 403 => ErrorKind::AuthFailure,
            429 => ErrorKind::RateLimited,
            504 => ErrorKind::Timeout,
            500..=599 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::Generic,
        }
    }

    /// Whether the client retries this kind within its budget
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::Timeout)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::RateLimited | ErrorKind::Timeout => ErrorCategory::TransientRetryable,
            ErrorKind::NotConfigured => ErrorCategory::NotConfigured,
            _ => ErrorCategory::NonRetryableRemote,
        }
    }

    /// Message suitable for showing to an end user
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::NotConfigured => {
                "Fishing activity data is not configured. An administrator must add API credentials."
            }
            ErrorKind::AuthFailure => {
                "Authentication with the fishing data provider failed. API credentials need rotating."
            }
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::ServiceUnavailable => {
                "Fishing activity data is temporarily unavailable. Please try again later."
            }
            ErrorKind::MalformedRequest => "The fishing data request was rejected as invalid.",
            ErrorKind::Generic => "Failed to load fishing activity data.",
        }
    }
}

/// Error returned by [`GatewayClient::request`](super::GatewayClient::request)
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind} (status: {status:?}, retries exhausted: {retries_exhausted}): {raw_body}")]
pub struct ClientError {
    /// HTTP status, absent for transport failures and timeouts
    pub status: Option<u16>,
    /// Raw response body or transport error text
    pub raw_body: String,
    pub kind: ErrorKind,
    /// True when the retry budget was spent on a transient failure
    pub retries_exhausted: bool,
}

impl ClientError {
    /// Error for a non-2xx response
    pub fn from_status(status: u16, raw_body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            raw_body: raw_body.into(),
            kind: ErrorKind::from_status(status),
            retries_exhausted: false,
        }
    }

    /// Client-side timeout or aborted call
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::without_status(ErrorKind::Timeout, message)
    }

    /// Connection-level failure (DNS, refused, TLS)
    pub fn transport(message: impl Into<String>) -> Self {
        Self::without_status(ErrorKind::ServiceUnavailable, message)
    }

    /// Credentials missing; raised by the capability probe
    pub fn not_configured() -> Self {
        Self::without_status(ErrorKind::NotConfigured, "API token is not configured")
    }

    /// 2xx response whose body could not be understood
    pub fn decode(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            raw_body: message.into(),
            kind: ErrorKind::Generic,
            retries_exhausted: false,
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::without_status(ErrorKind::Generic, message)
    }

    fn without_status(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: None,
            raw_body: message.into(),
            kind,
            retries_exhausted: false,
        }
    }

    /// Mark the error as the final failure after the retry budget ran out
    pub fn exhausted(mut self) -> Self {
        self.retries_exhausted = true;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }

    /// Outage, or a transient failure whose retry budget ran out
    pub fn is_temporarily_unavailable(&self) -> bool {
        match self.kind {
            ErrorKind::ServiceUnavailable => true,
            ErrorKind::RateLimited | ErrorKind::Timeout => self.retries_exhausted,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(504), ErrorKind::Timeout);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::ServiceUnavailable);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::AuthFailure);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::AuthFailure);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::MalformedRequest);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Generic);
    }

    #[test]
    fn test_only_rate_limit_and_timeout_retry() {
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::ServiceUnavailable.is_retryable());
        assert!(!ErrorKind::AuthFailure.is_retryable());
        assert!(!ErrorKind::NotConfigured.is_retryable());
    }

    #[test]
    fn test_user_messages_differ_by_category() {
        let not_configured = ClientError::not_configured();
        let auth = ClientError::from_status(401, "{}");
        let limited = ClientError::from_status(429, "slow down").exhausted();

        assert_eq!(not_configured.category(), ErrorCategory::NotConfigured);
        assert_eq!(limited.category(), ErrorCategory::TransientRetryable);
        assert!(not_configured.user_message().contains("administrator"));
        assert!(auth.user_message().contains("rotating"));
        assert!(limited.user_message().contains("temporarily unavailable"));
        assert!(limited.retries_exhausted);
    }

    #[test]
    fn test_exhausted_transient_is_unavailable() {
        assert!(!ClientError::from_status(429, "").is_temporarily_unavailable());
        assert!(ClientError::from_status(429, "").exhausted().is_temporarily_unavailable());
        assert!(ClientError::timeout("deadline").exhausted().is_temporarily_unavailable());
        assert!(ClientError::from_status(503, "").is_temporarily_unavailable());
        assert!(!ClientError::from_status(401, "").exhausted().is_temporarily_unavailable());
        assert!(!ClientError::not_configured().is_temporarily_unavailable());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::from_status(400, "bad geometry");
        let text = format!("{}", err);
        assert!(text.starts_with("malformed request"));
        assert!(text.contains("bad geometry"));
    }
}
