//! Typed errors for upstream provider calls
//!
//! Structured variants let callers distinguish failure modes (auth, rate
//! limiting, timeout) without string matching. The engine treats all of them
//! as a failed turn; retry policy belongs to the transport layer.

use thiserror::Error;

/// Upstream provider errors with typed variants
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication token is expired or invalid (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit or quota exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400), a caller bug; should not be retried
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (HTTP 5xx)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Network connectivity issue (connection refused, transport timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The bounded wait for the upstream call elapsed
    #[error("Provider call timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    /// The provider answered but the body was not a usable completion
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Other errors not fitting the above categories
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// Whether the transport layer may reasonably retry this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unauthorized(_)
                | ProviderError::RateLimited(_)
                | ProviderError::ServiceError(_)
                | ProviderError::Network(_)
                | ProviderError::Timeout { .. }
        )
    }

    /// Convert an HTTP status code and error body into a typed error
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 => ProviderError::Unauthorized(error_text),
            429 => ProviderError::RateLimited(error_text),
            400 => ProviderError::BadRequest(error_text),
            500..=599 => ProviderError::ServiceError(error_text),
            _ => ProviderError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert a transport-level error into a typed error
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            ProviderError::Network(format!("Connection failed: {}", e))
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else {
            ProviderError::Other(e.into())
        }
    }
}
