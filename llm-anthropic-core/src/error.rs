//! Adapter error types and handling

use crate::options::ValidationError;
use thiserror::Error;

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur while executing a request against the Messages API
///
/// Configuration errors (`Validation`, `MissingKey`) are detected before any
/// network call. Everything else is request-scoped and propagated to the
/// caller without local retry.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Invalid option values or mutually exclusive options set together
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No API key available for the request
    #[error("No API key found: set {var} or provide a key explicitly")]
    MissingKey { var: &'static str },

    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// The provider rejected the request as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Requested model does not exist
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Provider is overloaded or temporarily unavailable
    #[error("Service temporarily unavailable: {0}")]
    ServiceUnavailable(String),

    /// Provider returned an error outside the known taxonomy
    #[error("Provider error: {code}: {message}")]
    Provider { code: String, message: String },

    /// Response parsing error
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The stream ended before the provider signalled completion
    #[error("Stream ended unexpectedly: {0}")]
    IncompleteStream(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            AdapterError::Network(format!("Connection failed: {}", err))
        } else if err.is_status() {
            match err.status().map(|s| s.as_u16()) {
                Some(401) => AdapterError::Authentication(err.to_string()),
                Some(429) => AdapterError::RateLimit(err.to_string()),
                Some(500..=599) => AdapterError::ServiceUnavailable(err.to_string()),
                Some(code) => AdapterError::Provider {
                    code: code.to_string(),
                    message: err.to_string(),
                },
                None => AdapterError::Network(err.to_string()),
            }
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}
