//! Error types for Dot Traffic.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a job/client record store.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Lookup store not configured: {0}")]
    NotConfigured(String),

    #[error("Lookup request to {store} failed: {reason}")]
    RequestFailed { store: String, reason: String },

    #[error("Lookup request to {store} timed out after {timeout:?}")]
    Timeout { store: String, timeout: Duration },

    #[error("Unexpected response from {store}: {reason}")]
    InvalidResponse { store: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the routing decision itself.
///
/// Malformed inference output is not listed: the classifier recovers it into
/// a `clarify` judgment instead of failing the request.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Lookup unavailable: {0}")]
    LookupUnavailable(#[source] LookupError),

    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(#[source] LlmError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
