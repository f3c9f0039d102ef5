//! Upstream dependency errors.

use thiserror::Error;

/// Failure of a call to an external collaborator (store, topic, parameter service, files).
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Endpoint or connection string could not be turned into a URL.
    #[error("Invalid endpoint '{0}'")]
    Endpoint(String),

    /// The upstream accepted the call but refused the operation.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Errors resolving a named secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// No value exists for a mandatory secret name.
    #[error("Secret '{0}' is not configured")]
    NotConfigured(String),

    #[error("Secret '{0}' resolved to an empty value")]
    Empty(String),

    #[error("Failed to fetch secret '{name}': {source}")]
    Upstream {
        name: String,
        #[source]
        source: UpstreamError,
    },
}
