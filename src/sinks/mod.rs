//! External collaborators behind trait seams.
//!
//! # Data Flow
//! ```text
//! dispatcher / dead-letter processor
//!     → secrets.rs   (named secret lookup, cached with TTL)
//!     → store.rs     (durable document write)
//!     → publisher.rs (topic publish, returns delivery id)
//! ```
//!
//! # Design Decisions
//! - Every collaborator is an object-safe async trait so tests swap in fakes
//! - HTTP adapters share one pooled `reqwest::Client`
//! - Adapters report failures; deciding what a failure means is the caller's job

pub mod error;
pub mod publisher;
pub mod secrets;
pub mod store;

pub use error::{SecretError, UpstreamError};
pub use publisher::{HttpTopicPublisher, PublishRequest, TopicPublisher};
pub use secrets::{EnvSecretSource, HttpSecretSource, SecretCache, SecretSource, SecretValue};
pub use store::{DocumentStore, HttpDocumentStore};

use url::Url;

/// Append path segments (percent-encoded) to a base URL.
pub(crate) fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(base).map_err(|_| UpstreamError::Endpoint(base.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::Endpoint(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a non-success response into [`UpstreamError::Status`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body,
    })
}
