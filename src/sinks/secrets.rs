//! Named secret lookup with a process-wide TTL cache.
//!
//! # Responsibilities
//! - Resolve a secret by name from the configured source
//! - Reuse resolved values across requests until the TTL elapses
//! - Collapse concurrent first use into a single fetch per name
//!
//! # Design Decisions
//! - Reads are lock-free (`ArcSwapOption`); only refreshes take the per-name mutex
//! - No explicit invalidation; an expired value is simply fetched again
//! - Values never appear in `Debug` output

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::sinks::error::{SecretError, UpstreamError};
use crate::sinks::{check_status, endpoint_url};

/// A resolved secret. Cheap to clone; redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(Arc<str>);

impl SecretValue {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    /// The raw secret. Keep it out of logs.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// Source of named secrets.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the current value of `name`. Missing names are [`SecretError::NotConfigured`].
    async fn fetch(&self, name: &str) -> Result<String, SecretError>;
}

/// Reads secrets from environment variables.
///
/// `webhooks/store-uri` is looked up as `WEBHOOKS_STORE_URI`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretSource;

impl EnvSecretSource {
    pub fn variable_name(name: &str) -> String {
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn fetch(&self, name: &str) -> Result<String, SecretError> {
        std::env::var(Self::variable_name(name))
            .map_err(|_| SecretError::NotConfigured(name.to_string()))
    }
}

/// Reads secrets from a parameter service: `GET {endpoint}/parameters/{name}`.
#[derive(Debug, Clone)]
pub struct HttpSecretSource {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct ParameterResponse {
    value: String,
}

impl HttpSecretSource {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn fetch_parameter(&self, name: &str) -> Result<Option<String>, UpstreamError> {
        let url = endpoint_url(&self.endpoint, &["parameters", name])?;
        let response = self.client.get(url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let parameter: ParameterResponse = check_status(response).await?.json().await?;
        Ok(Some(parameter.value))
    }
}

#[async_trait]
impl SecretSource for HttpSecretSource {
    async fn fetch(&self, name: &str) -> Result<String, SecretError> {
        match self.fetch_parameter(name).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(SecretError::NotConfigured(name.to_string())),
            Err(source) => Err(SecretError::Upstream {
                name: name.to_string(),
                source,
            }),
        }
    }
}

struct CachedSecret {
    value: SecretValue,
    fetched_at: Instant,
}

#[derive(Default)]
struct SecretSlot {
    current: ArcSwapOption<CachedSecret>,
    refresh: Mutex<()>,
}

impl SecretSlot {
    fn fresh(&self, ttl: Duration) -> Option<SecretValue> {
        let current = self.current.load();
        Option::as_ref(&current)
            .filter(|cached| cached.fetched_at.elapsed() < ttl)
            .map(|cached| cached.value.clone())
    }
}

/// TTL cache in front of a [`SecretSource`], shared by every request of the process.
pub struct SecretCache {
    source: Arc<dyn SecretSource>,
    ttl: Duration,
    slots: DashMap<String, Arc<SecretSlot>>,
}

impl SecretCache {
    pub fn new(source: Arc<dyn SecretSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slots: DashMap::new(),
        }
    }

    /// Resolve `name`, fetching at most once per TTL window even under concurrent callers.
    pub async fn get(&self, name: &str) -> Result<SecretValue, SecretError> {
        let slot = self.slots.entry(name.to_string()).or_default().clone();
        if let Some(value) = slot.fresh(self.ttl) {
            return Ok(value);
        }

        let _refresh = slot.refresh.lock().await;
        if let Some(value) = slot.fresh(self.ttl) {
            return Ok(value);
        }

        let raw = self.source.fetch(name).await?;
        if raw.is_empty() {
            return Err(SecretError::Empty(name.to_string()));
        }

        let value = SecretValue::new(raw);
        slot.current.store(Some(Arc::new(CachedSecret {
            value: value.clone(),
            fetched_at: Instant::now(),
        })));
        tracing::debug!(secret = %name, ttl_secs = self.ttl.as_secs(), "Secret resolved");
        Ok(value)
    }
}
