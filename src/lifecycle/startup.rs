//! Startup orchestration.
//!
//! # Responsibilities
//! - Build one pooled HTTP client for every upstream adapter
//! - Pick adapters from configuration
//! - Assemble the dispatcher and the dead-letter processor
//!
//! # Design Decisions
//! - Fail fast: a missing mandatory setting is fatal before any traffic
//! - The secret cache is created once and shared for the life of the process

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ServiceConfig;
use crate::deadletter::{
    DeadLetterProcessor, FailureArchive, FileDeadLetterQueue, JsonlFileArchive, LogArchive,
    RecorderMetrics,
};
use crate::ingest::dispatcher::{DispatchSettings, WebhookDispatcher};
use crate::sinks::{
    EnvSecretSource, HttpDocumentStore, HttpSecretSource, HttpTopicPublisher, SecretCache,
    SecretSource, TopicPublisher,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Shared upstream client. Per-call deadlines come from the request timeout.
pub fn build_http_client(config: &ServiceConfig) -> Result<reqwest::Client, StartupError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeouts.request_secs))
        .build()?)
}

/// Parameter service when configured, else environment variables.
pub fn build_secret_source(
    config: &ServiceConfig,
    client: &reqwest::Client,
) -> Arc<dyn SecretSource> {
    match config.secrets.endpoint.as_deref().filter(|e| !e.is_empty()) {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Using HTTP secret source");
            Arc::new(HttpSecretSource::new(client.clone(), endpoint))
        }
        None => {
            tracing::info!("Using environment secret source");
            Arc::new(EnvSecretSource)
        }
    }
}

fn build_publisher(
    config: &ServiceConfig,
    client: &reqwest::Client,
) -> Option<Arc<dyn TopicPublisher>> {
    config
        .fanout
        .endpoint
        .as_deref()
        .filter(|e| !e.is_empty())
        .map(|endpoint| {
            Arc::new(HttpTopicPublisher::new(client.clone(), endpoint)) as Arc<dyn TopicPublisher>
        })
}

pub fn build_dispatcher(
    config: &ServiceConfig,
    client: &reqwest::Client,
) -> Result<Arc<WebhookDispatcher>, StartupError> {
    if config.store.secret_name.is_empty() {
        return Err(StartupError::MissingSetting("store.secret_name"));
    }

    let settings = DispatchSettings::from(config);
    let publisher = build_publisher(config, client);
    if settings.fanout_topic.is_some() && publisher.is_none() {
        return Err(StartupError::MissingSetting("fanout.endpoint"));
    }

    let secrets = Arc::new(SecretCache::new(
        build_secret_source(config, client),
        Duration::from_secs(config.store.secret_ttl_secs),
    ));

    tracing::info!(
        environment = %settings.environment,
        database = %settings.database,
        fanout_enabled = settings.fanout_topic.is_some(),
        "Dispatcher ready"
    );

    Ok(Arc::new(WebhookDispatcher::new(
        settings,
        secrets,
        Arc::new(HttpDocumentStore::new(client.clone())),
        publisher,
    )))
}

pub fn build_dead_letter_processor(
    config: &ServiceConfig,
    client: &reqwest::Client,
) -> Result<DeadLetterProcessor, StartupError> {
    let publisher = build_publisher(config, client)
        .ok_or(StartupError::MissingSetting("fanout.endpoint"))?;

    let archive: Arc<dyn FailureArchive> = match config.dead_letter.archive_path.as_deref() {
        Some(path) if !path.is_empty() => Arc::new(JsonlFileArchive::new(path)),
        _ => Arc::new(LogArchive),
    };

    tracing::info!(
        queue = %config.dead_letter.queue_path,
        escalation_enabled = config.dead_letter.escalation_topic.is_some(),
        "Dead-letter processor ready"
    );

    Ok(DeadLetterProcessor::new(
        config.environment.clone(),
        Arc::new(FileDeadLetterQueue::new(&config.dead_letter.queue_path)),
        publisher,
        config.dead_letter.escalation_topic.clone(),
        Arc::new(RecorderMetrics),
        archive,
    ))
}
