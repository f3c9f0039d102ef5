//! Dual-sink dispatch of one webhook.
//!
//! # Request Lifecycle
//! ```text
//! RECEIVED
//!     → METHOD_CHECKED   (allow-list; anything else → 405)
//!     → NORMALIZED       (Event, partition name, advisory header checks)
//!     → DISPATCHED       (store write ‖ fan-out publish)
//!     → SETTLED          (both branches finished, whatever their outcome)
//!     → RESPONDED        (200 + operations_status)
//!
//! Errors outside the two branches (secret resolution, panics) → ERROR_RESPONDED (500)
//! ```
//!
//! # Design Decisions
//! - Settle-all: `tokio::join!` over exactly two branches, never fail-fast
//! - Branch errors become an [`OperationOutcome`]; they never abort the sibling
//! - Unconfigured fan-out counts as success for composition, but is not attempted

use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::http::response::{AcceptedBody, BranchStatus, OperationsStatus, WebhookResponse};
use crate::ingest::event::{Event, InboundRequest};
use crate::ingest::fanout::{build_publish_request, FanoutMessage};
use crate::ingest::headers::validate_headers;
use crate::ingest::partition::partition_name;
use crate::ingest::tracking::{extract_tracking_ids, TrackingIds};
use crate::observability::metrics;
use crate::sinks::error::SecretError;
use crate::sinks::publisher::TopicPublisher;
use crate::sinks::secrets::{SecretCache, SecretValue};
use crate::sinks::store::DocumentStore;

/// Methods that pass the gate.
pub const ALLOWED_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// Errors escaping the tracked branches. Each one becomes a 500.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to resolve store connection: {0}")]
    Secret(#[from] SecretError),

    #[error("Unhandled panic during dispatch: {0}")]
    Panicked(String),
}

/// Which concurrent branch an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Store,
    Fanout,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Store => "store",
            Operation::Fanout => "fanout",
        }
    }
}

/// Result of one branch. Produced once, never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub success: bool,
    pub error: Option<String>,
}

impl OperationOutcome {
    fn succeeded(operation: Operation) -> Self {
        Self {
            operation,
            success: true,
            error: None,
        }
    }

    fn failed(operation: Operation, error: impl fmt::Display) -> Self {
        Self {
            operation,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// The four ways a settled dispatch can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    BothSucceeded,
    StoreOnly,
    FanoutOnly,
    BothFailed,
}

impl DispatchState {
    /// Classify settled branches. `fanout` is `None` when fan-out is not configured.
    pub fn classify(store: &OperationOutcome, fanout: Option<&OperationOutcome>) -> Self {
        let fanout_ok = fanout.map_or(true, |outcome| outcome.success);
        match (store.success, fanout_ok) {
            (true, true) => DispatchState::BothSucceeded,
            (true, false) => DispatchState::StoreOnly,
            (false, true) => DispatchState::FanoutOnly,
            (false, false) => DispatchState::BothFailed,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DispatchState::BothSucceeded => "Webhook received, stored and published successfully",
            DispatchState::StoreOnly => "Webhook stored; fan-out publish failed",
            DispatchState::FanoutOnly => "Webhook published; durable store write failed",
            DispatchState::BothFailed => "Webhook received but storage and fan-out both failed",
        }
    }

    /// Response message; without configured fan-out nothing was published.
    pub fn message_for(&self, fanout_attempted: bool) -> &'static str {
        match (self, fanout_attempted) {
            (DispatchState::BothSucceeded, false) => "Webhook received and stored successfully",
            (DispatchState::FanoutOnly, false) => "Webhook received; durable store write failed",
            _ => self.message(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::BothSucceeded => "both_succeeded",
            DispatchState::StoreOnly => "store_only",
            DispatchState::FanoutOnly => "fanout_only",
            DispatchState::BothFailed => "both_failed",
        }
    }
}

/// Settings the dispatcher needs from [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub environment: String,
    pub database: String,
    pub store_secret_name: String,
    pub fanout_topic: Option<String>,
    pub max_headers_attribute_size: usize,
}

impl From<&ServiceConfig> for DispatchSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            database: config.store.database.clone(),
            store_secret_name: config.store.secret_name.clone(),
            fanout_topic: config
                .fanout
                .is_enabled()
                .then(|| config.fanout.topic.clone())
                .flatten(),
            max_headers_attribute_size: config.fanout.max_headers_attribute_size,
        }
    }
}

/// Document written to the store: the event plus its tracking context.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord<'a> {
    #[serde(flatten)]
    event: &'a Event,
    environment: &'a str,
    correlation_id: &'a str,
    request_id: &'a str,
    received_at: DateTime<Utc>,
}

/// Runs the store write and the fan-out publish for each inbound webhook.
pub struct WebhookDispatcher {
    settings: DispatchSettings,
    secrets: Arc<SecretCache>,
    store: Arc<dyn DocumentStore>,
    publisher: Option<Arc<dyn TopicPublisher>>,
}

impl WebhookDispatcher {
    /// `publisher` is only used when `settings.fanout_topic` is set.
    pub fn new(
        settings: DispatchSettings,
        secrets: Arc<SecretCache>,
        store: Arc<dyn DocumentStore>,
        publisher: Option<Arc<dyn TopicPublisher>>,
    ) -> Self {
        Self {
            settings,
            secrets,
            store,
            publisher,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Handle one inbound webhook. Always produces a response.
    pub async fn handle(&self, request: InboundRequest) -> WebhookResponse {
        let started = Instant::now();
        let method = request.normalized_method();
        let tracking = extract_tracking_ids(&request.headers);

        let result = AssertUnwindSafe(self.process(request, &tracking, started))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(DispatchError::Panicked(panic_message(panic))));

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    request_id = %tracking.request_id,
                    correlation_id = %tracking.correlation_id,
                    error = %e,
                    "Webhook dispatch failed"
                );
                WebhookResponse::internal_error(&tracking, e.to_string())
            }
        };

        metrics::record_request(&method, response.status().as_u16(), started);
        response
    }

    async fn process(
        &self,
        request: InboundRequest,
        tracking: &TrackingIds,
        started: Instant,
    ) -> Result<WebhookResponse, DispatchError> {
        let method = request.normalized_method();
        if !ALLOWED_METHODS.contains(&method.as_str()) {
            tracing::info!(
                request_id = %tracking.request_id,
                method = %method,
                "Rejected webhook method"
            );
            return Ok(WebhookResponse::method_not_allowed(tracking, &method, &ALLOWED_METHODS));
        }

        for issue in validate_headers(&request.headers) {
            tracing::warn!(
                request_id = %tracking.request_id,
                issue = %issue,
                "Suspicious webhook header"
            );
        }

        let event = Event::from_request(&request);
        let collection = partition_name(&event.transport.path);

        tracing::info!(
            request_id = %tracking.request_id,
            correlation_id = %tracking.correlation_id,
            method = %event.transport.method,
            path = %event.transport.path,
            collection = %collection,
            content_type = event.content_type.as_str(),
            "Webhook received"
        );

        let connection = self.secrets.get(&self.settings.store_secret_name).await?;

        let (store, fanout) = tokio::join!(
            self.store_event(&connection, &collection, &event, tracking),
            self.publish_event(&event, tracking, &request.headers),
        );

        let state = DispatchState::classify(&store, fanout.as_ref());
        metrics::record_dispatch(state.as_str());
        self.log_settled(state, &store, fanout.as_ref(), tracking);

        Ok(WebhookResponse::accepted(
            tracking,
            AcceptedBody {
                message: state.message_for(fanout.is_some()).to_string(),
                request_id: tracking.request_id.clone(),
                database: self.settings.database.clone(),
                collection,
                operations_status: OperationsStatus {
                    store: BranchStatus::from(store.success),
                    fanout: BranchStatus::from(fanout.as_ref().map_or(true, |f| f.success)),
                },
                processing_time_ms: duration_ms(started.elapsed()),
            },
        ))
    }

    async fn store_event(
        &self,
        connection: &SecretValue,
        collection: &str,
        event: &Event,
        tracking: &TrackingIds,
    ) -> OperationOutcome {
        let record = StoredRecord {
            event,
            environment: &self.settings.environment,
            correlation_id: &tracking.correlation_id,
            request_id: &tracking.request_id,
            received_at: Utc::now(),
        };

        let outcome = match serde_json::to_value(&record) {
            Ok(document) => match self
                .store
                .insert(connection, &self.settings.database, collection, &document)
                .await
            {
                Ok(()) => OperationOutcome::succeeded(Operation::Store),
                Err(e) => OperationOutcome::failed(Operation::Store, e),
            },
            Err(e) => OperationOutcome::failed(Operation::Store, e),
        };

        metrics::record_branch(Operation::Store.as_str(), outcome.success);
        outcome
    }

    /// `None` when fan-out is not configured.
    async fn publish_event(
        &self,
        event: &Event,
        tracking: &TrackingIds,
        raw_headers: &BTreeMap<String, String>,
    ) -> Option<OperationOutcome> {
        let topic = self.settings.fanout_topic.as_deref()?;
        let Some(publisher) = self.publisher.as_ref() else {
            return Some(OperationOutcome::failed(
                Operation::Fanout,
                "fan-out topic configured without a publisher",
            ));
        };

        let message = FanoutMessage::new(self.settings.environment.clone(), event.clone())
            .with_tracking(tracking);
        let outcome = match build_publish_request(
            topic,
            &message,
            tracking,
            raw_headers,
            self.settings.max_headers_attribute_size,
        ) {
            Ok(request) => match publisher.publish(request).await {
                Ok(delivery_id) => {
                    tracing::debug!(
                        request_id = %tracking.request_id,
                        delivery_id = %delivery_id,
                        topic = %topic,
                        "Webhook published"
                    );
                    OperationOutcome::succeeded(Operation::Fanout)
                }
                Err(e) => OperationOutcome::failed(Operation::Fanout, e),
            },
            Err(e) => OperationOutcome::failed(Operation::Fanout, e),
        };

        metrics::record_branch(Operation::Fanout.as_str(), outcome.success);
        Some(outcome)
    }

    fn log_settled(
        &self,
        state: DispatchState,
        store: &OperationOutcome,
        fanout: Option<&OperationOutcome>,
        tracking: &TrackingIds,
    ) {
        let fanout_error = fanout.and_then(|f| f.error.as_deref()).unwrap_or("");
        let store_error = store.error.as_deref().unwrap_or("");
        match state {
            DispatchState::BothSucceeded => tracing::info!(
                request_id = %tracking.request_id,
                fanout_attempted = fanout.is_some(),
                "Webhook dispatched"
            ),
            DispatchState::StoreOnly | DispatchState::FanoutOnly => tracing::warn!(
                request_id = %tracking.request_id,
                state = state.as_str(),
                store_error,
                fanout_error,
                "Webhook partially dispatched"
            ),
            DispatchState::BothFailed => tracing::error!(
                request_id = %tracking.request_id,
                store_error,
                fanout_error,
                "Webhook dispatch failed on both sinks"
            ),
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
