//! Per-entry dead-letter processing and batch orchestration.
//!
//! # Entry Lifecycle
//! ```text
//! DeadLetterEntry
//!     → FailureInfo + original Event (decode)
//!     → FailureAnalysis
//!     → redeliver to the original topic   (retryable, receive count < 3)
//!       or escalate                       (critical, escalation topic set)
//!     → metrics ‖ archive ‖ escalation    (best effort, logged)
//!     → delete by receipt handle
//! ```
//!
//! Any error before the delete leaves the entry on the transport for a
//! later receive. One entry failing never stops the rest of the batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::deadletter::analyzer::{analyze_failure, FailureAnalysis};
use crate::deadletter::entry::{decode_original, DeadLetterEntry, FailureInfo};
use crate::deadletter::queue::DeadLetterQueue;
use crate::deadletter::sinks::{EscalationNotice, FailureArchive, FailureMetrics, FailureRecord};
use crate::ingest::event::Event;
use crate::ingest::fanout::{base_attributes, FanoutMessage};
use crate::ingest::tracking::{find_header, CORRELATION_ID_HEADERS, REQUEST_ID_HEADERS};
use crate::observability::metrics;
use crate::sinks::error::UpstreamError;
use crate::sinks::publisher::{PublishRequest, TopicPublisher};

#[derive(Debug, Error)]
pub enum DeadLetterError {
    #[error("Failed to receive dead-letter entries: {0}")]
    Receive(#[source] UpstreamError),

    #[error("Undecodable dead-letter body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Entry {0} has no original topic to redeliver to")]
    NoTopic(String),

    #[error("Redelivery failed: {0}")]
    Redelivery(#[source] UpstreamError),

    #[error("Failed to delete entry: {0}")]
    Delete(#[source] UpstreamError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    Redelivered,
    Escalated,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Processed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResult {
    pub message_id: String,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<EntryAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<EntryResult>,
}

pub struct DeadLetterProcessor {
    environment: String,
    queue: Arc<dyn DeadLetterQueue>,
    publisher: Arc<dyn TopicPublisher>,
    escalation_topic: Option<String>,
    metrics: Arc<dyn FailureMetrics>,
    archive: Arc<dyn FailureArchive>,
}

impl DeadLetterProcessor {
    pub fn new(
        environment: impl Into<String>,
        queue: Arc<dyn DeadLetterQueue>,
        publisher: Arc<dyn TopicPublisher>,
        escalation_topic: Option<String>,
        metrics: Arc<dyn FailureMetrics>,
        archive: Arc<dyn FailureArchive>,
    ) -> Self {
        Self {
            environment: environment.into(),
            queue,
            publisher,
            escalation_topic: escalation_topic.filter(|t| !t.is_empty()),
            metrics,
            archive,
        }
    }

    /// Receive up to `max` entries and process them.
    pub async fn run_once(&self, max: usize) -> Result<BatchSummary, DeadLetterError> {
        let entries = self.queue.receive(max).await.map_err(DeadLetterError::Receive)?;
        Ok(self.process_batch(entries).await)
    }

    /// Process entries in delivery order, isolating failures per entry.
    pub async fn process_batch(&self, entries: Vec<DeadLetterEntry>) -> BatchSummary {
        let mut summary = BatchSummary {
            total: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            let result = match self.process_entry(&entry).await {
                Ok(action) => {
                    summary.processed += 1;
                    EntryResult {
                        message_id: entry.message_id,
                        status: EntryStatus::Processed,
                        action: Some(action),
                        error: None,
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(
                        message_id = %entry.message_id,
                        error = %e,
                        "Dead-letter entry left for redelivery"
                    );
                    EntryResult {
                        message_id: entry.message_id,
                        status: EntryStatus::Failed,
                        action: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            summary.results.push(result);
        }

        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            total = summary.total,
            "Dead-letter batch finished"
        );
        summary
    }

    /// Process one entry. The entry is deleted only when this returns `Ok`.
    pub async fn process_entry(
        &self,
        entry: &DeadLetterEntry,
    ) -> Result<EntryAction, DeadLetterError> {
        let info = FailureInfo::from_entry(entry);
        let original = decode_original(&entry.body)?;
        let analysis = analyze_failure(&info, &original.event);

        tracing::info!(
            message_id = %info.message_id,
            receive_count = info.receive_count,
            failure_type = analysis.failure_type.as_str(),
            should_retry = analysis.should_retry,
            is_critical = analysis.is_critical,
            path = %original.event.transport.path,
            "Analyzed dead-letter entry"
        );

        let mut escalation = None;
        let action = if analysis.redeliver(info.receive_count) {
            self.redeliver(&info, &original).await?;
            EntryAction::Redelivered
        } else if analysis.is_critical && self.escalation_topic.is_some() {
            escalation = Some(EscalationNotice::new(
                &self.environment,
                &info,
                &original.event,
                &analysis,
            ));
            EntryAction::Escalated
        } else {
            EntryAction::Archived
        };

        self.side_channels(&info, original.event, analysis, escalation).await;

        self.queue
            .delete(&entry.receipt_handle)
            .await
            .map_err(DeadLetterError::Delete)?;
        Ok(action)
    }

    async fn redeliver(
        &self,
        info: &FailureInfo,
        original: &FanoutMessage,
    ) -> Result<(), DeadLetterError> {
        let topic = info
            .original_topic_ref
            .clone()
            .ok_or_else(|| DeadLetterError::NoTopic(info.message_id.clone()))?;
        let request = redelivery_request(topic, original, info)?;

        let delivery_id = self
            .publisher
            .publish(request)
            .await
            .map_err(DeadLetterError::Redelivery)?;

        metrics::record_redelivery();
        tracing::info!(
            message_id = %info.message_id,
            delivery_id = %delivery_id,
            retry_attempt = info.receive_count,
            "Redelivered webhook to original topic"
        );
        Ok(())
    }

    /// Escalation, metrics and archival run together; none of them can fail the entry.
    async fn side_channels(
        &self,
        info: &FailureInfo,
        event: Event,
        analysis: FailureAnalysis,
        escalation: Option<EscalationNotice>,
    ) {
        let escalate = async {
            let (Some(notice), Some(topic)) = (escalation, self.escalation_topic.as_deref()) else {
                return;
            };
            if let Err(e) = self.escalate(topic, &notice).await {
                tracing::error!(message_id = %info.message_id, error = %e, "Escalation failed");
            }
        };

        let record_metrics = async {
            if let Err(e) = self.metrics.record(info, &analysis).await {
                tracing::warn!(
                    message_id = %info.message_id,
                    error = %e,
                    "Failed to emit dead-letter metrics"
                );
            }
        };

        let record = FailureRecord {
            timestamp: Utc::now(),
            environment: self.environment.clone(),
            failure_info: info.clone(),
            original_event: event,
            analysis: analysis.clone(),
        };
        let archive = async {
            if let Err(e) = self.archive.archive(&record).await {
                tracing::warn!(
                    message_id = %info.message_id,
                    error = %e,
                    "Failed to archive dead-letter entry"
                );
            }
        };

        tokio::join!(escalate, record_metrics, archive);
    }

    async fn escalate(&self, topic: &str, notice: &EscalationNotice) -> Result<(), UpstreamError> {
        let mut attributes = BTreeMap::new();
        attributes.insert("environment".to_string(), self.environment.clone());
        attributes.insert("alertType".to_string(), notice.alert_type.to_string());
        attributes.insert("path".to_string(), notice.original_event.path.clone());

        let request = PublishRequest {
            topic: topic.to_string(),
            subject: notice.subject(),
            message: serde_json::to_string_pretty(notice)?,
            attributes,
        };
        let delivery_id = self.publisher.publish(request).await?;
        tracing::warn!(
            message_id = %notice.failure_info.message_id,
            delivery_id = %delivery_id,
            "Escalated critical webhook failure"
        );
        Ok(())
    }
}

/// Republish the original message, tagged with the retry attempt and prior failure.
pub fn redelivery_request(
    topic: String,
    original: &FanoutMessage,
    info: &FailureInfo,
) -> Result<PublishRequest, serde_json::Error> {
    let event = &original.event;
    let mut attributes = base_attributes(&original.environment, event);

    // Reuse the ids assigned at ingest; never mint new ones on retry.
    let headers = &event.transport.headers;
    let correlation_id = original
        .correlation_id
        .clone()
        .or_else(|| find_header(headers, &CORRELATION_ID_HEADERS));
    let request_id = original
        .request_id
        .clone()
        .or_else(|| find_header(headers, &REQUEST_ID_HEADERS));
    if let Some(id) = correlation_id {
        attributes.insert("correlation-id".to_string(), id);
    }
    if let Some(id) = request_id {
        attributes.insert("request-id".to_string(), id);
    }
    attributes.insert("retry-attempt".to_string(), info.receive_count.to_string());
    attributes.insert("original-failure-reason".to_string(), info.failure_reason.clone());

    Ok(PublishRequest {
        topic,
        subject: format!(
            "Webhook Event Retry - {} {}",
            event.transport.method, event.transport.path
        ),
        message: serde_json::to_string(original)?,
        attributes,
    })
}
