//! Best-effort side channels of the dead-letter pipeline.
//!
//! Metrics and archival are observational: the processor logs their
//! failures and carries on.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::deadletter::analyzer::FailureAnalysis;
use crate::deadletter::entry::FailureInfo;
use crate::ingest::event::Event;
use crate::observability::metrics;
use crate::sinks::error::UpstreamError;

/// Full record of one processed dead-letter entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub failure_info: FailureInfo,
    pub original_event: Event,
    pub analysis: FailureAnalysis,
}

/// The part of the event an escalation carries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub path: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Event> for EventSummary {
    fn from(event: &Event) -> Self {
        Self {
            path: event.transport.path.clone(),
            method: event.transport.method.clone(),
            timestamp: event.timestamp,
        }
    }
}

/// Body of a critical-failure escalation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationNotice {
    pub alert_type: &'static str,
    pub environment: String,
    pub failure_info: FailureInfo,
    pub original_event: EventSummary,
    pub analysis: FailureAnalysis,
}

impl EscalationNotice {
    pub fn new(
        environment: &str,
        info: &FailureInfo,
        event: &Event,
        analysis: &FailureAnalysis,
    ) -> Self {
        Self {
            alert_type: "CRITICAL_WEBHOOK_FAILURE",
            environment: environment.to_string(),
            failure_info: info.clone(),
            original_event: EventSummary::from(event),
            analysis: analysis.clone(),
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Critical Webhook Failure - {} {}",
            self.original_event.method, self.original_event.path
        )
    }
}

#[async_trait]
pub trait FailureMetrics: Send + Sync {
    async fn record(
        &self,
        info: &FailureInfo,
        analysis: &FailureAnalysis,
    ) -> Result<(), UpstreamError>;
}

/// Emits through the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderMetrics;

#[async_trait]
impl FailureMetrics for RecorderMetrics {
    async fn record(
        &self,
        info: &FailureInfo,
        analysis: &FailureAnalysis,
    ) -> Result<(), UpstreamError> {
        metrics::record_dead_letter(
            &info.protocol,
            analysis.failure_type.as_str(),
            analysis.is_critical,
        );
        Ok(())
    }
}

#[async_trait]
pub trait FailureArchive: Send + Sync {
    async fn archive(&self, record: &FailureRecord) -> Result<(), UpstreamError>;
}

/// Appends one JSON line per record.
#[derive(Debug)]
pub struct JsonlFileArchive {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlFileArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl FailureArchive for JsonlFileArchive {
    async fn archive(&self, record: &FailureRecord) -> Result<(), UpstreamError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Writes records to the log under the `dead_letter_archive` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogArchive;

#[async_trait]
impl FailureArchive for LogArchive {
    async fn archive(&self, record: &FailureRecord) -> Result<(), UpstreamError> {
        let json = serde_json::to_string(record)?;
        tracing::info!(
            target: "dead_letter_archive",
            message_id = %record.failure_info.message_id,
            record = %json,
            "Archived dead-letter failure"
        );
        Ok(())
    }
}
