//! Dead-letter entries and the failure facts derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::fanout::FanoutMessage;

/// Delivery attributes attached by the transport when a fan-out delivery failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeadLetterAttributes {
    pub topic_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub endpoint: Option<String>,
    pub protocol: Option<String>,
}

/// Transport bookkeeping. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeadLetterMetadata {
    pub approx_receive_count: u32,
    pub first_receive_timestamp: i64,
    pub sent_timestamp: i64,
}

/// One entry received from the dead-letter transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub attributes: DeadLetterAttributes,
    #[serde(default)]
    pub metadata: DeadLetterMetadata,
    pub receipt_handle: String,
}

/// Failure facts for one dead-letter entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    pub message_id: String,
    pub receive_count: u32,
    pub first_receive_timestamp: DateTime<Utc>,
    pub sent_timestamp: DateTime<Utc>,
    pub original_topic_ref: Option<String>,
    pub failure_reason: String,
    pub subscriber_endpoint: String,
    pub protocol: String,
}

const UNKNOWN: &str = "unknown";

impl FailureInfo {
    pub fn from_entry(entry: &DeadLetterEntry) -> Self {
        let attributes = &entry.attributes;
        Self {
            message_id: entry.message_id.clone(),
            receive_count: entry.metadata.approx_receive_count,
            first_receive_timestamp: from_millis(entry.metadata.first_receive_timestamp),
            sent_timestamp: from_millis(entry.metadata.sent_timestamp),
            original_topic_ref: attributes.topic_ref.clone().filter(|t| !t.is_empty()),
            failure_reason: attributes
                .failure_reason
                .clone()
                .unwrap_or_else(|| "Unknown failure".to_string()),
            subscriber_endpoint: attributes.endpoint.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            protocol: attributes.protocol.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// Out-of-range timestamps fall back to the epoch, which reads as "very old".
fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Recover the original fan-out message from an entry body.
///
/// The body is either the message itself or a transport envelope whose
/// `Message` field holds the message as a JSON string.
pub fn decode_original(body: &str) -> Result<FanoutMessage, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;
    match value.get("Message").and_then(Value::as_str) {
        Some(inner) => serde_json::from_str(inner),
        None => serde_json::from_value(value),
    }
}
