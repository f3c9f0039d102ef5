//! Fan-out message construction.
//!
//! The published body is the event plus the environment tag and the tracking
//! ids assigned at ingest. Attributes carry the routing-relevant fields so
//! subscribers can filter without parsing the body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ingest::event::Event;
use crate::ingest::headers::create_headers_attribute;
use crate::ingest::tracking::{find_header, TrackingIds};
use crate::sinks::publisher::PublishRequest;

/// W3C trace context headers copied onto the message when present.
pub const TRACE_CONTEXT_HEADERS: [&str; 2] = ["traceparent", "tracestate"];

/// Body of every fan-out message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoutMessage {
    pub environment: String,
    #[serde(rename = "correlationId", default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub event: Event,
}

impl FanoutMessage {
    pub fn new(environment: impl Into<String>, event: Event) -> Self {
        Self {
            environment: environment.into(),
            correlation_id: None,
            request_id: None,
            event,
        }
    }

    /// Record the ids assigned at ingest so redeliveries reuse them.
    pub fn with_tracking(mut self, tracking: &TrackingIds) -> Self {
        self.correlation_id = Some(tracking.correlation_id.clone());
        self.request_id = Some(tracking.request_id.clone());
        self
    }
}

/// Attributes shared by first deliveries and redeliveries. Tracking ids are
/// added by the caller.
pub fn base_attributes(environment: &str, event: &Event) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    attributes.insert("environment".to_string(), environment.to_string());
    attributes.insert("method".to_string(), event.transport.method.clone());
    attributes.insert("path".to_string(), event.transport.path.clone());
    attributes.insert("contentType".to_string(), event.content_type.as_str().to_string());
    attributes
}

/// Build the publish request for a freshly ingested event.
///
/// `raw_headers` are the unsanitized inbound headers; they only feed the
/// `content-type` and trace context attributes.
pub fn build_publish_request(
    topic: &str,
    message: &FanoutMessage,
    tracking: &TrackingIds,
    raw_headers: &BTreeMap<String, String>,
    max_headers_attribute_size: usize,
) -> Result<PublishRequest, serde_json::Error> {
    let event = &message.event;
    let mut attributes = base_attributes(&message.environment, event);
    attributes.insert("correlation-id".to_string(), tracking.correlation_id.clone());
    attributes.insert("request-id".to_string(), tracking.request_id.clone());

    let content_type = find_header(raw_headers, &["content-type"])
        .unwrap_or_else(|| event.content_type.as_str().to_string());
    attributes.insert("content-type".to_string(), content_type);

    if let Some(headers) =
        create_headers_attribute(&event.transport.headers, max_headers_attribute_size)
    {
        attributes.insert("headers".to_string(), headers);
    }

    for name in TRACE_CONTEXT_HEADERS {
        if let Some(value) = find_header(raw_headers, &[name]) {
            attributes.insert(name.to_string(), value);
        }
    }

    Ok(PublishRequest {
        topic: topic.to_string(),
        subject: subject_for(event),
        message: serde_json::to_string(message)?,
        attributes,
    })
}

/// `Webhook Event - {method} {path}`
pub fn subject_for(event: &Event) -> String {
    format!("Webhook Event - {} {}", event.transport.method, event.transport.path)
}
