//! Canonical event model.
//!
//! # Data Flow
//! ```text
//! InboundRequest (front door shape)
//!     → Event::from_request (defaults, sanitized headers, payload detection)
//!     → Event (immutable, shared by the store and fan-out branches)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::headers::sanitize_headers;

/// Method recorded when the front door supplies none.
pub const UNKNOWN_METHOD: &str = "UNKNOWN";

/// Domain used for the synthesized source when none is known.
pub const DEFAULT_DOMAIN: &str = "localhost";

/// One raw inbound request as handed over by the HTTP front door.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundRequest {
    pub method: Option<String>,
    pub path: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub query_parameters: BTreeMap<String, String>,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
    pub source_ip: Option<String>,
    pub domain: Option<String>,
    pub stage: Option<String>,
}

impl InboundRequest {
    /// Upper-cased method, or [`UNKNOWN_METHOD`] when absent.
    pub fn normalized_method(&self) -> String {
        self.method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| UNKNOWN_METHOD.to_string())
    }

    /// Request path, defaulting to `/`.
    pub fn normalized_path(&self) -> &str {
        self.path.as_deref().filter(|p| !p.is_empty()).unwrap_or("/")
    }
}

/// Payload classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "text/plain")]
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Text => "text/plain",
        }
    }
}

/// Transport-level details of the original request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transport {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query_parameters: BTreeMap<String, String>,
    pub source_ip: Option<String>,
}

/// Canonical, immutable representation of one inbound webhook.
///
/// `content_type` is [`ContentType::Json`] exactly when `payload` was parsed from
/// the body; otherwise `payload` is the raw body as a JSON string. Base64 bodies
/// are never parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub transport: Transport,
    pub payload: Value,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub is_base64_encoded: bool,
}

impl Event {
    /// Normalize a raw request, stamped with the current time.
    pub fn from_request(request: &InboundRequest) -> Self {
        Self::from_request_at(request, Utc::now())
    }

    /// Normalize a raw request with an explicit receive time.
    pub fn from_request_at(request: &InboundRequest, timestamp: DateTime<Utc>) -> Self {
        let path = request.normalized_path().to_string();
        let raw_body = request.body.clone().unwrap_or_default();
        let parsed = if request.is_base64_encoded {
            None
        } else {
            serde_json::from_str::<Value>(&raw_body).ok()
        };
        let (payload, content_type) = match parsed {
            Some(parsed) => (parsed, ContentType::Json),
            None => (Value::String(raw_body), ContentType::Text),
        };

        Self {
            timestamp,
            source: synthesize_source(request.domain.as_deref(), request.stage.as_deref(), &path),
            transport: Transport {
                method: request.normalized_method(),
                path,
                headers: sanitize_headers(&request.headers),
                query_parameters: request.query_parameters.clone(),
                source_ip: request.source_ip.clone(),
            },
            payload,
            content_type,
            is_base64_encoded: request.is_base64_encoded,
        }
    }
}

/// `https://{domain}[/{stage}]{path}`
fn synthesize_source(domain: Option<&str>, stage: Option<&str>, path: &str) -> String {
    let domain = domain.filter(|d| !d.is_empty()).unwrap_or(DEFAULT_DOMAIN);
    match stage.map(|s| s.trim_matches('/')).filter(|s| !s.is_empty()) {
        Some(stage) => format!("https://{domain}/{stage}{path}"),
        None => format!("https://{domain}{path}"),
    }
}
