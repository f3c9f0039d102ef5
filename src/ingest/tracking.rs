//! Correlation and request identifiers.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

/// Accepted spellings for the correlation identifier, in priority order.
pub const CORRELATION_ID_HEADERS: [&str; 2] = ["x-correlation-id", "correlation-id"];

/// Accepted spellings for the request identifier, in priority order.
pub const REQUEST_ID_HEADERS: [&str; 2] = ["x-request-id", "request-id"];

/// Identifiers that follow one request through logs, storage and fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingIds {
    pub correlation_id: String,
    pub request_id: String,
}

/// Propagate tracking ids from headers (case-insensitive), generating any that are missing.
pub fn extract_tracking_ids(headers: &BTreeMap<String, String>) -> TrackingIds {
    TrackingIds {
        correlation_id: find_header(headers, &CORRELATION_ID_HEADERS)
            .unwrap_or_else(generate_id),
        request_id: find_header(headers, &REQUEST_ID_HEADERS).unwrap_or_else(generate_id),
    }
}

/// First non-empty value among `names`, matching keys case-insensitively.
pub fn find_header(headers: &BTreeMap<String, String>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string())
    })
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
