//! Response bodies returned to webhook senders.
//!
//! # Responsibilities
//! - Shape the 200 / 405 / 500 JSON bodies
//! - Attach `Allow` on method rejection and tracking ids on every response
//! - Convert into an axum response
//!
//! # Design Decisions
//! - Status is derived from the body variant, so the two can never disagree
//! - Partial downstream failure is reported in `operations_status`, never in the status code

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::ingest::tracking::TrackingIds;

/// Per-branch result reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    Success,
    Failed,
}

impl From<bool> for BranchStatus {
    fn from(success: bool) -> Self {
        if success {
            BranchStatus::Success
        } else {
            BranchStatus::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationsStatus {
    pub store: BranchStatus,
    pub fanout: BranchStatus,
}

/// Body of a 200 acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedBody {
    pub message: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub database: String,
    pub collection: String,
    pub operations_status: OperationsStatus,
    pub processing_time_ms: u64,
}

/// Body of a 405 method rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedBody {
    pub message: String,
    pub error: String,
    pub allowed_methods: Vec<String>,
    #[serde(rename = "requestId")]
    pub request_id: String,
}

/// Body of a 500 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Accepted(AcceptedBody),
    MethodNotAllowed(RejectedBody),
    Error(ErrorBody),
}

/// Terminal response of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub body: ResponseBody,
    pub tracking: TrackingIds,
}

impl WebhookResponse {
    pub fn accepted(tracking: &TrackingIds, body: AcceptedBody) -> Self {
        Self {
            body: ResponseBody::Accepted(body),
            tracking: tracking.clone(),
        }
    }

    pub fn method_not_allowed(tracking: &TrackingIds, method: &str, allowed: &[&str]) -> Self {
        Self {
            body: ResponseBody::MethodNotAllowed(RejectedBody {
                message: "Method Not Allowed".to_string(),
                error: format!(
                    "Method {method} is not allowed. Allowed methods: {}",
                    allowed.join(", ")
                ),
                allowed_methods: allowed.iter().map(|m| m.to_string()).collect(),
                request_id: tracking.request_id.clone(),
            }),
            tracking: tracking.clone(),
        }
    }

    pub fn internal_error(tracking: &TrackingIds, error: impl Into<String>) -> Self {
        Self {
            body: ResponseBody::Error(ErrorBody {
                message: "Internal server error".to_string(),
                error: error.into(),
                request_id: tracking.request_id.clone(),
            }),
            tracking: tracking.clone(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.body {
            ResponseBody::Accepted(_) => StatusCode::OK,
            ResponseBody::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ResponseBody::Error(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `Allow` header, only for method rejections.
    pub fn allow_header(&self) -> Option<String> {
        match &self.body {
            ResponseBody::MethodNotAllowed(body) => Some(body.allowed_methods.join(", ")),
            _ => None,
        }
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let allow = self.allow_header();
        let mut response = (status, Json(&self.body)).into_response();

        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(allow) = allow.and_then(|a| HeaderValue::from_str(&a).ok()) {
            headers.insert(header::ALLOW, allow);
        }
        if let Ok(value) = HeaderValue::from_str(&self.tracking.request_id) {
            headers.insert("x-request-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.tracking.correlation_id) {
            headers.insert("x-correlation-id", value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking() -> TrackingIds {
        TrackingIds {
            correlation_id: "corr".into(),
            request_id: "req".into(),
        }
    }

    #[test]
    fn test_method_not_allowed_response() {
        let response = WebhookResponse::method_not_allowed(&tracking(), "GET", &["POST", "PUT"]);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.allow_header().as_deref(), Some("POST, PUT"));

        let http = response.into_response();
        assert_eq!(http.headers()[header::ALLOW], "POST, PUT");
        assert_eq!(http.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(http.headers()["x-request-id"], "req");
    }

    #[test]
    fn test_accepted_body_wire_names() {
        let body = ResponseBody::Accepted(AcceptedBody {
            message: "ok".into(),
            request_id: "req".into(),
            database: "webhooks".into(),
            collection: "root".into(),
            operations_status: OperationsStatus {
                store: BranchStatus::Success,
                fanout: BranchStatus::Failed,
            },
            processing_time_ms: 3,
        });

        let wire = serde_json::to_value(&body).unwrap();
        assert_eq!(wire["requestId"], "req");
        assert_eq!(wire["operations_status"]["store"], "success");
        assert_eq!(wire["operations_status"]["fanout"], "failed");
        assert_eq!(wire["processing_time_ms"], 3);
    }

    #[test]
    fn test_internal_error_has_no_allow_header() {
        let response = WebhookResponse::internal_error(&tracking(), "boom");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.allow_header().is_none());
    }
}
