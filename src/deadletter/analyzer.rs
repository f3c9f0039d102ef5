//! Failure classification and retry/escalation policy.
//!
//! # Classification
//! Ordered substring match on the failure reason:
//! ```text
//! "timeout" (any case) → timeout,      retry
//! contains '5'         → server_error, retry
//! contains '4'         → client_error, no retry
//! otherwise            → unknown,      no retry
//! ```
//! The digit match looks anywhere in the text, not only at status codes.
//! Entries sent more than [`MAX_ENTRY_AGE_HOURS`] ago are never retried.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::deadletter::entry::FailureInfo;
use crate::ingest::event::Event;

/// Redelivery stops once the transport has seen this many receives.
pub const MAX_RECEIVE_COUNT: u32 = 3;

/// Path fragments marking a webhook as critical.
pub const CRITICAL_PATH_MARKERS: [&str; 3] = ["/payment", "/security", "/critical"];

pub const MAX_ENTRY_AGE_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    Timeout,
    ServerError,
    ClientError,
    Unknown,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Timeout => "timeout",
            FailureType::ServerError => "server_error",
            FailureType::ClientError => "client_error",
            FailureType::Unknown => "unknown",
        }
    }

    fn classify(reason: &str) -> Self {
        if reason.to_lowercase().contains("timeout") {
            FailureType::Timeout
        } else if reason.contains('5') {
            FailureType::ServerError
        } else if reason.contains('4') {
            FailureType::ClientError
        } else {
            FailureType::Unknown
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, FailureType::Timeout | FailureType::ServerError)
    }

    fn recommendations(&self) -> &'static [&'static str] {
        match self {
            FailureType::Timeout => &[
                "Check subscriber endpoint response times",
                "Consider raising the subscriber timeout",
            ],
            FailureType::ServerError => &[
                "Check subscriber endpoint health",
                "Review subscriber server logs",
            ],
            FailureType::ClientError => &[
                "Verify subscriber endpoint URL and authentication",
                "Check payload format against subscriber expectations",
            ],
            FailureType::Unknown => &["Investigate failure reason manually"],
        }
    }
}

/// Verdict for one dead-letter entry. Recomputed on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnalysis {
    pub should_retry: bool,
    pub is_critical: bool,
    pub failure_type: FailureType,
    pub recommendations: Vec<String>,
}

impl FailureAnalysis {
    /// Whether the processor should redeliver, given the transport's receive count.
    pub fn redeliver(&self, receive_count: u32) -> bool {
        self.should_retry && receive_count < MAX_RECEIVE_COUNT
    }
}

pub fn analyze_failure(info: &FailureInfo, event: &Event) -> FailureAnalysis {
    analyze_failure_at(info, event, Utc::now())
}

/// [`analyze_failure`] against an explicit clock.
pub fn analyze_failure_at(
    info: &FailureInfo,
    event: &Event,
    now: DateTime<Utc>,
) -> FailureAnalysis {
    let failure_type = FailureType::classify(&info.failure_reason);
    let mut should_retry = failure_type.retryable();
    let mut recommendations: Vec<String> = failure_type
        .recommendations()
        .iter()
        .map(|r| r.to_string())
        .collect();

    let is_critical = is_critical_path(&event.transport.path);
    if is_critical {
        recommendations.push("Critical webhook: notify the owning team".to_string());
    }

    if now - info.sent_timestamp > Duration::hours(MAX_ENTRY_AGE_HOURS) {
        should_retry = false;
        recommendations.push("Message older than 24 hours: manual review required".to_string());
    }

    FailureAnalysis {
        should_retry,
        is_critical,
        failure_type,
        recommendations,
    }
}

pub fn is_critical_path(path: &str) -> bool {
    CRITICAL_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}
