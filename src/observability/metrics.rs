//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define ingestion and dead-letter metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `webhook_requests_total` (counter): requests by method, status
//! - `webhook_request_duration_seconds` (histogram): end-to-end handling latency
//! - `webhook_branch_outcomes_total` (counter): store / fanout results
//! - `webhook_dispatch_total` (counter): settled dispatch state
//! - `webhook_dead_letter_messages_total` (counter): by protocol, failure type
//! - `webhook_dead_letter_critical_total` (counter): critical entries by protocol
//! - `webhook_dead_letter_redeliveries_total` (counter)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests and tools quiet

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Install the Prometheus recorder without a listener.
///
/// For runs that exit before any scrape; the caller renders the handle.
pub fn init_metrics_snapshot() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record one handled webhook request.
pub fn record_request(method: &str, status: u16, started: Instant) {
    counter!(
        "webhook_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("webhook_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Record the outcome of one dispatch branch.
pub fn record_branch(operation: &'static str, success: bool) {
    let result = if success { "success" } else { "failed" };
    counter!("webhook_branch_outcomes_total", "operation" => operation, "result" => result)
        .increment(1);
}

/// Record the settled state of one dispatch.
pub fn record_dispatch(state: &'static str) {
    counter!("webhook_dispatch_total", "state" => state).increment(1);
}

/// Record one processed dead-letter entry.
pub fn record_dead_letter(protocol: &str, failure_type: &'static str, critical: bool) {
    counter!(
        "webhook_dead_letter_messages_total",
        "protocol" => protocol.to_string(),
        "failure_type" => failure_type
    )
    .increment(1);

    if critical {
        counter!("webhook_dead_letter_critical_total", "protocol" => protocol.to_string())
            .increment(1);
    }
}

/// Record one redelivery to the original topic.
pub fn record_redelivery() {
    counter!("webhook_dead_letter_redeliveries_total").increment(1);
}
