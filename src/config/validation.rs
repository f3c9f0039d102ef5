//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Mandatory settings present (environment, store secret)
//! - Cross-field checks (topics need a publish endpoint)
//! - Value ranges and parsable addresses/URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// Smallest header attribute budget that leaves room for the truncation suffix.
const MIN_HEADERS_ATTRIBUTE_SIZE: usize = 20;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.environment.trim().is_empty() {
        errors.push(ValidationError::new("environment", "must not be empty"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.store.database.trim().is_empty() {
        errors.push(ValidationError::new("store.database", "must not be empty"));
    }
    if config.store.secret_name.trim().is_empty() {
        errors.push(ValidationError::new("store.secret_name", "is required"));
    }
    if config.store.secret_ttl_secs == 0 {
        errors.push(ValidationError::new("store.secret_ttl_secs", "must be greater than 0"));
    }

    if config.fanout.is_enabled() && config.fanout.endpoint.is_none() {
        errors.push(ValidationError::new(
            "fanout.endpoint",
            "is required when fanout.topic is set",
        ));
    }
    check_url(&mut errors, "fanout.endpoint", config.fanout.endpoint.as_deref());
    if config.fanout.max_headers_attribute_size < MIN_HEADERS_ATTRIBUTE_SIZE {
        errors.push(ValidationError::new(
            "fanout.max_headers_attribute_size",
            format!("must be at least {MIN_HEADERS_ATTRIBUTE_SIZE}"),
        ));
    }

    check_url(&mut errors, "secrets.endpoint", config.secrets.endpoint.as_deref());

    if config.dead_letter.batch_size == 0 {
        errors.push(ValidationError::new("dead_letter.batch_size", "must be greater than 0"));
    }
    if config.dead_letter.escalation_topic.is_some() && config.fanout.endpoint.is_none() {
        errors.push(ValidationError::new(
            "dead_letter.escalation_topic",
            "requires fanout.endpoint to publish escalations",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: Option<&str>) {
    if let Some(raw) = value {
        if let Err(e) = url::Url::parse(raw) {
            errors.push(ValidationError::new(field, format!("'{raw}' is not a URL: {e}")));
        }
    }
}
