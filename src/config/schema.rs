//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the webhook fan-out service and the dead-letter worker.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Deployment environment tag (e.g., "dev", "prod").
    /// Stamped on every stored record, published message and archive entry.
    pub environment: String,

    /// Listener configuration (bind address, body limit, source synthesis).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Durable document store settings.
    pub store: StoreConfig,

    /// Fan-out topic settings. Fan-out is disabled when no topic is set.
    pub fanout: FanoutConfig,

    /// Secret/parameter lookup settings.
    pub secrets: SecretsConfig,

    /// Dead-letter pipeline settings.
    pub dead_letter: DeadLetterConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            store: StoreConfig::default(),
            fanout: FanoutConfig::default(),
            secrets: SecretsConfig::default(),
            dead_letter: DeadLetterConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Optional deployment stage, inserted into the synthesized event source.
    pub stage: Option<String>,

    /// Domain used for the event source when the request carries no Host header.
    pub domain: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 6 * 1024 * 1024, // 6MB
            stage: None,
            domain: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline in seconds. This is the only bound on a hung upstream call.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Durable store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database name reported back to senders and used as the first path segment on writes.
    pub database: String,

    /// Name of the secret holding the store connection URI.
    pub secret_name: String,

    /// How long a resolved connection secret is reused before it is fetched again.
    pub secret_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "webhooks".to_string(),
            secret_name: String::new(),
            secret_ttl_secs: 300,
        }
    }
}

/// Fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Topic reference to publish every event to.
    pub topic: Option<String>,

    /// Base URL of the publish/subscribe gateway.
    pub endpoint: Option<String>,

    /// Upper bound for the serialized `headers` message attribute.
    pub max_headers_attribute_size: usize,
}

impl FanoutConfig {
    /// Fan-out is only attempted when a topic is configured.
    pub fn is_enabled(&self) -> bool {
        self.topic.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            topic: None,
            endpoint: None,
            max_headers_attribute_size: 1000,
        }
    }
}

/// Secret lookup configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecretsConfig {
    /// Parameter service base URL. Secrets are read from the environment when unset.
    pub endpoint: Option<String>,
}

/// Dead-letter pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadLetterConfig {
    /// Path of the JSON file the worker reads dead-letter entries from.
    pub queue_path: String,

    /// Maximum entries processed per invocation.
    pub batch_size: usize,

    /// Poll interval for the continuous worker loop.
    pub poll_interval_secs: u64,

    /// Topic receiving escalation notifications for critical failures.
    pub escalation_topic: Option<String>,

    /// JSON-lines file receiving failure records. Records are logged when unset.
    pub archive_path: Option<String>,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            queue_path: "dead-letter.json".to_string(),
            batch_size: 10,
            poll_interval_secs: 20,
            escalation_topic: None,
            archive_path: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
