//! Webhook ingestion with durable storage, fan-out publishing and dead-letter triage.

pub mod config;
pub mod deadletter;
pub mod http;
pub mod ingest;
pub mod lifecycle;
pub mod observability;
pub mod sinks;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use ingest::WebhookDispatcher;
pub use lifecycle::Shutdown;
