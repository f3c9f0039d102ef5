//! Webhook fan-out service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Sender ──▶ http::server ──▶ http::request ──▶ ingest::dispatcher
//!                                                     │
//!                                     ┌───────────────┴───────────────┐
//!                                     ▼                               ▼
//!                              sinks::store                    sinks::publisher
//!                           (durable write)                  (topic fan-out)
//!                                     └───────────────┬───────────────┘
//!                                                     ▼
//!     Sender ◀── http::response ◀──────────── settle both, always 200
//! ```
//!
//! Failed fan-out deliveries land on the dead-letter transport and are
//! handled by the `dead-letter-worker` binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use webhook_fanout::config::load_from_args;
use webhook_fanout::http::HttpServer;
use webhook_fanout::lifecycle::{
    build_dispatcher, build_http_client, spawn_signal_handler, Shutdown,
};
use webhook_fanout::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "webhook-fanout")]
#[command(about = "Webhook ingestion with durable storage and fan-out", long_about = None)]
struct Cli {
    /// Path to the TOML configuration (falls back to WEBHOOK_FANOUT_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_from_args(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(environment = %config.environment, "webhook-fanout v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        database = %config.store.database,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = build_http_client(&config)?;
    let dispatcher = build_dispatcher(&config, &client)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for webhooks");

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    spawn_signal_handler(shutdown.clone());

    HttpServer::new(&config, dispatcher)
        .run(listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
