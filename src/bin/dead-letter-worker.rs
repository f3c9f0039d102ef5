//! Dead-letter worker: drains failed fan-out deliveries and triages them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use webhook_fanout::config::load_from_args;
use webhook_fanout::lifecycle::{
    build_dead_letter_processor, build_http_client, spawn_signal_handler, Shutdown,
};
use webhook_fanout::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "dead-letter-worker")]
#[command(about = "Analyze, redeliver and escalate failed webhook deliveries", long_about = None)]
struct Cli {
    /// Path to the TOML configuration (falls back to WEBHOOK_FANOUT_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Process a single batch, print its summary (and metrics on stderr) and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_from_args(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    let client = build_http_client(&config)?;
    let processor = build_dead_letter_processor(&config, &client)?;
    let batch_size = config.dead_letter.batch_size;

    if cli.once {
        let snapshot = if config.observability.metrics_enabled {
            Some(metrics::init_metrics_snapshot()?)
        } else {
            None
        };
        let summary = processor.run_once(batch_size).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        if let Some(handle) = snapshot {
            eprint!("{}", handle.render());
        }
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let mut stop = shutdown.subscribe();
    spawn_signal_handler(shutdown.clone());

    let poll_interval = Duration::from_secs(config.dead_letter.poll_interval_secs);
    tracing::info!(
        batch_size,
        poll_interval_secs = config.dead_letter.poll_interval_secs,
        "Dead-letter worker polling"
    );

    loop {
        if let Err(e) = processor.run_once(batch_size).await {
            tracing::error!(error = %e, "Dead-letter receive failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = stop.recv() => break,
        }
    }

    tracing::info!("Dead-letter worker stopped");
    Ok(())
}
