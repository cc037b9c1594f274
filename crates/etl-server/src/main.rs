//! # etl-server
//!
//! Thin wrapper binary for running the ETL orchestration core as a
//! standalone node. Loads a config document, builds the `Orchestrator`,
//! mounts whatever `auto-mount` names it to clusters registered by the
//! embedding deployment, and runs until `Ctrl+C` or `SIGTERM`.
//!
//! Dynamically loading cluster implementations from disk is out of scope
//! (spec.md §1); a real deployment links its `ClusterImpl`s in at compile
//! time and registers them before calling [`run`].

use std::sync::Arc;

use clap::Parser;
use etl_core::database::InMemoryDatabase;
use etl_core::orchestrator::Orchestrator;
use etl_shared::config::NodeConfig;
use etl_shared::logging;
use etl_shared::messages::InterruptEvent;
use tokio::signal;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "etl-server", version, about = "ETL orchestration node")]
struct Cli {
    /// Path to a JSON or YAML config document (spec.md §6).
    #[arg(long)]
    config: Option<String>,

    /// Force debug logging regardless of the config file's `debug` flag.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::new("etl-node"),
    };
    if cli.debug {
        config.debug = true;
    }

    info!(name = %config.name, version = config.version, "starting etl-server");
    info!(host = %config.net.host, port = config.net.port, "net config loaded");

    let database = Arc::new(InMemoryDatabase::new());
    let orchestrator = Arc::new(Orchestrator::new(config, database));

    let interrupts = orchestrator.handles().interrupts.clone();
    let shutdown_watcher = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    };

    shutdown_signal().await;
    info!("shutdown signal received, notifying the orchestrator");
    let _ = interrupts.send(InterruptEvent::Shutdown);

    shutdown_watcher.await?;
    info!("etl-server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
