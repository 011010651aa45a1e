// src/main.rs
use anyhow::Context;
use certalert::cli::Cli;
use certalert::config::Config;
use certalert::ct_log::{client, CtLogCoordinator};
use certalert::dispatcher::Dispatcher;
use certalert::metrics;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

const METRICS_ADDR: &str = "0.0.0.0:2112";
const MATCH_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // A broken config is fatal at startup; during reloads it is tolerated.
    let config = Config::from_file(Path::new(&cli.config))
        .with_context(|| format!("failed to read {}", cli.config))?;

    tracing::info!("Starting certalert...");

    metrics::init_metrics().context("failed to register metrics")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    if config.prometheus.enabled {
        let metrics_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(METRICS_ADDR, metrics_shutdown).await {
                tracing::error!("Failed to run metrics server: {:#}", e);
            }
        });
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .gzip(true)
        .user_agent(client::USER_AGENT)
        .build()
        .context("failed to build HTTP client")?;

    let (event_tx, event_rx) = mpsc::channel(MATCH_CHANNEL_CAPACITY);

    let dispatcher = Dispatcher::new(event_rx);
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx.clone()));

    let coordinator = CtLogCoordinator::new(PathBuf::from(&cli.config), http_client, event_tx);
    coordinator.run(shutdown_rx).await;

    dispatcher_handle.await.ok();

    tracing::info!("Shutdown complete");
    Ok(())
}

fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }

        tracing::info!("Received shutdown signal, shutting down...");
        let _ = shutdown_tx.send(true);
    });
}
