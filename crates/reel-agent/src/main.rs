//! Headless uploader binary.

mod cli;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_client::ReelApiClient;
use reel_tracker::{InMemoryMediaStore, JsonFileCache, TrackerConfig, UploadTracker};

use crate::cli::Cli;
use crate::session::Session;

fn init_tracing() -> Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn init_metrics() -> Result<()> {
    let Ok(addr) = std::env::var("REEL_METRICS_ADDR") else {
        return Ok(());
    };
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid REEL_METRICS_ADDR: {}", addr))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Required for rustls 0.23+
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing()?;
    let cli = Cli::parse();
    init_metrics()?;

    info!("Starting reel-agent");

    let client = Arc::new(ReelApiClient::from_env().context("Invalid upload service configuration")?);
    let config = TrackerConfig::from_env();
    let poll_interval = config.poll_interval;
    let media = Arc::new(InMemoryMediaStore::new());
    let cache = Arc::new(JsonFileCache::new(config.cache_path.clone()));
    info!(
        base_url = %client.config().base_url,
        cache = %cache.path().display(),
        "Agent config loaded"
    );

    let tracker = Arc::new(UploadTracker::new(
        config,
        client.clone(),
        client,
        media.clone(),
        cache,
    ));

    match tracker.restore().await {
        Ok(0) => {}
        Ok(count) => info!("Resuming {} uploads from a previous session", count),
        Err(e) => warn!("Ignoring unreadable upload cache: {}", e),
    }

    let session = Session::new(Arc::clone(&tracker), media);
    if cli.retry_failed {
        let retried = session.retry_failed().await;
        info!("Retried {} failed uploads", retried);
    }
    let submitted = session
        .upload_all(&cli.files, cli.title.as_deref(), cli.job_id.as_deref())
        .await;
    info!("Submitted {} of {} files", submitted, cli.files.len());

    if !cli.no_wait {
        let reconciler = tracker.start_reconciliation();

        tokio::select! {
            _ = session.wait_settled(poll_interval) => {
                info!("All uploads settled");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, pending uploads resume on the next run");
            }
        }

        reconciler.stop().await;
    }

    tracker.close().await;
    let failed = session.print_summary().await;
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
