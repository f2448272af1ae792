mod audit;
mod bootstrap;
mod directory;
mod health;
mod slack_http;
mod slack_service;

use std::time::Duration;

use anyhow::Result;
use lagertool_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use lagertool_core::config::LogFormat::*;

    // RUST_LOG wins over the configured level so single modules can be traced.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let routes =
        health::router(app.db_pool.clone()).merge(slack_http::router(app.ingress.clone()));
    health::spawn(&app.config.server.bind_address, app.config.server.health_check_port, routes)
        .await?;
    let sweeper = bootstrap::spawn_session_sweeper(app.workflow.sessions().clone());

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        idle_timeout_secs = app.config.borrow.session_idle_timeout_secs,
        announce_channel = app.config.borrow.announce_channel.as_deref().unwrap_or("none"),
        "lagertool-server started"
    );

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        open_sessions = app.workflow.sessions().len().await,
        "lagertool-server stopping"
    );

    sweeper.abort();
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "database pool did not close within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
