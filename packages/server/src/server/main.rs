// Main entry point for the content pipeline server

use anyhow::{Context, Result};
use chrono::Utc;
use server_core::server::{build_app, build_state};
use server_core::Config;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting GeoPress content pipeline");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    let port = config.port;
    tracing::info!("Configuration loaded");

    // Wire up components
    let state = build_state(config).context("Failed to build application state")?;

    // Periodic tick - runs every hour; the HTTP surface triggers the same
    // orchestrator on demand.
    let scheduler = JobScheduler::new().await?;
    let tick_orchestrator = state.orchestrator.clone();
    let tick_job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let orchestrator = tick_orchestrator.clone();
        Box::pin(async move {
            match orchestrator.tick(Utc::now()).await {
                Ok(processed) => {
                    tracing::info!(processed, "Scheduled tick finished");
                }
                Err(e) => {
                    tracing::error!(error = %format!("{:#}", e), "Scheduled tick failed");
                }
            }
        })
    })?;
    scheduler.add(tick_job).await?;
    scheduler.start().await?;
    tracing::info!("Scheduled tick registered (hourly)");

    // Start server
    let app = build_app(state);
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
