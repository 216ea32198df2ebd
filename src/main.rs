use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use event_finder::browser::ChromeEngine;
use event_finder::{Config, EventFinder, PipelineSettings, SnapshotCache, scheduler, server};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Event Finder");

    let config = Config::from_env()?;
    config.site.validate()?;

    let finder = EventFinder::new(
        Arc::new(ChromeEngine::new()),
        config.site.clone(),
        PipelineSettings::from(&config),
        Arc::new(SnapshotCache::new()),
    );

    // Keep the scheduler alive for the lifetime of the server
    let _sched = scheduler::start(finder.clone(), config.startup_delay, config.refresh_interval).await?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Server running on port {}", config.port);
    info!("Health check: http://localhost:{}/api/health", config.port);
    info!("Events API: http://localhost:{}/api/events", config.port);

    axum::serve(listener, server::router(finder)).await?;

    Ok(())
}
