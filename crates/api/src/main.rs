use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

mod app;
mod config;
mod error;
mod jobs;
mod middleware;
mod routes;
mod services;

use jobs::{CleanupReadingsJob, ExternalPollJob, JobRunner};
use services::{EventHub, MqttManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize logging and metrics
    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics();

    info!("Starting AirWatch API v{}", env!("CARGO_PKG_VERSION"));

    // Connect to MongoDB and ensure indexes
    let db = persistence::db::connect(&db_config(&config.database)).await?;
    if let Err(e) = persistence::db::ensure_indexes(&db).await {
        // Index bootstrap needs a reachable server; a cold database at boot
        // is tolerated and the probes report unreadiness instead
        warn!("Index bootstrap failed: {}", e);
    }

    // Event hub feeding /airqualityhub subscribers
    let event_hub = EventHub::new(config.mqtt.hub_capacity);

    // Start MQTT subscriber tasks for sources stored as active
    let mqtt = MqttManager::new(db.clone(), event_hub.clone(), config.mqtt.clone());
    match mqtt.start_registered().await {
        Ok(count) => info!("Started {} MQTT subscriber(s)", count),
        Err(e) => warn!("Could not start registered MQTT sources: {}", e),
    }

    // Background jobs: external source polling and reading retention
    let mut runner = JobRunner::new();
    runner.register(ExternalPollJob::new(
        db.clone(),
        event_hub.clone(),
        &config.polling,
    ));
    runner.register(CleanupReadingsJob::new(
        db.clone(),
        config.limits.reading_retention_days,
    ));
    runner.start();

    // Build application
    let addr = config.socket_addr();
    let app = app::create_app(config, db, event_hub, mqtt.clone());

    // Start server
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Drain background work before exit
    info!("Shutting down background tasks");
    runner.shutdown();
    runner.wait_for_shutdown(Duration::from_secs(10)).await;
    mqtt.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Hand the config section to the persistence layer's own type.
fn db_config(c: &config::DatabaseConfig) -> persistence::db::DatabaseConfig {
    persistence::db::DatabaseConfig {
        uri: c.uri.clone(),
        database: c.database.clone(),
        max_pool_size: c.max_pool_size,
        min_pool_size: c.min_pool_size,
        connect_timeout_secs: c.connect_timeout_secs,
        server_selection_timeout_secs: c.server_selection_timeout_secs,
    }
}
