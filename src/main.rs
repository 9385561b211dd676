//! Encontro
//!
//! Main application entry point: runs the periodic passes against PostgreSQL

use std::sync::Arc;
use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use Encontro::{
    config::Settings,
    utils::logging,
    database::{create_pool, health_check, run_migrations, DatabaseService, EventStore},
    services::{ServiceFactory, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file appender on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", Encontro::info());

    // Initialize database connection
    info!("Connecting to database...");
    let db_pool = create_pool(&settings.database).await?;

    // Run database migrations
    run_migrations(&db_pool).await?;
    health_check(&db_pool).await.context("Database health check failed")?;

    let store: Arc<dyn EventStore> = Arc::new(DatabaseService::new(db_pool));

    // Initialize services
    info!("Initializing services...");
    let services = ServiceFactory::new(settings.clone(), store, Arc::new(SystemClock))?;

    let health = services.health_check().await;
    for issue in health.get_issues() {
        warn!(issue = %issue, "Service health issue");
    }
    if !health.is_healthy() {
        anyhow::bail!("Services are not healthy, refusing to start");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = services.scheduler().spawn(shutdown_rx);

    info!("Encontro is running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;

    info!("Shutdown requested, waiting for running passes to finish...");
    shutdown_tx.send(true).ok();
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            error!(error = %e, "Periodic task ended abnormally");
        }
    }

    info!("Encontro has been shut down.");
    Ok(())
}
