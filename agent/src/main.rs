// Data source agent entry point
// Keeps a PostgreSQL pool current and hot-swaps it when configuration is reloaded (SIGHUP)

use anyhow::{Context, Result};
use datasource::bootstrap::{self, DynamicHandles};
use datasource::config::{DatabaseConfig, Settings};
use datasource::{telemetry, DataSource, ManagedPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings.validate().context("Invalid configuration")?;

    telemetry::init_logging(&settings.observability)?;
    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    info!(
        dynamic_datasource = settings.dynamic_datasource.enabled,
        "Starting data source agent"
    );

    let initial = Arc::new(bootstrap::init_pg_data_source(&settings.database, "primary-0").await?);

    match bootstrap::init_dynamic_datasource(&settings, initial.clone()) {
        Some(handles) => run_dynamic(settings.database, handles).await?,
        None => {
            run_static(initial.as_ref()).await?;
            initial.close().await;
        }
    }

    info!("Data source agent stopped");
    Ok(())
}

/// Serve a fixed data source until asked to stop
async fn run_static(source: &dyn DataSource) -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => check_health(source).await,
            _ = terminate.recv() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Received shutdown signal");
    Ok(())
}

/// Serve the swappable data source, refreshing it on SIGHUP
async fn run_dynamic(mut database: DatabaseConfig, handles: DynamicHandles) -> Result<()> {
    let mut hangup = signal(SignalKind::hangup()).context("Failed to listen for SIGHUP")?;
    let mut terminate = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    let mut generation = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = handles.data_source.current();
                check_health(current.as_ref()).await;
            }
            _ = hangup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                match reload(&database, &handles, generation + 1).await {
                    Ok(Some(updated)) => {
                        database = updated;
                        generation += 1;
                    }
                    Ok(None) => info!("Database configuration unchanged, keeping current data source"),
                    Err(e) => error!(error = %format!("{:#}", e), "Data source reload failed"),
                }
            }
            _ = terminate.recv() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Received shutdown signal, draining displaced data sources");
    handles.refresher.shutdown().await;

    let current = handles.data_source.current();
    if let Some(pool) = current.as_managed() {
        pool.close().await;
    }
    Ok(())
}

/// Connect a pool for the reloaded configuration and swap it in
///
/// Returns the new database configuration, or `None` when it did not change.
async fn reload(
    current: &DatabaseConfig,
    handles: &DynamicHandles,
    generation: u32,
) -> Result<Option<DatabaseConfig>> {
    let settings = Settings::load().context("Failed to reload configuration")?;
    settings.validate().context("Reloaded configuration is invalid")?;

    if &settings.database == current {
        return Ok(None);
    }

    let name = format!("primary-{}", generation);
    let source = bootstrap::init_pg_data_source(&settings.database, &name).await?;
    if let Err(e) = source.health_check().await {
        source.close().await;
        return Err(e).context("New data source failed health check");
    }

    let ticket = handles.refresher.refresh(Arc::new(source)).await?;
    info!(data_source = %name, displaced_id = %ticket.source_id(), "Data source refreshed");

    tokio::spawn(async move {
        match ticket.wait().await {
            Some(outcome) => info!(
                displaced = %outcome.name,
                evictions = outcome.evictions,
                exit = %outcome.exit,
                "Displaced data source drained"
            ),
            None => warn!("Drain worker stopped before the displaced data source was closed"),
        }
    });

    Ok(Some(settings.database))
}

async fn check_health(source: &dyn DataSource) {
    if let Err(e) = source.health_check().await {
        warn!(data_source = %source.name(), error = %e, "Data source health check failed");
    }
}
