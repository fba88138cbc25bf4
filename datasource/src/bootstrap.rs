// Bootstrap helpers shared by binaries

use crate::config::{DatabaseConfig, Settings};
use crate::dynamic::DynamicDataSource;
use crate::pool::{DataSource, PgDataSource};
use crate::refresher::{DataSourceRefresher, DrainSettings};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Shared data source plus the refresher that swaps it
pub struct DynamicHandles {
    pub data_source: Arc<DynamicDataSource>,
    pub refresher: DataSourceRefresher,
}

/// Connect a PostgreSQL pool
///
/// # Errors
/// Returns error if the pool cannot connect
#[tracing::instrument(skip(config))]
pub async fn init_pg_data_source(config: &DatabaseConfig, name: &str) -> Result<PgDataSource> {
    PgDataSource::connect(config, name)
        .await
        .with_context(|| format!("Failed to initialize data source '{}'", name))
}

/// Wrap `initial` in a swappable data source when the feature is enabled
///
/// Returns `None` when `dynamic_datasource.enabled` is false; callers then use
/// `initial` directly. Must be called from within a tokio runtime.
pub fn init_dynamic_datasource(
    settings: &Settings,
    initial: Arc<dyn DataSource>,
) -> Option<DynamicHandles> {
    if !settings.dynamic_datasource.enabled {
        info!("Dynamic data source disabled");
        return None;
    }

    let data_source = Arc::new(DynamicDataSource::new(initial));
    let refresher = DataSourceRefresher::new(
        data_source.clone(),
        DrainSettings::from_config(&settings.dynamic_datasource),
    );

    info!(
        initial_id = %data_source.current_id(),
        shutdown_max_retry_times = settings.dynamic_datasource.shutdown_max_retry_times,
        "Dynamic data source initialized"
    );

    Some(DynamicHandles {
        data_source,
        refresher,
    })
}
