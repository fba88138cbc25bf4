// PostgreSQL connection pool data source

use super::{DataSource, DataSourceId, ManagedPool};
use crate::config::DatabaseConfig;
use crate::errors::DataSourceError;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How long `close` waits for checked-out connections to come back
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pooled PostgreSQL data source
/// Wraps a sqlx pool and exposes its lifecycle for draining
#[derive(Debug, Clone)]
pub struct PgDataSource {
    id: DataSourceId,
    name: String,
    pool: PgPool,
    close_timeout: Duration,
}

impl PgDataSource {
    /// Connect a new pool
    ///
    /// # Errors
    /// Returns `DataSourceError::ConnectionFailed` if unable to establish connection
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig, name: &str) -> Result<Self, DataSourceError> {
        info!("Initializing database connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create database pool");
                DataSourceError::ConnectionFailed(e.to_string())
            })?;

        let source = Self::from_pool(pool, name);
        info!(
            data_source_id = %source.id,
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool initialized successfully"
        );

        Ok(source)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, name: impl Into<String>) -> Self {
        Self {
            id: DataSourceId::new(),
            name: name.into(),
            pool,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }

    /// Underlying pool, used by query code
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn size(&self) -> u32 {
        self.pool.size()
    }

    pub fn num_idle(&self) -> usize {
        self.pool.num_idle()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[async_trait]
impl DataSource for PgDataSource {
    fn id(&self) -> DataSourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(data_source = %self.name))]
    async fn health_check(&self) -> Result<(), DataSourceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Database health check failed");
                DataSourceError::HealthCheckFailed(e.to_string())
            })?;

        debug!("Database health check passed");
        Ok(())
    }

    fn as_managed(&self) -> Option<&dyn ManagedPool> {
        Some(self)
    }
}

#[async_trait]
impl ManagedPool for PgDataSource {
    async fn active_connections(&self) -> u32 {
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        self.pool.size().saturating_sub(idle)
    }

    async fn soft_evict_idle(&self) {
        // try_acquire only hands out idle connections, never waits
        let mut evicted = 0usize;
        for _ in 0..self.pool.num_idle() {
            let Some(conn) = self.pool.try_acquire() else {
                break;
            };
            if let Err(e) = conn.close().await {
                warn!(data_source = %self.name, error = %e, "Failed to close idle connection");
            }
            evicted += 1;
        }
        debug!(data_source = %self.name, evicted, "Soft-evicted idle connections");
    }

    async fn close(&self) {
        info!(data_source = %self.name, "Closing database connection pool");
        // The pool refuses new acquires from here on; connections still checked
        // out are closed when their holders return them.
        if tokio::time::timeout(self.close_timeout, self.pool.close())
            .await
            .is_err()
        {
            let active = self.active_connections().await;
            warn!(
                data_source = %self.name,
                active,
                "Connections still checked out, pool closed without waiting for them"
            );
            return;
        }
        info!(data_source = %self.name, "Database connection pool closed");
    }
}
