// Data source handles and the pool lifecycle they may expose

pub mod direct;
pub mod postgres;

pub use direct::DirectDataSource;
pub use postgres::PgDataSource;

use crate::errors::DataSourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a data source handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSourceId(Uuid);

impl DataSourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DataSourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A source of database connections that can be installed as current
#[async_trait]
pub trait DataSource: Send + Sync {
    fn id(&self) -> DataSourceId;

    /// Human-readable label used in logs and metrics
    fn name(&self) -> &str;

    /// Verify that a connection can be obtained and used
    async fn health_check(&self) -> Result<(), DataSourceError>;

    /// Pool lifecycle, when this handle owns a pool
    ///
    /// Handles without a pool return `None` and are skipped when drained.
    fn as_managed(&self) -> Option<&dyn ManagedPool> {
        None
    }
}

/// Lifecycle operations of a connection pool
#[async_trait]
pub trait ManagedPool: Send + Sync {
    /// Number of connections currently checked out
    async fn active_connections(&self) -> u32;

    /// Recycle idle connections without touching checked-out ones
    async fn soft_evict_idle(&self);

    /// Release every pooled resource
    async fn close(&self);
}
