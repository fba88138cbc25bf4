// Unpooled data source: opens a fresh connection for every caller

use super::{DataSource, DataSourceId};
use crate::errors::DataSourceError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;

/// Data source without a pool lifecycle
///
/// Draining one is a no-op since there is nothing to evict or close.
#[derive(Debug, Clone)]
pub struct DirectDataSource {
    id: DataSourceId,
    name: String,
    options: PgConnectOptions,
}

impl DirectDataSource {
    pub fn new(options: PgConnectOptions, name: impl Into<String>) -> Self {
        Self {
            id: DataSourceId::new(),
            name: name.into(),
            options,
        }
    }

    pub fn from_url(url: &str, name: impl Into<String>) -> Result<Self, DataSourceError> {
        let options = PgConnectOptions::from_str(url)
            .map_err(|e| DataSourceError::InvalidConfiguration(e.to_string()))?;
        Ok(Self::new(options, name))
    }

    /// Open a new connection; the caller owns and closes it
    pub async fn connect(&self) -> Result<PgConnection, DataSourceError> {
        Ok(self.options.connect().await?)
    }
}

#[async_trait]
impl DataSource for DirectDataSource {
    fn id(&self) -> DataSourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<(), DataSourceError> {
        let mut conn = self.connect().await?;
        conn.ping()
            .await
            .map_err(|e| DataSourceError::HealthCheckFailed(e.to_string()))?;
        conn.close()
            .await
            .map_err(|e| DataSourceError::HealthCheckFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_source_is_not_managed() {
        let source =
            DirectDataSource::from_url("postgresql://postgres@localhost/test_db", "direct").unwrap();
        assert!(source.as_managed().is_none());
        assert_eq!(source.name(), "direct");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = DirectDataSource::from_url("not a url", "direct");
        assert!(matches!(
            result,
            Err(DataSourceError::InvalidConfiguration(_))
        ));
    }
}
