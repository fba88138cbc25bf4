// Error types for data source management

use thiserror::Error;

/// Data source and refresher errors
#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Data source health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Data source refresher has been shut down")]
    RefresherShutDown,

    #[error("Drain worker is no longer running")]
    DrainWorkerUnavailable,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<sqlx::Error> for DataSourceError {
    fn from(err: sqlx::Error) -> Self {
        DataSourceError::ConnectionFailed(err.to_string())
    }
}
