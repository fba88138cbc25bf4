// Layered configuration (file, env) for the dynamic data source

use crate::errors::DataSourceError;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dynamic_datasource: DynamicDataSourceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

/// Hot-swap settings. Disabled unless `enabled` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicDataSourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_shutdown_max_retry_times")]
    pub shutdown_max_retry_times: u32,
    #[serde(default = "default_shutdown_retry_interval_ms")]
    pub shutdown_retry_interval_ms: u64,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_drain_queue_capacity")]
    pub drain_queue_capacity: usize,
}

fn default_shutdown_max_retry_times() -> u32 {
    10
}

fn default_shutdown_retry_interval_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_drain_queue_capacity() -> usize {
    16
}

impl Default for DynamicDataSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            shutdown_max_retry_times: default_shutdown_max_retry_times(),
            shutdown_retry_interval_ms: default_shutdown_retry_interval_ms(),
            backoff: BackoffKind::default(),
            max_backoff_ms: default_max_backoff_ms(),
            drain_queue_capacity: default_drain_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Settings {
    /// Load configuration with layered precedence: file → local file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides, not committed to git
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("SALAMANDER")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), DataSourceError> {
        if self.database.url.is_empty() {
            return Err(invalid("Database URL cannot be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("Database max_connections must be greater than 0"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(invalid(
                "Database min_connections cannot exceed max_connections",
            ));
        }

        if self.dynamic_datasource.drain_queue_capacity == 0 {
            return Err(invalid(
                "Dynamic datasource drain_queue_capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> DataSourceError {
    DataSourceError::InvalidConfiguration(reason.to_string())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/salamander".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            dynamic_datasource: DynamicDataSourceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert!(!settings.dynamic_datasource.enabled);
        assert_eq!(settings.dynamic_datasource.shutdown_max_retry_times, 10);
    }

    #[test]
    fn test_validation_catches_empty_database_url() {
        let mut settings = Settings::default();
        settings.database.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_min_above_max() {
        let mut settings = Settings::default();
        settings.database.min_connections = 20;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_queue_capacity() {
        let mut settings = Settings::default();
        settings.dynamic_datasource.drain_queue_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_shipped_config_keeps_dynamic_datasource_off() {
        let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config");
        let settings = Settings::load_from_path(config_dir).unwrap();

        assert!(settings.validate().is_ok());
        assert!(!settings.dynamic_datasource.enabled);
        assert_eq!(settings.dynamic_datasource.shutdown_max_retry_times, 10);
    }

    #[test]
    fn test_load_from_path_applies_dynamic_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[database]
url = "postgresql://db.internal/app"
max_connections = 4
min_connections = 1
connect_timeout_seconds = 5

[dynamic_datasource]
enabled = true
backoff = "exponential"

[observability]
log_level = "debug"
"#,
        )
        .unwrap();

        let settings = Settings::load_from_path(dir.path()).unwrap();
        assert_eq!(settings.database.url, "postgresql://db.internal/app");
        assert!(settings.dynamic_datasource.enabled);
        assert_eq!(settings.dynamic_datasource.backoff, BackoffKind::Exponential);
        assert_eq!(settings.dynamic_datasource.shutdown_max_retry_times, 10);
        assert_eq!(settings.dynamic_datasource.drain_queue_capacity, 16);
        assert_eq!(settings.observability.log_format, LogFormat::Json);
        assert_eq!(settings.observability.metrics_port, None);
    }
}
