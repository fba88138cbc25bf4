// Structured logging and metrics for data source swaps and drains

use crate::config::{LogFormat, ObservabilityConfig};
use crate::drain::DrainOutcome;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. JSON output carries
/// the current span so swap and drain events keep their data source fields.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_names(true)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Structured logging initialized"
    );

    Ok(())
}

/// Install the Prometheus exporter and describe data source metrics
#[tracing::instrument]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "datasource_refresh_total",
        "Total number of data source swaps"
    );
    describe_counter!(
        "datasource_soft_evictions_total",
        "Soft eviction requests issued while draining displaced pools"
    );
    describe_counter!(
        "datasource_drain_completed_total",
        "Displaced data sources closed, by drain exit reason"
    );
    describe_gauge!(
        "datasource_draining",
        "1 while the drain worker is processing a data source"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

#[inline]
pub fn record_refresh(new_name: &str) {
    counter!("datasource_refresh_total", "data_source" => new_name.to_string()).increment(1);
}

#[inline]
pub fn record_soft_eviction(name: &str) {
    counter!("datasource_soft_evictions_total", "data_source" => name.to_string()).increment(1);
}

#[inline]
pub fn record_drain_completed(outcome: &DrainOutcome) {
    counter!(
        "datasource_drain_completed_total",
        "data_source" => outcome.name.clone(),
        "exit" => outcome.exit.as_str()
    )
    .increment(1);
}

#[inline]
pub fn set_draining(active: bool) {
    gauge!("datasource_draining").set(if active { 1.0 } else { 0.0 });
}
