// Bounded drain-down of a displaced data source

use crate::backoff::BackoffStrategy;
use crate::pool::{DataSource, DataSourceId};
use crate::telemetry;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of a drain task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainState {
    /// Queued on the drain worker
    Scheduled,
    /// Worker is evicting connections
    Draining,
    /// Pool closed (or skipped); terminal
    Closed,
}

/// Why the drain loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainExit {
    /// Active connection count reached zero
    Idle,
    /// Retry budget ran out with connections still checked out
    RetriesExhausted,
    /// Handle has no pool lifecycle
    NotPoolable,
}

impl DrainExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainExit::Idle => "idle",
            DrainExit::RetriesExhausted => "retries_exhausted",
            DrainExit::NotPoolable => "not_poolable",
        }
    }
}

impl fmt::Display for DrainExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of draining one data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainOutcome {
    pub id: DataSourceId,
    pub name: String,
    pub evictions: u32,
    pub exit: DrainExit,
}

/// Drain and close a data source
///
/// Soft-evicts idle connections while any connection is checked out, at most
/// `max_retries` times, sleeping between attempts. The pool is closed
/// whatever the loop ends with.
#[instrument(skip(source, backoff), fields(data_source = %source.name(), data_source_id = %source.id()))]
pub async fn drain_data_source(
    source: &dyn DataSource,
    max_retries: u32,
    backoff: &dyn BackoffStrategy,
) -> DrainOutcome {
    let Some(pool) = source.as_managed() else {
        debug!("Data source has no pool lifecycle, skipping drain");
        let outcome = build_outcome(source, 0, DrainExit::NotPoolable);
        telemetry::record_drain_completed(&outcome);
        return outcome;
    };

    let mut evictions = 0u32;
    let mut active = pool.active_connections().await;
    while active > 0 && evictions < max_retries {
        pool.soft_evict_idle().await;
        evictions += 1;
        telemetry::record_soft_eviction(source.name());
        debug!(active, evictions, max_retries, "Soft eviction requested");

        tokio::time::sleep(backoff.delay(evictions)).await;
        active = pool.active_connections().await;
    }

    let exit = if active == 0 {
        DrainExit::Idle
    } else {
        warn!(
            active,
            max_retries, "Retry budget exhausted, force-closing pool with active connections"
        );
        DrainExit::RetriesExhausted
    };

    pool.close().await;

    let outcome = build_outcome(source, evictions, exit);
    telemetry::record_drain_completed(&outcome);
    info!(evictions, exit = %exit, "Displaced data source closed");
    outcome
}

fn build_outcome(source: &dyn DataSource, evictions: u32, exit: DrainExit) -> DrainOutcome {
    DrainOutcome {
        id: source.id(),
        name: source.name().to_string(),
        evictions,
        exit,
    }
}
