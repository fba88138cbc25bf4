// Hot swap of the current data source with background drain of the old one

use crate::backoff::{self, BackoffStrategy};
use crate::config::DynamicDataSourceConfig;
use crate::drain::{drain_data_source, DrainOutcome, DrainState};
use crate::dynamic::DynamicDataSource;
use crate::errors::DataSourceError;
use crate::pool::{DataSource, DataSourceId};
use crate::telemetry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Drain worker configuration
#[derive(Debug, Clone)]
pub struct DrainSettings {
    /// Soft eviction attempts before a pool is force-closed
    pub max_retries: u32,
    pub backoff: Arc<dyn BackoffStrategy>,
    /// Pending drains the worker queue holds before `refresh` waits
    pub queue_capacity: usize,
}

impl DrainSettings {
    pub fn from_config(config: &DynamicDataSourceConfig) -> Self {
        Self {
            max_retries: config.shutdown_max_retry_times,
            backoff: backoff::from_config(config),
            queue_capacity: config.drain_queue_capacity.max(1),
        }
    }
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self::from_config(&DynamicDataSourceConfig::default())
    }
}

/// A displaced data source waiting for the drain worker
struct DrainTask {
    source: Arc<dyn DataSource>,
    max_retries: u32,
    state: watch::Sender<DrainState>,
    done: oneshot::Sender<DrainOutcome>,
}

impl DrainTask {
    fn new(source: Arc<dyn DataSource>, max_retries: u32) -> (Self, DrainTicket) {
        let (state_tx, state_rx) = watch::channel(DrainState::Scheduled);
        let (done_tx, done_rx) = oneshot::channel();
        let ticket = DrainTicket {
            source_id: source.id(),
            state: state_rx,
            done: done_rx,
        };
        let task = Self {
            source,
            max_retries,
            state: state_tx,
            done: done_tx,
        };
        (task, ticket)
    }
}

/// Handle on a submitted drain
///
/// Dropping it does not cancel the drain.
#[derive(Debug)]
pub struct DrainTicket {
    source_id: DataSourceId,
    state: watch::Receiver<DrainState>,
    done: oneshot::Receiver<DrainOutcome>,
}

impl DrainTicket {
    /// Id of the data source being drained
    pub fn source_id(&self) -> DataSourceId {
        self.source_id
    }

    pub fn state(&self) -> DrainState {
        *self.state.borrow()
    }

    /// Wait for the data source to be closed
    ///
    /// Returns `None` if the worker stopped before finishing this drain.
    pub async fn wait(self) -> Option<DrainOutcome> {
        self.done.await.ok()
    }
}

/// Coordinates data source swaps
///
/// Swaps are serialized; each displaced source goes to a single background
/// worker that drains queued sources one at a time in submission order.
pub struct DataSourceRefresher {
    source: Arc<DynamicDataSource>,
    max_retries: u32,
    /// Held for the whole reserve/swap/submit sequence
    sender: Mutex<Option<mpsc::Sender<DrainTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DataSourceRefresher {
    /// Create a refresher and spawn its drain worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(source: Arc<DynamicDataSource>, settings: DrainSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let worker = tokio::spawn(run_drain_worker(rx, settings.backoff));

        info!(
            max_retries = settings.max_retries,
            queue_capacity = settings.queue_capacity,
            "Data source refresher started"
        );

        Self {
            source,
            max_retries: settings.max_retries,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn data_source(&self) -> &Arc<DynamicDataSource> {
        &self.source
    }

    /// Install `new_source` as current and schedule the old one for drain
    ///
    /// Returns once the old source is queued; does not wait for the drain.
    ///
    /// # Errors
    /// `RefresherShutDown` after `shutdown`, `DrainWorkerUnavailable` if the
    /// worker has died. No swap happens in either case.
    #[instrument(skip(self, new_source), fields(new_id = %new_source.id(), new_name = %new_source.name()))]
    pub async fn refresh(
        &self,
        new_source: Arc<dyn DataSource>,
    ) -> Result<DrainTicket, DataSourceError> {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(DataSourceError::RefresherShutDown)?;

        // Queue slot first so a swap always has its drain enqueued
        let permit = sender
            .reserve()
            .await
            .map_err(|_| DataSourceError::DrainWorkerUnavailable)?;

        let new_name = new_source.name().to_string();
        let old = self.source.get_and_set(new_source);
        telemetry::record_refresh(&new_name);
        info!(
            old_id = %old.id(),
            old_name = %old.name(),
            "Data source swapped, scheduling drain of previous source"
        );

        let (task, ticket) = DrainTask::new(old, self.max_retries);
        permit.send(task);
        Ok(ticket)
    }

    /// Queue a data source for drain and close
    #[instrument(skip(self, source), fields(data_source_id = %source.id(), data_source = %source.name()))]
    pub async fn drain(&self, source: Arc<dyn DataSource>) -> Result<DrainTicket, DataSourceError> {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(DataSourceError::RefresherShutDown)?;

        let (task, ticket) = DrainTask::new(source, self.max_retries);
        sender
            .send(task)
            .await
            .map_err(|_| DataSourceError::DrainWorkerUnavailable)?;
        Ok(ticket)
    }

    /// Stop accepting work and wait for every queued drain to finish
    pub async fn shutdown(&self) {
        // Dropping the sender lets the worker run the queue dry and exit
        self.sender.lock().await.take();

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Drain worker terminated abnormally");
            }
            info!("Data source refresher shut down");
        }
    }
}

async fn run_drain_worker(mut rx: mpsc::Receiver<DrainTask>, backoff: Arc<dyn BackoffStrategy>) {
    while let Some(task) = rx.recv().await {
        let _ = task.state.send(DrainState::Draining);
        telemetry::set_draining(true);

        let outcome =
            drain_data_source(task.source.as_ref(), task.max_retries, backoff.as_ref()).await;

        telemetry::set_draining(false);
        let _ = task.state.send(DrainState::Closed);
        // Nobody may be waiting on the ticket
        let _ = task.done.send(outcome);
    }
    info!("Drain worker stopped");
}
