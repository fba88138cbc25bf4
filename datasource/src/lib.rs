// Hot-swappable PostgreSQL data source with graceful drain of displaced pools

pub mod backoff;
pub mod bootstrap;
pub mod config;
pub mod drain;
pub mod dynamic;
pub mod errors;
pub mod pool;
pub mod refresher;
pub mod telemetry;

pub use drain::{DrainExit, DrainOutcome, DrainState};
pub use dynamic::DynamicDataSource;
pub use errors::DataSourceError;
pub use pool::{DataSource, DataSourceId, ManagedPool};
pub use refresher::{DataSourceRefresher, DrainSettings, DrainTicket};
