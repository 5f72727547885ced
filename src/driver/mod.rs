use async_trait::async_trait;

pub mod csv;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod options;
pub mod registry;
pub mod types;

pub use options::{Options, OptionsExt};
pub use registry::{DestinationFactory, DriverConfig, Registry, SourceFactory};
pub use types::{DriverError, ExtractionTask, LoadTask, Meta, ResultSet, Row, Value};

/// Reads data out of a backing store in chunks.
///
/// # Lifecycle
///
/// 1. construction - driver specific, fails with `Configuration` or `Connection`
/// 2. `plan()` - divide the whole source into extraction tasks
/// 3. `extract()` - called concurrently, once per planned task
#[async_trait]
pub trait Source: Send + Sync {
    /// Produces the finite, ordered list of tasks covering the whole source.
    async fn plan(&self) -> Result<Vec<ExtractionTask>, DriverError>;

    /// Reads the chunk described by `task`.
    ///
    /// Called from several extraction workers at once.
    async fn extract(&self, task: &ExtractionTask) -> Result<ResultSet, DriverError>;
}

/// Writes extracted rows into a backing store.
///
/// # Lifecycle
///
/// 1. construction - driver specific; may validate the target and truncate it
/// 2. `adapt()` - turn one result set into a load task, on an extraction worker
/// 3. `persist()` - write one load task, on a load worker
#[async_trait]
pub trait Destination: Send + Sync {
    /// Pure transform from rows to a write operation.
    async fn adapt(&self, rows: ResultSet) -> Result<LoadTask, DriverError>;

    /// Writes the task and returns the number of rows stored.
    ///
    /// On failure the error must be [`DriverError::Persistence`] carrying the
    /// attempted row count.
    async fn persist(&self, task: LoadTask) -> Result<usize, DriverError>;
}
