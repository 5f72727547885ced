use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::driver::{Destination, DriverError, ExtractionTask, LoadTask, Source};
use crate::pool::{PendingCounter, QueuePool};

use super::stats::PipelineStats;

/// Consumes one extraction queue: read, adapt, hand off to the load pool.
pub(crate) struct ExtractionWorker {
    pub(crate) queue: usize,
    pub(crate) receiver: mpsc::Receiver<ExtractionTask>,
    pub(crate) source: Arc<dyn Source>,
    pub(crate) destination: Arc<dyn Destination>,
    pub(crate) load_pool: QueuePool<LoadTask>,
    pub(crate) pending: PendingCounter,
    pub(crate) stats: Arc<PipelineStats>,
}

impl ExtractionWorker {
    pub(crate) async fn run(mut self) {
        while let Some(task) = self.receiver.recv().await {
            self.handle(task).await;
        }
        debug!(queue = self.queue, "extraction queue closed");
    }

    async fn handle(&self, task: ExtractionTask) {
        let rows = match self.source.extract(&task).await {
            Ok(rows) => rows,
            Err(e) => {
                self.pending.retire();
                self.stats.record_extraction_failure();
                warn!(queue = self.queue, error = %e, "failed task on extraction queue");
                return;
            }
        };
        let count = rows.len();
        self.stats.record_extracted(count);

        // Rows already read are dropped when adaptation fails.
        let load_task = match self.destination.adapt(rows).await {
            Ok(load_task) => load_task,
            Err(e) => {
                self.pending.retire();
                self.stats.record_adaptation_failure();
                warn!(
                    queue = self.queue,
                    rows = count,
                    error = %e,
                    "failed load task generation on extraction queue"
                );
                return;
            }
        };
        self.stats.record_load_task();

        match self.load_pool.dispatch(load_task).await {
            Ok(target) => {
                info!(queue = self.queue, load_queue = target, rows = count, "selected rows");
            }
            Err(e) => {
                self.pending.retire();
                self.stats.record_dispatch_failure();
                error!(queue = self.queue, rows = count, error = %e, "could not hand off load task");
            }
        }
    }
}

/// Consumes one load queue and persists every task it receives.
pub(crate) struct LoadWorker {
    pub(crate) queue: usize,
    pub(crate) receiver: mpsc::Receiver<LoadTask>,
    pub(crate) destination: Arc<dyn Destination>,
    pub(crate) pending: PendingCounter,
    pub(crate) stats: Arc<PipelineStats>,
}

impl LoadWorker {
    pub(crate) async fn run(mut self) {
        while let Some(task) = self.receiver.recv().await {
            // The lineage retires on receipt, before the persist outcome is known.
            let remaining = self.pending.retire();
            let attempted = task.row_count();

            match self.destination.persist(task).await {
                Ok(stored) => {
                    self.stats.record_persisted(stored);
                    info!(queue = self.queue, rows = stored, pending = remaining, "stored rows");
                }
                Err(e) => {
                    let lost = match &e {
                        DriverError::Persistence { rows, .. } => *rows,
                        _ => attempted,
                    };
                    self.stats.record_persistence_failure(lost);
                    warn!(queue = self.queue, lost, error = %e, "failed task on load queue");
                }
            }
        }
        debug!(queue = self.queue, "load queue closed");
    }
}

/// Fans planned tasks out over the extraction pool.
///
/// Every task must already be counted in `pending`; a task that cannot be
/// enqueued is retired here.
pub(crate) async fn admit(
    pool: QueuePool<ExtractionTask>,
    tasks: Vec<ExtractionTask>,
    pending: PendingCounter,
    stats: Arc<PipelineStats>,
) {
    let total = tasks.len();
    for task in tasks {
        match pool.dispatch(task).await {
            Ok(_) => stats.record_admitted(),
            Err(e) => {
                pending.retire();
                stats.record_dispatch_failure();
                error!(error = %e, "could not admit extraction task");
            }
        }
    }
    debug!(tasks = total, "admission finished");
}
