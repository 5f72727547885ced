use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::driver::{Destination, LoadTask, Registry, Source};
use crate::pool::{PendingCounter, QueuePool};

pub mod config;
mod monitor;
pub mod stats;
pub mod types;
mod worker;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use stats::{PipelineStats, StatsSnapshot};
pub use types::PipelineError;

use monitor::Monitor;
use worker::{ExtractionWorker, LoadWorker};

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Wall-clock time from the start instant to the termination signal.
    pub elapsed: Duration,
    /// Lineages still pending when the run ended; non-zero only after an
    /// external interrupt.
    pub pending: i64,
    pub stats: StatsSnapshot,
}

/// Moves every chunk of a source into a destination.
///
/// One run plans the source, starts one worker per extraction and load
/// queue, fans the planned tasks out over the extraction pool and waits for
/// the termination signal.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn Source>,
    destination: Arc<dyn Destination>,
    pending: PendingCounter,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn Source>,
        destination: Arc<dyn Destination>,
    ) -> Self {
        Pipeline {
            config,
            source,
            destination,
            pending: PendingCounter::new(),
            stats: Arc::new(PipelineStats::new()),
        }
    }

    /// Resolves and constructs both drivers named in `config`.
    ///
    /// The destination is built first so a truncating destination is ready
    /// before the source is touched.
    pub async fn connect(registry: &Registry, config: &AppConfig) -> Result<Self, PipelineError> {
        let pipeline_config = config
            .pipeline_config()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        info!(driver = %config.destination.driver, "selecting destination driver");
        let destination = registry.create_destination(&config.destination).await?;
        info!(driver = %config.source.driver, "selecting source driver");
        let source = registry.create_source(&config.source).await?;

        Ok(Pipeline::new(pipeline_config, source, destination))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pending(&self) -> &PendingCounter {
        &self.pending
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs the transfer until every lineage has retired or `shutdown` is
    /// cancelled from outside.
    ///
    /// Planning errors are returned before any worker starts. A timeout
    /// aborts every worker and returns [`PipelineError::TimedOut`].
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<RunSummary, PipelineError> {
        self.run_since(Instant::now(), shutdown).await
    }

    /// Same as [`Pipeline::run`], with the summary's elapsed time measured
    /// from `started`, e.g. process start so driver setup is included.
    pub async fn run_since(
        &self,
        started: Instant,
        shutdown: &CancellationToken,
    ) -> Result<RunSummary, PipelineError> {

        info!("getting extraction tasks");
        let tasks = self.source.plan().await?;
        self.stats.record_planned(tasks.len());
        info!(tasks = tasks.len(), "planned extraction tasks");

        let (extraction_pool, extraction_queues) = QueuePool::new(
            "extraction",
            self.config.source_concurrency(),
            self.config.queue_capacity(),
            self.config.retry_interval(),
        );
        let (load_pool, load_queues) = QueuePool::<LoadTask>::new(
            "load",
            self.config.destination_concurrency(),
            self.config.queue_capacity(),
            self.config.retry_interval(),
        );

        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        for (queue, receiver) in load_queues.into_iter().enumerate() {
            let worker = LoadWorker {
                queue,
                receiver,
                destination: Arc::clone(&self.destination),
                pending: self.pending.clone(),
                stats: Arc::clone(&self.stats),
            };
            workers.push(tokio::spawn(worker.run()));
        }

        for (queue, receiver) in extraction_queues.into_iter().enumerate() {
            let worker = ExtractionWorker {
                queue,
                receiver,
                source: Arc::clone(&self.source),
                destination: Arc::clone(&self.destination),
                load_pool: load_pool.clone(),
                pending: self.pending.clone(),
                stats: Arc::clone(&self.stats),
            };
            workers.push(tokio::spawn(worker.run()));
        }
        // Load queues now close once the last extraction worker exits.
        drop(load_pool);

        info!(
            extraction_queues = self.config.source_concurrency(),
            load_queues = self.config.destination_concurrency(),
            "workers started"
        );

        // Count every lineage before the first one can retire, so the monitor
        // never sees a transient zero while admission is still running.
        for _ in &tasks {
            self.pending.admit();
        }
        let admission = tokio::spawn(worker::admit(
            extraction_pool,
            tasks,
            self.pending.clone(),
            Arc::clone(&self.stats),
        ));

        let monitor = Monitor {
            pending: self.pending.clone(),
            timeout: self.config.timeout(),
            tick: self.config.tick_interval(),
        };
        let mut monitor = tokio::spawn(monitor.watch(shutdown.clone()));

        info!("running");
        tokio::select! {
            _ = shutdown.cancelled() => {
                monitor.abort();
            }
            outcome = &mut monitor => {
                if let Err(e) = outcome.map_err(PipelineError::from).and_then(|r| r) {
                    admission.abort();
                    for worker in &workers {
                        worker.abort();
                    }
                    return Err(e);
                }
            }
        }
        // Stop feeding after an interrupt; workers drain and exit on their own.
        admission.abort();

        let summary = RunSummary {
            elapsed: started.elapsed(),
            pending: self.pending.get(),
            stats: self.stats.snapshot(),
        };
        info!(
            rows_persisted = summary.stats.rows_persisted,
            rows_lost = summary.stats.rows_lost,
            "DONE, took {} seconds",
            summary.elapsed.as_secs()
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
