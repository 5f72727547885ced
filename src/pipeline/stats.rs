//! Counters collected during a run.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Run statistics, updated concurrently by every worker.
#[derive(Debug, Default)]
pub struct PipelineStats {
    tasks_planned: AtomicU64,
    tasks_admitted: AtomicU64,
    extraction_failures: AtomicU64,
    adaptation_failures: AtomicU64,
    dispatch_failures: AtomicU64,
    load_tasks_created: AtomicU64,
    rows_extracted: AtomicU64,
    rows_persisted: AtomicU64,
    rows_lost: AtomicU64,
    persistence_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub tasks_planned: u64,
    pub tasks_admitted: u64,
    pub extraction_failures: u64,
    pub adaptation_failures: u64,
    pub dispatch_failures: u64,
    pub load_tasks_created: u64,
    pub rows_extracted: u64,
    pub rows_persisted: u64,
    pub rows_lost: u64,
    pub persistence_failures: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_planned(&self, tasks: usize) {
        self.tasks_planned.fetch_add(tasks as u64, Ordering::Relaxed);
    }

    pub fn record_admitted(&self) {
        self.tasks_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extracted(&self, rows: usize) {
        self.rows_extracted.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_adaptation_failure(&self) {
        self.adaptation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_task(&self) {
        self.load_tasks_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self, rows: usize) {
        self.rows_persisted.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self, rows_lost: usize) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
        self.rows_lost.fetch_add(rows_lost as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_planned: self.tasks_planned.load(Ordering::Relaxed),
            tasks_admitted: self.tasks_admitted.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            adaptation_failures: self.adaptation_failures.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            load_tasks_created: self.load_tasks_created.load(Ordering::Relaxed),
            rows_extracted: self.rows_extracted.load(Ordering::Relaxed),
            rows_persisted: self.rows_persisted.load(Ordering::Relaxed),
            rows_lost: self.rows_lost.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}
