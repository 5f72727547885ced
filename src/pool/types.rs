use thiserror::Error;

/// Errors that can occur while dispatching into a queue pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every consumer of the pool has gone away.
    #[error("queue {queue} of the {pool} pool is closed")]
    Closed { pool: &'static str, queue: usize },
}
