use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::sleep;
use tracing::trace;

use super::types::PoolError;

/// A fixed set of bounded FIFO queues of one task type.
///
/// Each queue has exactly one consumer (the receiver handed out by
/// [`QueuePool::new`]) and any number of producers: every clone of the pool
/// can dispatch. The queues close once every clone has been dropped.
pub struct QueuePool<T> {
    name: &'static str,
    senders: Vec<mpsc::Sender<T>>,
    capacity: usize,
    retry_interval: Duration,
}

impl<T> Clone for QueuePool<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            senders: self.senders.clone(),
            capacity: self.capacity,
            retry_interval: self.retry_interval,
        }
    }
}

impl<T> QueuePool<T>
where
    T: Send + 'static,
{
    /// Creates `queues` queues (at least one) bounded to `capacity` tasks each.
    pub fn new(
        name: &'static str,
        queues: usize,
        capacity: usize,
        retry_interval: Duration,
    ) -> (Self, Vec<mpsc::Receiver<T>>) {
        let queues = queues.max(1);
        let capacity = capacity.max(1);
        let mut senders = Vec::with_capacity(queues);
        let mut receivers = Vec::with_capacity(queues);

        for _ in 0..queues {
            let (tx, rx) = mpsc::channel(capacity);
            senders.push(tx);
            receivers.push(rx);
        }

        let pool = Self {
            name,
            senders,
            capacity,
            retry_interval,
        };

        (pool, receivers)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of queues in the pool.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Capacity shared by every queue.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of tasks waiting in `queue`.
    pub fn depth(&self, queue: usize) -> Option<usize> {
        self.senders
            .get(queue)
            .map(|tx| tx.max_capacity() - tx.capacity())
    }

    pub fn depths(&self) -> Vec<usize> {
        (0..self.len()).filter_map(|id| self.depth(id)).collect()
    }

    /// Id of the queue with the fewest waiting tasks, lowest id on ties.
    ///
    /// Depths are read fresh on every call.
    pub fn select_queue(&self) -> usize {
        (0..self.len())
            .min_by_key(|&id| self.depth(id).unwrap_or(usize::MAX))
            .unwrap_or(0)
    }

    /// Enqueues `task` on the least-loaded queue and returns its id.
    ///
    /// When the chosen queue is full the task is kept, the caller sleeps for
    /// the retry interval and the least-loaded queue is resolved again across
    /// the whole pool. Tasks are never dropped while the pool is open.
    pub async fn dispatch(&self, task: T) -> Result<usize, PoolError> {
        let mut task = task;
        loop {
            let queue = self.select_queue();
            match self.senders[queue].try_send(task) {
                Ok(()) => return Ok(queue),
                Err(TrySendError::Full(returned)) => {
                    trace!(pool = self.name, queue, "least-loaded queue is full, backing off");
                    task = returned;
                    sleep(self.retry_interval).await;
                }
                Err(TrySendError::Closed(_)) => {
                    return Err(PoolError::Closed {
                        pool: self.name,
                        queue,
                    })
                }
            }
        }
    }
}
