use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::pool::PendingCounter;

use super::types::PipelineError;

/// Watches the pending count and the run's elapsed time.
///
/// Each tick is scheduled after the previous one has been handled, so a slow
/// tick delays the next one instead of bunching up.
pub(crate) struct Monitor {
    pub(crate) pending: PendingCounter,
    pub(crate) timeout: Option<Duration>,
    pub(crate) tick: Duration,
}

impl Monitor {
    /// Cancels `shutdown` once nothing is pending, or fails with
    /// [`PipelineError::TimedOut`] when the timeout is crossed first.
    ///
    /// Returns early if `shutdown` is cancelled by someone else.
    pub(crate) async fn watch(self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        let mut elapsed = Duration::ZERO;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("monitor stopped by external shutdown");
                    return Ok(());
                }
                _ = sleep(self.tick) => {}
            }
            elapsed += self.tick;

            if let Some(timeout) = self.timeout {
                if elapsed > timeout {
                    error!(
                        pending = self.pending.get(),
                        "timed out after {} seconds",
                        timeout.as_secs()
                    );
                    return Err(PipelineError::TimedOut(timeout));
                }
            }

            if self.pending.is_idle() {
                info!(elapsed_secs = elapsed.as_secs(), "no pending tasks left");
                shutdown.cancel();
                return Ok(());
            }
        }
    }
}
