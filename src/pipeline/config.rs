// src/pipeline/config.rs

use derive_builder::Builder;
use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct PipelineConfig {
    /// Overall run timeout in milliseconds, truncated to whole seconds;
    /// anything under one second disables it
    #[builder(default = "0")]
    pub(crate) timeout_ms: u64,

    /// Number of extraction queues and workers
    #[builder(default = "1")]
    pub(crate) source_concurrency: usize,

    /// Number of load queues and workers
    #[builder(default = "1")]
    pub(crate) destination_concurrency: usize,

    /// Maximum number of tasks waiting in a single queue
    #[builder(default = "DEFAULT_QUEUE_CAPACITY")]
    pub(crate) queue_capacity: usize,

    /// Pause before re-resolving the least-loaded queue when it is full
    #[builder(default = "DEFAULT_RETRY_INTERVAL")]
    pub(crate) retry_interval: Duration,

    /// Period of the completion/timeout monitor
    #[builder(default = "DEFAULT_TICK_INTERVAL")]
    pub(crate) tick_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            timeout_ms: 0,
            source_concurrency: 1,
            destination_concurrency: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Returns the run timeout in whole seconds, `None` when unbounded
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        let secs = self.timeout_ms / 1000;
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    #[inline]
    pub fn source_concurrency(&self) -> usize {
        self.source_concurrency.max(1)
    }

    #[inline]
    pub fn destination_concurrency(&self) -> usize {
        self.destination_concurrency.max(1)
    }

    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    #[inline]
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfigBuilder::default().build().unwrap();

        assert_eq!(config.timeout(), None);
        assert_eq!(config.source_concurrency(), 1);
        assert_eq!(config.destination_concurrency(), 1);
        assert_eq!(config.queue_capacity(), 1000);
        assert_eq!(config.retry_interval(), Duration::from_millis(500));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        let config = PipelineConfigBuilder::default()
            .source_concurrency(0usize)
            .destination_concurrency(0usize)
            .timeout_ms(2500u64)
            .build()
            .unwrap();

        assert_eq!(config.source_concurrency(), 1);
        assert_eq!(config.destination_concurrency(), 1);
        assert_eq!(config.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_subsecond_timeout_is_disabled() {
        let config = PipelineConfigBuilder::default()
            .timeout_ms(999u64)
            .build()
            .unwrap();
        assert_eq!(config.timeout(), None);

        let config = PipelineConfigBuilder::default()
            .timeout_ms(1000u64)
            .build()
            .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(1)));
    }
}
