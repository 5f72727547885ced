use std::time::Duration;

use crate::driver::DriverError;

/// Errors that end a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The configured timeout elapsed while tasks were still pending.
    #[error("timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::TimedOut(Duration::from_millis(3000));
        assert_eq!(err.to_string(), "timed out after 3 seconds");

        let err = PipelineError::from(DriverError::Planning("no file".into()));
        assert_eq!(err.to_string(), "planning error: no file");
    }
}
