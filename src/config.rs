//! Configuration file model.
//!
//! ```json
//! {
//!   "timeout": 60000,
//!   "source": { "driver": "csv", "options": { "path": "in.csv", "limit": 500 }, "pool": 4 },
//!   "destination": { "driver": "csv", "options": { "path": "out.csv", "truncate": true }, "pool": 2 }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::Options;
use crate::pipeline::{PipelineConfig, PipelineConfigBuilder};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_pool() -> usize {
    1
}

/// Selects a driver by name and carries its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub driver: String,

    #[serde(default)]
    pub options: Options,

    /// Number of concurrent workers for this side of the pipeline.
    #[serde(default = "default_pool")]
    pub pool: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Overall timeout in milliseconds, counted in whole seconds; under one
    /// second means none.
    #[serde(default)]
    pub timeout: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,

    pub source: DriverConfig,
    pub destination: DriverConfig,
}

impl AppConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(raw)?;
        if config.source.driver.is_empty() || config.destination.driver.is_empty() {
            return Err(ConfigError::Invalid(
                "source and destination must name a driver".to_string(),
            ));
        }
        Ok(config)
    }

    /// Core engine settings derived from this file.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut builder = PipelineConfigBuilder::default();
        builder
            .timeout_ms(self.timeout)
            .source_concurrency(self.source.pool.max(1))
            .destination_concurrency(self.destination.pool.max(1));
        if let Some(capacity) = self.queue_capacity {
            builder.queue_capacity(capacity.max(1));
        }
        builder
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
