//! # etl-shuttle
//!
//! A batch data-movement engine built on Tokio: rows are extracted from a
//! source in bounded chunks, converted into destination write operations and
//! persisted, with bounded concurrency on both sides.
//!
//! ## Features
//!
//! - **Dual worker pools** - one worker per extraction queue and per load queue
//! - **Least-loaded routing** - tasks always go to the shallowest queue
//! - **Backpressure** - full load queues make producers back off, never drop
//! - **Completion detection** - an atomic pending count and an optional timeout
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etl_shuttle::config::AppConfig;
//! use etl_shuttle::driver::Registry;
//! use etl_shuttle::pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = AppConfig::from_path("etl-shuttle.json")?;
//! let pipeline = Pipeline::connect(&Registry::new(), &config).await?;
//! let summary = pipeline.run(&CancellationToken::new()).await?;
//! println!("stored {} rows", summary.stats.rows_persisted);
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - source/destination contract, data model and built-in drivers
//! - [`pool`] - bounded queue pools, least-loaded routing and the pending count
//! - [`pipeline`] - workers, monitor and run lifecycle
//! - [`config`] - configuration file model

pub mod config;
pub mod driver;
pub mod pipeline;
pub mod pool;
