use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use etl_shuttle::config::AppConfig;
use etl_shuttle::driver::Registry;
use etl_shuttle::pipeline::{Pipeline, PipelineError};

/// Move rows between stores with bounded, least-loaded worker pools.
#[derive(Debug, Parser)]
#[command(name = "etl-shuttle", version, about)]
struct Args {
    /// JSON config file path
    #[arg(short, long, env = "ETL_SHUTTLE_CONFIG", default_value = "./etl-shuttle.json")]
    config: PathBuf,

    /// Log filter, e.g. `info` or `etl_shuttle=debug`
    #[arg(long, env = "ETL_SHUTTLE_LOG", default_value = "info")]
    log_level: String,
}

fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Cancels `shutdown` on SIGINT or SIGTERM.
fn forward_signals(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "cannot listen for SIGTERM");
                    let _ = tokio::signal::ctrl_c().await;
                    shutdown.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("interrupt received, shutting down");
        shutdown.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let started = Instant::now();
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = AppConfig::from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    info!("initializing");
    let registry = Registry::new();
    let pipeline = Pipeline::connect(&registry, &config)
        .await
        .context("starting drivers")?;

    let shutdown = CancellationToken::new();
    forward_signals(shutdown.clone());

    match pipeline.run_since(started, &shutdown).await {
        Ok(summary) => {
            println!(
                "DONE, took {} seconds ({} rows stored, {} rows lost)",
                summary.elapsed.as_secs(),
                summary.stats.rows_persisted,
                summary.stats.rows_lost
            );
            Ok(())
        }
        Err(e @ PipelineError::TimedOut(_)) => {
            // In-flight work is abandoned rather than drained.
            error!(error = %e, "fatal");
            std::process::exit(1);
        }
        Err(e) => Err(e).context("pipeline failed"),
    }
}
