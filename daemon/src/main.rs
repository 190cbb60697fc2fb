//! leash daemon binary
//!
//! Serves the supervisor HTTP API until interrupted, then kills every
//! subprocess it still manages.

use clap::Parser;
use daemon::bootstrap;
use leash_core::{init_tracing, load_config_from_toml_path};
use schema::DaemonConfig;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "leashd")]
#[command(about = "Supervise subprocesses on behalf of owner processes")]
#[command(version)]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen host
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(long)]
    port: Option<u16>,

    /// Requested owner liveness sweep period in seconds (capped at 0.1)
    #[arg(long, value_name = "SECONDS")]
    period: Option<f64>,

    /// Delay between SIGTERM and SIGKILL in milliseconds
    #[arg(long, value_name = "MS")]
    kill_grace_ms: Option<u64>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> daemon::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from_toml_path(path)?,
            None => DaemonConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(period) = self.period {
            config.sweep_period_secs = period;
        }
        if let Some(kill_grace_ms) = self.kill_grace_ms {
            config.kill_grace_ms = kill_grace_ms;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        Ok(config)
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() -> daemon::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> daemon::Result<()> {
    let config = Args::parse().into_config()?;
    init_tracing(&config.log_level)?;

    info!("Starting leash daemon");
    let handle = bootstrap(config).await.map_err(|e| {
        error!("Daemon failed to start: {} ({})", e, e.code());
        e
    })?;

    if let Err(e) = shutdown_signal().await {
        error!("Failed to listen for shutdown signals: {}", e);
    }
    info!("Shutdown requested");

    let report = handle.shutdown().await;
    info!(
        "Daemon stopped ({} subprocesses signalled)",
        report.signalled + report.flushed
    );
    Ok(())
}
