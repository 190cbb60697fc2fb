//! Daemon bootstrap: wire the supervisor, the sweeper, and the HTTP server
//!
//! [`bootstrap`] validates the configuration, starts the supervisor on real
//! Unix processes, binds the listener, and spawns the sweeper and server
//! tasks. [`BootstrapHandle::shutdown`] undoes all of it in order: stop
//! accepting requests, stop sweeping, then kill every managed process.

use crate::{Daemon, DaemonError, Result};
use leash_core::supervisor::ShutdownReport;
use leash_core::{spawn_supervisor, validate_config, Supervisor, SupervisorConfig};
use schema::DaemonConfig;
use std::net::{SocketAddr, TcpListener};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Handle to the running daemon components
#[derive(Debug)]
pub struct BootstrapHandle {
    local_addr: SocketAddr,
    supervisor: Supervisor,
    cancel: CancellationToken,
    server_task: JoinHandle<Result<()>>,
    sweeper_task: JoinHandle<()>,
}

impl BootstrapHandle {
    /// Address the HTTP server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The running supervisor
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Stop serving, stop sweeping, and kill every managed subprocess
    pub async fn shutdown(self) -> ShutdownReport {
        self.cancel.cancel();

        match self.server_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("HTTP server ended with error: {}", e),
            Err(e) => warn!("HTTP server task failed: {}", e),
        }
        if let Err(e) = self.sweeper_task.await {
            warn!("Sweeper task failed: {}", e);
        }

        let report = self.supervisor.shutdown_reap().await;
        info!("Bootstrap shutdown complete");
        report
    }
}

/// Start every daemon component for `config`
///
/// # Errors
/// Returns an error if the configuration is invalid or the listen address
/// cannot be bound.
pub async fn bootstrap(config: DaemonConfig) -> Result<BootstrapHandle> {
    validate_config(&config)?;
    let supervisor = spawn_supervisor(SupervisorConfig::unix(config.kill_grace()));
    let listener = Daemon::new(config.clone(), supervisor.clone()).bind()?;
    start(config, supervisor, listener)
}

/// Like [`bootstrap`], but serve on an already bound listener
///
/// # Errors
/// Returns an error if the configuration is invalid or the listener has no
/// local address.
pub async fn bootstrap_with_listener(
    config: DaemonConfig,
    listener: TcpListener,
) -> Result<BootstrapHandle> {
    validate_config(&config)?;
    listener.set_nonblocking(true)?;
    let supervisor = spawn_supervisor(SupervisorConfig::unix(config.kill_grace()));
    start(config, supervisor, listener)
}

fn start(
    config: DaemonConfig,
    supervisor: Supervisor,
    listener: TcpListener,
) -> Result<BootstrapHandle> {
    let period = config.effective_sweep_period();
    if period.as_secs_f64() < config.sweep_period_secs {
        info!(
            "Requested sweep period {}s, using {:?}",
            config.sweep_period_secs, period
        );
    }

    let daemon = Daemon::new(config, supervisor.clone());
    let local_addr = listener
        .local_addr()
        .map_err(|e| DaemonError::ServerError(format!("No local address: {e}")))?;

    let cancel = CancellationToken::new();
    let sweeper_task = supervisor.spawn_sweeper(period, cancel.child_token());

    let server_cancel = cancel.child_token();
    let server_task = tokio::spawn(async move {
        daemon
            .serve(listener, async move { server_cancel.cancelled().await })
            .await
    });

    info!("leashd ready on {}", local_addr);
    Ok(BootstrapHandle {
        local_addr,
        supervisor,
        cancel,
        server_task,
        sweeper_task,
    })
}
