//! Lifecycle supervisor
//!
//! The supervisor spawns subprocesses on behalf of owner processes, records
//! them in the [`Registry`], and guarantees they are terminated once their
//! owner disappears.
//!
//! ## Architecture
//!
//! ```text
//!  HTTP spawn ──► Supervisor::spawn ──► ProcessAdapter ──► Registry::register
//!  HTTP stop  ──► Supervisor::stop  ──┐
//!  sweeper    ──► sweep_once        ──┼─► SIGTERM ──► EscalationQueue ──(grace)──► SIGKILL
//!  shutdown   ──► shutdown_reap     ──┘
//! ```
//!
//! ## Components
//!
//! - [`Supervisor`]: cloneable service handle shared by the transport and the
//!   background tasks
//! - [`ProcessAdapter`] / [`ManagedProcess`]: process spawning and signalling
//! - [`OwnerLiveness`]: owner liveness check used by the sweeper
//! - [`EscalationQueue`]: delayed force-kills
//! - [`LifecycleEvent`]: broadcast of every lifecycle transition

use crate::process::CommandSpec;
use crate::registry::{ProcessHandle, Registry};
use crate::Result;
use schema::{Listing, OwnerId, SubprocessId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub mod adapters;
pub mod escalation;
mod shutdown;
mod sweeper;


pub use adapters::*;
pub use escalation::EscalationQueue;
pub use shutdown::ShutdownReport;
pub use sweeper::SweepReport;

/// Why a handle is being terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// An explicit stop request
    Stopped,
    /// The owner process is gone
    OwnerDied,
    /// The supervisor is shutting down
    Shutdown,
}

/// Events emitted by the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A subprocess was spawned and registered
    Spawned {
        /// Owner the subprocess belongs to
        owner_id: OwnerId,
        /// Pid of the subprocess
        subprocess_id: SubprocessId,
    },
    /// SIGTERM was sent
    TerminationRequested {
        /// Owner the subprocess belonged to
        owner_id: OwnerId,
        /// Pid of the subprocess
        subprocess_id: SubprocessId,
        /// What triggered the termination
        reason: TerminationReason,
    },
    /// SIGKILL was sent to the process group once the grace period ran out
    ForceKilled {
        /// Owner the subprocess belonged to
        owner_id: OwnerId,
        /// Pid of the subprocess
        subprocess_id: SubprocessId,
    },
    /// The subprocess was observed to exit after termination
    Exited {
        /// Owner the subprocess belonged to
        owner_id: OwnerId,
        /// Pid of the subprocess
        subprocess_id: SubprocessId,
    },
    /// A dead owner's entry was reaped
    OwnerReaped {
        /// The dead owner
        owner_id: OwnerId,
        /// How many handles it still held
        handles: usize,
    },
}

/// Configuration for starting a supervisor
pub struct SupervisorConfig {
    /// Process adapter for spawning and signalling processes
    pub process_adapter: Arc<dyn ProcessAdapter>,
    /// Owner liveness check for the sweeper
    pub owner_liveness: Arc<dyn OwnerLiveness>,
    /// Event broadcaster for lifecycle events
    pub event_tx: broadcast::Sender<LifecycleEvent>,
    /// Delay between SIGTERM and SIGKILL
    pub kill_grace: Duration,
}

impl SupervisorConfig {
    /// Configuration driving real Unix processes
    #[cfg(unix)]
    pub fn unix(kill_grace: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            process_adapter: Arc::new(UnixProcessAdapter::new()),
            owner_liveness: Arc::new(UnixOwnerLiveness::new()),
            event_tx,
            kill_grace,
        }
    }
}

/// Cloneable handle to the registry and the termination machinery
#[derive(Clone)]
pub struct Supervisor {
    registry: Arc<Registry>,
    process_adapter: Arc<dyn ProcessAdapter>,
    owner_liveness: Arc<dyn OwnerLiveness>,
    escalation: EscalationQueue,
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Start a supervisor with an empty registry
///
/// This spawns the escalation worker on the current tokio runtime. The
/// liveness sweeper is started separately with [`Supervisor::spawn_sweeper`].
pub fn spawn_supervisor(config: SupervisorConfig) -> Supervisor {
    let SupervisorConfig {
        process_adapter,
        owner_liveness,
        event_tx,
        kill_grace,
    } = config;

    let (escalation, _worker) = escalation::spawn_escalation_worker(kill_grace, event_tx.clone());
    info!("Supervisor started (kill grace {:?})", kill_grace);

    Supervisor {
        registry: Arc::new(Registry::new()),
        process_adapter,
        owner_liveness,
        escalation,
        event_tx,
    }
}

impl Supervisor {
    /// The shared ownership registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }

    /// Spawn `spec` on behalf of `owner_id` and register it.
    ///
    /// The process is created without holding the registry lock. Nothing is
    /// registered when creation fails.
    pub async fn spawn(&self, owner_id: OwnerId, spec: &CommandSpec) -> Result<SubprocessId> {
        let process = self.process_adapter.spawn(spec).await?;
        let handle = ProcessHandle::new(process);
        let subprocess_id = handle.subprocess_id();
        self.registry.register(owner_id, handle).await;

        info!(
            "Started subprocess {} for process {}: {}",
            subprocess_id,
            owner_id,
            spec.display_line()
        );
        let _ = self.event_tx.send(LifecycleEvent::Spawned {
            owner_id,
            subprocess_id,
        });
        Ok(subprocess_id)
    }

    /// Begin terminating `subprocess_id` owned by `owner_id`.
    ///
    /// Returns `false` when no such handle is registered (including when it
    /// was already stopped or reaped). `true` means termination was
    /// initiated, not that the process has exited.
    pub async fn stop(&self, owner_id: OwnerId, subprocess_id: SubprocessId) -> bool {
        match self.registry.remove(owner_id, subprocess_id).await {
            Some(handle) => {
                self.terminate(owner_id, handle, TerminationReason::Stopped);
                true
            }
            None => {
                debug!(
                    "No subprocess {} registered for process {}",
                    subprocess_id, owner_id
                );
                false
            }
        }
    }

    /// Owner id → subprocess ids, for the index page
    pub async fn listing(&self) -> Listing {
        self.registry.snapshot().await
    }

    /// SIGTERM a handle already removed from the registry and queue its
    /// force-kill.
    fn terminate(&self, owner_id: OwnerId, mut handle: ProcessHandle, reason: TerminationReason) {
        let subprocess_id = handle.subprocess_id();
        handle.begin_termination();

        match reason {
            TerminationReason::OwnerDied => warn!(
                "Killing subprocess {} for dead process {}",
                subprocess_id, owner_id
            ),
            _ => warn!("Killing subprocess {} for process {}", subprocess_id, owner_id),
        }

        let _ = self.event_tx.send(LifecycleEvent::TerminationRequested {
            owner_id,
            subprocess_id,
            reason,
        });
        self.escalation.schedule(owner_id, handle);
    }
}
