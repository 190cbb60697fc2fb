//! Shutdown reaper
//!
//! When the supervisor stops, every handle still in the registry receives
//! SIGTERM, then every handle receives SIGKILL: two full passes with no wait
//! in between. Handles already waiting in the escalation queue get their
//! SIGKILL immediately. Registry entries are left in place.

use super::{LifecycleEvent, Supervisor, TerminationReason};
use tracing::info;

/// Outcome of the shutdown reaper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Registered handles signalled
    pub signalled: usize,
    /// Pending force-kills fired early
    pub flushed: usize,
}

impl Supervisor {
    /// Send SIGTERM then SIGKILL to every managed process
    pub async fn shutdown_reap(&self) -> ShutdownReport {
        info!("Killing all subprocesses...");
        let mut report = ShutdownReport::default();

        let event_tx = &self.event_tx;
        self.registry
            .for_each_handle(|owner_id, handle| {
                handle.begin_termination();
                report.signalled += 1;
                let _ = event_tx.send(LifecycleEvent::TerminationRequested {
                    owner_id,
                    subprocess_id: handle.subprocess_id(),
                    reason: TerminationReason::Shutdown,
                });
            })
            .await;

        self.registry
            .for_each_handle(|_, handle| handle.force_kill())
            .await;

        report.flushed = self.escalation.flush().await;
        info!(
            "Shutdown reaper signalled {} subprocesses, fired {} pending force kills",
            report.signalled, report.flushed
        );
        report
    }
}
