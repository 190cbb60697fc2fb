//! Liveness sweeper: orphan reaping
//!
//! Once per period every owner in the registry is checked. Owners that no
//! longer exist have their entry removed and every handle they held goes
//! through the same SIGTERM-then-SIGKILL sequence as an explicit stop.
//!
//! Liveness is pid based. A pid reused by an unrelated process between two
//! sweeps keeps the dead owner's children alive; that race is accepted.

use super::{LifecycleEvent, Supervisor, TerminationReason};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Owners checked
    pub owners_checked: usize,
    /// Owners found dead and removed
    pub owners_reaped: usize,
    /// Handles terminated because their owner died
    pub handles_terminated: usize,
}

impl Supervisor {
    /// Check every owner once and reap the dead ones
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let pruned = self.registry.prune_empty().await;
        if pruned > 0 {
            debug!("Pruned {} empty owner entries", pruned);
        }

        for owner_id in self.registry.all_owners().await {
            report.owners_checked += 1;
            if self.owner_liveness.is_alive(owner_id) {
                continue;
            }

            // A concurrent stop may have emptied and removed the entry already
            let Some(handles) = self.registry.drop_owner(owner_id).await else {
                continue;
            };

            let count = handles.len();
            for handle in handles {
                self.terminate(owner_id, handle, TerminationReason::OwnerDied);
            }

            report.owners_reaped += 1;
            report.handles_terminated += count;
            let _ = self.event_tx.send(LifecycleEvent::OwnerReaped {
                owner_id,
                handles: count,
            });
        }

        report
    }

    /// Run [`Supervisor::sweep_once`] every `period` until `cancel` fires.
    ///
    /// The first sweep happens one period after the call.
    pub fn spawn_sweeper(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let supervisor = self.clone();
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            info!("Liveness sweeper started (period {:?})", period);
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() completes its first tick immediately
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Liveness sweeper stopped");
                        break;
                    }
                    _ = tick.tick() => {
                        let report = supervisor.sweep_once().await;
                        if report.owners_reaped > 0 {
                            debug!(
                                "Sweep reaped {} owners ({} subprocesses)",
                                report.owners_reaped, report.handles_terminated
                            );
                        }
                    }
                }
            }
        })
    }
}
