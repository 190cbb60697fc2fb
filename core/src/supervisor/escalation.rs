//! Deferred force-kill queue
//!
//! Terminating a handle is two-phase: SIGTERM is sent inline by whoever
//! removed the handle from the registry, and the handle is then moved into
//! this queue. A dedicated worker task owns the queue and, once the grace
//! period elapses, sends SIGKILL and reaps the process. Callers of `stop`
//! and the sweeper never wait on either step.
//!
//! The queue is the only place a handle lives outside the registry, and
//! only until its force-kill fires.

use super::LifecycleEvent;
use crate::registry::{ProcessHandle, TerminationState};
use schema::OwnerId;
use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::time::DelayQueue;
use tracing::{debug, info, warn};

/// Upper bound on waiting for a force-killed process to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

struct PendingKill {
    owner_id: OwnerId,
    handle: ProcessHandle,
}

enum EscalationMsg {
    Schedule(PendingKill),
    Flush(oneshot::Sender<usize>),
}

/// Sender side of the escalation worker
#[derive(Debug, Clone)]
pub struct EscalationQueue {
    tx: mpsc::UnboundedSender<EscalationMsg>,
}

impl EscalationQueue {
    /// Queue a force-kill of `handle` after the grace period.
    ///
    /// If the worker is gone the force-kill happens immediately instead.
    pub fn schedule(&self, owner_id: OwnerId, handle: ProcessHandle) {
        let msg = EscalationMsg::Schedule(PendingKill { owner_id, handle });
        if let Err(mpsc::error::SendError(msg)) = self.tx.send(msg) {
            if let EscalationMsg::Schedule(mut pending) = msg {
                warn!(
                    "Escalation worker is gone; force killing subprocess {} immediately",
                    pending.handle.subprocess_id()
                );
                pending.handle.force_kill();
            }
        }
    }

    /// Fire every pending force-kill now; returns how many fired
    pub async fn flush(&self) -> usize {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(EscalationMsg::Flush(done_tx)).is_err() {
            return 0;
        }
        done_rx.await.unwrap_or(0)
    }
}

/// Start the worker task that owns the delayed force-kills
pub(crate) fn spawn_escalation_worker(
    grace: Duration,
    event_tx: broadcast::Sender<LifecycleEvent>,
) -> (EscalationQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = EscalationWorker {
        grace,
        queue: DelayQueue::new(),
        pending: HashMap::new(),
        next_id: 0,
        event_tx,
    };
    let task = tokio::spawn(worker.run(rx));
    (EscalationQueue { tx }, task)
}

struct EscalationWorker {
    grace: Duration,
    queue: DelayQueue<u64>,
    pending: HashMap<u64, PendingKill>,
    next_id: u64,
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl EscalationWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EscalationMsg>) {
        debug!("Escalation worker started (grace {:?})", self.grace);
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(EscalationMsg::Schedule(pending)) => self.insert(pending),
                    Some(EscalationMsg::Flush(done)) => {
                        let fired = self.fire_all();
                        let _ = done.send(fired);
                    }
                    None => {
                        let fired = self.fire_all();
                        debug!("Escalation worker stopping, fired {} pending kills", fired);
                        break;
                    }
                },
                Some(expired) = poll_fn(|cx| self.queue.poll_expired(cx)), if !self.queue.is_empty() => {
                    let id = expired.into_inner();
                    if let Some(pending) = self.pending.remove(&id) {
                        self.fire(pending);
                    }
                }
            }
        }
    }

    fn insert(&mut self, pending: PendingKill) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.queue.insert(id, self.grace);
        self.pending.insert(id, pending);
    }

    fn fire_all(&mut self) -> usize {
        self.queue.clear();
        let drained: Vec<PendingKill> = self.pending.drain().map(|(_, p)| p).collect();
        let fired = drained.len();
        for pending in drained {
            self.fire(pending);
        }
        fired
    }

    fn fire(&self, pending: PendingKill) {
        let PendingKill {
            owner_id,
            mut handle,
        } = pending;
        let subprocess_id = handle.subprocess_id();

        handle.force_kill();
        let _ = self.event_tx.send(LifecycleEvent::ForceKilled {
            owner_id,
            subprocess_id,
        });

        if handle.state() == TerminationState::Exited {
            debug!(
                "Subprocess {} for process {} is gone after its grace period",
                subprocess_id, owner_id
            );
            let _ = self.event_tx.send(LifecycleEvent::Exited {
                owner_id,
                subprocess_id,
            });
            return;
        }

        warn!("Force killed subprocess {} for process {}", subprocess_id, owner_id);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            match timeout(REAP_TIMEOUT, handle.wait_exit()).await {
                Ok(Ok(())) => {
                    info!("Subprocess {} for process {} exited", subprocess_id, owner_id);
                    let _ = event_tx.send(LifecycleEvent::Exited {
                        owner_id,
                        subprocess_id,
                    });
                }
                Ok(Err(e)) => debug!("Could not reap subprocess {}: {}", subprocess_id, e),
                Err(_) => warn!(
                    "Subprocess {} did not exit within {:?} of SIGKILL",
                    subprocess_id, REAP_TIMEOUT
                ),
            }
        });
    }
}
