//! Process ownership registry
//!
//! The registry maps an owner id to the handles of the subprocesses spawned
//! on its behalf, in spawn order. It is the single source of truth for which
//! processes the supervisor manages: a handle leaves the registry exactly
//! once, and whoever removes it is responsible for terminating it.
//!
//! ## Locking
//!
//! One `tokio::sync::Mutex` guards the whole map. Critical sections only
//! look up, insert or remove entries; process creation and the escalation
//! delay never happen under the lock. Signal syscalls are made under the
//! lock only by the shutdown reaper, which has to reach handles it does not
//! remove.
//!
//! ## Invariants
//!
//! - An owner entry never stays empty: removing the last handle removes the
//!   entry in the same critical section.
//! - A subprocess id appears under at most one owner.

use crate::supervisor::ManagedProcess;
use schema::{Listing, OwnerId, SubprocessId};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Where a handle is in its termination sequence
///
/// ```text
/// Running → Terminating → Exited
///                       ↘ ForceKilling → Exited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationState {
    /// Registered, no signal sent yet
    Running,
    /// SIGTERM sent, force-kill pending
    Terminating,
    /// SIGKILL sent, exit not yet observed
    ForceKilling,
    /// Exit observed
    Exited,
}

/// The supervisor's managed reference to a spawned process
pub struct ProcessHandle {
    subprocess_id: SubprocessId,
    state: TerminationState,
    process: Box<dyn ManagedProcess>,
}

impl ProcessHandle {
    /// Wrap a freshly spawned process
    pub fn new(process: Box<dyn ManagedProcess>) -> Self {
        Self {
            subprocess_id: process.pid(),
            state: TerminationState::Running,
            process,
        }
    }

    /// OS pid of the process
    pub fn subprocess_id(&self) -> SubprocessId {
        self.subprocess_id
    }

    /// Current termination state
    pub fn state(&self) -> TerminationState {
        self.state
    }

    /// Send the graceful signal and enter `Terminating`.
    ///
    /// Delivery failures are logged and swallowed.
    pub fn begin_termination(&mut self) {
        if self.state == TerminationState::Exited {
            return;
        }
        if let Err(e) = self.process.terminate() {
            debug!("SIGTERM to subprocess {} failed: {}", self.subprocess_id, e);
        }
        if self.state == TerminationState::Running {
            self.state = TerminationState::Terminating;
        }
    }

    /// Send the forceful signal, then check for exit.
    ///
    /// The signal goes out before the exit check because the check reaps the
    /// process, after which its pid and group id are free for reuse. A
    /// process that is gone right after the signal enters `Exited`; otherwise
    /// the handle stays in `ForceKilling` until [`ProcessHandle::wait_exit`]
    /// observes the exit. A handle already `Exited` is not signalled again.
    pub fn force_kill(&mut self) {
        if self.state == TerminationState::Exited {
            return;
        }
        if let Err(e) = self.process.kill() {
            debug!("SIGKILL to subprocess {} failed: {}", self.subprocess_id, e);
        }
        self.state = if self.process.has_exited() {
            TerminationState::Exited
        } else {
            TerminationState::ForceKilling
        };
    }

    /// Whether the process has exited; moves the handle to `Exited` if so
    pub fn poll_exited(&mut self) -> bool {
        if self.state != TerminationState::Exited && self.process.has_exited() {
            self.state = TerminationState::Exited;
        }
        self.state == TerminationState::Exited
    }

    /// Wait for the process to exit and enter `Exited`
    pub async fn wait_exit(&mut self) -> crate::Result<()> {
        if self.state != TerminationState::Exited {
            self.process.wait().await?;
            self.state = TerminationState::Exited;
        }
        Ok(())
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("subprocess_id", &self.subprocess_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Concurrency-safe owner id → handles map
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<BTreeMap<OwnerId, Vec<ProcessHandle>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handle` under `owner_id`, creating the entry if absent
    pub async fn register(&self, owner_id: OwnerId, handle: ProcessHandle) {
        let mut entries = self.entries.lock().await;
        let subprocess_id = handle.subprocess_id();
        if let Some((previous, _)) = entries
            .iter()
            .find(|(_, handles)| handles.iter().any(|h| h.subprocess_id() == subprocess_id))
        {
            warn!(
                "Subprocess {} is already registered under owner {}; pid was reused",
                subprocess_id, previous
            );
        }
        entries.entry(owner_id).or_default().push(handle);
    }

    /// Subprocess ids registered under `owner_id`, in spawn order
    pub async fn lookup(&self, owner_id: OwnerId) -> Vec<SubprocessId> {
        let entries = self.entries.lock().await;
        entries
            .get(&owner_id)
            .map(|handles| handles.iter().map(ProcessHandle::subprocess_id).collect())
            .unwrap_or_default()
    }

    /// Remove and return the handle for `subprocess_id` under `owner_id`.
    ///
    /// Returns `None` when the owner is unknown or holds no such subprocess.
    pub async fn remove(
        &self,
        owner_id: OwnerId,
        subprocess_id: SubprocessId,
    ) -> Option<ProcessHandle> {
        let mut entries = self.entries.lock().await;
        let handles = entries.get_mut(&owner_id)?;
        let index = handles
            .iter()
            .position(|h| h.subprocess_id() == subprocess_id)?;
        let handle = handles.remove(index);
        if handles.is_empty() {
            entries.remove(&owner_id);
        }
        Some(handle)
    }

    /// Every owner id currently present
    pub async fn all_owners(&self) -> Vec<OwnerId> {
        self.entries.lock().await.keys().copied().collect()
    }

    /// Remove the whole entry for `owner_id`, handing back its handles
    pub async fn drop_owner(&self, owner_id: OwnerId) -> Option<Vec<ProcessHandle>> {
        self.entries.lock().await.remove(&owner_id)
    }

    /// Remove entries left without handles; returns how many were removed
    pub async fn prune_empty(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, handles| !handles.is_empty());
        before - entries.len()
    }

    /// Owner of `subprocess_id`, if registered
    pub async fn owner_of(&self, subprocess_id: SubprocessId) -> Option<OwnerId> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .find(|(_, handles)| handles.iter().any(|h| h.subprocess_id() == subprocess_id))
            .map(|(owner_id, _)| *owner_id)
    }

    /// Owner id → subprocess ids for the whole registry
    pub async fn snapshot(&self) -> Listing {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .map(|(owner_id, handles)| {
                (
                    *owner_id,
                    handles.iter().map(ProcessHandle::subprocess_id).collect(),
                )
            })
            .collect()
    }

    /// Total number of registered handles
    pub async fn len(&self) -> usize {
        self.entries.lock().await.values().map(Vec::len).sum()
    }

    /// Whether no handle is registered
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run `f` on every registered handle, leaving them registered
    pub(crate) async fn for_each_handle<F>(&self, mut f: F)
    where
        F: FnMut(OwnerId, &mut ProcessHandle),
    {
        let mut entries = self.entries.lock().await;
        for (owner_id, handles) in entries.iter_mut() {
            for handle in handles.iter_mut() {
                f(*owner_id, handle);
            }
        }
    }
}
