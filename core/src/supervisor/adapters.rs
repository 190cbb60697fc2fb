//! Process adapters for abstracting process management
//!
//! This module provides the traits the supervisor drives processes through,
//! the Unix implementations, and mock implementations that record every
//! signal so lifecycle behavior can be tested without real children.

use crate::process::CommandSpec;
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::OwnerId;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Trait for spawning processes in a platform-agnostic way
#[async_trait]
pub trait ProcessAdapter: Send + Sync {
    /// Spawn a new managed process from the command specification
    async fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ManagedProcess>>;
}

/// Trait representing a spawned process that can be signalled and reaped
///
/// `terminate` and `kill` must treat an already exited process as success.
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> u32;

    /// Send the graceful termination signal (SIGTERM)
    fn terminate(&mut self) -> Result<()>;

    /// Send the forceful termination signal (SIGKILL)
    fn kill(&mut self) -> Result<()>;

    /// Non-blocking check whether the process has exited, reaping it if so
    fn has_exited(&mut self) -> bool;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<()>;
}

/// Answers whether an owner process is still alive
pub trait OwnerLiveness: Send + Sync {
    /// `true` while the owner exists
    fn is_alive(&self, owner_id: OwnerId) -> bool;
}

/// Unix process adapter using process-group spawning
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct UnixProcessAdapter;

#[cfg(unix)]
impl UnixProcessAdapter {
    /// Create a new Unix process adapter
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessAdapter for UnixProcessAdapter {
    async fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ManagedProcess>> {
        let child = crate::process::unix::spawn(spec)?;
        Ok(Box::new(UnixManagedProcess { child }))
    }
}

/// Unix managed process implementation
#[cfg(unix)]
struct UnixManagedProcess {
    child: crate::process::unix::ChildProcess,
}

#[cfg(unix)]
#[async_trait]
impl ManagedProcess for UnixManagedProcess {
    fn pid(&self) -> u32 {
        self.child.pid()
    }

    fn terminate(&mut self) -> Result<()> {
        crate::process::unix::signal_term_group(&self.child)
    }

    fn kill(&mut self) -> Result<()> {
        crate::process::unix::signal_kill_group(&self.child)
    }

    fn has_exited(&mut self) -> bool {
        // An error here means the child was already reaped elsewhere
        !matches!(self.child.try_wait(), Ok(None))
    }

    async fn wait(&mut self) -> Result<()> {
        self.child.wait().await.map(|_| ())
    }
}

/// Owner liveness check backed by `kill(pid, 0)`
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct UnixOwnerLiveness;

#[cfg(unix)]
impl UnixOwnerLiveness {
    /// Create a new Unix owner liveness check
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl OwnerLiveness for UnixOwnerLiveness {
    fn is_alive(&self, owner_id: OwnerId) -> bool {
        crate::process::unix::pid_exists(owner_id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Signal observed by a mock process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSignal {
    /// Graceful termination
    Term,
    /// Forceful termination
    Kill,
}

/// Instructions for mock process behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct MockInstruction {
    /// Keep running after SIGTERM (like a child trapping the signal)
    pub ignores_term: bool,
    /// Make the spawn itself fail with "not found"
    pub fail_spawn: bool,
}

#[derive(Debug, Default)]
struct MockRecord {
    signals: Vec<MockSignal>,
    exited: bool,
    reaped: bool,
    signalled_after_reap: bool,
}

/// Mock process adapter for testing
///
/// Pids are handed out sequentially starting at 40000. Every spawned mock
/// keeps its record here after the supervisor drops the handle, so tests
/// can inspect which signals a process received.
#[derive(Debug, Clone)]
pub struct MockProcessAdapter {
    instructions: Arc<Mutex<VecDeque<MockInstruction>>>,
    records: Arc<Mutex<BTreeMap<u32, Arc<Mutex<MockRecord>>>>>,
    next_pid: Arc<AtomicU32>,
}

impl MockProcessAdapter {
    /// Create a new mock adapter with no pre-configured instructions
    pub fn new() -> Self {
        Self {
            instructions: Arc::new(Mutex::new(VecDeque::new())),
            records: Arc::new(Mutex::new(BTreeMap::new())),
            next_pid: Arc::new(AtomicU32::new(40_000)),
        }
    }

    /// Add instructions for the next spawn
    pub fn add_instruction(&self, instruction: MockInstruction) {
        lock(&self.instructions).push_back(instruction);
    }

    /// Pids of every mock process spawned so far
    pub fn spawned_pids(&self) -> Vec<u32> {
        lock(&self.records).keys().copied().collect()
    }

    /// Signals received by the process, in delivery order
    pub fn signals(&self, pid: u32) -> Vec<MockSignal> {
        lock(&self.records)
            .get(&pid)
            .map(|record| lock(record).signals.clone())
            .unwrap_or_default()
    }

    /// Whether the mock process is still running
    pub fn is_running(&self, pid: u32) -> bool {
        lock(&self.records)
            .get(&pid)
            .is_some_and(|record| !lock(record).exited)
    }

    /// Whether a signal reached the process after its exit was collected
    pub fn signalled_after_reap(&self, pid: u32) -> bool {
        lock(&self.records)
            .get(&pid)
            .is_some_and(|record| lock(record).signalled_after_reap)
    }

    /// Simulate the process exiting on its own
    pub fn exit(&self, pid: u32) {
        if let Some(record) = lock(&self.records).get(&pid) {
            lock(record).exited = true;
        }
    }
}

impl Default for MockProcessAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessAdapter for MockProcessAdapter {
    async fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ManagedProcess>> {
        debug!("Spawning mock process for: {}", spec.display_line());

        let instruction = lock(&self.instructions).pop_front().unwrap_or_default();
        if instruction.fail_spawn {
            return Err(CoreError::ProcessSpawn {
                command: spec.command.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock spawn failure"),
            });
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let record = Arc::new(Mutex::new(MockRecord::default()));
        lock(&self.records).insert(pid, record.clone());

        Ok(Box::new(MockManagedProcess {
            pid,
            ignores_term: instruction.ignores_term,
            record,
        }))
    }
}

/// Mock managed process for testing
struct MockManagedProcess {
    pid: u32,
    ignores_term: bool,
    record: Arc<Mutex<MockRecord>>,
}

#[async_trait]
impl ManagedProcess for MockManagedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> Result<()> {
        let mut record = lock(&self.record);
        record.signalled_after_reap |= record.reaped;
        record.signals.push(MockSignal::Term);
        if !self.ignores_term {
            record.exited = true;
        }
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        let mut record = lock(&self.record);
        record.signalled_after_reap |= record.reaped;
        record.signals.push(MockSignal::Kill);
        record.exited = true;
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        let mut record = lock(&self.record);
        // Observing the exit collects it, like waitpid
        record.reaped |= record.exited;
        record.exited
    }

    async fn wait(&mut self) -> Result<()> {
        while !self.has_exited() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(())
    }
}

/// Owner liveness for testing: every owner is alive until marked dead
#[derive(Debug, Clone, Default)]
pub struct MockOwnerLiveness {
    dead: Arc<Mutex<HashSet<OwnerId>>>,
}

impl MockOwnerLiveness {
    /// Create a liveness check that reports every owner alive
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `owner_id` as gone from now on
    pub fn mark_dead(&self, owner_id: OwnerId) {
        lock(&self.dead).insert(owner_id);
    }

    /// Report `owner_id` as alive again
    pub fn mark_alive(&self, owner_id: OwnerId) {
        lock(&self.dead).remove(&owner_id);
    }
}

impl OwnerLiveness for MockOwnerLiveness {
    fn is_alive(&self, owner_id: OwnerId) -> bool {
        !lock(&self.dead).contains(&owner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_signals() {
        let adapter = MockProcessAdapter::new();
        adapter.add_instruction(MockInstruction {
            ignores_term: true,
            ..Default::default()
        });

        let mut process = adapter.spawn(&CommandSpec::new("sleep")).await.unwrap();
        let pid = process.pid();

        process.terminate().unwrap();
        assert!(!process.has_exited());
        assert!(adapter.is_running(pid));

        process.kill().unwrap();
        assert!(process.has_exited());
        process.wait().await.unwrap();

        assert_eq!(adapter.signals(pid), vec![MockSignal::Term, MockSignal::Kill]);
    }

    #[tokio::test]
    async fn test_mock_spawn_failure() {
        let adapter = MockProcessAdapter::new();
        adapter.add_instruction(MockInstruction {
            fail_spawn: true,
            ..Default::default()
        });

        let err = adapter.spawn(&CommandSpec::new("missing")).await.err().unwrap();
        assert!(matches!(err, CoreError::ProcessSpawn { .. }));
        assert!(adapter.spawned_pids().is_empty());
    }

    #[test]
    fn test_mock_owner_liveness() {
        let liveness = MockOwnerLiveness::new();
        assert!(liveness.is_alive(10));
        liveness.mark_dead(10);
        assert!(!liveness.is_alive(10));
        liveness.mark_alive(10);
        assert!(liveness.is_alive(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_owner_liveness_sees_self() {
        assert!(UnixOwnerLiveness::new().is_alive(std::process::id()));
    }
}
