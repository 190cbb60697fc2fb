//! Unix process management: spawn into a process group, signal the group
//!
//! Every spawned child is made the leader of a fresh process group
//! (`process_group(0)`), so signals sent to the group also reach any
//! descendants the child started. SIGTERM is used for graceful termination
//! and SIGKILL for forceful termination.
//!
//! Signal delivery is idempotent: `ESRCH` (group already gone) and `EPERM`
//! (pid no longer ours) are reported as success.
//!
//! Owner liveness is a separate concern: owners are not our children, so
//! [`pid_exists`] checks them with `kill(pid, 0)`.

use super::CommandSpec;
use crate::{CoreError, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{debug, error};

/// A spawned child process leading its own process group
///
/// stdin, stdout and stderr are attached to pipes held by the wrapped
/// [`Child`]. Nothing drains them: a child that writes more than the OS pipe
/// buffer holds will block until a consumer takes and reads the stream.
#[derive(Debug)]
pub struct ChildProcess {
    /// The process ID of the spawned process
    pid: Pid,
    /// The underlying Child handle for waiting and status checking
    child: Child,
}

impl ChildProcess {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Get the process group ID (same as PID for group leaders)
    pub fn pgid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Wait for the process to exit and return its exit status
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().await.map_err(|e| CoreError::ProcessWait {
            pid: self.pid(),
            reason: e.to_string(),
        })
    }

    /// Try to collect the exit status without blocking
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.child.try_wait().map_err(|e| CoreError::ProcessWait {
            pid: self.pid(),
            reason: e.to_string(),
        })
    }

    /// Take the stdin pipe, if still attached
    pub fn take_stdin(&mut self) -> Option<tokio::process::ChildStdin> {
        self.child.stdin.take()
    }

    /// Take the stdout pipe, if still attached
    pub fn take_stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr pipe, if still attached
    pub fn take_stderr(&mut self) -> Option<tokio::process::ChildStderr> {
        self.child.stderr.take()
    }
}

/// Spawn a new process in its own process group
///
/// The executable is looked up through the `PATH` of `spec.env` (or the
/// system default search path when `spec.env` has none). The supervisor's own
/// environment is not inherited.
///
/// ## Example
///
/// ```rust,no_run
/// use leash_core::process::{unix::spawn, CommandSpec};
///
/// # #[tokio::main] async fn main() -> leash_core::Result<()> {
/// let child = spawn(&CommandSpec::new("sleep").arg("5"))?;
/// println!("Spawned process with PID: {}", child.pid());
/// # Ok(()) }
/// ```
pub fn spawn(spec: &CommandSpec) -> Result<ChildProcess> {
    debug!("Spawning process: {}", spec.display_line());

    let mut command = std::process::Command::new(&spec.command);
    command
        .args(&spec.args)
        .env_clear()
        .envs(&spec.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let child = Command::from(command).spawn().map_err(|source| {
        debug!("Failed to spawn process '{}': {}", spec.command, source);
        CoreError::ProcessSpawn {
            command: spec.command.clone(),
            source,
        }
    })?;

    // tokio::process::Child::id() is None once the child has been reaped
    let raw_pid = child.id().ok_or_else(|| CoreError::ProcessSpawn {
        command: spec.command.clone(),
        source: std::io::Error::new(
            std::io::ErrorKind::Other,
            "spawned child did not have a PID",
        ),
    })?;
    let pid = Pid::from_raw(raw_pid as i32);
    debug!("Successfully spawned process {} in new process group", pid);

    Ok(ChildProcess { pid, child })
}

fn signal_group(child: &ChildProcess, signal: Signal) -> Result<()> {
    debug!("Sending {} to process group {}", signal, child.pid);

    match killpg(child.pid, signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!("Process group {} already exited", child.pid);
            Ok(())
        }
        Err(Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                child.pid
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to send {} to process group {}: {}", signal, child.pid, e);
            Err(CoreError::ProcessSignal {
                pid: child.pid(),
                reason: format!("{}: {}", signal, e),
            })
        }
    }
}

/// Send SIGTERM to the process group for graceful termination
pub fn signal_term_group(child: &ChildProcess) -> Result<()> {
    signal_group(child, Signal::SIGTERM)
}

/// Send SIGKILL to the process group for forceful termination
pub fn signal_kill_group(child: &ChildProcess) -> Result<()> {
    signal_group(child, Signal::SIGKILL)
}

/// Whether a process with this pid currently exists
///
/// `EPERM` means the process exists but belongs to another user, so it counts
/// as alive. Pid 0 and values outside the `pid_t` range never exist. A zombie
/// (exited, not yet reaped by its parent) still counts as existing.
pub fn pid_exists(pid: u32) -> bool {
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return false,
    };

    match kill(Pid::from_raw(raw), None::<Signal>) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
