//! Core functionality for the leash supervisor
//!
//! This crate contains the process ownership registry, the Unix process
//! adapter, and the lifecycle supervisor that terminates subprocesses once
//! their owner is gone. The daemon wires these to its HTTP transport; the
//! types are equally usable in-process.

pub mod config;
pub mod error;
pub mod logging;
#[cfg(unix)]
pub mod process;
pub mod registry;
pub mod supervisor;


// Re-export schema types for convenience
pub use schema::*;

pub use config::{load_config_from_toml_path, load_config_from_toml_str, validate_config};
pub use error::{CoreError, Result};
pub use logging::init_tracing;
pub use registry::{ProcessHandle, Registry, TerminationState};
pub use supervisor::{
    spawn_supervisor, LifecycleEvent, Supervisor, SupervisorConfig, TerminationReason,
};
