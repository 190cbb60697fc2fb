//! Schema definitions for Leash
//!
//! This crate contains the data structures shared by the supervisor daemon
//! and its clients: the HTTP request/response bodies and the daemon and
//! client configuration. All types here implement JSON Schema generation
//! for external consumption.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod api;

#[cfg(test)]
mod json_roundtrip_tests;

pub use api::*;

/// Default port the supervisor listens on
pub const DEFAULT_PORT: u16 = 5687;

/// Upper bound applied to the requested sweep period, in seconds
pub const MAX_SWEEP_PERIOD_SECS: f64 = 0.1;

/// Configuration structure for the daemon
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Host to bind the HTTP listener to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind the HTTP listener to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log level for the daemon (overridden by `RUST_LOG`)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Requested owner liveness sweep period, in seconds
    #[serde(default = "default_sweep_period_secs")]
    pub sweep_period_secs: f64,
    /// Delay between the graceful and the forceful signal, in milliseconds
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

impl DaemonConfig {
    /// Sweep period actually used by the supervisor.
    ///
    /// The requested period is clamped with `min(0.1s, requested)`: anything
    /// slower than 100ms is replaced by 100ms, anything faster is honored.
    /// A non-positive request falls back to the 100ms bound.
    pub fn effective_sweep_period(&self) -> Duration {
        let secs = self.sweep_period_secs.min(MAX_SWEEP_PERIOD_SECS);
        if secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::from_secs_f64(MAX_SWEEP_PERIOD_SECS)
        }
    }

    /// Grace period before a terminated process is force-killed
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            sweep_period_secs: default_sweep_period_secs(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sweep_period_secs() -> f64 {
    0.35
}

fn default_kill_grace_ms() -> u64 {
    1000
}

/// Client configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Daemon host to connect to
    pub daemon_host: String,
    /// Daemon port to connect to
    pub daemon_port: u16,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl ClientConfig {
    /// Base URL of the daemon's HTTP API
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.daemon_host, self.daemon_port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            daemon_host: default_host(),
            daemon_port: default_port(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
