//! Daemon error types

use thiserror::Error;

/// Errors raised while starting or running the daemon
#[derive(Error, Debug)]
pub enum DaemonError {
    /// The HTTP server could not be bound or failed while serving
    #[error("Server error: {0}")]
    ServerError(String),

    /// Error bubbled up from the supervisor core
    #[error(transparent)]
    Core(#[from] leash_core::CoreError),

    /// HTTP layer failure
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DaemonError {
    /// Stable error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            DaemonError::ServerError(_) => "DAEMON001",
            DaemonError::Core(inner) => inner.code(),
            DaemonError::Http(_) => "DAEMON002",
            DaemonError::IoError(_) => "DAEMON003",
        }
    }
}

/// Daemon result type
pub type Result<T> = std::result::Result<T, DaemonError>;
