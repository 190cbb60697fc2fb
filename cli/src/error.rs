//! CLI error types

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// The daemon answered that the operation failed
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// A command-line argument could not be interpreted
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The daemon could not be reached
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The daemon answered with an unexpected status or body
    #[error("Daemon error: {0}")]
    DaemonError(String),

    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// JSON encoding or decoding failure
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CliError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CliError::CommandFailed(_) => "CLI001",
            CliError::InvalidArgument(_) => "CLI002",
            CliError::ConnectionFailed(_) => "CLI004",
            CliError::DaemonError(_) => "CLI005",
            CliError::Timeout(_) => "CLI006",
            CliError::SerializationError(_) => "CLI007",
            CliError::IoError(_) => "CLI008",
        }
    }
}

/// CLI-specific result type
pub type Result<T> = std::result::Result<T, CliError>;
