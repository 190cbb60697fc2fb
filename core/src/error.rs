//! Core error types

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Failed to spawn '{command}': {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to signal process {pid}: {reason}")]
    ProcessSignal { pid: u32, reason: String },

    #[error("Failed to wait for process {pid}: {reason}")]
    ProcessWait { pid: u32, reason: String },
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::ProcessSpawn { .. } => "CORE010",
            CoreError::ProcessSignal { .. } => "CORE011",
            CoreError::ProcessWait { .. } => "CORE012",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::ConfigurationError("test".to_string()).code(), "CORE001");
        assert_eq!(CoreError::ValidationError("test".to_string()).code(), "CORE002");
        assert_eq!(CoreError::InitializationError("test".to_string()).code(), "CORE003");
        assert_eq!(
            CoreError::ProcessSignal { pid: 1, reason: "x".to_string() }.code(),
            "CORE011"
        );
        assert_eq!(
            CoreError::ProcessWait { pid: 1, reason: "x".to_string() }.code(),
            "CORE012"
        );
    }

    #[test]
    fn test_error_display() {
        let error = CoreError::ConfigurationError("invalid port".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid port");
    }
}
