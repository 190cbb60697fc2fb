//! Tracing initialization shared by the binaries

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set and valid.
pub fn init_tracing(level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| crate::CoreError::ConfigurationError(format!("invalid log level '{level}': {e}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

    info!("Tracing initialized with level: {}", level);
    Ok(())
}
