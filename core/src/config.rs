//! Configuration loading and validation for the supervisor daemon
//!
//! This module parses a TOML file into a `schema::DaemonConfig`, relying on
//! the serde defaults of the schema type for omitted keys, and performs
//! strict validation with field-named error messages.
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 5687
//! logLevel = "debug"
//! sweepPeriodSecs = 0.05
//! killGraceMs = 500
//! ```

use crate::{CoreError, Result};
use schema::DaemonConfig;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Validate daemon configuration values
pub fn validate_config(config: &DaemonConfig) -> Result<()> {
    if config.port == 0 {
        return Err(CoreError::ValidationError(
            "port: must be 1..=65535".to_string(),
        ));
    }

    if config.host.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "host: cannot be empty".to_string(),
        ));
    }

    if !config.sweep_period_secs.is_finite() || config.sweep_period_secs <= 0.0 {
        return Err(CoreError::ValidationError(format!(
            "sweepPeriodSecs: must be a positive number of seconds, got {}",
            config.sweep_period_secs
        )));
    }

    if config.log_level.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "logLevel: cannot be empty".to_string(),
        ));
    }

    debug!("Configuration validated successfully");
    Ok(())
}

/// Load daemon config from a TOML file path
pub fn load_config_from_toml_path(path: impl AsRef<Path>) -> Result<DaemonConfig> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_config_from_toml_str(&data)
}

/// Load daemon config from a TOML string
pub fn load_config_from_toml_str(input: &str) -> Result<DaemonConfig> {
    let cfg: DaemonConfig = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    validate_config(&cfg)?;
    Ok(cfg)
}
