//! Structured logging setup.
//!
//! Logs go to stderr so stdout stays usable for `--format json` output.

use crate::core::config::LogConfig;
use crate::core::error::RosterError;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `override_level` (from `--log-level`) wins over `RUST_LOG`, which wins over
/// the configured level.
pub fn init_logging(config: &LogConfig, override_level: Option<&str>) -> Result<(), RosterError> {
    let env_filter = match override_level {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level)),
    }
    .map_err(|e| RosterError::ConfigError(format!("Invalid log level: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        other => {
            return Err(RosterError::ConfigError(format!(
                "Unknown log format: {}",
                other
            )));
        }
    };

    installed.map_err(|e| RosterError::ConfigError(format!("Failed to set logger: {}", e)))?;
    tracing::debug!(format = %config.format, "logging initialized");
    Ok(())
}
