//! Configuration loading for roster.
//!
//! Values resolve in order: built-in defaults, `roster.toml` (or the file given
//! with `--config`), environment overrides, then CLI flags applied by the caller.

use crate::core::error::RosterError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "roster.toml";

pub const ENV_DATA_DIR: &str = "ROSTER_DATA_DIR";
pub const ENV_DB: &str = "ROSTER_DB";
pub const ENV_LOG: &str = "ROSTER_LOG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `warn` or `roster=debug`.
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RosterConfig {
    /// Directory holding the database and the event log.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    pub db_name: String,
    /// SQLite `busy_timeout` in seconds.
    pub busy_timeout_secs: u64,
    pub log: LogConfig,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".roster"),
            db_name: "roster.db".to_string(),
            busy_timeout_secs: 5,
            log: LogConfig::default(),
        }
    }
}

impl RosterConfig {
    /// Load from an explicit file, or from `roster.toml` in `cwd` when present.
    ///
    /// An explicit path that does not exist is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, RosterError> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(RosterError::ConfigError(format!(
                        "Configuration file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = cwd.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();

        // Relative data dirs are anchored at the working directory, not the process cwd.
        if config.data_dir.is_relative() {
            config.data_dir = cwd.join(&config.data_dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, RosterError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, RosterError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(name) = env::var(ENV_DB) {
            if !name.trim().is_empty() {
                self.db_name = name;
            }
        }
        if let Ok(level) = env::var(ENV_LOG) {
            if !level.trim().is_empty() {
                self.log.level = level;
            }
        }
    }

    pub fn validate(&self) -> Result<(), RosterError> {
        if self.db_name.trim().is_empty() {
            return Err(RosterError::ConfigError("db_name must not be empty".into()));
        }
        if self.db_name.contains('/') || self.db_name.contains('\\') {
            return Err(RosterError::ConfigError(format!(
                "db_name must be a file name, not a path: {}",
                self.db_name
            )));
        }
        if self.busy_timeout_secs == 0 {
            return Err(RosterError::ConfigError(
                "busy_timeout_secs must be greater than zero".into(),
            ));
        }
        match self.log.format.as_str() {
            "compact" | "json" => {}
            other => {
                return Err(RosterError::ConfigError(format!(
                    "Unknown log format: {}",
                    other
                )));
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_name)
    }
}
