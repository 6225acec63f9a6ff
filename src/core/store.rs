//! Store handle: the data directory that holds the roster database and its event log.

use crate::core::config::RosterConfig;
use crate::core::error::RosterError;
use std::fs;
use std::path::{Path, PathBuf};

/// Event log appended to by the broker, relative to the store root.
pub const EVENTS_FILE_NAME: &str = "migrations.events.jsonl";

#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute or cwd-anchored path to the data directory
    pub root: PathBuf,
    /// Database file inside `root`
    pub db_path: PathBuf,
    pub busy_timeout_secs: u64,
}

impl Store {
    pub fn from_config(config: &RosterConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
            db_path: config.db_path(),
            busy_timeout_secs: config.busy_timeout_secs,
        }
    }

    /// Store rooted at `root` with the default database name. Mostly for tests.
    pub fn at(root: &Path) -> Self {
        let config = RosterConfig {
            data_dir: root.to_path_buf(),
            ..RosterConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(EVENTS_FILE_NAME)
    }

    /// Create the data directory if needed and fail early if it is not writable.
    pub fn ensure_root(&self) -> Result<(), RosterError> {
        fs::create_dir_all(&self.root)?;
        let marker = self.root.join(".roster_write_check");
        fs::write(&marker, b"ok").map_err(|e| {
            RosterError::ValidationError(format!(
                "Data directory {} is not writable: {}",
                self.root.display(),
                e
            ))
        })?;
        fs::remove_file(&marker)?;
        Ok(())
    }
}
