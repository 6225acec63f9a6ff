use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unknown migration: {0}")]
    UnknownMigration(String),
    #[error("Migration {0} is already applied")]
    AlreadyApplied(String),
    #[error("Migration {0} is not applied")]
    NotApplied(String),
    #[error("Checksum mismatch for migration {version}: recorded {recorded}, expected {expected}")]
    ChecksumMismatch {
        version: String,
        recorded: String,
        expected: String,
    },
}

impl From<toml::de::Error> for RosterError {
    fn from(err: toml::de::Error) -> Self {
        RosterError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for RosterError {
    fn from(err: serde_json::Error) -> Self {
        RosterError::ValidationError(err.to_string())
    }
}
