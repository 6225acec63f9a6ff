//! Versioned schema migrations with explicit rollbacks.
//!
//! Each migration is a directory `migrations/<version>_<name>/` holding `up.sql`
//! and `down.sql`, embedded into the binary at compile time. Applied versions are
//! tracked in `schema_migrations` together with a SHA-256 of the `up` SQL so that
//! edits to an already-applied migration show up as drift.
//!
//! - Migrations apply in ascending version order; each one runs in its own
//!   transaction together with its tracking row.
//! - Applying a migration that is already recorded is an error, never a no-op.
//! - Rollback always executes the migration's own `down.sql`.

use crate::core::error::RosterError;
use crate::core::schemas;
use crate::core::time;
use regex::Regex;
use rusqlite::{Connection, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A single embedded migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// 14-digit UTC timestamp, e.g. `20140127091954`
    pub version: &'static str,
    /// snake_case description, e.g. `create_sections`
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

impl Migration {
    /// Build from a `<version>_<name>` directory name.
    ///
    /// A name without an underscore yields an empty `name`, which `validate_migrations`
    /// rejects.
    pub fn from_dir_name(dir: &'static str, up: &'static str, down: &'static str) -> Self {
        let (version, name) = dir.split_once('_').unwrap_or((dir, ""));
        Self {
            version,
            name,
            up,
            down,
        }
    }

    pub fn id(&self) -> String {
        format!("{}_{}", self.version, self.name)
    }

    /// Lowercase hex SHA-256 of the `up` SQL.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.up.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

macro_rules! embedded_migrations {
    ($($dir:literal),* $(,)?) => {
        /// All migrations shipped with this binary, in chronological order.
        pub fn all_migrations() -> Vec<Migration> {
            vec![
                $(
                    Migration::from_dir_name(
                        $dir,
                        include_str!(concat!("../../migrations/", $dir, "/up.sql")),
                        include_str!(concat!("../../migrations/", $dir, "/down.sql")),
                    ),
                )*
            ]
        }
    };
}

embedded_migrations! {
    "20140127091954_create_sections",
}

/// Row of `schema_migrations`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppliedMigration {
    pub version: String,
    pub name: String,
    pub checksum: String,
    pub applied_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub applied_at: Option<String>,
    /// Applied, but the recorded checksum differs from the embedded SQL.
    pub drifted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub migrations: Vec<MigrationStatus>,
    /// Versions recorded in the database that this binary does not know about.
    pub orphaned: Vec<AppliedMigration>,
}

impl StatusReport {
    pub fn pending_count(&self) -> usize {
        self.migrations
            .iter()
            .filter(|m| m.applied_at.is_none())
            .count()
    }

    pub fn applied_count(&self) -> usize {
        self.migrations.len() - self.pending_count()
    }
}

/// Check version format, name format and strict ordering.
pub fn validate_migrations(migrations: &[Migration]) -> Result<(), RosterError> {
    let version_re = Regex::new(r"^[0-9]{14}$")
        .map_err(|e| RosterError::ValidationError(e.to_string()))?;
    let name_re = Regex::new(r"^[a-z][a-z0-9_]*$")
        .map_err(|e| RosterError::ValidationError(e.to_string()))?;

    let mut previous: Option<&str> = None;
    for m in migrations {
        if !version_re.is_match(m.version) {
            return Err(RosterError::ValidationError(format!(
                "Migration version must be 14 digits: {}",
                m.id()
            )));
        }
        if !name_re.is_match(m.name) {
            return Err(RosterError::ValidationError(format!(
                "Migration name must be snake_case: {}",
                m.id()
            )));
        }
        if let Some(prev) = previous {
            if m.version <= prev {
                return Err(RosterError::ValidationError(format!(
                    "Migration {} is not ordered after {}",
                    m.version, prev
                )));
            }
        }
        previous = Some(m.version);
    }
    Ok(())
}

/// Applies and reverts migrations against one connection.
pub struct Migrator<'c> {
    conn: &'c Connection,
    migrations: Vec<Migration>,
}

impl<'c> Migrator<'c> {
    /// Migrator over the embedded migrations.
    pub fn new(conn: &'c Connection) -> Result<Self, RosterError> {
        Self::with_migrations(conn, all_migrations())
    }

    /// Migrator over an explicit set, which must already be in ascending order.
    pub fn with_migrations(
        conn: &'c Connection,
        migrations: Vec<Migration>,
    ) -> Result<Self, RosterError> {
        validate_migrations(&migrations)?;
        conn.execute(schemas::SCHEMA_MIGRATIONS_SCHEMA, [])?;
        Ok(Self { conn, migrations })
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    fn find(&self, version: &str) -> Result<&Migration, RosterError> {
        self.migrations
            .iter()
            .find(|m| m.version == version)
            .ok_or_else(|| RosterError::UnknownMigration(version.to_string()))
    }

    /// Tracking rows, ascending by version.
    pub fn applied(&self) -> Result<Vec<AppliedMigration>, RosterError> {
        let mut stmt = self.conn.prepare(schemas::SCHEMA_MIGRATIONS_SELECT)?;
        let rows = stmt.query_map([], |row| {
            Ok(AppliedMigration {
                version: row.get(0)?,
                name: row.get(1)?,
                checksum: row.get(2)?,
                applied_at: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn applied_by_version(&self) -> Result<BTreeMap<String, AppliedMigration>, RosterError> {
        Ok(self
            .applied()?
            .into_iter()
            .map(|a| (a.version.clone(), a))
            .collect())
    }

    pub fn is_applied(&self, version: &str) -> Result<bool, RosterError> {
        Ok(self.applied_by_version()?.contains_key(version))
    }

    pub fn status(&self) -> Result<StatusReport, RosterError> {
        let mut applied = self.applied_by_version()?;
        let migrations = self
            .migrations
            .iter()
            .map(|m| {
                let record = applied.remove(m.version);
                MigrationStatus {
                    version: m.version.to_string(),
                    name: m.name.to_string(),
                    drifted: record
                        .as_ref()
                        .is_some_and(|r| r.checksum != m.checksum()),
                    applied_at: record.map(|r| r.applied_at),
                }
            })
            .collect();
        Ok(StatusReport {
            migrations,
            orphaned: applied.into_values().collect(),
        })
    }

    /// Known migrations not yet applied, ascending.
    pub fn pending(&self) -> Result<Vec<&Migration>, RosterError> {
        let applied = self.applied_by_version()?;
        Ok(self
            .migrations
            .iter()
            .filter(|m| !applied.contains_key(m.version))
            .collect())
    }

    /// Apply every pending migration. Returns the versions applied.
    pub fn migrate(&self) -> Result<Vec<String>, RosterError> {
        let pending: Vec<Migration> = self.pending()?.into_iter().cloned().collect();
        if pending.is_empty() {
            debug!("schema is up to date");
        }
        let mut done = Vec::new();
        for m in &pending {
            self.apply_one(m)?;
            done.push(m.version.to_string());
        }
        Ok(done)
    }

    /// Apply pending migrations up to and including `target`.
    pub fn migrate_to(&self, target: &str) -> Result<Vec<String>, RosterError> {
        self.find(target)?;
        let pending: Vec<Migration> = self
            .pending()?
            .into_iter()
            .filter(|m| m.version <= target)
            .cloned()
            .collect();
        let mut done = Vec::new();
        for m in &pending {
            self.apply_one(m)?;
            done.push(m.version.to_string());
        }
        Ok(done)
    }

    /// Apply exactly one migration. Fails with `AlreadyApplied` if it is recorded.
    pub fn apply(&self, version: &str) -> Result<(), RosterError> {
        let m = self.find(version)?.clone();
        if self.is_applied(version)? {
            return Err(RosterError::AlreadyApplied(m.id()));
        }
        self.apply_one(&m)
    }

    /// Revert the `steps` most recently applied migrations, newest first.
    pub fn rollback(&self, steps: usize) -> Result<Vec<String>, RosterError> {
        let mut applied = self.applied()?;
        applied.reverse();
        let mut done = Vec::new();
        for record in applied.into_iter().take(steps) {
            let m = self.find(&record.version)?.clone();
            self.revert_one(&m)?;
            done.push(record.version);
        }
        Ok(done)
    }

    /// Revert exactly one migration. Fails with `NotApplied` if it is not recorded.
    pub fn revert(&self, version: &str) -> Result<(), RosterError> {
        let m = self.find(version)?.clone();
        if !self.is_applied(version)? {
            return Err(RosterError::NotApplied(m.id()));
        }
        self.revert_one(&m)
    }

    /// Roll back the latest migration and apply it again.
    pub fn redo(&self) -> Result<Option<String>, RosterError> {
        let Some(version) = self.rollback(1)?.pop() else {
            return Ok(None);
        };
        self.apply(&version)?;
        Ok(Some(version))
    }

    /// Applied migrations whose recorded checksum differs from the embedded SQL.
    pub fn drift(&self) -> Result<Vec<RosterError>, RosterError> {
        let mut out = Vec::new();
        for record in self.applied()? {
            if let Ok(m) = self.find(&record.version) {
                let expected = m.checksum();
                if record.checksum != expected {
                    out.push(RosterError::ChecksumMismatch {
                        version: record.version.clone(),
                        recorded: record.checksum.clone(),
                        expected,
                    });
                }
            }
        }
        Ok(out)
    }

    /// First drift found, if any.
    pub fn verify(&self) -> Result<(), RosterError> {
        match self.drift()?.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply_one(&self, m: &Migration) -> Result<(), RosterError> {
        info!(version = m.version, name = m.name, "applying migration");
        // Dropping the transaction without commit rolls it back.
        let tx = self.conn.unchecked_transaction()?;
        if let Err(e) = tx.execute_batch(m.up) {
            warn!(version = m.version, error = %e, "migration failed; rolled back");
            return Err(e.into());
        }
        tx.execute(
            schemas::SCHEMA_MIGRATIONS_INSERT,
            params![m.version, m.name, m.checksum(), time::now_epoch_z()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn revert_one(&self, m: &Migration) -> Result<(), RosterError> {
        info!(version = m.version, name = m.name, "reverting migration");
        let tx = self.conn.unchecked_transaction()?;
        if let Err(e) = tx.execute_batch(m.down) {
            warn!(version = m.version, error = %e, "rollback failed; rolled back");
            return Err(e.into());
        }
        tx.execute(schemas::SCHEMA_MIGRATIONS_DELETE, params![m.version])?;
        tx.commit()?;
        Ok(())
    }
}
