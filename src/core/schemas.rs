//! Centralized SQL for roster.
//!
//! Versioned table definitions live under `migrations/`; this module only holds
//! the tracking table that the runner itself needs and the row-level queries
//! used by the `sections` subsystem.

// --- Migration tracking ---
pub const SCHEMA_MIGRATIONS_TABLE: &str = "schema_migrations";

pub const SCHEMA_MIGRATIONS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        checksum TEXT NOT NULL,
        applied_at TEXT NOT NULL
    )
";

pub const SCHEMA_MIGRATIONS_SELECT: &str =
    "SELECT version, name, checksum, applied_at FROM schema_migrations ORDER BY version ASC";

pub const SCHEMA_MIGRATIONS_INSERT: &str =
    "INSERT INTO schema_migrations(version, name, checksum, applied_at) VALUES(?1, ?2, ?3, ?4)";

pub const SCHEMA_MIGRATIONS_DELETE: &str = "DELETE FROM schema_migrations WHERE version = ?1";

// --- Sections ---
pub const SECTIONS_TABLE: &str = "sections";
pub const SECTIONS_COURSE_INDEX: &str = "index_sections_on_course_id";
pub const SECTIONS_LEADER_INDEX: &str = "index_sections_on_leader_id";

pub const SECTIONS_INSERT: &str = "INSERT INTO sections(course_id, leader_id) VALUES(?1, ?2)";
pub const SECTIONS_SELECT_BY_ID: &str =
    "SELECT id, course_id, leader_id FROM sections WHERE id = ?1";
pub const SECTIONS_SELECT_ALL: &str =
    "SELECT id, course_id, leader_id FROM sections ORDER BY id ASC";
pub const SECTIONS_SELECT_BY_COURSE: &str =
    "SELECT id, course_id, leader_id FROM sections WHERE course_id = ?1 ORDER BY id ASC";
pub const SECTIONS_SELECT_BY_LEADER: &str =
    "SELECT id, course_id, leader_id FROM sections WHERE leader_id = ?1 ORDER BY id ASC";
pub const SECTIONS_UPDATE_LEADER: &str = "UPDATE sections SET leader_id = ?2 WHERE id = ?1";
pub const SECTIONS_DELETE: &str = "DELETE FROM sections WHERE id = ?1";
