use roster::core::db;
use roster::core::error::RosterError;
use roster::core::introspect;
use roster::core::migration::{self, Migration, Migrator};
use rusqlite::{Connection, params};
use tempfile::{TempDir, tempdir};

const CREATE_SECTIONS: &str = "20140127091954";

fn open_temp_db() -> (TempDir, Connection) {
    let tmp = tempdir().expect("tempdir");
    let conn = db::db_connect(&tmp.path().join("roster.db"), 5).expect("db connect");
    (tmp, conn)
}

fn embedded_plus(extra: Migration) -> Vec<Migration> {
    let mut all = migration::all_migrations();
    all.push(extra);
    all
}

#[test]
fn migrate_creates_sections_with_exact_columns() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");

    let applied = migrator.migrate().expect("migrate");
    assert_eq!(applied, vec![CREATE_SECTIONS.to_string()]);

    assert!(introspect::table_exists(&conn, "sections").expect("exists"));
    let columns = introspect::column_names(&conn, "sections").expect("columns");
    assert_eq!(columns, vec!["id", "course_id", "leader_id"]);

    let id = &introspect::columns(&conn, "sections").expect("columns")[0];
    assert!(id.primary_key);
    assert!(id.not_null);
}

#[test]
fn migrate_indexes_course_and_leader() {
    let (_tmp, conn) = open_temp_db();
    Migrator::new(&conn).expect("migrator").migrate().expect("migrate");

    assert!(introspect::index_covers(&conn, "sections", "course_id").expect("course idx"));
    assert!(introspect::index_covers(&conn, "sections", "leader_id").expect("leader idx"));

    let indexes = introspect::indexes(&conn, "sections").expect("indexes");
    let names: Vec<&str> = indexes.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["index_sections_on_course_id", "index_sections_on_leader_id"]
    );
    assert!(indexes.iter().all(|i| !i.unique), "indexes must be non-unique");
}

#[test]
fn sections_has_no_foreign_key_constraints() {
    let (_tmp, conn) = open_temp_db();
    Migrator::new(&conn).expect("migrator").migrate().expect("migrate");

    let fk_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_foreign_key_list('sections')",
            [],
            |row| row.get(0),
        )
        .expect("fk list");
    assert_eq!(fk_count, 0);

    // foreign_keys=ON is set, yet dangling references are accepted.
    conn.execute(
        "INSERT INTO sections(course_id, leader_id) VALUES(?1, ?2)",
        params![999_i64, 888_i64],
    )
    .expect("dangling refs insert");
}

#[test]
fn rollback_restores_pre_migration_schema() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    let before = introspect::schema_snapshot(&conn).expect("snapshot before");

    migrator.migrate().expect("migrate");
    assert_ne!(introspect::schema_snapshot(&conn).expect("snapshot mid"), before);

    let reverted = migrator.rollback(1).expect("rollback");
    assert_eq!(reverted, vec![CREATE_SECTIONS.to_string()]);
    assert!(!introspect::table_exists(&conn, "sections").expect("exists"));
    assert_eq!(introspect::schema_snapshot(&conn).expect("snapshot after"), before);
    assert!(migrator.applied().expect("applied").is_empty());
}

fn master_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master ORDER BY name")
        .expect("prepare");
    stmt.query_map([], |row| row.get(0))
        .expect("query")
        .collect::<Result<Vec<String>, _>>()
        .expect("names")
}

#[test]
fn rollback_leaves_raw_sqlite_master_unchanged() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    let before = master_names(&conn);

    migrator.migrate().expect("migrate");
    create_row(&conn);
    assert!(master_names(&conn).contains(&"sections".to_string()));

    migrator.rollback(1).expect("rollback");
    let after = master_names(&conn);
    assert_eq!(after, before);
    assert!(!after.contains(&"sqlite_sequence".to_string()));
}

fn create_row(conn: &Connection) {
    conn.execute(
        "INSERT INTO sections (course_id, leader_id) VALUES (?1, ?2)",
        params![106, 7],
    )
    .expect("insert");
}

#[test]
fn applying_twice_without_rollback_fails() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    migrator.apply(CREATE_SECTIONS).expect("first apply");

    let err = migrator.apply(CREATE_SECTIONS).expect_err("second apply");
    assert!(matches!(err, RosterError::AlreadyApplied(_)), "{err}");

    // Running the raw SQL again fails at the database too.
    let raw = conn.execute_batch(migration::all_migrations()[0].up);
    assert!(raw.is_err());
    assert!(raw.unwrap_err().to_string().contains("already exists"));
}

#[test]
fn migrate_on_up_to_date_schema_is_empty() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    migrator.migrate().expect("first");
    assert!(migrator.migrate().expect("second").is_empty());
    assert!(migrator.pending().expect("pending").is_empty());
}

#[test]
fn rollback_with_nothing_applied_is_noop() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    assert!(migrator.rollback(1).expect("rollback").is_empty());
    assert_eq!(migrator.redo().expect("redo"), None);
}

#[test]
fn revert_requires_applied_and_known_versions() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");

    let err = migrator.revert(CREATE_SECTIONS).expect_err("not applied");
    assert!(matches!(err, RosterError::NotApplied(_)));

    let err = migrator.revert("29991231235959").expect_err("unknown");
    assert!(matches!(err, RosterError::UnknownMigration(_)));

    let err = migrator.migrate_to("29991231235959").expect_err("unknown target");
    assert!(matches!(err, RosterError::UnknownMigration(_)));
}

#[test]
fn tracking_row_records_name_and_checksum() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    migrator.migrate().expect("migrate");

    let applied = migrator.applied().expect("applied");
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].version, CREATE_SECTIONS);
    assert_eq!(applied[0].name, "create_sections");
    assert_eq!(applied[0].checksum, migration::all_migrations()[0].checksum());
    assert!(roster::core::time::parse_epoch_z(&applied[0].applied_at).is_some());
}

#[test]
fn failed_migration_rolls_back_and_stops() {
    let (_tmp, conn) = open_temp_db();
    let broken = Migration {
        version: "20140201000000",
        name: "broken_step",
        up: "CREATE TABLE rooms (id INTEGER PRIMARY KEY); CREATE TABL oops;",
        down: "DROP TABLE rooms;",
    };
    let migrator = Migrator::with_migrations(&conn, embedded_plus(broken)).expect("migrator");

    let err = migrator.migrate().expect_err("broken migration");
    assert!(matches!(err, RosterError::RusqliteError(_)), "{err}");

    // The earlier migration committed; the broken one left nothing behind.
    assert!(introspect::table_exists(&conn, "sections").expect("sections"));
    assert!(!introspect::table_exists(&conn, "rooms").expect("rooms"));
    let versions: Vec<String> = migrator
        .applied()
        .expect("applied")
        .into_iter()
        .map(|a| a.version)
        .collect();
    assert_eq!(versions, vec![CREATE_SECTIONS.to_string()]);
}

#[test]
fn migrate_to_stops_at_target_and_rollback_is_newest_first() {
    let (_tmp, conn) = open_temp_db();
    let rooms = Migration {
        version: "20140301000000",
        name: "add_room_to_sections",
        up: "ALTER TABLE sections ADD COLUMN room TEXT;",
        down: "ALTER TABLE sections DROP COLUMN room;",
    };
    let migrator = Migrator::with_migrations(&conn, embedded_plus(rooms)).expect("migrator");

    let first = migrator.migrate_to(CREATE_SECTIONS).expect("migrate_to");
    assert_eq!(first, vec![CREATE_SECTIONS.to_string()]);
    assert_eq!(migrator.pending().expect("pending").len(), 1);

    migrator.migrate().expect("migrate rest");
    assert_eq!(
        introspect::column_names(&conn, "sections").expect("cols"),
        vec!["id", "course_id", "leader_id", "room"]
    );

    let reverted = migrator.rollback(2).expect("rollback both");
    assert_eq!(
        reverted,
        vec!["20140301000000".to_string(), CREATE_SECTIONS.to_string()]
    );
}

#[test]
fn redo_reapplies_latest_migration() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    migrator.migrate().expect("migrate");
    conn.execute("INSERT INTO sections(course_id) VALUES(1)", [])
        .expect("insert");

    let redone = migrator.redo().expect("redo");
    assert_eq!(redone.as_deref(), Some(CREATE_SECTIONS));
    assert!(migrator.is_applied(CREATE_SECTIONS).expect("applied"));

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM sections", [], |row| row.get(0))
        .expect("count");
    assert_eq!(rows, 0, "redo recreates the table empty");
}

#[test]
fn verify_reports_checksum_drift() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");
    migrator.migrate().expect("migrate");
    migrator.verify().expect("clean verify");

    conn.execute(
        "UPDATE schema_migrations SET checksum = 'deadbeef' WHERE version = ?1",
        params![CREATE_SECTIONS],
    )
    .expect("tamper");

    match migrator.verify() {
        Err(RosterError::ChecksumMismatch {
            version, recorded, ..
        }) => {
            assert_eq!(version, CREATE_SECTIONS);
            assert_eq!(recorded, "deadbeef");
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }

    let status = migrator.status().expect("status");
    assert!(status.migrations[0].drifted);
}

#[test]
fn status_reports_pending_applied_and_orphaned() {
    let (_tmp, conn) = open_temp_db();
    let migrator = Migrator::new(&conn).expect("migrator");

    let status = migrator.status().expect("status");
    assert_eq!(status.pending_count(), 1);
    assert_eq!(status.applied_count(), 0);
    assert!(status.orphaned.is_empty());

    migrator.migrate().expect("migrate");
    conn.execute(
        "INSERT INTO schema_migrations(version, name, checksum, applied_at) VALUES('20990101000000', 'from_the_future', 'x', '0Z')",
        [],
    )
    .expect("orphan row");

    let status = migrator.status().expect("status");
    assert_eq!(status.applied_count(), 1);
    assert_eq!(status.pending_count(), 0);
    assert_eq!(status.orphaned.len(), 1);
    assert_eq!(status.orphaned[0].name, "from_the_future");

    // No down SQL is known for the orphan, so it cannot be rolled back.
    let err = migrator.rollback(1).expect_err("orphan rollback");
    assert!(matches!(err, RosterError::UnknownMigration(_)));
}

#[test]
fn invalid_migration_set_is_rejected_up_front() {
    let (_tmp, conn) = open_temp_db();
    let bad = Migration {
        version: "20000101000000",
        name: "older_than_sections",
        up: "SELECT 1;",
        down: "SELECT 1;",
    };
    let err = Migrator::with_migrations(&conn, embedded_plus(bad))
        .err()
        .expect("out of order set");
    assert!(matches!(err, RosterError::ValidationError(_)));
}
