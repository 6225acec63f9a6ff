use roster::core::db;
use roster::core::error::RosterError;
use roster::core::introspect;
use tempfile::tempdir;

#[test]
fn missing_table_is_not_found() {
    let tmp = tempdir().expect("tempdir");
    let conn = db::db_connect(&tmp.path().join("t.db"), 5).expect("connect");

    assert!(!introspect::table_exists(&conn, "sections").expect("exists"));
    let err = introspect::columns(&conn, "sections").expect_err("no table");
    assert!(matches!(err, RosterError::NotFound(_)));
    assert!(introspect::indexes(&conn, "sections").is_err());
}

#[test]
fn indexes_skip_autoindexes_and_report_key_order() {
    let tmp = tempdir().expect("tempdir");
    let conn = db::db_connect(&tmp.path().join("t.db"), 5).expect("connect");
    conn.execute_batch(
        "CREATE TABLE leaders (id INTEGER PRIMARY KEY, email TEXT UNIQUE, last TEXT, first TEXT);
         CREATE INDEX idx_leaders_name ON leaders(last, first);",
    )
    .expect("setup");

    let indexes = introspect::indexes(&conn, "leaders").expect("indexes");
    assert_eq!(indexes.len(), 1, "UNIQUE autoindex must be skipped: {indexes:?}");
    assert_eq!(indexes[0].name, "idx_leaders_name");
    assert_eq!(indexes[0].columns, vec!["last", "first"]);

    assert!(introspect::index_covers(&conn, "leaders", "last").expect("covers"));
    // Second key of a composite index does not count as covering.
    assert!(!introspect::index_covers(&conn, "leaders", "first").expect("covers"));
}

#[test]
fn snapshot_is_sorted_and_ignores_tracking_table() {
    let tmp = tempdir().expect("tempdir");
    let conn = db::db_connect(&tmp.path().join("t.db"), 5).expect("connect");
    conn.execute_batch(
        "CREATE TABLE schema_migrations (version TEXT PRIMARY KEY);
         CREATE TABLE b (id INTEGER PRIMARY KEY AUTOINCREMENT);
         CREATE TABLE a (id INTEGER);
         CREATE INDEX idx_a ON a(id);",
    )
    .expect("setup");

    let snapshot = introspect::schema_snapshot(&conn).expect("snapshot");
    let names: Vec<(&str, &str)> = snapshot
        .iter()
        .map(|o| (o.kind.as_str(), o.name.as_str()))
        .collect();
    assert_eq!(names, vec![("index", "idx_a"), ("table", "a"), ("table", "b")]);
    assert_eq!(introspect::tables(&conn).expect("tables"), vec!["a", "b"]);
}

#[test]
fn connection_enables_foreign_keys_and_wal() {
    let tmp = tempdir().expect("tempdir");
    let conn = db::db_connect(&tmp.path().join("t.db"), 5).expect("connect");

    let fk_on: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("pragma foreign_keys");
    assert_eq!(fk_on, 1);

    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("pragma journal_mode");
    assert_eq!(mode.to_lowercase(), "wal");
}
