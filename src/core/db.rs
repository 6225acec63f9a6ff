use crate::core::error;
use crate::core::store::Store;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Open a connection with the pragmas every roster connection runs under.
pub fn db_connect(db_path: &Path, busy_timeout_secs: u64) -> Result<Connection, error::RosterError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(busy_timeout_secs))?;
    // journal_mode returns a row, so it cannot go through execute().
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

/// Connect to the store's database, creating the data directory first.
pub fn open_store(store: &Store) -> Result<Connection, error::RosterError> {
    store.ensure_root()?;
    db_connect(&store.db_path, store.busy_timeout_secs)
}
