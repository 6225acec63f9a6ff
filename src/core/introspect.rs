//! Read-only schema introspection over SQLite pragmas.

use crate::core::error::RosterError;
use crate::core::schemas;
use rusqlite::{Connection, params};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    /// Indexed columns in key order
    pub columns: Vec<String>,
}

/// One `sqlite_master` entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaObject {
    pub kind: String,
    pub name: String,
    pub sql: Option<String>,
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, RosterError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Columns of `table` in declaration order. Missing table → `NotFound`.
pub fn columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>, RosterError> {
    if !table_exists(conn, table)? {
        return Err(RosterError::NotFound(format!("table {}", table)));
    }
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid ASC",
    )?;
    let rows = stmt.query_map(params![table], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            decl_type: row.get(1)?,
            not_null: row.get::<_, i64>(2)? != 0,
            primary_key: row.get::<_, i64>(3)? != 0,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>, RosterError> {
    Ok(columns(conn, table)?.into_iter().map(|c| c.name).collect())
}

/// Explicitly created indexes on `table`, sorted by name. SQLite auto-indexes are skipped.
pub fn indexes(conn: &Connection, table: &str) -> Result<Vec<IndexInfo>, RosterError> {
    if !table_exists(conn, table)? {
        return Err(RosterError::NotFound(format!("table {}", table)));
    }
    let mut list = conn.prepare(
        "SELECT name, \"unique\" FROM pragma_index_list(?1) WHERE origin = 'c' ORDER BY name ASC",
    )?;
    let heads = list.query_map(params![table], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
    })?;

    let mut cols_stmt =
        conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno ASC")?;
    let mut out = Vec::new();
    for head in heads {
        let (name, unique) = head?;
        let cols = cols_stmt.query_map(params![name], |row| row.get::<_, String>(0))?;
        let mut columns = Vec::new();
        for c in cols {
            columns.push(c?);
        }
        out.push(IndexInfo {
            name,
            unique,
            columns,
        });
    }
    Ok(out)
}

/// True if some index on `table` has `column` as its leading key.
pub fn index_covers(conn: &Connection, table: &str, column: &str) -> Result<bool, RosterError> {
    Ok(indexes(conn, table)?
        .iter()
        .any(|idx| idx.columns.first().is_some_and(|c| c == column)))
}

/// User-visible schema objects, sorted. SQLite internals and the migration
/// tracking table are left out so that before/after comparisons only see
/// what migrations create.
pub fn schema_snapshot(conn: &Connection) -> Result<Vec<SchemaObject>, RosterError> {
    let mut stmt = conn.prepare(
        "SELECT type, name, sql FROM sqlite_master
         WHERE name NOT LIKE 'sqlite_%' AND name != ?1 AND tbl_name != ?1
         ORDER BY type ASC, name ASC",
    )?;
    let rows = stmt.query_map(params![schemas::SCHEMA_MIGRATIONS_TABLE], |row| {
        Ok(SchemaObject {
            kind: row.get(0)?,
            name: row.get(1)?,
            sql: row.get(2)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Tables visible in the snapshot, sorted.
pub fn tables(conn: &Connection) -> Result<Vec<String>, RosterError> {
    Ok(schema_snapshot(conn)?
        .into_iter()
        .filter(|o| o.kind == "table")
        .map(|o| o.name)
        .collect())
}
