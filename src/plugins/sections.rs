//! Section records: rows of the `sections` table.
//!
//! A section belongs to a course and has a leader. Both references are plain
//! indexed integers; the schema does not enforce that the referenced course or
//! leader exists.

use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use colored::Colorize;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: i64,
    pub course_id: Option<i64>,
    pub leader_id: Option<i64>,
}

impl Section {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Section {
            id: row.get(0)?,
            course_id: row.get(1)?,
            leader_id: row.get(2)?,
        })
    }
}

fn collect_sections(
    conn: &Connection,
    sql: &str,
    arg: Option<i64>,
) -> Result<Vec<Section>, error::RosterError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match arg {
        Some(v) => stmt.query_map(params![v], Section::from_row)?,
        None => stmt.query_map([], Section::from_row)?,
    };
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn create_section(
    conn: &Connection,
    course_id: Option<i64>,
    leader_id: Option<i64>,
) -> Result<Section, error::RosterError> {
    conn.execute(schemas::SECTIONS_INSERT, params![course_id, leader_id])?;
    Ok(Section {
        id: conn.last_insert_rowid(),
        course_id,
        leader_id,
    })
}

pub fn get_section(conn: &Connection, id: i64) -> Result<Section, error::RosterError> {
    conn.query_row(schemas::SECTIONS_SELECT_BY_ID, params![id], Section::from_row)
        .optional()?
        .ok_or_else(|| error::RosterError::NotFound(format!("section {}", id)))
}

pub fn list_sections(conn: &Connection) -> Result<Vec<Section>, error::RosterError> {
    collect_sections(conn, schemas::SECTIONS_SELECT_ALL, None)
}

pub fn sections_for_course(
    conn: &Connection,
    course_id: i64,
) -> Result<Vec<Section>, error::RosterError> {
    collect_sections(conn, schemas::SECTIONS_SELECT_BY_COURSE, Some(course_id))
}

pub fn sections_for_leader(
    conn: &Connection,
    leader_id: i64,
) -> Result<Vec<Section>, error::RosterError> {
    collect_sections(conn, schemas::SECTIONS_SELECT_BY_LEADER, Some(leader_id))
}

/// Point a section at a different leader, or clear it with `None`.
pub fn reassign_leader(
    conn: &Connection,
    id: i64,
    leader_id: Option<i64>,
) -> Result<Section, error::RosterError> {
    let changed = conn.execute(schemas::SECTIONS_UPDATE_LEADER, params![id, leader_id])?;
    if changed == 0 {
        return Err(error::RosterError::NotFound(format!("section {}", id)));
    }
    get_section(conn, id)
}

pub fn delete_section(conn: &Connection, id: i64) -> Result<(), error::RosterError> {
    let changed = conn.execute(schemas::SECTIONS_DELETE, params![id])?;
    if changed == 0 {
        return Err(error::RosterError::NotFound(format!("section {}", id)));
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(name = "section", about = "Create, inspect and remove section records")]
pub struct SectionCli {
    #[clap(subcommand)]
    pub command: SectionCommand,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand, Debug)]
pub enum SectionCommand {
    /// Add a section.
    Add {
        #[clap(long)]
        course: Option<i64>,
        #[clap(long)]
        leader: Option<i64>,
    },
    /// Show one section.
    Show { id: i64 },
    /// List sections, optionally filtered by course or leader.
    List {
        #[clap(long, conflicts_with = "leader")]
        course: Option<i64>,
        #[clap(long)]
        leader: Option<i64>,
    },
    /// Change (or clear) a section's leader.
    Reassign {
        id: i64,
        #[clap(long)]
        leader: Option<i64>,
    },
    /// Delete a section.
    Rm { id: i64 },
}

fn fmt_ref(v: Option<i64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_section(s: &Section) {
    let label = format!("#{}", s.id);
    println!(
        "{} {}  course={}  leader={}",
        "●".bright_cyan(),
        label.as_str().bright_white().bold(),
        fmt_ref(s.course_id),
        fmt_ref(s.leader_id)
    );
}

fn emit(format: &str, cmd: &str, sections: &[Section]) -> Result<(), error::RosterError> {
    if format == "json" {
        let env = time::command_envelope(cmd, "ok", serde_json::json!({ "sections": sections }));
        println!("{}", serde_json::to_string_pretty(&env)?);
    } else if sections.is_empty() {
        println!("{}", "No sections.".dimmed());
    } else {
        for s in sections {
            print_section(s);
        }
    }
    Ok(())
}

pub fn run_section_cli(store: &Store, cli: SectionCli) -> Result<(), error::RosterError> {
    let broker = DbBroker::new(store);
    let format = cli.format.as_str();
    match cli.command {
        SectionCommand::Add { course, leader } => {
            let s = broker.with_conn("roster", "section.add", |conn| {
                create_section(conn, course, leader)
            })?;
            emit(format, "section.add", &[s])
        }
        SectionCommand::Show { id } => {
            let s = broker.with_conn("roster", "section.show", |conn| get_section(conn, id))?;
            emit(format, "section.show", &[s])
        }
        SectionCommand::List { course, leader } => {
            let found = broker.with_conn("roster", "section.list", |conn| {
                match (course, leader) {
                    (Some(c), _) => sections_for_course(conn, c),
                    (None, Some(l)) => sections_for_leader(conn, l),
                    (None, None) => list_sections(conn),
                }
            })?;
            emit(format, "section.list", &found)
        }
        SectionCommand::Reassign { id, leader } => {
            let s = broker.with_conn("roster", "section.reassign", |conn| {
                reassign_leader(conn, id, leader)
            })?;
            emit(format, "section.reassign", &[s])
        }
        SectionCommand::Rm { id } => {
            broker.with_conn("roster", "section.rm", |conn| delete_section(conn, id))?;
            if format == "json" {
                let env = time::command_envelope(
                    "section.rm",
                    "ok",
                    serde_json::json!({ "deleted": id }),
                );
                println!("{}", serde_json::to_string_pretty(&env)?);
            } else {
                println!("{} Section #{} deleted", "✓".bright_green(), id);
            }
            Ok(())
        }
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "section",
        "version": "0.1.0",
        "description": "Section records keyed by course and leader",
        "commands": [
            { "name": "add", "parameters": ["course", "leader"] },
            { "name": "show", "parameters": ["id"] },
            { "name": "list", "parameters": ["course", "leader"] },
            { "name": "reassign", "parameters": ["id", "leader"] },
            { "name": "rm", "parameters": ["id"] }
        ],
        "storage": [schemas::SECTIONS_TABLE]
    })
}
