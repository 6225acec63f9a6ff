//! Roster: versioned SQLite schema migrations and section records.
//!
//! A roster database holds `sections`, each belonging to a course and led by a
//! leader. The schema is defined by embedded, versioned migrations with explicit
//! rollbacks; applied versions are tracked in `schema_migrations`.
//!
//! # Layout
//!
//! - [`core`]: store, database connection, migration runner, introspection, broker
//! - [`plugins`]: record-level subsystems (currently `sections`)
//!
//! # Examples
//!
//! ```bash
//! roster migrate up
//! roster migrate status --format json
//! roster section add --course 106 --leader 7
//! roster section list --course 106
//! roster schema show --table sections
//! roster migrate down
//! ```

pub mod core;
pub mod plugins;

use crate::core::{
    config::RosterConfig, error, introspect, logging, migrate_cli, migration, schemas,
    store::Store,
};
use crate::plugins::sections;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "roster",
    version = env!("CARGO_PKG_VERSION"),
    about = "Versioned schema migrations and section records for a course roster"
)]
struct Cli {
    /// Data directory (overrides config and ROSTER_DATA_DIR).
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Config file (defaults to ./roster.toml when present).
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, e.g. 'info' or 'roster=debug'.
    #[clap(long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct SchemaCli {
    #[clap(subcommand)]
    command: SchemaCommand,
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Show tables, columns and indexes.
    Show {
        /// Limit output to one table.
        #[clap(long)]
        table: Option<String>,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Describe the CLI subsystems as JSON.
    Subsystems,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply, revert and inspect schema migrations
    #[clap(name = "migrate", visible_alias = "m")]
    Migrate(migrate_cli::MigrateCli),

    /// Manage section records
    #[clap(name = "section", visible_alias = "s")]
    Section(sections::SectionCli),

    /// Inspect the live database schema
    #[clap(name = "schema")]
    Schema(SchemaCli),

    /// Show version information
    #[clap(name = "version")]
    Version,
}

fn run_schema_cli(store: &Store, cli: SchemaCli) -> Result<(), error::RosterError> {
    match cli.command {
        SchemaCommand::Show { table, format } => {
            let conn = crate::core::db::open_store(store)?;
            let tables = match table {
                Some(t) => {
                    if !introspect::table_exists(&conn, &t)? {
                        return Err(error::RosterError::NotFound(format!("table {}", t)));
                    }
                    vec![t]
                }
                None => introspect::tables(&conn)?,
            };

            let mut described = Vec::new();
            for t in &tables {
                described.push(serde_json::json!({
                    "table": t,
                    "columns": introspect::columns(&conn, t)?,
                    "indexes": introspect::indexes(&conn, t)?,
                }));
            }

            if format == "json" {
                let env = crate::core::time::command_envelope(
                    "schema.show",
                    "ok",
                    serde_json::json!({ "tables": described }),
                );
                println!("{}", serde_json::to_string_pretty(&env)?);
                return Ok(());
            }

            if tables.is_empty() {
                println!(
                    "{} No tables. Run: {}",
                    "ℹ".bright_blue(),
                    "roster migrate up".bright_cyan()
                );
                return Ok(());
            }
            for t in &tables {
                println!("{}", t.as_str().bright_white().bold());
                for c in introspect::columns(&conn, t)? {
                    let mut flags = Vec::new();
                    if c.primary_key {
                        flags.push("pk");
                    }
                    if c.not_null {
                        flags.push("not null");
                    }
                    println!("  {:<12} {:<8} {}", c.name, c.decl_type, flags.join(", "));
                }
                for idx in introspect::indexes(&conn, t)? {
                    println!(
                        "  {} {} ({}){}",
                        "idx".dimmed(),
                        idx.name,
                        idx.columns.join(", "),
                        if idx.unique { " unique" } else { "" }
                    );
                }
            }
            Ok(())
        }
        SchemaCommand::Subsystems => {
            let mut subsystems = std::collections::BTreeMap::new();
            subsystems.insert("migrate", migrate_cli::schema());
            subsystems.insert("section", sections::schema());
            let env = serde_json::json!({
                "schema_version": "1.0.0",
                "tables": [schemas::SECTIONS_TABLE, schemas::SCHEMA_MIGRATIONS_TABLE],
                "subsystems": subsystems,
            });
            println!("{}", serde_json::to_string_pretty(&env)?);
            Ok(())
        }
    }
}

pub fn run() -> Result<(), error::RosterError> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        // Plain output for scripts.
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let current_dir = std::env::current_dir()?;
    let mut config = RosterConfig::load(cli.config.as_deref(), &current_dir)?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = if dir.is_relative() {
            current_dir.join(dir)
        } else {
            dir
        };
    }
    logging::init_logging(&config.log, cli.log_level.as_deref())?;

    let store = Store::from_config(&config);
    tracing::debug!(
        db = %store.db_path.display(),
        migrations = migration::all_migrations().len(),
        "store resolved"
    );

    match cli.command {
        Command::Migrate(migrate) => migrate_cli::run_migrate_cli(&store, migrate),
        Command::Section(section) => sections::run_section_cli(&store, section),
        Command::Schema(schema) => run_schema_cli(&store, schema),
        Command::Version => Ok(()),
    }
}
