//! `roster migrate` command family.

use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::migration::{self, Migrator, StatusReport};
use crate::core::store::Store;
use crate::core::time;
use clap::Subcommand;
use colored::Colorize;

#[derive(clap::Args, Debug)]
pub struct MigrateCli {
    #[clap(subcommand)]
    pub command: MigrateCommand,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand, Debug)]
pub enum MigrateCommand {
    /// Apply pending migrations.
    Up {
        /// Stop after this version (inclusive).
        #[clap(long)]
        to: Option<String>,
    },
    /// Apply exactly one migration; fails if it is already applied.
    Apply { version: String },
    /// Revert the most recently applied migrations.
    Down {
        #[clap(long, default_value_t = 1)]
        steps: usize,
    },
    /// Revert exactly one applied migration.
    Revert { version: String },
    /// Revert and re-apply the latest migration.
    Redo,
    /// Show applied and pending migrations.
    Status,
    /// Fail if any applied migration no longer matches its embedded SQL.
    Verify,
    /// List migrations embedded in this binary.
    List,
    /// Show the broker event log.
    Log,
}

fn print_versions(verb: &str, versions: &[String]) {
    if versions.is_empty() {
        println!("{} Nothing to {}", "ℹ".bright_blue(), verb);
        return;
    }
    for v in versions {
        println!("  {} {} {}", "●".bright_cyan(), verb, v.as_str().bright_white());
    }
    println!(
        "{} {} migration(s) {}",
        "✓".bright_green(),
        versions.len(),
        if verb == "apply" { "applied" } else { "reverted" }
    );
}

fn print_status(report: &StatusReport) {
    for m in &report.migrations {
        let state = match (&m.applied_at, m.drifted) {
            (Some(_), true) => "drifted".bright_red().bold(),
            (Some(_), false) => "applied".bright_green(),
            (None, _) => "pending".bright_yellow(),
        };
        println!(
            "  {:<9} {} {}",
            state,
            m.version.as_str().bright_white(),
            m.name
        );
    }
    for o in &report.orphaned {
        println!(
            "  {:<9} {} {}",
            "orphaned".bright_magenta(),
            o.version.as_str().bright_white(),
            o.name
        );
    }
    println!(
        "{} applied, {} pending",
        report.applied_count(),
        report.pending_count()
    );
}

fn emit_json(cmd: &str, payload: serde_json::Value) -> Result<(), error::RosterError> {
    let env = time::command_envelope(cmd, "ok", payload);
    println!("{}", serde_json::to_string_pretty(&env)?);
    Ok(())
}

fn drift_json(err: &error::RosterError) -> Option<serde_json::Value> {
    match err {
        error::RosterError::ChecksumMismatch {
            version,
            recorded,
            expected,
        } => Some(serde_json::json!({
            "version": version,
            "recorded": recorded,
            "expected": expected,
        })),
        _ => None,
    }
}

pub fn run_migrate_cli(store: &Store, cli: MigrateCli) -> Result<(), error::RosterError> {
    let broker = DbBroker::new(store);
    let json = cli.format == "json";

    match cli.command {
        MigrateCommand::Up { to } => {
            let applied = broker.with_conn("roster", "migrate.up", |conn| {
                let migrator = Migrator::new(conn)?;
                match to.as_deref() {
                    Some(target) => migrator.migrate_to(target),
                    None => migrator.migrate(),
                }
            })?;
            if json {
                emit_json("migrate.up", serde_json::json!({ "applied": applied }))
            } else {
                print_versions("apply", &applied);
                Ok(())
            }
        }
        MigrateCommand::Apply { version } => {
            broker.with_conn("roster", "migrate.apply", |conn| {
                Migrator::new(conn)?.apply(&version)
            })?;
            let applied = vec![version];
            if json {
                emit_json("migrate.apply", serde_json::json!({ "applied": applied }))
            } else {
                print_versions("apply", &applied);
                Ok(())
            }
        }
        MigrateCommand::Down { steps } => {
            let reverted = broker.with_conn("roster", "migrate.down", |conn| {
                Migrator::new(conn)?.rollback(steps)
            })?;
            if json {
                emit_json("migrate.down", serde_json::json!({ "reverted": reverted }))
            } else {
                print_versions("revert", &reverted);
                Ok(())
            }
        }
        MigrateCommand::Revert { version } => {
            broker.with_conn("roster", "migrate.revert", |conn| {
                Migrator::new(conn)?.revert(&version)
            })?;
            let reverted = vec![version];
            if json {
                emit_json("migrate.revert", serde_json::json!({ "reverted": reverted }))
            } else {
                print_versions("revert", &reverted);
                Ok(())
            }
        }
        MigrateCommand::Redo => {
            let redone = broker.with_conn("roster", "migrate.redo", |conn| {
                Migrator::new(conn)?.redo()
            })?;
            if json {
                emit_json("migrate.redo", serde_json::json!({ "redone": redone }))
            } else {
                match redone {
                    Some(v) => println!("{} Redid {}", "✓".bright_green(), v),
                    None => println!("{} Nothing to redo", "ℹ".bright_blue()),
                }
                Ok(())
            }
        }
        MigrateCommand::Status => {
            let report = broker.with_conn("roster", "migrate.status", |conn| {
                Migrator::new(conn)?.status()
            })?;
            if json {
                emit_json(
                    "migrate.status",
                    serde_json::json!({
                        "applied": report.applied_count(),
                        "pending": report.pending_count(),
                        "migrations": report.migrations,
                        "orphaned": report.orphaned,
                    }),
                )
            } else {
                print_status(&report);
                Ok(())
            }
        }
        MigrateCommand::Verify => {
            let drift = broker.with_conn("roster", "migrate.verify", |conn| {
                Migrator::new(conn)?.drift()
            })?;
            if json {
                let rows: Vec<_> = drift.iter().filter_map(drift_json).collect();
                let status = if rows.is_empty() { "ok" } else { "drift" };
                let env = time::command_envelope(
                    "migrate.verify",
                    status,
                    serde_json::json!({ "drift": rows }),
                );
                println!("{}", serde_json::to_string_pretty(&env)?);
            } else if drift.is_empty() {
                println!("{} Applied migrations match embedded SQL", "✓".bright_green());
            } else {
                for d in &drift {
                    println!("  {} {}", "✗".bright_red(), d);
                }
            }
            match drift.into_iter().next() {
                Some(first) => Err(first),
                None => Ok(()),
            }
        }
        MigrateCommand::List => {
            let all = migration::all_migrations();
            if json {
                let rows: Vec<_> = all
                    .iter()
                    .map(|m| {
                        serde_json::json!({
                            "version": m.version,
                            "name": m.name,
                            "checksum": m.checksum(),
                        })
                    })
                    .collect();
                emit_json("migrate.list", serde_json::json!({ "migrations": rows }))
            } else {
                for m in &all {
                    println!("  {} {}", m.version.bright_white(), m.name);
                }
                Ok(())
            }
        }
        MigrateCommand::Log => {
            let events = broker.read_events()?;
            if json {
                emit_json("migrate.log", serde_json::json!({ "events": events }))
            } else {
                for ev in &events {
                    let status = if ev.status == "success" {
                        ev.status.as_str().bright_green()
                    } else {
                        ev.status.as_str().bright_red()
                    };
                    println!("{} {:<18} {} {}", ev.ts, ev.op, status, ev.actor);
                }
                Ok(())
            }
        }
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "migrate",
        "version": "0.1.0",
        "description": "Versioned schema migrations with explicit rollback",
        "commands": [
            { "name": "up", "parameters": ["to"] },
            { "name": "apply", "parameters": ["version"] },
            { "name": "down", "parameters": ["steps"] },
            { "name": "revert", "parameters": ["version"] },
            { "name": "redo" },
            { "name": "status" },
            { "name": "verify" },
            { "name": "list" },
            { "name": "log" }
        ],
        "storage": ["schema_migrations", "migrations.events.jsonl"]
    })
}
