//! Core modules: storage, migrations and the shared primitives the CLI builds on.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod introspect;
pub mod logging;
pub mod migrate_cli;
pub mod migration;
pub mod schemas;
pub mod store;
pub mod time;
