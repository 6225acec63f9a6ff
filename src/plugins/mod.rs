//! Record-level subsystems built on top of the migrated schema.

pub mod sections;
