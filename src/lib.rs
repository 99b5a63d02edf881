// ABOUTME: Library module for pg2mysql
// ABOUTME: Exports stores, schema model, validator, migrator and commands

pub mod commands;
pub mod compare;
pub mod config;
pub mod error;
pub mod migrator;
pub mod schema;
pub mod store;
pub mod utils;
pub mod validator;

pub use error::{ReconcileError, Result};
pub use migrator::{MigrationWatcher, Migrator, TableMigrationSummary};
pub use validator::{MigrationConfig, ValidationResult, Validator};
