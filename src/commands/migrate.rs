// ABOUTME: Migrate command - copies missing rows from PostgreSQL into MySQL
// ABOUTME: Renders migrator progress with a terminal spinner and log lines

use std::time::Duration;

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;
use crate::error::ReconcileError;
use crate::migrator::{MigrationWatcher, Migrator, TableMigrationSummary};
use crate::store::Store;
use crate::utils::sanitize_identifier;
use crate::validator::MigrationConfig;

use super::{close_store, open_stores};

/// Migrator progress shown on the terminal.
///
/// A spinner tracks the current step; finished steps are logged through
/// `tracing` with the spinner suspended so lines do not interleave.
pub struct TerminalWatcher {
    spinner: ProgressBar,
}

impl TerminalWatcher {
    pub fn new() -> Self {
        Self::with_spinner(ProgressBar::new_spinner())
    }

    /// Watcher that draws nothing, only logs
    pub fn hidden() -> Self {
        Self::with_spinner(ProgressBar::hidden())
    }

    fn with_spinner(spinner: ProgressBar) -> Self {
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        Self { spinner }
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    fn log(&self, f: impl FnOnce()) {
        self.spinner.suspend(f);
    }
}

impl Default for TerminalWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationWatcher for TerminalWatcher {
    fn will_disable_constraints(&self) {
        self.spinner.set_message("Disabling constraints...");
    }

    fn did_disable_constraints(&self) {
        self.log(|| tracing::info!("✓ Constraints disabled"));
    }

    fn will_truncate_table(&self, table: &str) {
        self.spinner
            .set_message(format!("Truncating {}...", sanitize_identifier(table)));
    }

    fn truncate_table_did_finish(&self, table: &str) {
        self.log(|| tracing::info!("✓ Truncated {}", sanitize_identifier(table)));
    }

    fn table_migration_did_start(&self, table: &str) {
        self.spinner
            .set_message(format!("Migrating {}...", sanitize_identifier(table)));
    }

    fn table_migration_did_finish(&self, table: &str, rows_inserted: u64) {
        self.log(|| {
            tracing::info!(
                "✓ {}: {} row(s) inserted",
                sanitize_identifier(table),
                rows_inserted
            )
        });
    }

    fn will_enable_constraints(&self) {
        self.spinner.set_message("Enabling constraints...");
    }

    fn enable_constraints_did_fail_with_error(&self, err: &ReconcileError) {
        self.log(|| tracing::error!("✗ Failed to enable constraints: {}", err));
    }

    fn enable_constraints_did_finish(&self) {
        self.log(|| tracing::info!("✓ Constraints enabled"));
    }
}

/// Copy rows missing from the destination.
///
/// # Arguments
///
/// * `config` - Loaded configuration for both stores
/// * `truncate` - Empty each destination table before copying
/// * `skip_confirmation` - Do not ask before truncating
///
/// # Errors
///
/// This function will return an error if:
/// - Either database cannot be opened
/// - The user declines the truncate confirmation
/// - The migration aborts (schema, constraint, truncate or query failure)
/// - Constraints cannot be re-enabled after an otherwise successful run
pub async fn migrate(config: &Config, truncate: bool, skip_confirmation: bool) -> Result<()> {
    if truncate && !skip_confirmation && !confirm_truncate(&config.mysql.database)? {
        bail!("Migration cancelled by user");
    }

    tracing::info!("Starting migration...");
    let (mut source, mut destination) = open_stores(config).await?;
    let migration_config = MigrationConfig::new(config.ignored_tables().iter().cloned());

    let watcher = TerminalWatcher::new();
    let outcome = run(&source, &destination, truncate, &migration_config, &watcher).await;
    watcher.finish();

    close_store(&mut destination).await;
    close_store(&mut source).await;

    let summaries = outcome?;
    report(&summaries);
    Ok(())
}

pub async fn run(
    source: &dyn Store,
    destination: &dyn Store,
    truncate: bool,
    config: &MigrationConfig,
    watcher: &dyn MigrationWatcher,
) -> Result<Vec<TableMigrationSummary>> {
    Migrator::new(source, destination, truncate, watcher)
        .migrate(config)
        .await
        .context("failed migrating")
}

fn report(summaries: &[TableMigrationSummary]) {
    let inserted: u64 = summaries.iter().map(|s| s.inserted).sum();
    let failed: u64 = summaries.iter().map(|s| s.failed).sum();

    tracing::info!("");
    tracing::info!("========================================");
    tracing::info!("Migration Summary");
    tracing::info!("========================================");
    tracing::info!("Tables migrated: {}", summaries.len());
    tracing::info!("✓ Rows inserted: {}", inserted);
    if failed > 0 {
        tracing::warn!("✗ Rows failed: {}", failed);
        for summary in summaries.iter().filter(|s| s.failed > 0) {
            tracing::warn!(
                "  {}: {} row(s) failed",
                sanitize_identifier(&summary.table),
                summary.failed
            );
        }
    }
    tracing::info!("========================================");
}

fn confirm_truncate(database: &str) -> Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Truncate every migrated table in MySQL database '{}' first?",
            database
        ))
        .default(false)
        .interact()
        .context("Failed to get confirmation")
}
