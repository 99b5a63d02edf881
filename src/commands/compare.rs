// ABOUTME: Compare command - row counts per table on both stores
// ABOUTME: Summarizes which tables still have rows missing in MySQL

use anyhow::{Context, Result};

use crate::compare::{compare_row_counts, RowCountComparison};
use crate::config::Config;
use crate::utils::sanitize_identifier;
use crate::validator::MigrationConfig;

use super::{close_store, open_stores};

/// Print source and destination row counts for every non-ignored table.
///
/// # Errors
///
/// This function will return an error if:
/// - Either database cannot be opened
/// - A source table is missing from the destination
/// - Any table's row counts differ
pub async fn compare(config: &Config) -> Result<()> {
    tracing::info!("Comparing row counts...");

    let (mut source, mut destination) = open_stores(config).await?;
    let migration_config = MigrationConfig::new(config.ignored_tables().iter().cloned());

    let outcome = compare_row_counts(&source, &destination, &migration_config).await;

    close_store(&mut destination).await;
    close_store(&mut source).await;

    let comparisons = outcome.context("failed to compare row counts")?;
    for comparison in &comparisons {
        println!("{}", format_comparison(comparison));
    }

    let mismatches = comparisons.iter().filter(|c| !c.matches()).count();
    if mismatches > 0 {
        anyhow::bail!("{} table(s) have differing row counts", mismatches);
    }

    tracing::info!("✓ All {} table(s) have matching row counts", comparisons.len());
    Ok(())
}

pub fn format_comparison(comparison: &RowCountComparison) -> String {
    let table = sanitize_identifier(&comparison.table);
    if comparison.matches() {
        format!("✓ {}: {} rows", table, comparison.source_rows)
    } else {
        format!(
            "✗ {}: source={} destination={} ({} missing)",
            table,
            comparison.source_rows,
            comparison.destination_rows,
            comparison.missing()
        )
    }
}
