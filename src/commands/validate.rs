// ABOUTME: Validate command - reports rows the destination columns cannot hold
// ABOUTME: Prints one line per source table, OK or the violations found

use anyhow::{Context, Result};

use crate::config::Config;
use crate::store::Store;
use crate::utils::sanitize_identifier;
use crate::validator::{IncompatibleColumnMetadata, MigrationConfig, ValidationResult, Validator};

use super::{close_store, open_stores};

/// Row ids shown per table before the list is cut short
const MAX_DISPLAYED_IDS: usize = 10;

/// Check every source table against the destination and print the outcome.
///
/// Output is one line per non-ignored table, in table name order:
///
/// ```text
/// users OK
/// found 2 incompatible rows in posts with column names [{ColumnName: title, MaxChars: 312}] with IDs [4, 9]
/// found 5 incompatible rows in events (which has no primary key)
/// ```
///
/// # Errors
///
/// This function will return an error if:
/// - Either database cannot be opened
/// - Schema introspection fails on either side
/// - A source table is missing from the destination
pub async fn validate(config: &Config) -> Result<()> {
    tracing::info!("Starting validation...");

    let (mut source, mut destination) = open_stores(config).await?;
    let migration_config = MigrationConfig::new(config.ignored_tables().iter().cloned());

    let outcome = run(&source, &destination, &migration_config).await;

    close_store(&mut destination).await;
    close_store(&mut source).await;

    for line in outcome? {
        println!("{}", line);
    }

    Ok(())
}

/// Validate and render the report lines
pub async fn run(
    source: &dyn Store,
    destination: &dyn Store,
    config: &MigrationConfig,
) -> Result<Vec<String>> {
    let mut results = Validator::new(source, destination)
        .validate(config)
        .await
        .context("failed to validate")?;
    results.sort_by(|a, b| a.table_name.cmp(&b.table_name));

    let failing = results.iter().filter(|r| !r.is_ok()).count();
    if failing > 0 {
        tracing::warn!("⚠ {} table(s) have incompatible rows", failing);
    } else {
        tracing::info!("✓ All {} table(s) compatible", results.len());
    }

    Ok(results.iter().map(format_result).collect())
}

pub fn format_result(result: &ValidationResult) -> String {
    let table = sanitize_identifier(&result.table_name);
    match result.incompatible_row_ids.as_deref() {
        Some(ids) if !ids.is_empty() => format!(
            "found {} incompatible rows in {} with column names {} with IDs {}",
            result.incompatible_row_count,
            table,
            format_columns(result.incompatible_columns.as_deref().unwrap_or_default()),
            format_ids(ids, MAX_DISPLAYED_IDS)
        ),
        _ if result.incompatible_row_count > 0 => format!(
            "found {} incompatible rows in {} (which has no primary key)",
            result.incompatible_row_count, table
        ),
        _ => format!("{} OK", table),
    }
}

fn format_columns(columns: &[IncompatibleColumnMetadata]) -> String {
    let rendered: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "{{ColumnName: {}, MaxChars: {}}}",
                sanitize_identifier(&c.column_name),
                c.max_chars
            )
        })
        .collect();
    format!("[{}]", rendered.join(", "))
}

/// `[a, b, c]`, or the first `max` ids followed by how many were left out
fn format_ids(ids: &[String], max: usize) -> String {
    if ids.len() > max {
        format!("[{}, ...] and {} more", ids[..max].join(", "), ids.len() - max)
    } else {
        format!("[{}]", ids.join(", "))
    }
}
