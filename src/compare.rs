// ABOUTME: Per-table row-count comparison between source and destination
// ABOUTME: Quick post-migration sanity check without reading row contents

use crate::error::{ReconcileError, Result, ResultExt};
use crate::schema::build_schema;
use crate::store::Store;
use crate::validator::MigrationConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCountComparison {
    pub table: String,
    pub source_rows: i64,
    pub destination_rows: i64,
}

impl RowCountComparison {
    pub fn matches(&self) -> bool {
        self.source_rows == self.destination_rows
    }

    /// Source rows the destination is short by (negative when it holds more)
    pub fn missing(&self) -> i64 {
        self.source_rows - self.destination_rows
    }
}

/// Count rows of every non-ignored source table on both stores.
///
/// # Errors
///
/// Returns [`ReconcileError::TableNotFound`] (wrapped with its phase) when a
/// source table does not exist in the destination, or the first query error.
pub async fn compare_row_counts(
    source: &dyn Store,
    destination: &dyn Store,
    config: &MigrationConfig,
) -> Result<Vec<RowCountComparison>> {
    let src_schema = build_schema(source)
        .await
        .during("failed to build source schema")?;
    let dst_schema = build_schema(destination)
        .await
        .during("failed to build destination schema")?;

    let mut comparisons = Vec::new();
    for table in src_schema.tables.values() {
        if config.ignores(&table.name) {
            continue;
        }
        dst_schema
            .get_table(&table.name)
            .during("failed to get table from destination schema")?;

        let source_rows = count_rows(source, &table.name).await?;
        let destination_rows = count_rows(destination, &table.name).await?;
        tracing::debug!(
            "{}: source={} destination={}",
            table.name,
            source_rows,
            destination_rows
        );

        comparisons.push(RowCountComparison {
            table: table.name.clone(),
            source_rows,
            destination_rows,
        });
    }

    Ok(comparisons)
}

async fn count_rows(store: &dyn Store, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", store.dialect().quote_ident(table));
    let rows = store
        .query(&sql, &[])
        .await
        .during(format!("failed to count rows in {} on {}", table, store.name()))?;
    rows.first()
        .and_then(|row| row.get(0))
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ReconcileError::decode(store.name(), "COUNT(*)", "missing row count"))
}
