// ABOUTME: Checks that destination columns can hold the source data
// ABOUTME: Reports incompatible rows per table with ids or counts

use crate::error::{ReconcileError, Result, ResultExt};
use crate::schema::{build_schema, Column, Table};
use crate::store::{SqlValue, Store};

/// Options shared by validation, migration and row-count comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Source tables to skip, matched by exact name
    pub ignore_tables: Vec<String>,
}

impl MigrationConfig {
    pub fn new(ignore_tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ignore_tables: ignore_tables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn ignores(&self, table: &str) -> bool {
        self.ignore_tables.iter().any(|t| t == table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompatibleColumnMetadata {
    pub column_name: String,
    /// Longest value observed in the source column
    pub max_chars: i64,
}

/// Outcome of validating one source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub table_name: String,
    pub incompatible_row_count: i64,
    /// Primary key values of violating rows, `None` when the table has no key
    pub incompatible_row_ids: Option<Vec<String>>,
    pub incompatible_columns: Option<Vec<IncompatibleColumnMetadata>>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.incompatible_row_count == 0
    }
}

/// Destination columns of `dst` that cannot hold their source counterpart.
///
/// # Errors
///
/// Returns [`ReconcileError::ColumnNotFound`] if a destination column has no
/// column of the same name in `src`.
pub fn incompatible_columns<'a>(src: &Table, dst: &'a Table) -> Result<Vec<&'a Column>> {
    let mut columns = Vec::new();
    for dst_column in &dst.columns {
        let src_column =
            src.get_column(&dst_column.name)
                .ok_or_else(|| ReconcileError::ColumnNotFound {
                    table: src.name.clone(),
                    column: dst_column.name.clone(),
                })?;
        if dst_column.incompatible_with(src_column) {
            columns.push(dst_column);
        }
    }
    Ok(columns)
}

pub struct Validator<'a> {
    source: &'a dyn Store,
    destination: &'a dyn Store,
}

impl<'a> Validator<'a> {
    pub fn new(source: &'a dyn Store, destination: &'a dyn Store) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Validate every non-ignored source table against the destination.
    ///
    /// Both schemas are introspected fresh. Results are in ascending table
    /// name order.
    ///
    /// # Errors
    ///
    /// Fails on the first schema, lookup or query error; a source table
    /// missing from the destination is fatal for the whole pass.
    pub async fn validate(&self, config: &MigrationConfig) -> Result<Vec<ValidationResult>> {
        let src_schema = build_schema(self.source)
            .await
            .during("failed to build source schema")?;
        let dst_schema = build_schema(self.destination)
            .await
            .during("failed to build destination schema")?;

        let mut results = Vec::new();
        for src_table in src_schema.tables.values() {
            if config.ignores(&src_table.name) {
                tracing::debug!("Skipping ignored table {}", src_table.name);
                continue;
            }

            let dst_table = dst_schema
                .get_table(&src_table.name)
                .during("failed to get table from destination schema")?;

            let primary_key = self
                .source
                .primary_key(&src_table.name)
                .await
                .during("failed to get primary key from source table")?;

            let result = match primary_key {
                Some(key) => self
                    .incompatible_rows_by_key(src_table, dst_table, &key)
                    .await
                    .during("failed getting incompatible row ids")?,
                None => self
                    .incompatible_row_count(src_table, dst_table)
                    .await
                    .during("failed getting incompatible row count")?,
            };
            results.push(result);
        }

        Ok(results)
    }

    async fn incompatible_rows_by_key(
        &self,
        src: &Table,
        dst: &Table,
        primary_key: &str,
    ) -> Result<ValidationResult> {
        let dialect = self.source.dialect();
        let columns = incompatible_columns(src, dst)?;
        let key_expr = dialect.text_cast(&dialect.quote_ident(primary_key));
        let table = dialect.quote_ident(&src.name);

        let mut row_ids = Vec::new();
        let mut metadata = Vec::new();
        for column in columns {
            let sql = format!(
                "SELECT {} FROM {} WHERE {}",
                key_expr,
                table,
                self.exceeds_width(column)
            );
            tracing::debug!("{}", sql);

            let rows = self.source.query(&sql, &[]).await?;
            let found = rows.len();
            row_ids.extend(
                rows.iter()
                    .filter_map(|row| row.get(0).and_then(SqlValue::to_text)),
            );

            if found > 0 {
                metadata.push(self.max_chars(src, column).await?);
            }
        }

        Ok(ValidationResult {
            table_name: src.name.clone(),
            incompatible_row_count: row_ids.len() as i64,
            incompatible_row_ids: Some(row_ids),
            incompatible_columns: Some(metadata),
        })
    }

    async fn incompatible_row_count(&self, src: &Table, dst: &Table) -> Result<ValidationResult> {
        let dialect = self.source.dialect();
        let columns = incompatible_columns(src, dst)?;
        let table = dialect.quote_ident(&src.name);

        let mut count = 0;
        let mut metadata = Vec::new();
        for column in columns {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {}",
                table,
                self.exceeds_width(column)
            );
            tracing::debug!("{}", sql);

            let column_count = self.scalar(&sql).await?;
            if column_count > 0 {
                metadata.push(self.max_chars(src, column).await?);
            }
            count += column_count;
        }

        Ok(ValidationResult {
            table_name: src.name.clone(),
            incompatible_row_count: count,
            incompatible_row_ids: None,
            incompatible_columns: Some(metadata),
        })
    }

    /// Predicate matching source rows longer than the destination column
    fn exceeds_width(&self, dst_column: &Column) -> String {
        let dialect = self.source.dialect();
        format!(
            "{} > {}",
            dialect.text_length(&dialect.quote_ident(&dst_column.name)),
            dst_column.max_chars
        )
    }

    async fn max_chars(&self, src: &Table, column: &Column) -> Result<IncompatibleColumnMetadata> {
        let dialect = self.source.dialect();
        let sql = format!(
            "SELECT MAX({}) FROM {}",
            dialect.text_length(&dialect.quote_ident(&column.name)),
            dialect.quote_ident(&src.name)
        );
        let max_chars = self.scalar(&sql).await.during("failed getting max chars")?;
        Ok(IncompatibleColumnMetadata {
            column_name: column.name.clone(),
            max_chars,
        })
    }

    /// First column of the first row as an integer, 0 for NULL
    async fn scalar(&self, sql: &str) -> Result<i64> {
        let rows = self.source.query(sql, &[]).await?;
        let value = rows.first().and_then(|row| row.get(0));
        match value {
            None | Some(SqlValue::Null) => Ok(0),
            Some(v) => v.as_i64().ok_or_else(|| {
                ReconcileError::decode(self.source.name(), "scalar", format!("not an integer: {}", v))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, columns: &[(&str, i64)]) -> Table {
        Table {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, w)| Column {
                    name: n.to_string(),
                    data_type: "varchar".to_string(),
                    max_chars: *w,
                })
                .collect(),
        }
    }

    #[test]
    fn test_ignores_exact_names_only() {
        let config = MigrationConfig::new(["audit"]);
        assert!(config.ignores("audit"));
        assert!(!config.ignores("audit_log"));
        assert!(!MigrationConfig::default().ignores("audit"));
    }

    #[test]
    fn test_incompatible_columns() {
        let src = table("users", &[("id", 0), ("name", 100), ("bio", 0)]);
        let dst = table("users", &[("id", 0), ("name", 50), ("bio", 255)]);

        let names: Vec<&str> = incompatible_columns(&src, &dst)
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "bio"]);
    }

    #[test]
    fn test_incompatible_columns_missing_source_column() {
        let src = table("users", &[("id", 0)]);
        let dst = table("users", &[("id", 0), ("email", 255)]);

        let err = incompatible_columns(&src, &dst).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to find column 'users/email' in source schema"
        );
    }
}
