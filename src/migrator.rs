// ABOUTME: Copies rows missing from the destination, table by table
// ABOUTME: Uses a primary-key diff or a null-safe existence check per row

use crate::error::{ReconcileError, Result, ResultExt};
use crate::schema::{build_schema, Schema, Table};
use crate::store::{Row, SqlValue, Store};
use crate::validator::MigrationConfig;

/// Progress callbacks, invoked in order as a migration runs.
pub trait MigrationWatcher: Send + Sync {
    fn will_disable_constraints(&self);
    fn did_disable_constraints(&self);

    fn will_truncate_table(&self, table: &str);
    fn truncate_table_did_finish(&self, table: &str);

    fn table_migration_did_start(&self, table: &str);
    fn table_migration_did_finish(&self, table: &str, rows_inserted: u64);

    fn will_enable_constraints(&self);
    fn enable_constraints_did_fail_with_error(&self, err: &ReconcileError);
    fn enable_constraints_did_finish(&self);
}

/// Rows written to one destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMigrationSummary {
    pub table: String,
    pub inserted: u64,
    /// Rows whose insert errored or affected nothing
    pub failed: u64,
}

pub struct Migrator<'a> {
    source: &'a dyn Store,
    destination: &'a dyn Store,
    truncate_first: bool,
    watcher: &'a dyn MigrationWatcher,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: &'a dyn Store,
        destination: &'a dyn Store,
        truncate_first: bool,
        watcher: &'a dyn MigrationWatcher,
    ) -> Self {
        Self {
            source,
            destination,
            truncate_first,
            watcher,
        }
    }

    /// Copy every source row that is missing from the destination.
    ///
    /// Referential integrity on the destination is suspended for the run
    /// and restored on every exit path once it was suspended. Stores that
    /// cannot toggle it are migrated with it left as is.
    ///
    /// # Returns
    ///
    /// One summary per migrated table, in ascending table name order.
    ///
    /// # Errors
    ///
    /// Schema, constraint, truncate, prepare and query failures abort the
    /// run. Individual insert failures are logged and counted instead.
    /// If the run succeeds but constraints cannot be re-enabled, returns
    /// [`ReconcileError::EnableConstraints`].
    pub async fn migrate(&self, config: &MigrationConfig) -> Result<Vec<TableMigrationSummary>> {
        let schema = build_schema(self.source)
            .await
            .during("failed to build source schema")?;

        let toggled = self.disable_constraints().await?;

        let outcome = self.migrate_tables(&schema, config).await;

        if !toggled {
            return outcome;
        }

        match (outcome, self.enable_constraints().await) {
            (Ok(summaries), Ok(())) => Ok(summaries),
            (Ok(_), Err(err)) => Err(ReconcileError::EnableConstraints(Box::new(err))),
            (Err(err), _) => Err(err),
        }
    }

    /// Returns whether constraints were disabled and need re-enabling
    async fn disable_constraints(&self) -> Result<bool> {
        self.watcher.will_disable_constraints();
        match self.destination.disable_constraints().await {
            Ok(()) => {
                self.watcher.did_disable_constraints();
                Ok(true)
            }
            Err(err) if err.is_unsupported() => {
                tracing::warn!(
                    "⚠ {}; continuing with referential integrity enforced",
                    err
                );
                Ok(false)
            }
            Err(err) => Err(err.during("failed to disable constraints")),
        }
    }

    async fn enable_constraints(&self) -> Result<()> {
        self.watcher.will_enable_constraints();
        match self.destination.enable_constraints().await {
            Ok(()) => {
                self.watcher.enable_constraints_did_finish();
                Ok(())
            }
            Err(err) => {
                tracing::error!("Failed to re-enable constraints: {}", err);
                self.watcher.enable_constraints_did_fail_with_error(&err);
                Err(err)
            }
        }
    }

    async fn migrate_tables(
        &self,
        schema: &Schema,
        config: &MigrationConfig,
    ) -> Result<Vec<TableMigrationSummary>> {
        let mut summaries = Vec::new();
        for table in schema.tables.values() {
            if config.ignores(&table.name) {
                tracing::debug!("Skipping ignored table {}", table.name);
                continue;
            }
            summaries.push(self.migrate_table(table).await?);
        }
        Ok(summaries)
    }

    async fn migrate_table(&self, table: &Table) -> Result<TableMigrationSummary> {
        let dst = self.destination.dialect();

        if self.truncate_first {
            self.watcher.will_truncate_table(&table.name);
            let sql = dst.truncate_table(&dst.quote_ident(&table.name));
            self.destination
                .execute(&sql, &[])
                .await
                .during("failed truncating")?;
            self.watcher.truncate_table_did_finish(&table.name);
        }

        let insert = self.insert_statement(table);
        tracing::debug!("{}", insert);
        self.destination
            .prepare(&insert)
            .await
            .during("failed creating prepared statement")?;

        self.watcher.table_migration_did_start(&table.name);

        let primary_key = self
            .source
            .primary_key(&table.name)
            .await
            .during("failed to get primary key from source table")?;

        let mut summary = TableMigrationSummary {
            table: table.name.clone(),
            ..Default::default()
        };

        match primary_key {
            Some(key) => {
                let rows = self
                    .missing_rows_by_key(table, &key)
                    .await
                    .during("failed migrating table with ids")?;
                for row in rows {
                    self.insert_row(table, &insert, row.values(), &mut summary)
                        .await;
                }
            }
            None => {
                self.migrate_by_existence(table, &insert, &mut summary)
                    .await
                    .during("failed migrating table without ids")?;
            }
        }

        if summary.failed > 0 {
            tracing::warn!(
                "⚠ {} row(s) could not be inserted into {}",
                summary.failed,
                table.name
            );
        }
        self.watcher
            .table_migration_did_finish(&table.name, summary.inserted);

        Ok(summary)
    }

    fn insert_statement(&self, table: &Table) -> String {
        let dst = self.destination.dialect();
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| dst.quote_ident(&c.name))
            .collect();
        let placeholders: Vec<String> = (1..=table.columns.len())
            .map(|i| dst.param_placeholder(i))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dst.quote_ident(&table.name),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn select_list(&self, table: &Table) -> String {
        let src = self.source.dialect();
        table
            .columns
            .iter()
            .map(|c| src.column_for_select(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Source rows whose key is not present in the destination
    async fn missing_rows_by_key(&self, table: &Table, primary_key: &str) -> Result<Vec<Row>> {
        let dst = self.destination.dialect();
        let key_sql = format!(
            "SELECT {} FROM {}",
            dst.text_cast(&dst.quote_ident(primary_key)),
            dst.quote_ident(&table.name)
        );
        let existing: Vec<String> = self
            .destination
            .query(&key_sql, &[])
            .await
            .during("failed to select primary key from rows")?
            .iter()
            .filter_map(|row| row.get(0).and_then(SqlValue::to_text))
            .collect();
        tracing::debug!("{}: {} key(s) already in destination", table.name, existing.len());

        let src = self.source.dialect();
        let (predicate, params) =
            src.key_exclusion(&src.text_cast(&src.quote_ident(primary_key)), &existing, 1);
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.select_list(table),
            src.quote_ident(&table.name),
            predicate
        );

        self.source
            .query(&sql, &params)
            .await
            .during("failed to select rows")
    }

    async fn migrate_by_existence(
        &self,
        table: &Table,
        insert: &str,
        summary: &mut TableMigrationSummary,
    ) -> Result<()> {
        let src = self.source.dialect();
        let select = format!(
            "SELECT {} FROM {}",
            self.select_list(table),
            src.quote_ident(&table.name)
        );
        let rows = self
            .source
            .query(&select, &[])
            .await
            .during("failed to select rows")?;

        let dst = self.destination.dialect();
        let conditions: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| dst.null_safe_eq(&dst.quote_ident(&c.name), &dst.param_placeholder(i + 1)))
            .collect();
        let exists = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {})",
            dst.quote_ident(&table.name),
            conditions.join(" AND ")
        );
        tracing::debug!("{}", exists);
        self.destination
            .prepare(&exists)
            .await
            .during("failed to prepare statement")?;

        for row in rows {
            let values: Vec<SqlValue> = row
                .into_values()
                .into_iter()
                .map(SqlValue::truncate_subsecond)
                .collect();

            let found = self
                .destination
                .query(&exists, &values)
                .await
                .during("failed to check if row exists")?;
            let present = found
                .first()
                .and_then(|r| r.get(0))
                .and_then(SqlValue::as_bool)
                .ok_or_else(|| {
                    ReconcileError::decode(
                        self.destination.name(),
                        "EXISTS",
                        format!("expected a boolean, got {:?}", found.first()),
                    )
                })
                .during("failed to check if row exists")?;

            if !present {
                self.insert_row(table, insert, &values, summary).await;
            }
        }

        Ok(())
    }

    async fn insert_row(
        &self,
        table: &Table,
        insert: &str,
        values: &[SqlValue],
        summary: &mut TableMigrationSummary,
    ) {
        match self.destination.execute(insert, values).await {
            Ok(0) => {
                tracing::warn!("failed to insert into {}: no rows affected by insert", table.name);
                summary.failed += 1;
            }
            Ok(_) => summary.inserted += 1,
            Err(err) => {
                tracing::warn!("failed to insert into {}: {}", table.name, err);
                summary.failed += 1;
            }
        }
    }
}
