// ABOUTME: Shared fixtures for the reconciliation integration tests
// ABOUTME: In-memory SQLite store pairs, a recording watcher and a scripted store

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use pg2mysql::error::{ReconcileError, Result};
use pg2mysql::migrator::MigrationWatcher;
use pg2mysql::store::{Dialect, Row, SchemaRow, SqlValue, SqliteStore, Store};

/// Open an in-memory store and run `statements` against it
pub async fn sqlite_store(statements: &[&str]) -> SqliteStore {
    let mut store = SqliteStore::in_memory();
    store.open().await.expect("open in-memory sqlite");
    for sql in statements {
        store.execute(sql, &[]).await.expect(sql);
    }
    store
}

/// Single-column text values of `sql`, in result order
pub async fn column_values(store: &dyn Store, sql: &str) -> Vec<Option<String>> {
    store
        .query(sql, &[])
        .await
        .expect(sql)
        .iter()
        .map(|row| row.get(0).and_then(SqlValue::to_text))
        .collect()
}

pub async fn count(store: &dyn Store, table: &str) -> i64 {
    let rows = store
        .query(&format!("SELECT COUNT(*) FROM \"{}\"", table), &[])
        .await
        .expect("count rows");
    rows[0].get(0).and_then(SqlValue::as_i64).expect("integer count")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    WillDisableConstraints,
    DidDisableConstraints,
    WillTruncateTable(String),
    TruncateTableDidFinish(String),
    TableMigrationDidStart(String),
    TableMigrationDidFinish(String, u64),
    WillEnableConstraints,
    EnableConstraintsDidFail(String),
    EnableConstraintsDidFinish,
}

#[derive(Default)]
pub struct RecordingWatcher {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: MigrationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl MigrationWatcher for RecordingWatcher {
    fn will_disable_constraints(&self) {
        self.push(MigrationEvent::WillDisableConstraints);
    }

    fn did_disable_constraints(&self) {
        self.push(MigrationEvent::DidDisableConstraints);
    }

    fn will_truncate_table(&self, table: &str) {
        self.push(MigrationEvent::WillTruncateTable(table.to_string()));
    }

    fn truncate_table_did_finish(&self, table: &str) {
        self.push(MigrationEvent::TruncateTableDidFinish(table.to_string()));
    }

    fn table_migration_did_start(&self, table: &str) {
        self.push(MigrationEvent::TableMigrationDidStart(table.to_string()));
    }

    fn table_migration_did_finish(&self, table: &str, rows_inserted: u64) {
        self.push(MigrationEvent::TableMigrationDidFinish(
            table.to_string(),
            rows_inserted,
        ));
    }

    fn will_enable_constraints(&self) {
        self.push(MigrationEvent::WillEnableConstraints);
    }

    fn enable_constraints_did_fail_with_error(&self, err: &ReconcileError) {
        self.push(MigrationEvent::EnableConstraintsDidFail(err.to_string()));
    }

    fn enable_constraints_did_finish(&self) {
        self.push(MigrationEvent::EnableConstraintsDidFinish);
    }
}

/// How a [`ScriptedStore`] answers constraint toggling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraints {
    /// Delegated to the wrapped store
    Supported,
    /// Like an engine without a session switch
    Unsupported,
    /// Disabling works, re-enabling fails
    FailEnable,
}

/// SQLite store whose constraint toggling is scripted
pub struct ScriptedStore {
    pub inner: SqliteStore,
    constraints: Constraints,
    exists_answer: Option<Vec<Row>>,
}

impl ScriptedStore {
    pub fn new(inner: SqliteStore, constraints: Constraints) -> Self {
        Self {
            inner,
            constraints,
            exists_answer: None,
        }
    }

    /// Answer every `SELECT EXISTS` query with `rows`
    pub fn with_exists_answer(mut self, rows: Vec<Row>) -> Self {
        self.exists_answer = Some(rows);
        self
    }
}

#[async_trait]
impl Store for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&mut self) -> Result<()> {
        self.inner.open().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    async fn schema_rows(&self) -> Result<Vec<SchemaRow>> {
        self.inner.schema_rows().await
    }

    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        self.inner.primary_key_columns(table).await
    }

    async fn disable_constraints(&self) -> Result<()> {
        match self.constraints {
            Constraints::Unsupported => Err(ReconcileError::unsupported(
                self.name(),
                "disabling constraints",
            )),
            Constraints::Supported | Constraints::FailEnable => {
                self.inner.disable_constraints().await
            }
        }
    }

    async fn enable_constraints(&self) -> Result<()> {
        match self.constraints {
            Constraints::Unsupported => Err(ReconcileError::unsupported(
                self.name(),
                "enabling constraints",
            )),
            Constraints::Supported => self.inner.enable_constraints().await,
            Constraints::FailEnable => Err(ReconcileError::query(
                self.name(),
                "SET FOREIGN_KEY_CHECKS = 1",
                "lost connection",
            )),
        }
    }

    fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect()
    }

    async fn prepare(&self, sql: &str) -> Result<()> {
        self.inner.prepare(sql).await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        match &self.exists_answer {
            Some(rows) if sql.starts_with("SELECT EXISTS") => Ok(rows.clone()),
            _ => self.inner.query(sql, params).await,
        }
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.inner.execute(sql, params).await
    }
}
