// ABOUTME: Capability interface every relational store adapter implements
// ABOUTME: Exports the Store and Dialect traits plus the engine adapters

pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod value;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::Column;

pub use mysql::MysqlStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use value::{Row, SqlValue};

/// Bookkeeping table excluded from introspection on every engine
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

/// One introspection tuple: (table, column, declared type, max chars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRow {
    pub table: String,
    pub column: String,
    pub data_type: String,
    /// 0 when the engine reports no character limit
    pub max_chars: i64,
}

/// Connection to one relational database.
///
/// The validator and migrator depend only on this trait. Adapters own the
/// dialect details: introspection queries, identifier quoting, and how
/// referential integrity is toggled.
///
/// Each store holds exactly one connection between [`Store::open`] and
/// [`Store::close`]; session-level settings such as MySQL's
/// `FOREIGN_KEY_CHECKS` rely on that.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short engine name used in logs and errors ("postgres", "mysql", ...)
    fn name(&self) -> &str;

    async fn open(&mut self) -> Result<()>;

    /// Release the connection. Closing a store that is not open is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// One row per column of every base table, excluding [`MIGRATIONS_TABLE`]
    async fn schema_rows(&self) -> Result<Vec<SchemaRow>>;

    /// Primary key columns of `table` in key order, empty if it has none
    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>>;

    /// The single-column primary key of `table`.
    ///
    /// Composite keys yield `None`: no one column of them identifies a row,
    /// so callers compare whole rows instead.
    async fn primary_key(&self, table: &str) -> Result<Option<String>> {
        let mut columns = self.primary_key_columns(table).await?;
        Ok(match columns.len() {
            1 => columns.pop(),
            _ => None,
        })
    }

    async fn has_primary_key(&self, table: &str) -> Result<bool> {
        Ok(self.primary_key(table).await?.is_some())
    }

    /// Suspend referential-integrity enforcement for this session.
    ///
    /// Engines without a session-level switch return
    /// [`crate::error::ReconcileError::Unsupported`].
    async fn disable_constraints(&self) -> Result<()>;

    async fn enable_constraints(&self) -> Result<()>;

    fn dialect(&self) -> &dyn Dialect;

    /// Validate a statement ahead of repeated execution
    async fn prepare(&self, sql: &str) -> Result<()>;

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Run a statement, returning the number of affected rows
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;
}

/// SQL syntax differences between engines.
///
/// Identifiers passed in here always come from introspection; quoting
/// doubles any embedded quote character.
pub trait Dialect: Send + Sync {
    fn quote_ident(&self, name: &str) -> String;

    /// Select-list expression for a column (ColumnNameForSelect)
    fn column_for_select(&self, column: &Column) -> String {
        self.quote_ident(&column.name)
    }

    /// Parameter placeholder for the 1-based `index`
    fn param_placeholder(&self, index: usize) -> String;

    /// Expression casting `expr` to the engine's text type
    fn text_cast(&self, expr: &str) -> String;

    /// Character length of `expr` rendered as text
    fn text_length(&self, expr: &str) -> String {
        format!("LENGTH({})", self.text_cast(expr))
    }

    /// Equality that treats two NULLs as equal
    fn null_safe_eq(&self, lhs: &str, rhs: &str) -> String;

    fn truncate_table(&self, quoted_table: &str) -> String {
        format!("TRUNCATE TABLE {}", quoted_table)
    }

    /// Predicate excluding rows whose `key_expr` (already text) is in `keys`.
    ///
    /// Returns the predicate and the parameters it binds, numbered from
    /// `first_param`. An empty key list excludes nothing.
    fn key_exclusion(
        &self,
        key_expr: &str,
        keys: &[String],
        first_param: usize,
    ) -> (String, Vec<SqlValue>) {
        if keys.is_empty() {
            return ("1 = 1".to_string(), Vec::new());
        }
        let placeholders: Vec<String> = (0..keys.len())
            .map(|i| self.param_placeholder(first_param + i))
            .collect();
        let params = keys.iter().cloned().map(SqlValue::Text).collect();
        (
            format!("{} NOT IN ({})", key_expr, placeholders.join(", ")),
            params,
        )
    }
}

/// Quote `name` with `quote`, doubling embedded quote characters
pub(crate) fn quote_with(name: &str, quote: char) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(quote);
    for c in name.chars() {
        if c == quote {
            quoted.push(quote);
        }
        quoted.push(c);
    }
    quoted.push(quote);
    quoted
}

/// Parse the width out of a declared type such as `VARCHAR(255)`
pub(crate) fn declared_width(data_type: &str) -> i64 {
    let lower = data_type.to_ascii_lowercase();
    if !(lower.contains("char") || lower.contains("text") || lower.contains("clob")) {
        return 0;
    }
    lower
        .split_once('(')
        .and_then(|(_, rest)| rest.split(|c| c == ')' || c == ',').next())
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(0)
}
