// ABOUTME: SQLite store adapter built on rusqlite
// ABOUTME: Serves local database files and in-memory stores for reconciliation tests

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::PathBuf;
use std::sync::Mutex;

use super::value::format_timestamp;
use super::{declared_width, quote_with, Dialect, Row, SchemaRow, SqlValue, Store, MIGRATIONS_TABLE};
use crate::error::{ReconcileError, Result};

const STORE_NAME: &str = "sqlite";

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Where the database lives
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

pub struct SqliteStore {
    location: Location,
    conn: Mutex<Option<Connection>>,
    dialect: SqliteDialect,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::at(Location::File(path.into()))
    }

    /// A private in-memory database, created empty on `open`
    pub fn in_memory() -> Self {
        Self::at(Location::Memory)
    }

    fn at(location: Location) -> Self {
        Self {
            location,
            conn: Mutex::new(None),
            dialect: SqliteDialect,
        }
    }

    /// Run `f` against the open connection
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().map_err(|_| ReconcileError::Connection {
            store: STORE_NAME.to_string(),
            message: "connection mutex poisoned".to_string(),
        })?;
        let conn = guard.as_ref().ok_or_else(|| ReconcileError::NotOpen {
            store: STORE_NAME.to_string(),
        })?;
        f(conn)
    }
}

fn to_sqlite_value(value: &SqlValue) -> Result<Value> {
    Ok(match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bytes(b) => Value::Blob(b.clone()),
        SqlValue::Json(v) => Value::Text(v.to_string()),
        SqlValue::Timestamp(ts) => Value::Text(format_timestamp(ts)),
        SqlValue::TimestampTz(ts) => Value::Text(format_timestamp(&ts.naive_utc())),
        SqlValue::Date(_) | SqlValue::Time(_) => Value::Text(value.to_string()),
        SqlValue::TextArray(_) => {
            return Err(ReconcileError::unsupported(STORE_NAME, "array parameters"))
        }
    })
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Decode using the declared column type, since SQLite stores dates as text
fn decode_value(decl_type: Option<&str>, value: ValueRef<'_>) -> SqlValue {
    let decl = decl_type.unwrap_or_default().to_ascii_uppercase();
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) if decl.contains("BOOL") => SqlValue::Bool(i != 0),
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Blob(b) => SqlValue::Bytes(b.to_vec()),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            let typed = if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
                parse_timestamp(&text).map(SqlValue::Timestamp)
            } else if decl == "DATE" {
                NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .ok()
                    .map(SqlValue::Date)
            } else if decl == "TIME" {
                NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
                    .ok()
                    .map(SqlValue::Time)
            } else {
                None
            };
            typed.unwrap_or(SqlValue::Text(text))
        }
    }
}

fn bind(params: &[SqlValue]) -> Result<Vec<Value>> {
    params.iter().map(to_sqlite_value).collect()
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn open(&mut self) -> Result<()> {
        let conn = match &self.location {
            Location::File(path) => Connection::open(path),
            Location::Memory => Connection::open_in_memory(),
        }
        .map_err(|e| ReconcileError::Connection {
            store: STORE_NAME.to_string(),
            message: e.to_string(),
        })?;

        let slot = self.conn.get_mut().map_err(|_| ReconcileError::Connection {
            store: STORE_NAME.to_string(),
            message: "connection mutex poisoned".to_string(),
        })?;
        *slot = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let slot = self.conn.get_mut().map_err(|_| ReconcileError::Connection {
            store: STORE_NAME.to_string(),
            message: "connection mutex poisoned".to_string(),
        })?;
        if let Some(conn) = slot.take() {
            conn.close().map_err(|(_, e)| ReconcileError::Connection {
                store: STORE_NAME.to_string(),
                message: format!("failed to close connection: {}", e),
            })?;
        }
        Ok(())
    }

    async fn schema_rows(&self) -> Result<Vec<SchemaRow>> {
        let sql = "SELECT m.name, p.name, p.type
             FROM sqlite_master m
             JOIN pragma_table_info(m.name) p
             WHERE m.type = 'table'
               AND m.name NOT LIKE 'sqlite_%'
               AND m.name <> ?1
             ORDER BY m.name, p.cid";

        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;
            let rows = stmt
                .query_map([MIGRATIONS_TABLE], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;

            let schema_rows = rows
                .map(|row| {
                    let (table, column, data_type) =
                        row.map_err(|e| ReconcileError::decode(STORE_NAME, "table_info", e))?;
                    Ok(SchemaRow {
                        max_chars: declared_width(&data_type),
                        table,
                        column,
                        data_type,
                    })
                })
                .collect::<Result<Vec<_>>>();
            schema_rows
        })
    }

    async fn primary_key_columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk";
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;
            let rows = stmt
                .query_map([table], |row| row.get::<_, String>(0))
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;
            let columns = rows
                .map(|row| row.map_err(|e| ReconcileError::decode(STORE_NAME, "name", e)))
                .collect::<Result<Vec<_>>>();
            columns
        })
    }

    async fn disable_constraints(&self) -> Result<()> {
        self.execute("PRAGMA foreign_keys = OFF", &[]).await?;
        Ok(())
    }

    async fn enable_constraints(&self) -> Result<()> {
        self.execute("PRAGMA foreign_keys = ON", &[]).await?;
        Ok(())
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn prepare(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(sql)
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;
            Ok(())
        })
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let values = bind(params)?;
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;
            let decl_types: Vec<Option<String>> = stmt
                .columns()
                .iter()
                .map(|c| c.decl_type().map(str::to_string))
                .collect();

            let mut rows = stmt
                .query(params_from_iter(values.iter()))
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;

            let mut out = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?
            {
                let mut values = Vec::with_capacity(decl_types.len());
                for (idx, decl) in decl_types.iter().enumerate() {
                    let value = row
                        .get_ref(idx)
                        .map_err(|e| ReconcileError::decode(STORE_NAME, idx.to_string(), e))?;
                    values.push(decode_value(decl.as_deref(), value));
                }
                out.push(Row::new(values));
            }
            Ok(out)
        })
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let values = bind(params)?;
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(sql)
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;
            let affected = stmt
                .execute(params_from_iter(values.iter()))
                .map_err(|e| ReconcileError::query(STORE_NAME, sql, e))?;
            Ok(affected as u64)
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn quote_ident(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn text_cast(&self, expr: &str) -> String {
        format!("CAST({} AS TEXT)", expr)
    }

    fn null_safe_eq(&self, lhs: &str, rhs: &str) -> String {
        format!("{} IS {}", lhs, rhs)
    }

    fn truncate_table(&self, quoted_table: &str) -> String {
        format!("DELETE FROM {}", quoted_table)
    }
}
