// ABOUTME: In-memory schema snapshot built from store introspection
// ABOUTME: Groups column rows by table and applies the column width rule

use std::collections::BTreeMap;

use crate::error::{ReconcileError, Result};
use crate::store::{SchemaRow, Store};

/// Tables of one store at one point in time, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: BTreeMap<String, Table>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    /// Introspection order
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    /// Maximum character width, 0 for unbounded or non-text columns
    pub max_chars: i64,
}

impl Schema {
    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| ReconcileError::TableNotFound(name.to_string()))
    }

    /// Group introspection rows by table, keeping column order per table
    pub fn from_rows(rows: Vec<SchemaRow>) -> Result<Self> {
        let mut tables: BTreeMap<String, Table> = BTreeMap::new();

        for row in rows {
            let table = tables.entry(row.table.clone()).or_insert_with(|| Table {
                name: row.table.clone(),
                columns: Vec::new(),
            });

            if table.has_column(&row.column) {
                return Err(ReconcileError::DuplicateColumn {
                    table: row.table,
                    column: row.column,
                });
            }

            table.columns.push(Column {
                name: row.column,
                data_type: row.data_type,
                max_chars: row.max_chars.max(0),
            });
        }

        Ok(Schema { tables })
    }
}

impl Table {
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

impl Column {
    /// Whether this (destination) column can hold every value of the
    /// `source` column.
    ///
    /// Two unbounded columns are compatible, a bounded/unbounded pair never
    /// is, and two bounded columns are compatible when the destination is at
    /// least as wide as the source.
    pub fn compatible_with(&self, source: &Column) -> bool {
        match (self.max_chars, source.max_chars) {
            (0, 0) => true,
            (dst, src) if dst > 0 && src > 0 => dst >= src,
            _ => false,
        }
    }

    pub fn incompatible_with(&self, source: &Column) -> bool {
        !self.compatible_with(source)
    }
}

/// Introspect `store` once and build a fresh snapshot
pub async fn build_schema(store: &dyn Store) -> Result<Schema> {
    let rows = store.schema_rows().await?;
    tracing::debug!("{}: {} schema rows", store.name(), rows.len());
    Schema::from_rows(rows)
}
