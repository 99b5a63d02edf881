// ABOUTME: Error taxonomy for schema validation and data migration
// ABOUTME: Distinguishes connection, schema-shape, unsupported and query failures

use thiserror::Error;

/// Errors produced by the stores, the validator and the migrator.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Configuration file is missing, malformed or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Opening the connection to a store failed
    #[error("Failed to connect to {store}: {message}")]
    Connection { store: String, message: String },

    /// A store was used before `open` or after `close`
    #[error("{store} connection is not open")]
    NotOpen { store: String },

    /// A statement failed to prepare or execute
    #[error("Query failed on {store}: {message}\n  Statement: {sql}")]
    Query {
        store: String,
        sql: String,
        message: String,
    },

    /// A returned value could not be mapped to a `SqlValue`
    #[error("Failed to decode column {column} on {store}: {message}")]
    Decode {
        store: String,
        column: String,
        message: String,
    },

    /// A parameter value has no representation on the store
    #[error("Failed to encode value for {store}: {message}")]
    Encode { store: String, message: String },

    /// Introspection rows were inconsistent
    #[error("Failed to build schema: {0}")]
    SchemaBuild(String),

    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("failed to find column '{table}/{column}' in source schema")]
    ColumnNotFound { table: String, column: String },

    #[error("column '{column}' appears more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// The store has no notion of the requested operation
    #[error("{operation} is not supported by {store}")]
    Unsupported { store: String, operation: String },

    /// Referential-integrity checks could not be turned back on
    #[error("failed to re-enable constraints: {0}")]
    EnableConstraints(#[source] Box<ReconcileError>),

    /// Wraps an error with the phase of the operation that failed
    #[error("{phase}: {source}")]
    Phase {
        phase: String,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    pub fn query(store: impl Into<String>, sql: impl Into<String>, err: impl ToString) -> Self {
        ReconcileError::Query {
            store: store.into(),
            sql: sql.into(),
            message: err.to_string(),
        }
    }

    pub fn decode(store: impl Into<String>, column: impl Into<String>, err: impl ToString) -> Self {
        ReconcileError::Decode {
            store: store.into(),
            column: column.into(),
            message: err.to_string(),
        }
    }

    pub fn unsupported(store: impl Into<String>, operation: impl Into<String>) -> Self {
        ReconcileError::Unsupported {
            store: store.into(),
            operation: operation.into(),
        }
    }

    /// Attach the failing phase, e.g. "failed to build source schema"
    pub fn during(self, phase: impl Into<String>) -> Self {
        ReconcileError::Phase {
            phase: phase.into(),
            source: Box::new(self),
        }
    }

    /// True when the store reported the operation as unsupported,
    /// looking through any phase wrappers
    pub fn is_unsupported(&self) -> bool {
        match self {
            ReconcileError::Unsupported { .. } => true,
            ReconcileError::Phase { source, .. } => source.is_unsupported(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// `.during("...")` on results, mirroring anyhow's `.context`
pub trait ResultExt<T> {
    fn during(self, phase: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn during(self, phase: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.during(phase))
    }
}
