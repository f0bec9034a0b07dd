use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the engine can report. Each variant carries a message meant
/// to be shown as-is to the user of the shell.
#[derive(Error, Debug)]
pub enum Error {
    // Front end
    #[error("syntax error: {0}")]
    StatementSyntax(String),

    #[error("invalid condition: {0}")]
    ConditionSyntax(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    // Catalog
    #[error("no database selected, use CREATE DATABASE or CHANGE DATABASE first")]
    NoDatabaseSelected,

    #[error("no database with the name {0:?} found")]
    DatabaseNotFound(String),

    #[error("database {0:?} already exists")]
    DatabaseExists(String),

    #[error("table {0:?} already exists")]
    TableExists(String),

    #[error("table {0:?} does not exist")]
    TableNotFound(String),

    #[error("schema of table {0:?} not found")]
    SchemaNotFound(String),

    #[error("column {0:?} not found")]
    ColumnNotFound(String),

    // Constraints
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("value cannot be null for column {0:?}")]
    NotNullViolation(String),

    #[error("duplicate value {value} for unique column {column:?}")]
    DuplicateValue { column: String, value: String },

    #[error("type mismatch for column {column:?}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("DELETE without WHERE clause is not supported for safety")]
    UnsafeDelete,

    // Storage
    #[error("I/O failure on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt file {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to apply updates: {0}")]
    UpdateFailed(#[source] Box<Error>),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
