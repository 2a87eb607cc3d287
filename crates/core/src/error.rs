//! Error types for Tessera.

use crate::value::{Value, ValueKind};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Tessera operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Unique constraint violation.
    #[error("Unique constraint violated for column {column}: {value}")]
    ConstraintViolation { column: String, value: Value },

    /// Record not found.
    #[error("Record {key} not found in table {table}")]
    NotFound { table: String, key: u64 },

    /// Table not found in the registry.
    #[error("Table not found: {name}")]
    TableNotFound { name: String },

    /// Table name already taken in the registry.
    #[error("Table with name {name} already exists")]
    TableExists { name: String },

    /// A transaction was committed twice.
    #[error("Transaction already committed")]
    AlreadyCommitted,

    /// The backing file could not be written or read. In-memory state may
    /// already reflect the mutation.
    #[error("Persistence failure on {}: {source}", .path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backing file content is not a valid table file.
    #[error("Malformed table file {} at line {line}: {message}", .path.display())]
    MalformedPersistedData {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Values cannot be ordered (missing or of mixed kinds).
    #[error("Values of column {column} are not orderable")]
    Unorderable { column: String },

    /// Text could not be parsed as the requested kind.
    #[error("Cannot parse {text:?} as {kind}")]
    InvalidValue { kind: ValueKind, text: String },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Creates a constraint violation error.
    pub fn constraint_violation(column: impl Into<String>, value: Value) -> Self {
        Error::ConstraintViolation {
            column: column.into(),
            value,
        }
    }

    /// Creates a record not found error.
    pub fn not_found(table: impl Into<String>, key: u64) -> Self {
        Error::NotFound {
            table: table.into(),
            key,
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates a table exists error.
    pub fn table_exists(name: impl Into<String>) -> Self {
        Error::TableExists { name: name.into() }
    }

    /// Creates a persistence failure error.
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::PersistenceFailure {
            path: path.into(),
            source,
        }
    }

    /// Creates a malformed data error.
    pub fn malformed(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Error::MalformedPersistedData {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Creates an unorderable error.
    pub fn unorderable(column: impl Into<String>) -> Self {
        Error::Unorderable {
            column: column.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(kind: ValueKind, text: impl Into<String>) -> Self {
        Error::InvalidValue {
            kind,
            text: text.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}
