//! Error types for the core engine.

use crate::storage::StorageError;
use rowlog_schema::SchemaError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Schema definition or row validation error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Oplog storage error.
    ///
    /// Aborts the enclosing mutation so the table and the log never diverge.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An update attempted to change a primary-key column.
    ///
    /// Fatal to the enclosing write; the row is left unchanged.
    #[error("table {table}: cannot change the value of column {column} as it belongs to the primary key")]
    PrimaryKeyImmutable {
        /// Table name.
        table: String,
        /// Primary-key column whose value differed.
        column: String,
    },

    /// An insert collided with an existing primary key.
    #[error("duplicate key in table {table}: {key}")]
    DuplicateKey {
        /// Table name.
        table: String,
        /// Display form of the primary key.
        key: String,
    },

    /// A keyed update referenced a row that does not exist.
    #[error("row not found in table {table}: {key}")]
    RowNotFound {
        /// Table name.
        table: String,
        /// Display form of the primary key.
        key: String,
    },
}

impl CoreError {
    /// Creates a primary-key immutability violation.
    pub fn primary_key_immutable(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::PrimaryKeyImmutable {
            table: table.into(),
            column: column.into(),
        }
    }
}
