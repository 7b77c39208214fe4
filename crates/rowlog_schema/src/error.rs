//! Error types for schema definition and row validation.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while registering table definitions or validating rows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A table definition declared no primary-key columns.
    #[error("table {table} has an empty primary key")]
    EmptyPrimaryKey {
        /// Table name.
        table: String,
    },

    /// A primary-key column does not exist in the column list.
    #[error("primary key of table {table} references unknown column {column}")]
    UnknownPrimaryKeyColumn {
        /// Table name.
        table: String,
        /// Offending column name.
        column: String,
    },

    /// A primary-key column was declared nullable.
    #[error("primary key column {column} of table {table} must not be nullable")]
    NullablePrimaryKey {
        /// Table name.
        table: String,
        /// Offending column name.
        column: String,
    },

    /// Two columns share the same name.
    #[error("table {table} declares column {column} more than once")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Duplicated column name.
        column: String,
    },

    /// A table was registered twice.
    #[error("table {table} is already registered")]
    TableExists {
        /// Table name.
        table: String,
    },

    /// An operation referenced a table that was never registered.
    #[error("unknown table: {table}")]
    UnknownTable {
        /// Table name.
        table: String,
    },

    /// A row carried a column the definition does not declare.
    #[error("table {table} has no column {column}")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Offending column name.
        column: String,
    },

    /// A required column was absent from a row.
    #[error("row for table {table} is missing column {column}")]
    MissingColumn {
        /// Table name.
        table: String,
        /// Missing column name.
        column: String,
    },

    /// NULL was supplied for a non-nullable column.
    #[error("column {column} of table {table} is not nullable")]
    NullViolation {
        /// Table name.
        table: String,
        /// Offending column name.
        column: String,
    },

    /// A value did not conform to the column's declared type.
    #[error("column {column} of table {table} expects {expected}, got {actual}")]
    TypeMismatch {
        /// Table name.
        table: String,
        /// Offending column name.
        column: String,
        /// Declared column type.
        expected: String,
        /// Actual value type.
        actual: String,
    },
}

impl SchemaError {
    /// Creates an unknown-table error.
    pub fn unknown_table(table: impl Into<String>) -> Self {
        Self::UnknownTable {
            table: table.into(),
        }
    }
}
