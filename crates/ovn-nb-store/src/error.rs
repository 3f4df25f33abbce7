//! Error types for row store operations.

use crate::schema::Table;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for row store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the row store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Column is not part of the table schema.
    #[error("Unknown column {table}.{column}")]
    UnknownColumn {
        /// The table that was addressed.
        table: Table,
        /// The column name.
        column: String,
    },

    /// Value does not match the declared column type.
    #[error("Type mismatch for {table}.{column}: expected {expected}")]
    TypeMismatch {
        /// The table that was addressed.
        table: Table,
        /// The column name.
        column: String,
        /// Human readable description of the declared type.
        expected: String,
    },

    /// Row does not exist in the transaction view.
    #[error("Row {uuid} not found in {table}")]
    RowNotFound {
        /// The table that was addressed.
        table: Table,
        /// The row identifier.
        uuid: Uuid,
    },

    /// Snapshot could not be read or written.
    #[error("Snapshot operation failed: {operation}: {message}")]
    Snapshot {
        /// The operation that failed (e.g., "load", "save").
        operation: String,
        /// Error message.
        message: String,
    },
}

impl StoreError {
    /// Creates an unknown column error.
    pub fn unknown_column(table: Table, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            table,
            column: column.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(table: Table, column: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            table,
            column: column.into(),
            expected: expected.into(),
        }
    }

    /// Creates a snapshot error.
    pub fn snapshot(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Snapshot {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::unknown_column(Table::LogicalSwitch, "mtu");
        assert_eq!(err.to_string(), "Unknown column Logical_Switch.mtu");
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = StoreError::type_mismatch(Table::Acl, "priority", "integer");
        assert_eq!(
            err.to_string(),
            "Type mismatch for ACL.priority: expected integer"
        );
    }
}
