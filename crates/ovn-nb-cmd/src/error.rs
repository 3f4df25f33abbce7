//! Error types for Northbound command execution.
//!
//! Every error aborts the whole transaction it occurred in. Only
//! [`NbError::Conflict`] is transient: the caller may rebuild its commands
//! from fresh state and try again.

use ovn_nb_store::{StoreError, Table};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Northbound operations.
pub type NbResult<T> = Result<T, NbError>;

/// Errors that can occur while building or running Northbound commands.
#[derive(Debug, Error)]
pub enum NbError {
    /// Named entity (or a required parent) does not exist.
    #[error("{table} '{name}' does not exist")]
    NotFound {
        /// The table that was searched.
        table: Table,
        /// The entity name.
        name: String,
    },

    /// Parent/child linkage is broken.
    #[error("Inconsistent {table} '{name}': {message}")]
    Inconsistent {
        /// The table of the entity whose linkage is broken.
        table: Table,
        /// The entity name.
        name: String,
        /// What was found to be inconsistent.
        message: String,
    },

    /// A verified column changed concurrently; nothing was applied.
    #[error("Transaction aborted: concurrent modification detected")]
    Conflict,

    /// Operation is not supported.
    #[error("Unsupported operation: {message}")]
    Unsupported {
        /// Error message.
        message: String,
    },

    /// Column map rejected at construction time.
    #[error("Invalid column {table}.{column}: {message}")]
    InvalidColumn {
        /// The target table.
        table: Table,
        /// The column name.
        column: String,
        /// Error message.
        message: String,
    },

    /// Transaction did not complete within the configured timeout.
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// Row store failure.
    #[error("Row store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Batch file could not be decoded.
    #[error("Invalid batch: {0}")]
    Batch(#[from] serde_json::Error),

    /// File access failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl NbError {
    /// Creates a not found error.
    pub fn not_found(table: Table, name: impl Into<String>) -> Self {
        Self::NotFound {
            table,
            name: name.into(),
        }
    }

    /// Creates an inconsistency error.
    pub fn inconsistent(table: Table, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Inconsistent {
            table,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates an invalid column error.
    pub fn invalid_column(table: Table, column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidColumn {
            table,
            column: column.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed when the commands are rebuilt and retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NbError::Conflict)
    }

    /// Classifies this error as a transaction outcome.
    pub fn status(&self) -> TxnStatus {
        if self.is_retryable() {
            TxnStatus::Aborted
        } else {
            TxnStatus::Error
        }
    }
}

/// Outcome class of one transaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnStatus {
    /// All commands applied
    Success,
    /// Concurrent modification detected; safe to rebuild and retry
    Aborted,
    /// Definitive failure; nothing applied
    Error,
}

impl TxnStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TxnStatus::Success)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TxnStatus::Aborted)
    }
}

impl<T> From<&NbResult<T>> for TxnStatus {
    fn from(result: &NbResult<T>) -> Self {
        match result {
            Ok(_) => TxnStatus::Success,
            Err(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NbError::not_found(Table::LogicalSwitch, "sw1");
        assert_eq!(err.to_string(), "Logical_Switch 'sw1' does not exist");
    }

    #[test]
    fn test_inconsistent_display() {
        let err = NbError::inconsistent(Table::LogicalSwitch, "sw1", "missing acl");
        assert_eq!(
            err.to_string(),
            "Inconsistent Logical_Switch 'sw1': missing acl"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(NbError::Conflict.is_retryable());
        assert!(!NbError::not_found(Table::Acl, "x").is_retryable());
        assert!(!NbError::unsupported("delete by id").is_retryable());
        assert!(!NbError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn test_status_classification() {
        let ok: NbResult<()> = Ok(());
        let conflict: NbResult<()> = Err(NbError::Conflict);
        let missing: NbResult<()> = Err(NbError::not_found(Table::LogicalRouter, "r1"));
        assert_eq!(TxnStatus::from(&ok), TxnStatus::Success);
        assert_eq!(TxnStatus::from(&conflict), TxnStatus::Aborted);
        assert_eq!(TxnStatus::from(&missing), TxnStatus::Error);
    }
}
