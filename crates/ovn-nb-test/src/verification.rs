//! Verification helpers for committed topology state
//!
//! Provides assertion helpers over a [`MemoryStore`]: entity presence,
//! membership counts and referential integrity of membership columns.

use ovn_nb_store::{
    ColumnType, MemoryStore, RowRef, RowStore, StoreError, StoreRead, Table, Uuid, Value,
};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Expected {table} '{name}' not found")]
    EntityNotFound { table: Table, name: String },

    #[error("{table} '{name}' should not exist")]
    UnexpectedEntity { table: Table, name: String },

    #[error("Expected {child} to appear {expected} time(s) in {parent}.{column}, found {actual}")]
    MembershipMismatch {
        parent: String,
        column: String,
        child: String,
        expected: usize,
        actual: usize,
    },

    #[error("{row}.{column} references missing {target} row {uuid}")]
    DanglingReference {
        row: RowRef,
        column: String,
        target: Table,
        uuid: Uuid,
    },

    #[error("Value mismatch for {row}.{column}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        row: RowRef,
        column: String,
        expected: Value,
        actual: Value,
    },

    #[error("Expected {expected} {table} row(s), found {actual}")]
    RowCountMismatch {
        table: Table,
        expected: usize,
        actual: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Committed topology verification helper
pub struct TopologyVerifier<'a> {
    store: &'a MemoryStore,
}

impl<'a> TopologyVerifier<'a> {
    pub fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    fn lookup(&self, table: Table, name: &str) -> VerifyResult<Option<RowRef>> {
        let view = self.store.reader();
        Ok(view.lookup(table, "name", &Value::from(name))?.found())
    }

    /// Verify that a named entity exists and return its row
    pub fn assert_exists(&self, table: Table, name: &str) -> VerifyResult<RowRef> {
        self.lookup(table, name)?
            .ok_or_else(|| VerificationError::EntityNotFound {
                table,
                name: name.to_string(),
            })
    }

    /// Verify that a named entity does not exist
    pub fn assert_absent(&self, table: Table, name: &str) -> VerifyResult<()> {
        match self.lookup(table, name)? {
            Some(_) => Err(VerificationError::UnexpectedEntity {
                table,
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Verify that a column holds a specific value
    pub fn assert_column(&self, row: RowRef, column: &str, expected: &Value) -> VerifyResult<()> {
        let actual = self.store.reader().get(row, column)?;
        if &actual != expected {
            return Err(VerificationError::ValueMismatch {
                row,
                column: column.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify that `child` appears in `parent.column` exactly `expected` times
    pub fn assert_member_count(
        &self,
        parent: RowRef,
        column: &str,
        child: RowRef,
        expected: usize,
    ) -> VerifyResult<()> {
        let view = self.store.reader();
        let actual = view
            .get(parent, column)?
            .uuids()
            .into_iter()
            .filter(|uuid| *uuid == child.uuid)
            .count();
        if actual != expected {
            return Err(VerificationError::MembershipMismatch {
                parent: parent.to_string(),
                column: column.to_string(),
                child: child.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify that `child` is listed in `parent.column` exactly once
    pub fn assert_member_once(&self, parent: RowRef, column: &str, child: RowRef) -> VerifyResult<()> {
        self.assert_member_count(parent, column, child, 1)
    }

    /// Verify that every reference column points at live rows
    pub fn assert_no_dangling_references(&self) -> VerifyResult<()> {
        let view = self.store.reader();
        for table in Table::ALL {
            for row in view.rows(table) {
                for column in &table.schema().columns {
                    let ColumnType::RefSet { table: target, .. } = column.kind else {
                        continue;
                    };
                    for uuid in view.get(row, column.name)?.uuids() {
                        if !view.exists(RowRef::new(target, uuid)) {
                            return Err(VerificationError::DanglingReference {
                                row,
                                column: column.name.to_string(),
                                target,
                                uuid,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Verify the number of rows in a table
    pub fn assert_row_count(&self, table: Table, expected: usize) -> VerifyResult<()> {
        let actual = self.store.row_count(table);
        if actual != expected {
            return Err(VerificationError::RowCountMismatch {
                table,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovn_nb_store::StoreTxn;

    fn named(store: &MemoryStore, table: Table, name: &str) -> RowRef {
        let mut txn = store.begin();
        let row = txn.insert(table);
        txn.set(row, "name", Value::from(name)).unwrap();
        tokio_test::block_on(store.commit(txn)).unwrap();
        row
    }

    #[test]
    fn test_presence_checks() {
        let store = MemoryStore::new();
        named(&store, Table::LogicalSwitch, "sw1");
        let verifier = TopologyVerifier::new(&store);

        assert!(verifier.assert_exists(Table::LogicalSwitch, "sw1").is_ok());
        assert!(verifier.assert_absent(Table::LogicalSwitch, "sw2").is_ok());
        assert!(matches!(
            verifier.assert_absent(Table::LogicalSwitch, "sw1"),
            Err(VerificationError::UnexpectedEntity { .. })
        ));
        assert!(verifier.assert_row_count(Table::LogicalSwitch, 1).is_ok());
    }

    #[test]
    fn test_dangling_reference_detected() {
        let store = MemoryStore::new();
        let switch = named(&store, Table::LogicalSwitch, "sw1");

        let mut txn = store.begin();
        txn.set(switch, "ports", Value::from(vec![Uuid::new_v4()]))
            .unwrap();
        tokio_test::block_on(store.commit(txn)).unwrap();

        let verifier = TopologyVerifier::new(&store);
        assert!(matches!(
            verifier.assert_no_dangling_references(),
            Err(VerificationError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_member_count_mismatch() {
        let store = MemoryStore::new();
        let switch = named(&store, Table::LogicalSwitch, "sw1");
        let port = named(&store, Table::LogicalSwitchPort, "p1");
        let verifier = TopologyVerifier::new(&store);
        assert!(matches!(
            verifier.assert_member_once(switch, "ports", port),
            Err(VerificationError::MembershipMismatch { actual: 0, .. })
        ));
    }
}
