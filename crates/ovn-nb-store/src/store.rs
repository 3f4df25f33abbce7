//! Row store seam: snapshot transactions with optimistic verify.

use crate::error::StoreResult;
use crate::schema::Table;
use crate::value::Value;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Reference to a row: table plus row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowRef {
    pub table: Table,
    pub uuid: Uuid,
}

impl RowRef {
    pub fn new(table: Table, uuid: Uuid) -> Self {
        Self { table, uuid }
    }
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.uuid)
    }
}

/// Result of looking a row up by column value.
///
/// Absence is an ordinary outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(RowRef),
    Absent,
}

impl Lookup {
    pub fn found(self) -> Option<RowRef> {
        match self {
            Lookup::Found(row) => Some(row),
            Lookup::Absent => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Outcome of committing a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitStatus {
    /// All mutations applied
    Success,
    /// Nothing to apply; verified columns were still current
    Unchanged,
    /// A verified column (or a row the transaction touched) changed
    /// concurrently; nothing was applied
    Aborted,
}

impl CommitStatus {
    /// Returns true if the transaction took effect (or had nothing to do).
    pub fn is_success(&self) -> bool {
        matches!(self, CommitStatus::Success | CommitStatus::Unchanged)
    }
}

/// Read access to a consistent view of the database.
pub trait StoreRead {
    /// Finds the first row of `table` whose `column` equals `value`.
    fn lookup(&self, table: Table, column: &str, value: &Value) -> StoreResult<Lookup>;

    /// Lists every row of `table`.
    fn rows(&self, table: Table) -> Vec<RowRef>;

    /// Returns true if the row exists in this view.
    fn exists(&self, row: RowRef) -> bool;

    /// Reads a column. Unset columns read as the type's default value.
    fn get(&self, row: RowRef, column: &str) -> StoreResult<Value>;
}

/// Operations available inside one store transaction.
///
/// Reads observe the transaction's own writes. Nothing is visible to other
/// transactions until [`RowStore::commit`] succeeds.
pub trait StoreTxn: StoreRead + Send {
    /// Assigns a whole column value.
    fn set(&mut self, row: RowRef, column: &str, value: Value) -> StoreResult<()>;

    /// Asserts at commit time that `column` of `row` is unchanged since this
    /// transaction observed it.
    fn verify(&mut self, row: RowRef, column: &str) -> StoreResult<()>;

    /// Inserts a new row with default column values.
    fn insert(&mut self, table: Table) -> RowRef;

    /// Deletes a row.
    fn delete(&mut self, row: RowRef) -> StoreResult<()>;

    /// Returns true if the transaction holds at least one mutation.
    fn has_changes(&self) -> bool;
}

/// A replicated row store.
#[async_trait]
pub trait RowStore: Send + Sync {
    type Txn: StoreTxn + 'static;
    type Reader<'a>: StoreRead
    where
        Self: 'a;

    /// Opens a transaction over a consistent view of the database.
    fn begin(&self) -> Self::Txn;

    /// Opens a read-only view of the committed database. Holds no copy;
    /// writers wait until the view is dropped.
    fn reader(&self) -> Self::Reader<'_>;

    /// Commits a transaction atomically.
    async fn commit(&self, txn: Self::Txn) -> StoreResult<CommitStatus>;
}
