//! Row store abstractions for the OVN Northbound database.
//!
//! This crate provides the schema and transaction seam consumed by the
//! Northbound command layer:
//!
//! - [`Table`] / [`TableSchema`]: Static description of the Northbound tables
//! - [`Value`]: Typed column value with a total order
//! - [`RowStore`] / [`StoreTxn`]: Snapshot transactions with optimistic verify
//! - [`StoreRead`]: Read access shared by transactions and read-only views
//! - [`Lookup`]: Explicit found/absent result of a name lookup
//! - [`MemoryStore`]: In-process backend with per-column versioning
//!
//! # Transaction model
//!
//! 1. `begin()` takes a private view of the database
//! 2. Reads and writes are applied to that view and recorded
//! 3. `verify()` records the version of a column that was read
//! 4. `commit()` re-checks every verified column against the live database;
//!    any change since the read aborts the whole transaction
//!
//! Read-only queries use `reader()` instead, which borrows the committed
//! database without copying it.
//!
//! # Example
//!
//! ```ignore
//! use ovn_nb_store::{MemoryStore, RowStore, StoreRead, StoreTxn, Table, Value};
//!
//! let store = MemoryStore::new();
//! let mut txn = store.begin();
//! let row = txn.insert(Table::LogicalSwitch);
//! txn.set(row, "name", Value::from("sw1"))?;
//! store.commit(txn).await?;
//! ```

mod error;
mod memory;
mod schema;
mod store;
mod value;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryReader, MemoryStore, MemoryTxn};
pub use schema::{ColumnSchema, ColumnType, Table, TableSchema};
pub use store::{CommitStatus, Lookup, RowRef, RowStore, StoreRead, StoreTxn};
pub use value::Value;

pub use uuid::Uuid;
