//! In-memory row store backend.
//!
//! Each transaction works on a private copy of the database taken at
//! `begin()`. Every committed column write is stamped with a generation
//! number; `verify()` records the generation observed and commit rejects
//! the transaction if that generation moved.
//!
//! Read-only views borrow the committed database under a read lock.
//!
//! The database can be loaded from and saved to a JSON snapshot.

use crate::error::{StoreError, StoreResult};
use crate::schema::Table;
use crate::store::{CommitStatus, Lookup, RowRef, RowStore, StoreRead, StoreTxn};
use crate::value::Value;
use async_trait::async_trait;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredRow {
    columns: BTreeMap<String, Value>,
    /// Generation of the last committed write per column
    #[serde(skip)]
    versions: BTreeMap<String, u64>,
}

impl StoredRow {
    fn version(&self, column: &str) -> u64 {
        self.versions.get(column).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Database {
    tables: BTreeMap<Table, BTreeMap<Uuid, StoredRow>>,
    #[serde(skip)]
    generation: u64,
}

impl Database {
    fn row(&self, row: RowRef) -> Option<&StoredRow> {
        self.tables.get(&row.table).and_then(|t| t.get(&row.uuid))
    }

    fn row_mut(&mut self, row: RowRef) -> Option<&mut StoredRow> {
        self.tables
            .get_mut(&row.table)
            .and_then(|t| t.get_mut(&row.uuid))
    }

    fn read(&self, row: RowRef, column: &str) -> StoreResult<Value> {
        let schema = row
            .table
            .schema()
            .column(column)
            .ok_or_else(|| StoreError::unknown_column(row.table, column))?;
        let stored = self.row(row).ok_or(StoreError::RowNotFound {
            table: row.table,
            uuid: row.uuid,
        })?;
        Ok(stored
            .columns
            .get(column)
            .cloned()
            .unwrap_or_else(|| schema.kind.default_value()))
    }

    fn lookup(&self, table: Table, column: &str, value: &Value) -> StoreResult<Lookup> {
        check_column(table, column)?;
        let Some(rows) = self.tables.get(&table) else {
            return Ok(Lookup::Absent);
        };
        for uuid in rows.keys() {
            let row = RowRef::new(table, *uuid);
            if self.read(row, column)? == *value {
                return Ok(Lookup::Found(row));
            }
        }
        Ok(Lookup::Absent)
    }

    fn rows(&self, table: Table) -> Vec<RowRef> {
        self.tables
            .get(&table)
            .map(|rows| rows.keys().map(|u| RowRef::new(table, *u)).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
enum TxnOp {
    Insert(RowRef),
    Set(RowRef, String, Value),
    Delete(RowRef),
}

#[derive(Debug, Clone)]
struct Verified {
    row: RowRef,
    column: String,
    version: u64,
}

/// Transaction over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTxn {
    view: Database,
    ops: Vec<TxnOp>,
    verified: Vec<Verified>,
    inserted: HashSet<Uuid>,
}

fn check_column(table: Table, column: &str) -> StoreResult<()> {
    match table.schema().column(column) {
        Some(_) => Ok(()),
        None => Err(StoreError::unknown_column(table, column)),
    }
}

impl StoreRead for MemoryTxn {
    fn lookup(&self, table: Table, column: &str, value: &Value) -> StoreResult<Lookup> {
        self.view.lookup(table, column, value)
    }

    fn rows(&self, table: Table) -> Vec<RowRef> {
        self.view.rows(table)
    }

    fn exists(&self, row: RowRef) -> bool {
        self.view.row(row).is_some()
    }

    fn get(&self, row: RowRef, column: &str) -> StoreResult<Value> {
        self.view.read(row, column)
    }
}

impl StoreTxn for MemoryTxn {
    fn set(&mut self, row: RowRef, column: &str, value: Value) -> StoreResult<()> {
        let schema = row
            .table
            .schema()
            .column(column)
            .ok_or_else(|| StoreError::unknown_column(row.table, column))?;
        if !schema.kind.accepts(&value) {
            return Err(StoreError::type_mismatch(
                row.table,
                column,
                schema.kind.to_string(),
            ));
        }
        let stored = self.view.row_mut(row).ok_or(StoreError::RowNotFound {
            table: row.table,
            uuid: row.uuid,
        })?;
        stored.columns.insert(column.to_string(), value.clone());
        self.ops.push(TxnOp::Set(row, column.to_string(), value));
        Ok(())
    }

    fn verify(&mut self, row: RowRef, column: &str) -> StoreResult<()> {
        check_column(row.table, column)?;
        let stored = self.view.row(row).ok_or(StoreError::RowNotFound {
            table: row.table,
            uuid: row.uuid,
        })?;
        if self.inserted.contains(&row.uuid) {
            return Ok(());
        }
        if self
            .verified
            .iter()
            .any(|v| v.row == row && v.column == column)
        {
            return Ok(());
        }
        let version = stored.version(column);
        self.verified.push(Verified {
            row,
            column: column.to_string(),
            version,
        });
        Ok(())
    }

    fn insert(&mut self, table: Table) -> RowRef {
        let row = RowRef::new(table, Uuid::new_v4());
        self.view
            .tables
            .entry(table)
            .or_default()
            .insert(row.uuid, StoredRow::default());
        self.inserted.insert(row.uuid);
        self.ops.push(TxnOp::Insert(row));
        row
    }

    fn delete(&mut self, row: RowRef) -> StoreResult<()> {
        let removed = self
            .view
            .tables
            .get_mut(&row.table)
            .and_then(|t| t.remove(&row.uuid));
        if removed.is_none() {
            return Err(StoreError::RowNotFound {
                table: row.table,
                uuid: row.uuid,
            });
        }
        self.ops.push(TxnOp::Delete(row));
        Ok(())
    }

    fn has_changes(&self) -> bool {
        !self.ops.is_empty()
    }
}

/// Read-only view over the committed contents of a [`MemoryStore`].
pub struct MemoryReader<'a> {
    db: RwLockReadGuard<'a, Database>,
}

impl StoreRead for MemoryReader<'_> {
    fn lookup(&self, table: Table, column: &str, value: &Value) -> StoreResult<Lookup> {
        self.db.lookup(table, column, value)
    }

    fn rows(&self, table: Table) -> Vec<RowRef> {
        self.db.rows(table)
    }

    fn exists(&self, row: RowRef) -> bool {
        self.db.row(row).is_some()
    }

    fn get(&self, row: RowRef, column: &str) -> StoreResult<Value> {
        self.db.read(row, column)
    }
}

/// In-process row store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    db: RwLock<Database>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from a JSON snapshot.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let db: Database =
            serde_json::from_str(json).map_err(|e| StoreError::snapshot("parse", e.to_string()))?;
        Ok(Self {
            db: RwLock::new(db),
        })
    }

    /// Serializes the committed database to JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        let db = self.db.read();
        serde_json::to_string_pretty(&*db).map_err(|e| StoreError::snapshot("serialize", e.to_string()))
    }

    /// Loads a snapshot file, or starts empty if the file does not exist.
    pub fn load_or_empty(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                let store = Self::from_json(&content)?;
                info!("Loaded row store snapshot from {}", path.display());
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Snapshot {} not found, starting empty", path.display());
                Ok(Self::new())
            }
            Err(e) => Err(StoreError::snapshot(
                "load",
                format!("{}: {}", path.display(), e),
            )),
        }
    }

    /// Writes the committed database to a snapshot file.
    pub fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let content = self.to_json()?;
        fs::write(path, content)
            .map_err(|e| StoreError::snapshot("save", format!("{}: {}", path.display(), e)))
    }

    /// Number of committed rows in `table`.
    pub fn row_count(&self, table: Table) -> usize {
        self.db.read().tables.get(&table).map_or(0, |t| t.len())
    }

    fn apply(&self, txn: MemoryTxn) -> CommitStatus {
        let mut db = self.db.write();

        for v in &txn.verified {
            match db.row(v.row) {
                Some(stored) if stored.version(&v.column) == v.version => {}
                _ => {
                    debug!("Verify failed on {}.{}", v.row, v.column);
                    return CommitStatus::Aborted;
                }
            }
        }

        for op in &txn.ops {
            if let TxnOp::Set(row, _, _) | TxnOp::Delete(row) = op {
                if !txn.inserted.contains(&row.uuid) && db.row(*row).is_none() {
                    debug!("Row {} deleted concurrently", row);
                    return CommitStatus::Aborted;
                }
            }
        }

        if txn.ops.is_empty() {
            return CommitStatus::Unchanged;
        }

        db.generation += 1;
        let generation = db.generation;
        for op in txn.ops {
            match op {
                TxnOp::Insert(row) => {
                    db.tables
                        .entry(row.table)
                        .or_default()
                        .insert(row.uuid, StoredRow::default());
                }
                TxnOp::Set(row, column, value) => {
                    if let Some(stored) = db.row_mut(row) {
                        stored.versions.insert(column.clone(), generation);
                        stored.columns.insert(column, value);
                    }
                }
                TxnOp::Delete(row) => {
                    if let Some(rows) = db.tables.get_mut(&row.table) {
                        rows.remove(&row.uuid);
                    }
                }
            }
        }
        debug!("Committed generation {}", generation);
        CommitStatus::Success
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    type Txn = MemoryTxn;
    type Reader<'a> = MemoryReader<'a>;

    fn begin(&self) -> MemoryTxn {
        MemoryTxn {
            view: self.db.read().clone(),
            ops: Vec::new(),
            verified: Vec::new(),
            inserted: HashSet::new(),
        }
    }

    fn reader(&self) -> MemoryReader<'_> {
        MemoryReader { db: self.db.read() }
    }

    async fn commit(&self, txn: MemoryTxn) -> StoreResult<CommitStatus> {
        Ok(self.apply(txn))
    }
}
