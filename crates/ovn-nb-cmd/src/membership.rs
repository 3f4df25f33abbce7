//! Parent/child membership maintenance.
//!
//! A child belongs to a parent iff its identifier is in the parent's
//! membership column. Every change follows the same sequence: verify the
//! column, read it, edit the list in memory, write the whole list back as
//! one assignment. The verify turns a concurrent edit of the same list into
//! a commit-time conflict instead of a lost update.

use crate::entity::is_link_column;
use crate::error::{NbError, NbResult};
use ovn_nb_store::{ColumnType, RowRef, StoreTxn, Table, Value};
use tracing::debug;
use uuid::Uuid;

/// A list column read under verify.
#[derive(Debug)]
pub(crate) struct ListColumn {
    row: RowRef,
    column: String,
    values: Vec<Value>,
    changed: bool,
}

impl ListColumn {
    /// Verifies and reads `row.column`.
    pub(crate) fn read<T: StoreTxn>(txn: &mut T, row: RowRef, column: &str) -> NbResult<Self> {
        txn.verify(row, column)?;
        let values = txn.get(row, column)?.into_list();
        Ok(Self {
            row,
            column: column.to_string(),
            values,
            changed: false,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn uuids(&self) -> Vec<Uuid> {
        self.values.iter().filter_map(Value::as_uuid).collect()
    }

    /// Appends `value` unless already present. Returns true if appended.
    pub(crate) fn push(&mut self, value: Value) -> bool {
        if self.values.contains(&value) {
            return false;
        }
        self.values.push(value);
        self.changed = true;
        true
    }

    /// Removes every occurrence of `value`. Returns true if one was found.
    pub(crate) fn remove(&mut self, value: &Value) -> bool {
        let before = self.values.len();
        self.values.retain(|v| v != value);
        let removed = self.values.len() != before;
        self.changed |= removed;
        removed
    }

    /// Writes the list back if it was edited.
    pub(crate) fn write<T: StoreTxn>(self, txn: &mut T) -> NbResult<()> {
        if self.changed {
            txn.set(self.row, &self.column, Value::List(self.values))?;
        }
        Ok(())
    }
}

/// Links `child` into `parent.column`.
///
/// Fails with `Inconsistent` when a capped reference column is already full.
pub(crate) fn add_member<T: StoreTxn>(
    txn: &mut T,
    parent: RowRef,
    parent_name: &str,
    column: &str,
    child: Uuid,
) -> NbResult<()> {
    let capacity = parent
        .table
        .schema()
        .column(column)
        .and_then(|c| c.kind.capacity());
    let mut members = ListColumn::read(txn, parent, column)?;
    if let Some(max) = capacity {
        if members.len() >= max && !members.uuids().contains(&child) {
            return Err(NbError::inconsistent(
                parent.table,
                parent_name,
                format!("{} already holds {} member(s)", column, max),
            ));
        }
    }
    members.push(Value::Uuid(child));
    members.write(txn)
}

/// Unlinks `child` from `parent.column`.
///
/// Fails with `Inconsistent` if the child is not listed.
pub(crate) fn remove_member<T: StoreTxn>(
    txn: &mut T,
    parent: RowRef,
    parent_name: &str,
    column: &str,
    child: Uuid,
    child_name: &str,
) -> NbResult<()> {
    let mut members = ListColumn::read(txn, parent, column)?;
    if !members.remove(&Value::Uuid(child)) {
        return Err(NbError::inconsistent(
            parent.table,
            parent_name,
            format!("{} does not contain '{}'", column, child_name),
        ));
    }
    members.write(txn)
}

/// Adds and removes plain values in one write.
///
/// Values already present are not added twice; removing an absent value is
/// not an error.
pub(crate) fn update_values<T: StoreTxn>(
    txn: &mut T,
    row: RowRef,
    column: &str,
    add: &[Value],
    remove: &[Value],
) -> NbResult<()> {
    let mut list = ListColumn::read(txn, row, column)?;
    for value in remove {
        list.remove(value);
    }
    for value in add {
        list.push(value.clone());
    }
    list.write(txn)
}

fn ref_table(table: Table, column: &str) -> Option<Table> {
    match table.schema().column(column)?.kind {
        ColumnType::RefSet { table, .. } => Some(table),
        _ => None,
    }
}

/// Deletes `row` together with every row it owns, recursively, and unlinks
/// it from non-owning references held by other rows.
///
/// Every membership column walked is verified, so a child linked in by a
/// concurrent transaction aborts the delete instead of being orphaned.
///
/// Returns the number of rows deleted.
pub(crate) fn delete_tree<T: StoreTxn>(txn: &mut T, row: RowRef) -> NbResult<usize> {
    let mut deleted = 0;
    let owned: Vec<&'static str> = row
        .table
        .schema()
        .columns
        .iter()
        .filter(|c| c.managed && !is_link_column(row.table, c.name))
        .map(|c| c.name)
        .collect();

    for column in owned {
        let Some(child_table) = ref_table(row.table, column) else {
            continue;
        };
        txn.verify(row, column)?;
        for uuid in txn.get(row, column)?.uuids() {
            let child = RowRef::new(child_table, uuid);
            if txn.exists(child) {
                deleted += delete_tree(txn, child)?;
            }
        }
    }

    unlink_references(txn, row)?;
    txn.delete(row)?;
    debug!("Deleted {}", row);
    Ok(deleted + 1)
}

fn unlink_references<T: StoreTxn>(txn: &mut T, target: RowRef) -> NbResult<()> {
    for referrer in Table::ALL {
        let links: Vec<&'static str> = referrer
            .schema()
            .columns
            .iter()
            .filter(|c| is_link_column(referrer, c.name))
            .filter(|c| ref_table(referrer, c.name) == Some(target.table))
            .map(|c| c.name)
            .collect();
        for column in links {
            for row in txn.rows(referrer) {
                let mut list = ListColumn::read(txn, row, column)?;
                list.remove(&Value::Uuid(target.uuid));
                list.write(txn)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovn_nb_store::{MemoryStore, RowStore, StoreRead};

    fn named(txn: &mut impl StoreTxn, table: Table, name: &str) -> RowRef {
        let row = txn.insert(table);
        txn.set(row, "name", Value::from(name)).unwrap();
        row
    }

    #[test]
    fn test_add_member_no_duplicates() {
        let store = MemoryStore::new();
        let mut txn = store.begin();
        let sw = named(&mut txn, Table::LogicalSwitch, "sw1");
        let port = named(&mut txn, Table::LogicalSwitchPort, "p1");
        add_member(&mut txn, sw, "sw1", "ports", port.uuid).unwrap();
        add_member(&mut txn, sw, "sw1", "ports", port.uuid).unwrap();
        assert_eq!(txn.get(sw, "ports").unwrap().uuids(), vec![port.uuid]);
    }

    #[test]
    fn test_remove_absent_member_is_inconsistent() {
        let store = MemoryStore::new();
        let mut txn = store.begin();
        let sw = named(&mut txn, Table::LogicalSwitch, "sw1");
        let port = named(&mut txn, Table::LogicalSwitchPort, "p1");
        let err = remove_member(&mut txn, sw, "sw1", "ports", port.uuid, "p1").unwrap_err();
        assert!(matches!(err, NbError::Inconsistent { .. }));
    }

    #[test]
    fn test_capped_column_rejects_second_member() {
        let store = MemoryStore::new();
        let mut txn = store.begin();
        let chain = named(&mut txn, Table::LogicalPortChain, "pc1");
        let fc1 = named(&mut txn, Table::LogicalFlowClassifier, "fc1");
        let fc2 = named(&mut txn, Table::LogicalFlowClassifier, "fc2");
        add_member(&mut txn, chain, "pc1", "flow_classifier", fc1.uuid).unwrap();
        let err = add_member(&mut txn, chain, "pc1", "flow_classifier", fc2.uuid).unwrap_err();
        assert!(err.to_string().contains("already holds 1"));
    }

    #[test]
    fn test_update_values_lenient() {
        let store = MemoryStore::new();
        let mut txn = store.begin();
        let set = named(&mut txn, Table::AddressSet, "as1");
        update_values(
            &mut txn,
            set,
            "addresses",
            &[Value::from("10.0.0.1"), Value::from("10.0.0.2")],
            &[Value::from("10.0.0.9")],
        )
        .unwrap();
        update_values(
            &mut txn,
            set,
            "addresses",
            &[Value::from("10.0.0.2")],
            &[Value::from("10.0.0.1")],
        )
        .unwrap();
        assert_eq!(
            txn.get(set, "addresses").unwrap().string_items(),
            vec!["10.0.0.2"]
        );
    }

    #[test]
    fn test_delete_tree_cascades_and_unlinks() {
        let store = MemoryStore::new();
        let mut txn = store.begin();
        let sw = named(&mut txn, Table::LogicalSwitch, "sw1");
        let pair = named(&mut txn, Table::LogicalPortPair, "pp1");
        let chain = named(&mut txn, Table::LogicalPortChain, "pc1");
        let group = named(&mut txn, Table::LogicalPortPairGroup, "ppg1");
        add_member(&mut txn, sw, "sw1", "port_pairs", pair.uuid).unwrap();
        add_member(&mut txn, sw, "sw1", "port_chains", chain.uuid).unwrap();
        add_member(&mut txn, chain, "pc1", "port_pair_groups", group.uuid).unwrap();
        add_member(&mut txn, group, "ppg1", "port_pairs", pair.uuid).unwrap();

        let deleted = delete_tree(&mut txn, pair).unwrap();
        assert_eq!(deleted, 1);
        assert!(txn.get(group, "port_pairs").unwrap().uuids().is_empty());

        let deleted = delete_tree(&mut txn, sw).unwrap();
        assert_eq!(deleted, 3);
        assert!(!txn.exists(chain));
        assert!(!txn.exists(group));
    }
}
