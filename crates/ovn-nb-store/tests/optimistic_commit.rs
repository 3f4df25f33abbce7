//! Optimistic concurrency tests for the in-memory row store
//!
//! Many tasks race to append to the same membership list. Every task that
//! commits must have seen the latest list, so no append is ever lost.

use ovn_nb_store::{CommitStatus, MemoryStore, RowStore, StoreRead, StoreTxn, Table, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_racing_appends_never_lose_members() {
    let store = Arc::new(MemoryStore::new());
    let mut txn = store.begin();
    let sw = txn.insert(Table::LogicalSwitch);
    txn.set(sw, "name", Value::from("sw1")).unwrap();
    store.commit(txn).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            loop {
                let mut txn = store.begin();
                let port = txn.insert(Table::LogicalSwitchPort);
                txn.set(port, "name", Value::from(format!("p{}", i))).unwrap();
                txn.verify(sw, "ports").unwrap();
                let mut ports = txn.get(sw, "ports").unwrap().uuids();
                ports.push(port.uuid);
                txn.set(sw, "ports", Value::from(ports)).unwrap();
                match store.commit(txn).await.unwrap() {
                    CommitStatus::Aborted => {
                        tokio::task::yield_now().await;
                        continue;
                    }
                    status => return status,
                }
            }
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), CommitStatus::Success);
    }

    let view = store.begin();
    let ports = view.get(sw, "ports").unwrap().uuids();
    assert_eq!(ports.len(), 8);
    assert_eq!(store.row_count(Table::LogicalSwitchPort), 8);
}

#[tokio::test]
async fn test_verify_on_row_inserted_in_same_txn() {
    let store = MemoryStore::new();
    let mut txn = store.begin();
    let sw = txn.insert(Table::LogicalSwitch);
    txn.verify(sw, "ports").unwrap();
    txn.set(sw, "name", Value::from("fresh")).unwrap();
    assert_eq!(store.commit(txn).await.unwrap(), CommitStatus::Success);
}
