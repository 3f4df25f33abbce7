//! Batch file integration tests

use ovn_nb_cmd::{build_commands, parse_batch, NbApi, SwitchPorts};
use ovn_nb_store::{MemoryStore, Table};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const TOPOLOGY: &str = r#"[
    {"op": "create", "entity": "switch", "name": "neutron-net1",
     "columns": {"external_ids": {"neutron:network_name": "net1"}}},
    {"op": "create", "entity": "switch_port", "name": "p1", "parent": "neutron-net1",
     "columns": {"addresses": ["fa:16:3e:00:00:01 10.0.0.5"]}},
    {"op": "create", "entity": "router", "name": "neutron-r1"},
    {"op": "create", "entity": "router_port", "name": "lrp-p1", "parent": "neutron-r1",
     "columns": {"mac": "fa:16:3e:00:00:10", "networks": ["10.0.0.1/24"]}},
    {"op": "bind_router_port", "switch_port": "p1", "router_port": "lrp-p1"},
    {"op": "add_static_route", "router": "neutron-r1",
     "columns": {"ip_prefix": "0.0.0.0/0", "nexthop": "172.24.4.1"}},
    {"op": "update_acls", "switches": ["neutron-net1"],
     "ports": [{"id": "p1", "switch": "neutron-net1"}],
     "desired": {"p1": [{"priority": 1001, "direction": "to-lport",
                         "match": "outport == \"p1\" && ip", "action": "drop"}]}}
]"#;

#[tokio::test]
async fn test_apply_batch_and_persist_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ovnnb_db.json");

    let store = Arc::new(MemoryStore::load_or_empty(&path).unwrap());
    let api = NbApi::new(Arc::clone(&store));
    let ops = parse_batch(TOPOLOGY).unwrap();
    let results = api
        .commit_with_retry(3, |api| build_commands(api, &ops))
        .await
        .unwrap();
    assert_eq!(results.len(), ops.len());
    store.save(&path).unwrap();

    let reloaded = Arc::new(MemoryStore::load_or_empty(&path).unwrap());
    let api = NbApi::new(Arc::clone(&reloaded));
    assert_eq!(
        api.all_switches_with_ports().unwrap(),
        vec![SwitchPorts {
            name: "neutron-net1".to_string(),
            ports: vec!["p1".to_string()],
        }]
    );
    let routers = api.all_routers_with_ports_and_routes().unwrap();
    assert_eq!(routers[0].name, "r1");
    assert_eq!(routers[0].ports, vec!["p1".to_string()]);
    assert_eq!(reloaded.row_count(Table::Acl), 1);
    assert_eq!(
        api.acls_for_switches(&["neutron-net1".to_string()])
            .unwrap()
            .rules_for("p1")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_invalid_batch_applies_nothing() {
    let store = Arc::new(MemoryStore::new());
    let api = NbApi::new(Arc::clone(&store));
    let ops = parse_batch(
        r#"[
            {"op": "create", "entity": "switch", "name": "sw1"},
            {"op": "delete", "entity": "switch_port", "name": "p1", "parent": "sw1"}
        ]"#,
    )
    .unwrap();

    assert!(api
        .commit_with_retry(3, |api| build_commands(api, &ops))
        .await
        .is_err());
    assert_eq!(store.row_count(Table::LogicalSwitch), 0);
}
