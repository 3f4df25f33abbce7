//! ACL reconciliation integration tests

use ovn_nb_cmd::{AclRemovalPolicy, AclRule, CommandResult, NbConfig, NbError, TargetPort};
use ovn_nb_store::{RowStore, StoreTxn, Table, Value};
use ovn_nb_test::{acl_fixtures, switch_fixtures, NbTestEnv, TopologyVerifier};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

async fn env_with_ports(config: NbConfig) -> NbTestEnv {
    let env = NbTestEnv::with_config(config);
    let api = &env.api;
    env.apply(vec![
        switch_fixtures::bare_switch(api, "sw1").unwrap(),
        switch_fixtures::bare_port(api, "sw1", "p1").unwrap(),
        switch_fixtures::bare_port(api, "sw1", "p2").unwrap(),
    ])
    .await
    .unwrap();
    env
}

fn desired(port: &str, rules: Vec<AclRule>) -> BTreeMap<String, Vec<AclRule>> {
    BTreeMap::from([(port.to_string(), rules)])
}

fn switches() -> Vec<String> {
    vec!["sw1".to_string()]
}

#[tokio::test]
async fn test_diff_replaces_only_changed_rules() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    let a = acl_fixtures::allow_ingress("p1", 1002, "tcp.dst == 22");
    let b = acl_fixtures::allow_ingress("p1", 1002, "tcp.dst == 80");
    let c = acl_fixtures::allow_ingress("p1", 1002, "tcp.dst == 443");
    let ports = vec![TargetPort::new("p1", "sw1")];

    env.apply_one(api.update_acls(
        switches(),
        ports.clone(),
        desired("p1", vec![a.clone(), b.clone()]),
        true,
        true,
    ))
    .await
    .unwrap();

    let before = api.acls_for_switches(&switches()).unwrap();
    let b_uuid = before.by_port["p1"]
        .iter()
        .find(|acl| acl.rule == b)
        .map(|acl| acl.uuid)
        .unwrap();

    let result = env
        .apply_one(api.update_acls(
            switches(),
            ports,
            desired("p1", vec![b.clone(), c.clone()]),
            true,
            true,
        ))
        .await
        .unwrap();
    match result {
        CommandResult::Acls(summary) => {
            assert_eq!(summary.deleted, 1);
            assert_eq!(summary.added.len(), 1);
        }
        other => panic!("unexpected result {:?}", other),
    }

    let after = api.acls_for_switches(&switches()).unwrap();
    let mut rules: Vec<&AclRule> = after.rules_for("p1");
    rules.sort();
    let mut expected = vec![&b, &c];
    expected.sort();
    assert_eq!(rules, expected);
    assert!(after.by_port["p1"].iter().any(|acl| acl.uuid == b_uuid));

    let verifier = TopologyVerifier::new(&env.store);
    verifier.assert_row_count(Table::Acl, 2).unwrap();
    verifier.assert_no_dangling_references().unwrap();
}

#[tokio::test]
async fn test_diff_leaves_other_ports() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    let other = acl_fixtures::drop_ingress("p2");

    env.apply(vec![
        api.add_acl("sw1", "p2", acl_fixtures::acl_columns(&other).unwrap())
            .unwrap(),
        api.update_acls(
            switches(),
            vec![TargetPort::new("p1", "sw1")],
            desired("p1", vec![acl_fixtures::drop_ingress("p1")]),
            true,
            true,
        ),
    ])
    .await
    .unwrap();

    // Empty desired set clears p1 only
    env.apply_one(api.update_acls(
        switches(),
        vec![TargetPort::new("p1", "sw1")],
        BTreeMap::new(),
        true,
        true,
    ))
    .await
    .unwrap();

    let snapshot = api.acls_for_switches(&switches()).unwrap();
    assert!(snapshot.rules_for("p1").is_empty());
    assert_eq!(snapshot.rules_for("p2"), vec![&other]);
}

#[tokio::test]
async fn test_diff_with_no_changes_is_empty() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    let rules = desired("p1", vec![acl_fixtures::drop_ingress("p1")]);
    let ports = vec![TargetPort::new("p1", "sw1")];

    env.apply_one(api.update_acls(switches(), ports.clone(), rules.clone(), true, true))
        .await
        .unwrap();
    let again = env
        .apply_one(api.update_acls(switches(), ports, rules, true, true))
        .await
        .unwrap();
    assert_eq!(again, CommandResult::Acls(Default::default()));
}

#[tokio::test]
async fn test_diff_ignores_ports_on_unreconciled_switches() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    env.apply(vec![
        switch_fixtures::bare_switch(api, "sw2").unwrap(),
        switch_fixtures::bare_port(api, "sw2", "p3").unwrap(),
    ])
    .await
    .unwrap();

    let ports = vec![TargetPort::new("p3", "sw2")];
    let rules = desired("p3", vec![acl_fixtures::drop_ingress("p3")]);
    for _ in 0..3 {
        let result = env
            .apply_one(api.update_acls(switches(), ports.clone(), rules.clone(), true, true))
            .await
            .unwrap();
        assert_eq!(result, CommandResult::Acls(Default::default()));
    }

    TopologyVerifier::new(&env.store)
        .assert_row_count(Table::Acl, 0)
        .unwrap();
}

#[tokio::test]
async fn test_acl_shared_between_switches_is_inconsistent() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    let rule = acl_fixtures::drop_ingress("p1");
    env.apply(vec![
        switch_fixtures::bare_switch(api, "sw2").unwrap(),
        api.add_acl("sw1", "p1", acl_fixtures::acl_columns(&rule).unwrap())
            .unwrap(),
    ])
    .await
    .unwrap();

    let acl = api.acls_for_switches(&switches()).unwrap().by_port["p1"][0].uuid;
    let verifier = TopologyVerifier::new(&env.store);
    let sw2 = verifier.assert_exists(Table::LogicalSwitch, "sw2").unwrap();
    let mut txn = env.store.begin();
    txn.set(sw2, "acls", Value::from(vec![acl])).unwrap();
    env.store.commit(txn).await.unwrap();

    let err = env
        .apply_one(api.update_acls(
            vec!["sw1".to_string(), "sw2".to_string()],
            vec![TargetPort::new("p1", "sw1")],
            BTreeMap::new(),
            true,
            true,
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NbError::Inconsistent {
            table: Table::LogicalSwitch,
            ..
        }
    ));

    verifier.assert_row_count(Table::Acl, 1).unwrap();
    assert_eq!(
        api.acls_for_switches(&switches()).unwrap().rules_for("p1"),
        vec![&rule]
    );
}

#[tokio::test]
async fn test_direct_add_and_remove_by_match() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    let rule = acl_fixtures::allow_egress("p1", 1002, "ip4");
    let ports = vec![TargetPort::new("p1", "sw1")];

    env.apply_one(api.update_acls(switches(), ports.clone(), desired("p1", vec![rule.clone()]), false, true))
        .await
        .unwrap();
    assert_eq!(api.acls_for_switches(&switches()).unwrap().rules_for("p1"), vec![&rule]);

    // Match-only removal ignores the differing priority
    let mut loose = rule.clone();
    loose.priority = 1;
    let result = env
        .apply_one(api.update_acls(switches(), ports, desired("p1", vec![loose]), false, false))
        .await
        .unwrap();
    assert!(matches!(result, CommandResult::Acls(ref s) if s.deleted == 1));
    TopologyVerifier::new(&env.store)
        .assert_row_count(Table::Acl, 0)
        .unwrap();
}

#[tokio::test]
async fn test_direct_remove_full_value_policy() {
    let mut config = NbConfig::default();
    config.acl.direct_removal = AclRemovalPolicy::FullValue;
    let env = env_with_ports(config).await;
    let api = &env.api;
    let rule = acl_fixtures::allow_egress("p1", 1002, "ip4");
    let ports = vec![TargetPort::new("p1", "sw1")];

    env.apply_one(api.update_acls(switches(), ports.clone(), desired("p1", vec![rule.clone()]), false, true))
        .await
        .unwrap();

    let mut loose = rule.clone();
    loose.priority = 1;
    env.apply_one(api.update_acls(switches(), ports.clone(), desired("p1", vec![loose]), false, false))
        .await
        .unwrap();
    TopologyVerifier::new(&env.store)
        .assert_row_count(Table::Acl, 1)
        .unwrap();

    env.apply_one(api.update_acls(switches(), ports, desired("p1", vec![rule]), false, false))
        .await
        .unwrap();
    TopologyVerifier::new(&env.store)
        .assert_row_count(Table::Acl, 0)
        .unwrap();
}

#[tokio::test]
async fn test_direct_mode_requires_switches() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    let err = env
        .apply_one(api.update_acls(
            vec!["missing".to_string()],
            vec![TargetPort::new("p1", "missing")],
            desired("p1", vec![acl_fixtures::drop_ingress("p1")]),
            false,
            true,
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        NbError::NotFound {
            table: Table::LogicalSwitch,
            ..
        }
    ));
}

#[tokio::test]
async fn test_delete_acls_of_port() {
    let env = env_with_ports(NbConfig::default()).await;
    let api = &env.api;
    let p1 = acl_fixtures::drop_ingress("p1");
    let p2 = acl_fixtures::drop_ingress("p2");
    env.apply(vec![
        api.add_acl("sw1", "p1", acl_fixtures::acl_columns(&p1).unwrap())
            .unwrap(),
        api.add_acl("sw1", "p2", acl_fixtures::acl_columns(&p2).unwrap())
            .unwrap(),
    ])
    .await
    .unwrap();

    let result = env.apply_one(api.delete_acl("sw1", "p1", false)).await.unwrap();
    assert_eq!(result, CommandResult::Deleted(1));

    let snapshot = api.acls_for_switches(&switches()).unwrap();
    assert!(snapshot.rules_for("p1").is_empty());
    assert_eq!(snapshot.rules_for("p2").len(), 1);
}
