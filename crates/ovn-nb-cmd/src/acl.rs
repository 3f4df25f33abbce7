//! ACL reconciliation.
//!
//! Brings the ACLs attached to a set of switch ports to a desired set, in
//! one of two modes:
//!
//! - **Diff**: read the current ACLs of the given switches, compare them
//!   with the desired set per port by value, delete what is no longer wanted
//!   and insert what is missing. ACLs that are already correct keep their
//!   row identity.
//! - **Direct**: add every desired ACL, or remove every existing ACL whose
//!   key matches a provided one, without comparing first.
//!
//! An ACL belongs to a port through its `neutron:lport` external id; the
//! switch it is listed on is only its container.

use crate::error::{NbError, NbResult};
use crate::membership::ListColumn;
use crate::naming::ext_ids;
use crate::query::find;
use ovn_nb_store::{RowRef, StoreRead, StoreTxn, Table, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Canonical, comparable projection of an ACL row.
///
/// Derived ordering and hashing make value comparison independent of key
/// order in `external_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AclRule {
    pub priority: i64,
    pub direction: String,
    #[serde(rename = "match")]
    pub match_expr: String,
    pub action: String,
    #[serde(default)]
    pub log: bool,
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
}

impl AclRule {
    /// Creates a rule with logging off and no external ids.
    pub fn new(
        priority: i64,
        direction: impl Into<String>,
        match_expr: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            priority,
            direction: direction.into(),
            match_expr: match_expr.into(),
            action: action.into(),
            log: false,
            external_ids: BTreeMap::new(),
        }
    }

    pub fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn with_external_id(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.external_ids.insert(key.into(), value.into());
        self
    }

    /// Tags the rule as belonging to `port`.
    pub fn for_port(self, port: &str) -> Self {
        self.with_external_id(ext_ids::LPORT, port)
    }

    /// The port this rule belongs to, if tagged.
    pub fn port(&self) -> Option<&str> {
        self.external_ids.get(ext_ids::LPORT).map(String::as_str)
    }

    /// Projects an ACL row.
    pub(crate) fn read<T: StoreRead>(txn: &T, row: RowRef) -> NbResult<Self> {
        let text = |column: &str| -> NbResult<String> {
            Ok(txn.get(row, column)?.as_str().unwrap_or_default().to_string())
        };
        Ok(Self {
            priority: txn.get(row, "priority")?.as_integer().unwrap_or_default(),
            direction: text("direction")?,
            match_expr: text("match")?,
            action: text("action")?,
            log: txn.get(row, "log")?.as_bool().unwrap_or_default(),
            external_ids: txn.get(row, "external_ids")?.into_map(),
        })
    }

    /// Writes every column of the rule to an ACL row.
    pub(crate) fn write<T: StoreTxn>(&self, txn: &mut T, row: RowRef) -> NbResult<()> {
        txn.set(row, "priority", Value::Integer(self.priority))?;
        txn.set(row, "direction", Value::from(self.direction.as_str()))?;
        txn.set(row, "match", Value::from(self.match_expr.as_str()))?;
        txn.set(row, "action", Value::from(self.action.as_str()))?;
        txn.set(row, "log", Value::Boolean(self.log))?;
        txn.set(row, "external_ids", Value::Map(self.external_ids.clone()))?;
        Ok(())
    }
}

impl fmt::Display for AclRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) {}",
            self.direction, self.priority, self.match_expr, self.action
        )
    }
}

/// A port whose ACLs are being reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPort {
    /// Port identifier, as used in the `neutron:lport` tag
    pub id: String,
    /// Name of the switch the port's ACLs live on
    pub switch: String,
}

impl TargetPort {
    pub fn new(id: impl Into<String>, switch: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            switch: switch.into(),
        }
    }
}

/// How direct-mode removal decides an existing ACL matches a provided one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclRemovalPolicy {
    /// Match expression equality only
    #[default]
    MatchOnly,
    /// Equality of the whole projected rule
    FullValue,
}

impl AclRemovalPolicy {
    fn matches(&self, existing: &AclRule, provided: &[AclRule]) -> bool {
        match self {
            AclRemovalPolicy::MatchOnly => provided
                .iter()
                .any(|rule| rule.match_expr == existing.match_expr),
            AclRemovalPolicy::FullValue => provided.contains(existing),
        }
    }
}

/// Reconciliation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclUpdateMode {
    /// Compare with current state and apply the difference
    Diff,
    /// Add every desired rule
    Add,
    /// Remove every existing rule matching a desired one
    Remove,
}

impl AclUpdateMode {
    /// Maps the `need_compare` / `is_add` flag pair to a mode.
    pub fn from_flags(need_compare: bool, is_add: bool) -> Self {
        match (need_compare, is_add) {
            (true, _) => AclUpdateMode::Diff,
            (false, true) => AclUpdateMode::Add,
            (false, false) => AclUpdateMode::Remove,
        }
    }
}

/// An ACL currently stored, with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentAcl {
    pub uuid: Uuid,
    pub switch: String,
    pub rule: AclRule,
}

/// Current ACLs of a set of switches, grouped by owning port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclSnapshot {
    /// Switches that were found, by name
    pub switches: BTreeMap<String, RowRef>,
    /// Tagged ACLs by port
    pub by_port: BTreeMap<String, Vec<CurrentAcl>>,
    /// ACLs without a port tag
    pub untagged: Vec<CurrentAcl>,
}

impl AclSnapshot {
    /// Reads the ACLs of `switch_names`, verifying each `acls` column.
    ///
    /// Switches that do not exist are skipped.
    pub(crate) fn collect<T: StoreTxn>(txn: &mut T, switch_names: &[String]) -> NbResult<Self> {
        let snapshot = Self::read(txn, switch_names)?;
        for switch in snapshot.switches.values() {
            txn.verify(*switch, "acls")?;
        }
        Ok(snapshot)
    }

    /// Reads the ACLs of `switch_names`. Switches that do not exist are
    /// skipped.
    pub(crate) fn read<T: StoreRead>(txn: &T, switch_names: &[String]) -> NbResult<Self> {
        let mut snapshot = AclSnapshot::default();
        for name in switch_names {
            let Some(switch) = find(txn, Table::LogicalSwitch, name)?.found() else {
                debug!("Switch {} not found, skipping its ACLs", name);
                continue;
            };
            snapshot.switches.insert(name.clone(), switch);
            for uuid in txn.get(switch, "acls")?.uuids() {
                let row = RowRef::new(Table::Acl, uuid);
                if !txn.exists(row) {
                    continue;
                }
                let acl = CurrentAcl {
                    uuid,
                    switch: name.clone(),
                    rule: AclRule::read(txn, row)?,
                };
                match acl.rule.port() {
                    Some(port) => snapshot
                        .by_port
                        .entry(port.to_string())
                        .or_default()
                        .push(acl),
                    None => snapshot.untagged.push(acl),
                }
            }
        }
        Ok(snapshot)
    }

    /// Rules currently attached to `port`.
    pub fn rules_for(&self, port: &str) -> Vec<&AclRule> {
        self.by_port
            .get(port)
            .map(|acls| acls.iter().map(|a| &a.rule).collect())
            .unwrap_or_default()
    }
}

/// Pending ACL changes, by switch name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclPatch {
    pub to_delete: BTreeMap<String, Vec<Uuid>>,
    pub to_add: BTreeMap<String, Vec<AclRule>>,
}

impl AclPatch {
    pub fn is_empty(&self) -> bool {
        self.to_delete.values().all(Vec::is_empty) && self.to_add.values().all(Vec::is_empty)
    }

    fn delete(&mut self, switch: &str, uuid: Uuid) {
        let list = self.to_delete.entry(switch.to_string()).or_default();
        if !list.contains(&uuid) {
            list.push(uuid);
        }
    }

    fn add(&mut self, switch: &str, rule: AclRule) {
        let list = self.to_add.entry(switch.to_string()).or_default();
        if !list.contains(&rule) {
            list.push(rule);
        }
    }
}

/// What an ACL update changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclChangeSummary {
    pub deleted: usize,
    pub added: Vec<Uuid>,
}

/// Computes the per-port difference between `snapshot` and `desired`.
///
/// Deletions are attributed to the switch the ACL is on, additions to the
/// switch of the port. Desired rules are tagged with their port first.
///
/// Additions for a port whose switch is not in the snapshot are dropped:
/// that switch's current ACLs were never read, so they cannot be compared.
pub fn compute_diff(
    snapshot: &AclSnapshot,
    ports: &[TargetPort],
    desired: &BTreeMap<String, Vec<AclRule>>,
) -> AclPatch {
    let mut patch = AclPatch::default();
    let mut seen = HashSet::new();

    for port in ports {
        if !seen.insert(port.id.as_str()) {
            continue;
        }
        let current = snapshot
            .by_port
            .get(&port.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let wanted: BTreeSet<AclRule> = desired
            .get(&port.id)
            .into_iter()
            .flatten()
            .map(|rule| rule.clone().for_port(&port.id))
            .collect();
        let have: HashSet<&AclRule> = current.iter().map(|acl| &acl.rule).collect();

        for acl in current {
            if !wanted.contains(&acl.rule) {
                patch.delete(&acl.switch, acl.uuid);
            }
        }
        if !snapshot.switches.contains_key(&port.switch) {
            if !wanted.is_empty() {
                warn!(
                    port = %port.id,
                    switch = %port.switch,
                    "Switch not reconciled, dropping ACL additions"
                );
            }
            continue;
        }
        for rule in wanted {
            if !have.contains(&rule) {
                patch.add(&port.switch, rule);
            }
        }
    }
    patch
}

/// ACL reconciliation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAcls {
    /// Switches whose ACLs are examined
    pub switches: Vec<String>,
    /// Ports whose ACLs are reconciled
    pub ports: Vec<TargetPort>,
    /// Desired rules by port id
    pub desired: BTreeMap<String, Vec<AclRule>>,
    pub mode: AclUpdateMode,
}

impl UpdateAcls {
    pub(crate) fn run<T: StoreTxn>(
        &self,
        txn: &mut T,
        policy: AclRemovalPolicy,
    ) -> NbResult<AclChangeSummary> {
        let patch = match self.mode {
            AclUpdateMode::Diff => {
                let snapshot = AclSnapshot::collect(txn, &self.switches)?;
                compute_diff(&snapshot, &self.ports, &self.desired)
            }
            AclUpdateMode::Add => self.direct_add(txn)?,
            AclUpdateMode::Remove => self.direct_remove(txn, policy)?,
        };
        debug!(
            mode = ?self.mode,
            deletes = patch.to_delete.values().map(Vec::len).sum::<usize>(),
            adds = patch.to_add.values().map(Vec::len).sum::<usize>(),
            "Applying ACL patch"
        );
        apply_patch(txn, &patch, self.mode != AclUpdateMode::Diff)
    }

    fn require_switches<T: StoreRead>(&self, txn: &T) -> NbResult<BTreeMap<String, RowRef>> {
        let mut switches = BTreeMap::new();
        for name in &self.switches {
            let row = find(txn, Table::LogicalSwitch, name)?
                .found()
                .ok_or_else(|| NbError::not_found(Table::LogicalSwitch, name.as_str()))?;
            switches.insert(name.clone(), row);
        }
        Ok(switches)
    }

    fn direct_add<T: StoreRead>(&self, txn: &T) -> NbResult<AclPatch> {
        self.require_switches(txn)?;
        let mut patch = AclPatch::default();
        for port in &self.ports {
            for rule in self.desired.get(&port.id).into_iter().flatten() {
                patch.add(&port.switch, rule.clone().for_port(&port.id));
            }
        }
        Ok(patch)
    }

    fn direct_remove<T: StoreTxn>(&self, txn: &mut T, policy: AclRemovalPolicy) -> NbResult<AclPatch> {
        let switches = self.require_switches(txn)?;
        let provided: Vec<AclRule> = self
            .desired
            .iter()
            .flat_map(|(port, rules)| rules.iter().map(move |r| r.clone().for_port(port)))
            .collect();

        let mut patch = AclPatch::default();
        for (name, switch) in switches {
            txn.verify(switch, "acls")?;
            for uuid in txn.get(switch, "acls")?.uuids() {
                let row = RowRef::new(Table::Acl, uuid);
                if !txn.exists(row) {
                    continue;
                }
                if policy.matches(&AclRule::read(txn, row)?, &provided) {
                    patch.delete(&name, uuid);
                }
            }
        }
        Ok(patch)
    }
}

/// Applies `patch`, one membership write per switch.
///
/// Switches named in the patch that do not exist are skipped, or rejected
/// with `NotFound` when `strict`.
pub(crate) fn apply_patch<T: StoreTxn>(
    txn: &mut T,
    patch: &AclPatch,
    strict: bool,
) -> NbResult<AclChangeSummary> {
    let mut summary = AclChangeSummary::default();
    let names: BTreeSet<&String> = patch.to_delete.keys().chain(patch.to_add.keys()).collect();

    for name in names {
        let Some(switch) = find(txn, Table::LogicalSwitch, name)?.found() else {
            if strict {
                return Err(NbError::not_found(Table::LogicalSwitch, name.as_str()));
            }
            warn!("Switch {} not found, dropping its ACL changes", name);
            continue;
        };
        let mut acls = ListColumn::read(txn, switch, "acls")?;

        for uuid in patch.to_delete.get(name).into_iter().flatten() {
            if !acls.remove(&Value::Uuid(*uuid)) {
                return Err(NbError::inconsistent(
                    Table::LogicalSwitch,
                    name.as_str(),
                    format!("missing acl {}", uuid),
                ));
            }
            let row = RowRef::new(Table::Acl, *uuid);
            if !txn.exists(row) {
                return Err(NbError::inconsistent(
                    Table::LogicalSwitch,
                    name.as_str(),
                    format!("acl {} is also listed by another switch", uuid),
                ));
            }
            txn.delete(row)?;
            summary.deleted += 1;
        }

        for rule in patch.to_add.get(name).into_iter().flatten() {
            let row = txn.insert(Table::Acl);
            rule.write(txn, row)?;
            acls.push(Value::Uuid(row.uuid));
            summary.added.push(row.uuid);
        }

        acls.write(txn)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovn_nb_store::{MemoryStore, RowStore};
    use pretty_assertions::assert_eq;

    fn rule(priority: i64, m: &str) -> AclRule {
        AclRule::new(priority, "from-lport", m, "allow-related")
    }

    fn current(uuid: Uuid, switch: &str, port: &str, r: AclRule) -> CurrentAcl {
        CurrentAcl {
            uuid,
            switch: switch.to_string(),
            rule: r.for_port(port),
        }
    }

    fn snapshot_of(switches: &[&str]) -> AclSnapshot {
        let mut snapshot = AclSnapshot::default();
        for name in switches {
            snapshot.switches.insert(
                name.to_string(),
                RowRef::new(Table::LogicalSwitch, Uuid::new_v4()),
            );
        }
        snapshot
    }

    #[test]
    fn test_diff_keeps_common_rules() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut snapshot = snapshot_of(&["sw1"]);
        snapshot.by_port.insert(
            "p1".to_string(),
            vec![
                current(a, "sw1", "p1", rule(1001, "ip4")),
                current(b, "sw1", "p1", rule(1002, "ip6")),
            ],
        );
        let desired = BTreeMap::from([(
            "p1".to_string(),
            vec![rule(1002, "ip6"), rule(1003, "arp")],
        )]);

        let patch = compute_diff(&snapshot, &[TargetPort::new("p1", "sw1")], &desired);

        assert_eq!(patch.to_delete, BTreeMap::from([("sw1".to_string(), vec![a])]));
        assert_eq!(
            patch.to_add,
            BTreeMap::from([("sw1".to_string(), vec![rule(1003, "arp").for_port("p1")])])
        );
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let mut snapshot = snapshot_of(&["sw1"]);
        snapshot.by_port.insert(
            "p1".to_string(),
            vec![current(Uuid::new_v4(), "sw1", "p1", rule(1001, "ip4"))],
        );
        let desired = BTreeMap::from([("p1".to_string(), vec![rule(1001, "ip4")])]);
        let patch = compute_diff(&snapshot, &[TargetPort::new("p1", "sw1")], &desired);
        assert!(patch.is_empty());
    }

    #[test]
    fn test_diff_deduplicates_desired_and_ports() {
        let snapshot = snapshot_of(&["sw1"]);
        let desired = BTreeMap::from([(
            "p1".to_string(),
            vec![rule(1001, "ip4"), rule(1001, "ip4")],
        )]);
        let ports = [TargetPort::new("p1", "sw1"), TargetPort::new("p1", "sw1")];
        let patch = compute_diff(&snapshot, &ports, &desired);
        assert_eq!(patch.to_add["sw1"].len(), 1);
    }

    #[test]
    fn test_diff_port_without_desired_rules_clears() {
        let a = Uuid::new_v4();
        let mut snapshot = snapshot_of(&["sw1"]);
        snapshot
            .by_port
            .insert("p1".to_string(), vec![current(a, "sw1", "p1", rule(1, "ip"))]);
        let patch = compute_diff(&snapshot, &[TargetPort::new("p1", "sw1")], &BTreeMap::new());
        assert_eq!(patch.to_delete["sw1"], vec![a]);
        assert!(patch.to_add.is_empty());
    }

    #[test]
    fn test_diff_skips_additions_outside_snapshot() {
        let snapshot = snapshot_of(&["sw1"]);
        let desired = BTreeMap::from([("p1".to_string(), vec![rule(1001, "ip4")])]);
        let patch = compute_diff(&snapshot, &[TargetPort::new("p1", "sw2")], &desired);
        assert!(patch.is_empty());
    }

    #[test]
    fn test_rule_equality_ignores_map_insertion_order() {
        let one = rule(1, "ip").with_external_id("b", "2").with_external_id("a", "1");
        let two = rule(1, "ip").with_external_id("a", "1").with_external_id("b", "2");
        assert_eq!(one, two);
    }

    #[test]
    fn test_apply_patch_rejects_unlisted_acl() {
        let store = MemoryStore::new();
        let mut txn = store.begin();
        let sw = txn.insert(Table::LogicalSwitch);
        txn.set(sw, "name", Value::from("sw1")).unwrap();
        let acl = txn.insert(Table::Acl);
        rule(1001, "ip4").for_port("p1").write(&mut txn, acl).unwrap();

        let mut patch = AclPatch::default();
        patch.delete("sw1", acl.uuid);
        patch.add("sw1", rule(1002, "ip6").for_port("p1"));
        let err = apply_patch(&mut txn, &patch, true).unwrap_err();

        assert!(matches!(
            err,
            NbError::Inconsistent {
                table: Table::LogicalSwitch,
                ..
            }
        ));
        assert!(txn.exists(acl));
        assert!(txn.get(sw, "acls").unwrap().uuids().is_empty());
        assert_eq!(txn.rows(Table::Acl), vec![acl]);
    }

    #[test]
    fn test_removal_policy() {
        let existing = rule(1001, "ip4").for_port("p1");
        let provided = vec![rule(2000, "ip4").for_port("p1")];
        assert!(AclRemovalPolicy::MatchOnly.matches(&existing, &provided));
        assert!(!AclRemovalPolicy::FullValue.matches(&existing, &provided));
    }

    #[test]
    fn test_mode_from_flags() {
        assert_eq!(AclUpdateMode::from_flags(true, false), AclUpdateMode::Diff);
        assert_eq!(AclUpdateMode::from_flags(false, true), AclUpdateMode::Add);
        assert_eq!(AclUpdateMode::from_flags(false, false), AclUpdateMode::Remove);
    }

    #[test]
    fn test_rule_deserialize() {
        let rule: AclRule = serde_json::from_str(
            r#"{"priority": 1002, "direction": "to-lport", "match": "outport == \"p1\"", "action": "drop"}"#,
        )
        .unwrap();
        assert_eq!(rule.match_expr, "outport == \"p1\"");
        assert!(!rule.log);
        assert!(rule.external_ids.is_empty());
    }
}
