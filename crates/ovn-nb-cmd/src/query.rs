//! Read-only topology queries.

use crate::acl::AclSnapshot;
use crate::error::{NbError, NbResult};
use crate::naming::{self, ext_ids};
use ovn_nb_store::{Lookup, RowRef, StoreRead, Table, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// Looks a row up by name.
pub(crate) fn find<T: StoreRead>(txn: &T, table: Table, name: &str) -> NbResult<Lookup> {
    Ok(txn.lookup(table, "name", &Value::from(name))?)
}

/// Looks a row up by name, failing with `NotFound` if absent.
pub(crate) fn require<T: StoreRead>(txn: &T, table: Table, name: &str) -> NbResult<RowRef> {
    find(txn, table, name)?
        .found()
        .ok_or_else(|| NbError::not_found(table, name))
}

fn text<T: StoreRead>(txn: &T, row: RowRef, column: &str) -> NbResult<String> {
    Ok(txn
        .get(row, column)?
        .as_str()
        .unwrap_or_default()
        .to_string())
}

fn external_ids<T: StoreRead>(txn: &T, row: RowRef) -> NbResult<BTreeMap<String, String>> {
    Ok(txn.get(row, "external_ids")?.into_map())
}

/// Live rows referenced by `row.column`.
fn member_rows<T: StoreRead>(txn: &T, row: RowRef, column: &str, table: Table) -> NbResult<Vec<RowRef>> {
    Ok(txn
        .get(row, column)?
        .uuids()
        .into_iter()
        .map(|uuid| RowRef::new(table, uuid))
        .filter(|r| txn.exists(*r))
        .collect())
}

/// A switch and the names of its ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchPorts {
    pub name: String,
    pub ports: Vec<String>,
}

/// A static route as seen by the router query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticRouteSummary {
    pub destination: String,
    pub nexthop: String,
}

/// A router with its ports and static routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterSummary {
    pub name: String,
    pub ports: Vec<String>,
    pub static_routes: Vec<StaticRouteSummary>,
}

/// Every switch with its ports, sorted by switch name.
///
/// With `managed_only`, switches without a network name tag and ports
/// without a port name tag are left out.
pub fn all_switches_with_ports<T: StoreRead>(txn: &T, managed_only: bool) -> NbResult<Vec<SwitchPorts>> {
    let mut result = Vec::new();
    for switch in txn.rows(Table::LogicalSwitch) {
        if managed_only && !external_ids(txn, switch)?.contains_key(ext_ids::NETWORK_NAME) {
            continue;
        }
        let mut ports = Vec::new();
        for port in member_rows(txn, switch, "ports", Table::LogicalSwitchPort)? {
            if managed_only && !external_ids(txn, port)?.contains_key(ext_ids::PORT_NAME) {
                continue;
            }
            ports.push(text(txn, port, "name")?);
        }
        result.push(SwitchPorts {
            name: text(txn, switch, "name")?,
            ports,
        });
    }
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

/// Every router with its ports and static routes, sorted by router name.
///
/// Router names lose their `neutron-` prefix and port names their `lrp-`
/// prefix when present.
pub fn all_routers_with_ports_and_routes<T: StoreRead>(
    txn: &T,
    managed_only: bool,
) -> NbResult<Vec<RouterSummary>> {
    let mut result = Vec::new();
    for router in txn.rows(Table::LogicalRouter) {
        if managed_only && !external_ids(txn, router)?.contains_key(ext_ids::ROUTER_NAME) {
            continue;
        }
        let mut ports = Vec::new();
        for port in member_rows(txn, router, "ports", Table::LogicalRouterPort)? {
            ports.push(naming::strip(
                &text(txn, port, "name")?,
                naming::LROUTER_PORT_PREFIX,
            ));
        }
        let mut static_routes = Vec::new();
        for route in member_rows(txn, router, "static_routes", Table::LogicalRouterStaticRoute)? {
            static_routes.push(StaticRouteSummary {
                destination: text(txn, route, "ip_prefix")?,
                nexthop: text(txn, route, "nexthop")?,
            });
        }
        result.push(RouterSummary {
            name: naming::strip(&text(txn, router, "name")?, naming::OVN_NAME_PREFIX),
            ports,
            static_routes,
        });
    }
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

/// Current ACLs of the named switches, grouped by port. Missing switches
/// are skipped.
pub fn acls_for_switches<T: StoreRead>(txn: &T, switch_names: &[String]) -> NbResult<AclSnapshot> {
    AclSnapshot::read(txn, switch_names)
}

/// External ids of every switch, by switch name.
pub fn all_switch_external_ids<T: StoreRead>(
    txn: &T,
) -> NbResult<BTreeMap<String, BTreeMap<String, String>>> {
    let mut result = BTreeMap::new();
    for switch in txn.rows(Table::LogicalSwitch) {
        result.insert(text(txn, switch, "name")?, external_ids(txn, switch)?);
    }
    Ok(result)
}

/// External ids of one switch.
pub fn switch_external_ids<T: StoreRead>(txn: &T, name: &str) -> NbResult<BTreeMap<String, String>> {
    let switch = require(txn, Table::LogicalSwitch, name)?;
    external_ids(txn, switch)
}

/// External ids of every switch port, by port name.
pub fn all_switch_port_external_ids<T: StoreRead>(
    txn: &T,
) -> NbResult<BTreeMap<String, BTreeMap<String, String>>> {
    let mut result = BTreeMap::new();
    for port in txn.rows(Table::LogicalSwitchPort) {
        result.insert(text(txn, port, "name")?, external_ids(txn, port)?);
    }
    Ok(result)
}
