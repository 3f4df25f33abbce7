//! JSON batch files.
//!
//! A batch is a JSON array of operations, each tagged with `op`:
//!
//! ```json
//! [
//!   {"op": "create", "entity": "switch", "name": "neutron-net1"},
//!   {"op": "create", "entity": "switch_port", "name": "p1",
//!    "parent": "neutron-net1", "columns": {"addresses": ["unknown"]}}
//! ]
//! ```
//!
//! Operations go through the same [`NbApi`] factories as library callers,
//! so argument checks are identical.

use crate::acl::{AclRule, TargetPort};
use crate::api::{DeleteBy, NbApi};
use crate::columns::ColumnMap;
use crate::command::Command;
use crate::entity::Entity;
use crate::error::NbResult;
use ovn_nb_store::{RowStore, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type JsonObject = serde_json::Map<String, serde_json::Value>;

/// One operation of a batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOp {
    Create {
        entity: Entity,
        name: String,
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        link: Option<String>,
        #[serde(default)]
        may_exist: bool,
        #[serde(default)]
        columns: JsonObject,
    },
    Set {
        entity: Entity,
        name: String,
        #[serde(default)]
        if_exists: bool,
        columns: JsonObject,
    },
    Delete {
        entity: Entity,
        name: String,
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        if_exists: bool,
    },
    SetExternalId {
        entity: Entity,
        name: String,
        key: String,
        value: String,
        #[serde(default)]
        if_exists: bool,
    },
    BindRouterPort {
        switch_port: String,
        router_port: String,
    },
    AddAcl {
        switch: String,
        port: String,
        columns: JsonObject,
    },
    DeleteAcls {
        switch: String,
        port: String,
        #[serde(default)]
        if_exists: bool,
    },
    UpdateAcls {
        switches: Vec<String>,
        ports: Vec<TargetPort>,
        #[serde(default)]
        desired: BTreeMap<String, Vec<AclRule>>,
        #[serde(default = "default_true")]
        need_compare: bool,
        #[serde(default = "default_true")]
        is_add: bool,
    },
    AddStaticRoute {
        router: String,
        columns: JsonObject,
    },
    DeleteStaticRoute {
        router: String,
        ip_prefix: String,
        nexthop: String,
        #[serde(default)]
        if_exists: bool,
    },
    UpdateAddressSet {
        name: String,
        #[serde(default)]
        add: Vec<String>,
        #[serde(default)]
        remove: Vec<String>,
        #[serde(default)]
        if_exists: bool,
    },
}

fn default_true() -> bool {
    true
}

impl BatchOp {
    /// Builds the command through the API factories.
    pub fn to_command<S: RowStore>(&self, api: &NbApi<S>) -> NbResult<Command> {
        match self {
            BatchOp::Create {
                entity,
                name,
                parent,
                link,
                may_exist,
                columns,
            } => api.create(
                *entity,
                name.as_str(),
                parent.as_deref(),
                link.as_deref(),
                *may_exist,
                ColumnMap::from_json(entity.table(), columns)?,
            ),
            BatchOp::Set {
                entity,
                name,
                if_exists,
                columns,
            } => api.set(
                *entity,
                name.as_str(),
                *if_exists,
                ColumnMap::from_json(entity.table(), columns)?,
            ),
            BatchOp::Delete {
                entity,
                name,
                parent,
                if_exists,
            } => api.delete(*entity, DeleteBy::name(name.as_str()), parent.as_deref(), *if_exists),
            BatchOp::SetExternalId {
                entity,
                name,
                key,
                value,
                if_exists,
            } => Ok(api.set_external_id(*entity, name.as_str(), key.as_str(), value.as_str(), *if_exists)),
            BatchOp::BindRouterPort {
                switch_port,
                router_port,
            } => Ok(api.set_router_port_in_switch_port(switch_port, router_port)),
            BatchOp::AddAcl {
                switch,
                port,
                columns,
            } => api.add_acl(switch, port, ColumnMap::from_json(Table::Acl, columns)?),
            BatchOp::DeleteAcls {
                switch,
                port,
                if_exists,
            } => Ok(api.delete_acl(switch, port, *if_exists)),
            BatchOp::UpdateAcls {
                switches,
                ports,
                desired,
                need_compare,
                is_add,
            } => Ok(api.update_acls(
                switches.clone(),
                ports.clone(),
                desired.clone(),
                *need_compare,
                *is_add,
            )),
            BatchOp::AddStaticRoute { router, columns } => api.add_static_route(
                router,
                ColumnMap::from_json(Table::LogicalRouterStaticRoute, columns)?,
            ),
            BatchOp::DeleteStaticRoute {
                router,
                ip_prefix,
                nexthop,
                if_exists,
            } => Ok(api.delete_static_route(router, ip_prefix, nexthop, *if_exists)),
            BatchOp::UpdateAddressSet {
                name,
                add,
                remove,
                if_exists,
            } => Ok(api.update_address_set(name, add.clone(), remove.clone(), *if_exists)),
        }
    }
}

/// Parses a batch document.
pub fn parse_batch(json: &str) -> NbResult<Vec<BatchOp>> {
    Ok(serde_json::from_str(json)?)
}

/// Builds every command of a batch, stopping at the first invalid one.
pub fn build_commands<S: RowStore>(api: &NbApi<S>, ops: &[BatchOp]) -> NbResult<Vec<Command>> {
    ops.iter().map(|op| op.to_command(api)).collect()
}
