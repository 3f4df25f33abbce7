//! Entity commands.
//!
//! Each [`Command`] variant carries a typed payload and knows how to turn
//! itself into row mutations inside one store transaction. Commands are
//! built through the factory methods on [`crate::NbApi`], which check the
//! argument combinations up front.

use crate::acl::{AclChangeSummary, AclRemovalPolicy, UpdateAcls};
use crate::columns::ColumnMap;
use crate::entity::{Entity, Relation};
use crate::error::{NbError, NbResult};
use crate::membership::{add_member, delete_tree, remove_member, update_values, ListColumn};
use crate::naming::{ext_ids, ROUTER_PORT_OPTION, ROUTER_PORT_TYPE};
use crate::query::{find, require};
use ovn_nb_store::{RowRef, StoreTxn, Table, Value};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Settings commands consult while running.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExecContext {
    pub acl_removal: AclRemovalPolicy,
}

/// Per-command outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Row created
    Inserted(Uuid),
    /// Row updated in place
    Updated(Uuid),
    /// Number of rows deleted
    Deleted(usize),
    /// Nothing to do (`may_exist` / `if_exists` applied)
    NoOp,
    /// ACL reconciliation outcome
    Acls(AclChangeSummary),
}

/// Create a named entity, linked into its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntity {
    pub entity: Entity,
    pub name: String,
    /// Owning parent name, required for entities with a parent
    pub parent: Option<String>,
    /// Optional secondary membership (port pair group, port chain)
    pub link: Option<String>,
    pub may_exist: bool,
    pub columns: ColumnMap,
}

/// Update columns of a named entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEntity {
    pub entity: Entity,
    pub name: String,
    pub if_exists: bool,
    pub columns: ColumnMap,
}

/// Delete a named entity and everything it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntity {
    pub entity: Entity,
    pub name: String,
    pub parent: Option<String>,
    pub if_exists: bool,
}

/// Merge one key into an entity's external ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetExternalId {
    pub entity: Entity,
    pub name: String,
    pub key: String,
    pub value: String,
    pub if_exists: bool,
}

/// Attach a switch port to a router port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRouterPort {
    pub switch_port: String,
    pub router_port: String,
}

/// Add one ACL for a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddAcl {
    pub switch: String,
    pub port: String,
    pub columns: ColumnMap,
}

/// Remove every ACL of a port from a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAcls {
    pub switch: String,
    pub port: String,
    pub if_exists: bool,
}

/// Add a static route to a router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddStaticRoute {
    pub router: String,
    pub columns: ColumnMap,
}

/// Remove the first static route matching prefix and next hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteStaticRoute {
    pub router: String,
    pub ip_prefix: String,
    pub nexthop: String,
    pub if_exists: bool,
}

/// Add and remove addresses of an address set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAddressSet {
    pub name: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub if_exists: bool,
}

/// One unit of intent, applied inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(CreateEntity),
    Set(SetEntity),
    Delete(DeleteEntity),
    SetExternalId(SetExternalId),
    BindRouterPort(BindRouterPort),
    AddAcl(AddAcl),
    DeleteAcls(DeleteAcls),
    UpdateAcls(UpdateAcls),
    AddStaticRoute(AddStaticRoute),
    DeleteStaticRoute(DeleteStaticRoute),
    UpdateAddressSet(UpdateAddressSet),
}

impl Command {
    pub(crate) fn run<T: StoreTxn>(&self, txn: &mut T, ctx: &ExecContext) -> NbResult<CommandResult> {
        match self {
            Command::Create(cmd) => cmd.run(txn),
            Command::Set(cmd) => cmd.run(txn),
            Command::Delete(cmd) => cmd.run(txn),
            Command::SetExternalId(cmd) => cmd.run(txn),
            Command::BindRouterPort(cmd) => cmd.run(txn),
            Command::AddAcl(cmd) => cmd.run(txn),
            Command::DeleteAcls(cmd) => cmd.run(txn),
            Command::UpdateAcls(cmd) => cmd.run(txn, ctx.acl_removal).map(CommandResult::Acls),
            Command::AddStaticRoute(cmd) => cmd.run(txn),
            Command::DeleteStaticRoute(cmd) => cmd.run(txn),
            Command::UpdateAddressSet(cmd) => cmd.run(txn),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Create(c) => write!(f, "create {} '{}'", c.entity, c.name),
            Command::Set(c) => write!(f, "set {} '{}'", c.entity, c.name),
            Command::Delete(c) => write!(f, "delete {} '{}'", c.entity, c.name),
            Command::SetExternalId(c) => {
                write!(f, "set external id {} on {} '{}'", c.key, c.entity, c.name)
            }
            Command::BindRouterPort(c) => {
                write!(f, "bind switch port '{}' to router port '{}'", c.switch_port, c.router_port)
            }
            Command::AddAcl(c) => write!(f, "add acl for '{}' on '{}'", c.port, c.switch),
            Command::DeleteAcls(c) => write!(f, "delete acls of '{}' on '{}'", c.port, c.switch),
            Command::UpdateAcls(c) => {
                write!(f, "update acls ({:?}) of {} port(s)", c.mode, c.ports.len())
            }
            Command::AddStaticRoute(c) => write!(f, "add static route on '{}'", c.router),
            Command::DeleteStaticRoute(c) => write!(
                f,
                "delete static route {} via {} on '{}'",
                c.ip_prefix, c.nexthop, c.router
            ),
            Command::UpdateAddressSet(c) => write!(f, "update address set '{}'", c.name),
        }
    }
}

/// Resolves `name` for an optional relation; `None` when no name is given.
fn resolve_relation<T: StoreTxn>(
    txn: &T,
    entity: Entity,
    relation: Option<Relation>,
    name: Option<&str>,
) -> NbResult<Option<(RowRef, String, &'static str)>> {
    match (relation, name) {
        (Some(rel), Some(name)) => {
            let row = require(txn, rel.parent.table(), name)?;
            Ok(Some((row, name.to_string(), rel.column)))
        }
        (None, Some(name)) => Err(NbError::unsupported(format!(
            "{} cannot be placed under '{}'",
            entity, name
        ))),
        (_, None) => Ok(None),
    }
}

impl CreateEntity {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let table = self.entity.table();
        if let (Some(rel), None) = (self.entity.parent(), &self.parent) {
            return Err(NbError::unsupported(format!(
                "{} requires a parent {}",
                self.entity, rel.parent
            )));
        }
        let parent = resolve_relation(txn, self.entity, self.entity.parent(), self.parent.as_deref())?;
        let link = resolve_relation(txn, self.entity, self.entity.link(), self.link.as_deref())?;

        if self.may_exist && find(txn, table, &self.name)?.is_found() {
            debug!("{} {} already exists", self.entity, self.name);
            return Ok(CommandResult::NoOp);
        }

        let row = txn.insert(table);
        txn.set(row, "name", Value::from(self.name.as_str()))?;
        self.columns.apply(txn, row)?;

        for (owner, owner_name, column) in parent.into_iter().chain(link) {
            add_member(txn, owner, &owner_name, column, row.uuid)?;
        }
        Ok(CommandResult::Inserted(row.uuid))
    }
}

impl SetEntity {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let table = self.entity.table();
        match find(txn, table, &self.name)?.found() {
            Some(row) => {
                self.columns.apply(txn, row)?;
                Ok(CommandResult::Updated(row.uuid))
            }
            None if self.if_exists => Ok(CommandResult::NoOp),
            None => Err(NbError::not_found(table, self.name.as_str())),
        }
    }
}

impl DeleteEntity {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let table = self.entity.table();
        let Some(row) = find(txn, table, &self.name)?.found() else {
            if self.if_exists {
                return Ok(CommandResult::NoOp);
            }
            return Err(NbError::not_found(table, self.name.as_str()));
        };

        if let Some(rel) = self.entity.parent() {
            let parent_name = self.parent.as_deref().ok_or_else(|| {
                NbError::unsupported(format!("{} requires a parent {}", self.entity, rel.parent))
            })?;
            let parent = find(txn, rel.parent.table(), parent_name)?
                .found()
                .ok_or_else(|| {
                    NbError::inconsistent(
                        table,
                        self.name.as_str(),
                        format!("parent {} '{}' does not exist", rel.parent, parent_name),
                    )
                })?;
            remove_member(txn, parent, parent_name, rel.column, row.uuid, &self.name)?;
        }

        Ok(CommandResult::Deleted(delete_tree(txn, row)?))
    }
}

impl SetExternalId {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let table = self.entity.table();
        let Some(row) = find(txn, table, &self.name)?.found() else {
            if self.if_exists {
                return Ok(CommandResult::NoOp);
            }
            return Err(NbError::not_found(table, self.name.as_str()));
        };
        txn.verify(row, "external_ids")?;
        let mut ids = txn.get(row, "external_ids")?.into_map();
        ids.insert(self.key.clone(), self.value.clone());
        txn.set(row, "external_ids", Value::Map(ids))?;
        Ok(CommandResult::Updated(row.uuid))
    }
}

impl BindRouterPort {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let row = require(txn, Table::LogicalSwitchPort, &self.switch_port)?;
        txn.set(
            row,
            "options",
            Value::map([(ROUTER_PORT_OPTION, self.router_port.as_str())]),
        )?;
        txn.set(row, "type", Value::from(ROUTER_PORT_TYPE))?;
        Ok(CommandResult::Updated(row.uuid))
    }
}

impl AddAcl {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let switch = require(txn, Table::LogicalSwitch, &self.switch)?;
        let row = txn.insert(Table::Acl);
        self.columns.apply(txn, row)?;

        let mut ids = self
            .columns
            .get("external_ids")
            .cloned()
            .map(Value::into_map)
            .unwrap_or_default();
        ids.insert(ext_ids::LPORT.to_string(), self.port.clone());
        txn.set(row, "external_ids", Value::Map(ids))?;

        add_member(txn, switch, &self.switch, "acls", row.uuid)?;
        Ok(CommandResult::Inserted(row.uuid))
    }
}

impl DeleteAcls {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let Some(switch) = find(txn, Table::LogicalSwitch, &self.switch)?.found() else {
            if self.if_exists {
                return Ok(CommandResult::NoOp);
            }
            return Err(NbError::not_found(Table::LogicalSwitch, self.switch.as_str()));
        };

        let mut acls = ListColumn::read(txn, switch, "acls")?;
        let mut deleted = 0;
        for uuid in acls.uuids() {
            let row = RowRef::new(Table::Acl, uuid);
            if !txn.exists(row) {
                continue;
            }
            let ids = txn.get(row, "external_ids")?.into_map();
            if ids.get(ext_ids::LPORT) == Some(&self.port) {
                acls.remove(&Value::Uuid(uuid));
                txn.delete(row)?;
                deleted += 1;
            }
        }
        acls.write(txn)?;
        Ok(CommandResult::Deleted(deleted))
    }
}

impl AddStaticRoute {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let router = require(txn, Table::LogicalRouter, &self.router)?;
        let row = txn.insert(Table::LogicalRouterStaticRoute);
        self.columns.apply(txn, row)?;
        add_member(txn, router, &self.router, "static_routes", row.uuid)?;
        Ok(CommandResult::Inserted(row.uuid))
    }
}

impl DeleteStaticRoute {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let Some(router) = find(txn, Table::LogicalRouter, &self.router)?.found() else {
            if self.if_exists {
                return Ok(CommandResult::NoOp);
            }
            return Err(NbError::not_found(Table::LogicalRouter, self.router.as_str()));
        };

        let mut routes = ListColumn::read(txn, router, "static_routes")?;
        let prefix = Value::from(self.ip_prefix.as_str());
        let nexthop = Value::from(self.nexthop.as_str());
        for uuid in routes.uuids() {
            let row = RowRef::new(Table::LogicalRouterStaticRoute, uuid);
            if !txn.exists(row) {
                continue;
            }
            if txn.get(row, "ip_prefix")? == prefix && txn.get(row, "nexthop")? == nexthop {
                routes.remove(&Value::Uuid(uuid));
                routes.write(txn)?;
                txn.delete(row)?;
                return Ok(CommandResult::Deleted(1));
            }
        }

        if self.if_exists {
            return Ok(CommandResult::NoOp);
        }
        Err(NbError::not_found(
            Table::LogicalRouterStaticRoute,
            format!("{} via {}", self.ip_prefix, self.nexthop),
        ))
    }
}

impl UpdateAddressSet {
    fn run<T: StoreTxn>(&self, txn: &mut T) -> NbResult<CommandResult> {
        let Some(row) = find(txn, Table::AddressSet, &self.name)?.found() else {
            if self.if_exists {
                return Ok(CommandResult::NoOp);
            }
            return Err(NbError::not_found(Table::AddressSet, self.name.as_str()));
        };
        let add: Vec<Value> = self.add.iter().map(|a| Value::from(a.as_str())).collect();
        let remove: Vec<Value> = self.remove.iter().map(|a| Value::from(a.as_str())).collect();
        update_values(txn, row, "addresses", &add, &remove)?;
        Ok(CommandResult::Updated(row.uuid))
    }
}
