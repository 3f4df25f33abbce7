//! Northbound API facade.
//!
//! [`NbApi`] builds commands (one factory per entity and verb), opens
//! transactions and answers read queries. It holds the shared store handle
//! and the configuration; it keeps no topology state of its own.

use crate::acl::{AclRule, AclSnapshot, AclUpdateMode, TargetPort, UpdateAcls};
use crate::columns::ColumnMap;
use crate::command::{
    AddAcl, AddStaticRoute, BindRouterPort, Command, CommandResult, CreateEntity, DeleteAcls,
    DeleteEntity, DeleteStaticRoute, ExecContext, SetEntity, SetExternalId, UpdateAddressSet,
};
use crate::config::NbConfig;
use crate::entity::Entity;
use crate::error::{NbError, NbResult};
use crate::query::{self, RouterSummary, SwitchPorts};
use crate::transaction::Transaction;
use ovn_nb_store::{RowStore, Table, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// How a delete command identifies its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteBy {
    Name(String),
    ExternalId { key: String, value: String },
}

impl DeleteBy {
    pub fn name(name: impl Into<String>) -> Self {
        DeleteBy::Name(name.into())
    }

    fn into_name(self, entity: Entity) -> NbResult<String> {
        match self {
            DeleteBy::Name(name) => Ok(name),
            DeleteBy::ExternalId { .. } => Err(NbError::unsupported(format!(
                "{} can only be deleted by name",
                entity
            ))),
        }
    }
}

/// Entry point to the Northbound command layer.
pub struct NbApi<S: RowStore> {
    store: Arc<S>,
    config: NbConfig,
}

impl<S: RowStore> Clone for NbApi<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

fn check_table(columns: &ColumnMap, entity: Entity) -> NbResult<()> {
    if columns.table() != entity.table() {
        return Err(NbError::invalid_column(
            entity.table(),
            "*",
            format!("column map was built for {}", columns.table()),
        ));
    }
    Ok(())
}

impl<S: RowStore> NbApi<S> {
    /// Creates an API over `store` with default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, NbConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: NbConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &NbConfig {
        &self.config
    }

    fn context(&self) -> ExecContext {
        ExecContext {
            acl_removal: self.config.acl.direct_removal,
        }
    }

    // ----- transactions -----

    /// Opens a transaction. The store view is taken now.
    pub fn transaction(&self) -> Transaction<S> {
        Transaction::new(
            Arc::clone(&self.store),
            self.context(),
            self.config.transaction_timeout(),
            self.config.connection.log_errors,
        )
    }

    /// Runs a single command in its own transaction.
    pub async fn execute(&self, command: Command) -> NbResult<CommandResult> {
        let mut txn = self.transaction();
        txn.add(command);
        let mut results = txn.commit().await?;
        Ok(results.pop().unwrap_or(CommandResult::NoOp))
    }

    /// Builds and commits a batch, rebuilding it on conflict.
    ///
    /// `build` is called once per attempt so each attempt reflects the state
    /// current at that time.
    #[instrument(skip(self, build))]
    pub async fn commit_with_retry<F>(&self, attempts: usize, mut build: F) -> NbResult<Vec<CommandResult>>
    where
        F: FnMut(&Self) -> NbResult<Vec<Command>>,
    {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            let mut txn = self.transaction();
            txn.extend(build(self)?);
            match txn.commit().await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("Attempt {}/{} aborted, rebuilding", attempt, attempts);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // ----- generic factories -----

    /// Create command for any entity.
    pub fn create(
        &self,
        entity: Entity,
        name: impl Into<String>,
        parent: Option<&str>,
        link: Option<&str>,
        may_exist: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        check_table(&columns, entity)?;
        match (entity.parent(), parent) {
            (Some(rel), None) => {
                return Err(NbError::unsupported(format!(
                    "{} requires a parent {}",
                    entity, rel.parent
                )))
            }
            (None, Some(p)) => {
                return Err(NbError::unsupported(format!("{} has no parent, got '{}'", entity, p)))
            }
            _ => {}
        }
        if entity.link().is_none() && link.is_some() {
            return Err(NbError::unsupported(format!("{} takes no secondary membership", entity)));
        }
        Ok(Command::Create(CreateEntity {
            entity,
            name: name.into(),
            parent: parent.map(str::to_string),
            link: link.map(str::to_string),
            may_exist,
            columns,
        }))
    }

    /// Set command for any entity.
    pub fn set(
        &self,
        entity: Entity,
        name: impl Into<String>,
        if_exists: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        check_table(&columns, entity)?;
        Ok(Command::Set(SetEntity {
            entity,
            name: name.into(),
            if_exists,
            columns,
        }))
    }

    /// Delete command for any entity. Only deletion by name is supported.
    pub fn delete(
        &self,
        entity: Entity,
        by: DeleteBy,
        parent: Option<&str>,
        if_exists: bool,
    ) -> NbResult<Command> {
        let name = by.into_name(entity)?;
        if entity.parent().is_some() != parent.is_some() {
            return Err(NbError::unsupported(format!(
                "{} delete parent mismatch",
                entity
            )));
        }
        Ok(Command::Delete(DeleteEntity {
            entity,
            name,
            parent: parent.map(str::to_string),
            if_exists,
        }))
    }

    /// Merges one external id into any entity.
    pub fn set_external_id(
        &self,
        entity: Entity,
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        if_exists: bool,
    ) -> Command {
        Command::SetExternalId(SetExternalId {
            entity,
            name: name.into(),
            key: key.into(),
            value: value.into(),
            if_exists,
        })
    }

    // ----- logical switches -----

    pub fn create_switch(&self, name: &str, may_exist: bool, columns: ColumnMap) -> NbResult<Command> {
        self.create(Entity::Switch, name, None, None, may_exist, columns)
    }

    pub fn set_switch(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::Switch, name, if_exists, columns)
    }

    pub fn delete_switch(&self, by: DeleteBy, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::Switch, by, None, if_exists)
    }

    pub fn set_switch_external_id(&self, name: &str, key: &str, value: &str, if_exists: bool) -> Command {
        self.set_external_id(Entity::Switch, name, key, value, if_exists)
    }

    // ----- logical switch ports -----

    pub fn create_switch_port(
        &self,
        name: &str,
        switch: &str,
        may_exist: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        self.create(Entity::SwitchPort, name, Some(switch), None, may_exist, columns)
    }

    pub fn set_switch_port(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::SwitchPort, name, if_exists, columns)
    }

    pub fn delete_switch_port(&self, by: DeleteBy, switch: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::SwitchPort, by, Some(switch), if_exists)
    }

    /// Binds a switch port to a router port.
    pub fn set_router_port_in_switch_port(&self, switch_port: &str, router_port: &str) -> Command {
        Command::BindRouterPort(BindRouterPort {
            switch_port: switch_port.to_string(),
            router_port: router_port.to_string(),
        })
    }

    // ----- logical routers -----

    pub fn create_router(&self, name: &str, may_exist: bool, columns: ColumnMap) -> NbResult<Command> {
        self.create(Entity::Router, name, None, None, may_exist, columns)
    }

    pub fn update_router(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::Router, name, if_exists, columns)
    }

    pub fn delete_router(&self, name: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::Router, DeleteBy::name(name), None, if_exists)
    }

    // ----- logical router ports -----

    pub fn add_router_port(
        &self,
        name: &str,
        router: &str,
        may_exist: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        self.create(Entity::RouterPort, name, Some(router), None, may_exist, columns)
    }

    pub fn update_router_port(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::RouterPort, name, if_exists, columns)
    }

    pub fn delete_router_port(&self, name: &str, router: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::RouterPort, DeleteBy::name(name), Some(router), if_exists)
    }

    // ----- static routes -----

    pub fn add_static_route(&self, router: &str, columns: ColumnMap) -> NbResult<Command> {
        if columns.table() != Table::LogicalRouterStaticRoute {
            return Err(NbError::invalid_column(
                Table::LogicalRouterStaticRoute,
                "*",
                format!("column map was built for {}", columns.table()),
            ));
        }
        Ok(Command::AddStaticRoute(AddStaticRoute {
            router: router.to_string(),
            columns,
        }))
    }

    /// Removes the first route of `router` matching both `ip_prefix` and
    /// `nexthop`.
    ///
    /// A missing router or an unmatched route is a no-op with `if_exists`.
    /// Without it, either fails with `NotFound` rather than being ignored.
    pub fn delete_static_route(
        &self,
        router: &str,
        ip_prefix: &str,
        nexthop: &str,
        if_exists: bool,
    ) -> Command {
        Command::DeleteStaticRoute(DeleteStaticRoute {
            router: router.to_string(),
            ip_prefix: ip_prefix.to_string(),
            nexthop: nexthop.to_string(),
            if_exists,
        })
    }

    // ----- ACLs -----

    pub fn add_acl(&self, switch: &str, port: &str, columns: ColumnMap) -> NbResult<Command> {
        if columns.table() != Table::Acl {
            return Err(NbError::invalid_column(
                Table::Acl,
                "*",
                format!("column map was built for {}", columns.table()),
            ));
        }
        Ok(Command::AddAcl(AddAcl {
            switch: switch.to_string(),
            port: port.to_string(),
            columns,
        }))
    }

    /// Removes every ACL of `port` from `switch`.
    pub fn delete_acl(&self, switch: &str, port: &str, if_exists: bool) -> Command {
        Command::DeleteAcls(DeleteAcls {
            switch: switch.to_string(),
            port: port.to_string(),
            if_exists,
        })
    }

    /// Reconciles the ACLs of `ports`.
    ///
    /// `need_compare` selects diff mode; otherwise `is_add` chooses between
    /// adding and removing the given rules directly.
    pub fn update_acls(
        &self,
        switches: Vec<String>,
        ports: Vec<TargetPort>,
        desired: BTreeMap<String, Vec<AclRule>>,
        need_compare: bool,
        is_add: bool,
    ) -> Command {
        Command::UpdateAcls(UpdateAcls {
            switches,
            ports,
            desired,
            mode: AclUpdateMode::from_flags(need_compare, is_add),
        })
    }

    // ----- address sets -----

    pub fn create_address_set(&self, name: &str, may_exist: bool, columns: ColumnMap) -> NbResult<Command> {
        self.create(Entity::AddressSet, name, None, None, may_exist, columns)
    }

    pub fn delete_address_set(&self, name: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::AddressSet, DeleteBy::name(name), None, if_exists)
    }

    pub fn update_address_set(
        &self,
        name: &str,
        add: Vec<String>,
        remove: Vec<String>,
        if_exists: bool,
    ) -> Command {
        Command::UpdateAddressSet(UpdateAddressSet {
            name: name.to_string(),
            add,
            remove,
            if_exists,
        })
    }

    pub fn update_address_set_external_ids(
        &self,
        name: &str,
        external_ids: BTreeMap<String, String>,
        if_exists: bool,
    ) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::AddressSet).with("external_ids", Value::Map(external_ids))?;
        self.set(Entity::AddressSet, name, if_exists, columns)
    }

    // ----- service function chaining -----

    pub fn create_port_chain(
        &self,
        name: &str,
        switch: &str,
        may_exist: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        self.create(Entity::PortChain, name, Some(switch), None, may_exist, columns)
    }

    pub fn set_port_chain(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::PortChain, name, if_exists, columns)
    }

    pub fn delete_port_chain(&self, by: DeleteBy, switch: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::PortChain, by, Some(switch), if_exists)
    }

    pub fn create_port_pair_group(
        &self,
        name: &str,
        chain: &str,
        may_exist: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        self.create(Entity::PortPairGroup, name, Some(chain), None, may_exist, columns)
    }

    pub fn set_port_pair_group(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::PortPairGroup, name, if_exists, columns)
    }

    pub fn delete_port_pair_group(&self, by: DeleteBy, chain: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::PortPairGroup, by, Some(chain), if_exists)
    }

    /// Port pair on `switch`, optionally also listed in `group`.
    pub fn create_port_pair(
        &self,
        name: &str,
        switch: &str,
        group: Option<&str>,
        may_exist: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        self.create(Entity::PortPair, name, Some(switch), group, may_exist, columns)
    }

    pub fn set_port_pair(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::PortPair, name, if_exists, columns)
    }

    pub fn delete_port_pair(&self, by: DeleteBy, switch: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::PortPair, by, Some(switch), if_exists)
    }

    /// Flow classifier on `switch`, optionally bound to `chain`.
    pub fn create_flow_classifier(
        &self,
        name: &str,
        switch: &str,
        chain: Option<&str>,
        may_exist: bool,
        columns: ColumnMap,
    ) -> NbResult<Command> {
        self.create(Entity::FlowClassifier, name, Some(switch), chain, may_exist, columns)
    }

    pub fn set_flow_classifier(&self, name: &str, if_exists: bool, columns: ColumnMap) -> NbResult<Command> {
        self.set(Entity::FlowClassifier, name, if_exists, columns)
    }

    pub fn delete_flow_classifier(&self, by: DeleteBy, switch: &str, if_exists: bool) -> NbResult<Command> {
        self.delete(Entity::FlowClassifier, by, Some(switch), if_exists)
    }

    // ----- queries -----

    /// Every switch with its port names.
    pub fn all_switches_with_ports(&self) -> NbResult<Vec<SwitchPorts>> {
        let reader = self.store.reader();
        query::all_switches_with_ports(&reader, self.config.query.managed_only)
    }

    /// Every router with its port names and static routes.
    pub fn all_routers_with_ports_and_routes(&self) -> NbResult<Vec<RouterSummary>> {
        let reader = self.store.reader();
        query::all_routers_with_ports_and_routes(&reader, self.config.query.managed_only)
    }

    /// Current ACLs of the named switches, grouped by port.
    pub fn acls_for_switches(&self, switch_names: &[String]) -> NbResult<AclSnapshot> {
        let reader = self.store.reader();
        query::acls_for_switches(&reader, switch_names)
    }

    pub fn all_switch_external_ids(&self) -> NbResult<BTreeMap<String, BTreeMap<String, String>>> {
        let reader = self.store.reader();
        query::all_switch_external_ids(&reader)
    }

    pub fn switch_external_ids(&self, name: &str) -> NbResult<BTreeMap<String, String>> {
        let reader = self.store.reader();
        query::switch_external_ids(&reader, name)
    }

    pub fn all_switch_port_external_ids(&self) -> NbResult<BTreeMap<String, BTreeMap<String, String>>> {
        let reader = self.store.reader();
        query::all_switch_port_external_ids(&reader)
    }
}

impl<S: RowStore> std::fmt::Debug for NbApi<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NbApi").field("config", &self.config).finish()
    }
}

/// Logs a one-line summary of a batch outcome.
pub fn log_results(results: &[CommandResult]) {
    let inserted = results
        .iter()
        .filter(|r| matches!(r, CommandResult::Inserted(_)))
        .count();
    let noops = results
        .iter()
        .filter(|r| matches!(r, CommandResult::NoOp))
        .count();
    info!(
        "{} command(s): {} inserted, {} no-op",
        results.len(),
        inserted,
        noops
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovn_nb_store::MemoryStore;

    fn api() -> NbApi<MemoryStore> {
        NbApi::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_delete_by_external_id_unsupported() {
        let err = api()
            .delete_switch(
                DeleteBy::ExternalId {
                    key: "neutron:network_name".to_string(),
                    value: "net1".to_string(),
                },
                true,
            )
            .unwrap_err();
        assert!(matches!(err, NbError::Unsupported { .. }));
    }

    #[test]
    fn test_create_rejects_foreign_column_map() {
        let columns = ColumnMap::new(Table::LogicalRouter);
        let err = api().create_switch("sw1", false, columns).unwrap_err();
        assert!(matches!(err, NbError::InvalidColumn { .. }));
    }

    #[test]
    fn test_link_only_where_supported() {
        let api = api();
        let err = api
            .create(
                Entity::SwitchPort,
                "p1",
                Some("sw1"),
                Some("g1"),
                false,
                ColumnMap::new(Table::LogicalSwitchPort),
            )
            .unwrap_err();
        assert!(matches!(err, NbError::Unsupported { .. }));
        assert!(api
            .create_port_pair(
                "pp1",
                "sw1",
                Some("ppg1"),
                false,
                ColumnMap::new(Table::LogicalPortPair)
            )
            .is_ok());
    }

    #[test]
    fn test_update_acls_mode() {
        let cmd = api().update_acls(vec![], vec![], BTreeMap::new(), false, true);
        match cmd {
            Command::UpdateAcls(update) => assert_eq!(update.mode, AclUpdateMode::Add),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
