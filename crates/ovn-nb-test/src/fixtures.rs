//! Test fixtures for common Northbound topology patterns
//!
//! Each fixture builds commands through the public API so the argument
//! checks run exactly as they do for real callers.

use ovn_nb_cmd::{naming, AclRule, ColumnMap, Command, NbApi, NbResult};
use ovn_nb_store::{RowStore, Table, Value};

/// Logical switch and switch port fixtures
pub mod switch_fixtures {
    use super::*;

    /// Switch tagged with a Neutron network name.
    pub fn tenant_switch<S: RowStore>(api: &NbApi<S>, name: &str) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::LogicalSwitch).with(
            "external_ids",
            Value::map([(naming::ext_ids::NETWORK_NAME, name)]),
        )?;
        api.create_switch(name, false, columns)
    }

    /// Untagged switch.
    pub fn bare_switch<S: RowStore>(api: &NbApi<S>, name: &str) -> NbResult<Command> {
        api.create_switch(name, false, ColumnMap::new(Table::LogicalSwitch))
    }

    /// VM port with a MAC/IP address, tagged with a Neutron port name.
    pub fn vm_port<S: RowStore>(
        api: &NbApi<S>,
        switch: &str,
        name: &str,
        address: &str,
    ) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::LogicalSwitchPort)
            .with("addresses", Value::strings([address]))?
            .with("port_security", Value::strings([address]))?
            .with(
                "external_ids",
                Value::map([(naming::ext_ids::PORT_NAME, name)]),
            )?;
        api.create_switch_port(name, switch, false, columns)
    }

    /// Port with no addresses and no tags.
    pub fn bare_port<S: RowStore>(api: &NbApi<S>, switch: &str, name: &str) -> NbResult<Command> {
        api.create_switch_port(name, switch, false, ColumnMap::new(Table::LogicalSwitchPort))
    }
}

/// Logical router fixtures
pub mod router_fixtures {
    use super::*;

    /// Router tagged with a Neutron router name, using the `neutron-` prefix.
    pub fn tenant_router<S: RowStore>(api: &NbApi<S>, id: &str) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::LogicalRouter).with(
            "external_ids",
            Value::map([(naming::ext_ids::ROUTER_NAME, id)]),
        )?;
        api.create_router(&naming::ovn_name(id), false, columns)
    }

    /// Router port on `router` (a Neutron id) with a MAC and one network.
    pub fn router_port<S: RowStore>(
        api: &NbApi<S>,
        router: &str,
        port_id: &str,
        mac: &str,
        network: &str,
    ) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::LogicalRouterPort)
            .with("mac", mac)?
            .with("networks", Value::strings([network]))?;
        api.add_router_port(
            &naming::lrouter_port_name(port_id),
            &naming::ovn_name(router),
            false,
            columns,
        )
    }

    /// Static route on `router` (a Neutron id).
    pub fn static_route<S: RowStore>(
        api: &NbApi<S>,
        router: &str,
        ip_prefix: &str,
        nexthop: &str,
    ) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::LogicalRouterStaticRoute)
            .with("ip_prefix", ip_prefix)?
            .with("nexthop", nexthop)?;
        api.add_static_route(&naming::ovn_name(router), columns)
    }
}

/// ACL rule fixtures
pub mod acl_fixtures {
    use super::*;

    /// Allow-related rule from a port to anywhere.
    pub fn allow_egress(port: &str, priority: i64, expr: &str) -> AclRule {
        AclRule::new(
            priority,
            "from-lport",
            format!("inport == \"{}\" && {}", port, expr),
            "allow-related",
        )
        .for_port(port)
    }

    /// Allow-related rule to a port.
    pub fn allow_ingress(port: &str, priority: i64, expr: &str) -> AclRule {
        AclRule::new(
            priority,
            "to-lport",
            format!("outport == \"{}\" && {}", port, expr),
            "allow-related",
        )
        .for_port(port)
    }

    /// Default drop rule to a port.
    pub fn drop_ingress(port: &str) -> AclRule {
        AclRule::new(1001, "to-lport", format!("outport == \"{}\" && ip", port), "drop").for_port(port)
    }

    /// Column map for [`NbApi::add_acl`] equivalent to `rule`.
    pub fn acl_columns(rule: &AclRule) -> NbResult<ColumnMap> {
        ColumnMap::new(Table::Acl)
            .with("priority", rule.priority)?
            .with("direction", rule.direction.as_str())?
            .with("match", rule.match_expr.as_str())?
            .with("action", rule.action.as_str())?
            .with("log", rule.log)?
            .with("external_ids", Value::Map(rule.external_ids.clone()))
    }
}

/// Service function chaining fixtures
pub mod sfc_fixtures {
    use super::*;

    /// Port chain on `switch`.
    pub fn port_chain<S: RowStore>(api: &NbApi<S>, switch: &str, id: &str) -> NbResult<Command> {
        api.create_port_chain(
            &naming::sfc_name(id),
            switch,
            false,
            ColumnMap::new(Table::LogicalPortChain),
        )
    }

    /// Port pair group in the chain `chain` (a Neutron id).
    pub fn port_pair_group<S: RowStore>(api: &NbApi<S>, chain: &str, id: &str) -> NbResult<Command> {
        api.create_port_pair_group(
            &naming::sfc_name(id),
            &naming::sfc_name(chain),
            false,
            ColumnMap::new(Table::LogicalPortPairGroup),
        )
    }

    /// Port pair on `switch`, listed in `group` (a Neutron id) when given.
    pub fn port_pair<S: RowStore>(
        api: &NbApi<S>,
        switch: &str,
        group: Option<&str>,
        id: &str,
        inport: &str,
        outport: &str,
    ) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::LogicalPortPair)
            .with("inport", inport)?
            .with("outport", outport)?;
        let group = group.map(naming::sfc_name);
        api.create_port_pair(&naming::sfc_name(id), switch, group.as_deref(), false, columns)
    }

    /// Flow classifier on `switch`, bound to `chain` (a Neutron id) when given.
    pub fn flow_classifier<S: RowStore>(
        api: &NbApi<S>,
        switch: &str,
        chain: Option<&str>,
        id: &str,
        logical_source_port: &str,
    ) -> NbResult<Command> {
        let columns = ColumnMap::new(Table::LogicalFlowClassifier)
            .with("logical_source_port", logical_source_port)?;
        let chain = chain.map(naming::sfc_name);
        api.create_flow_classifier(&naming::sfc_name(id), switch, chain.as_deref(), false, columns)
    }
}
