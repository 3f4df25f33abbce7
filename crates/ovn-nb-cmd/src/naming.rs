//! Entity naming conventions and well-known external id keys

/// Prefix of switch and router names derived from a Neutron id
pub const OVN_NAME_PREFIX: &str = "neutron-";

/// Prefix of router port names derived from a Neutron port id
pub const LROUTER_PORT_PREFIX: &str = "lrp-";

/// Prefix of service function chaining entity names
pub const SFC_NAME_PREFIX: &str = "neutron-sfc-";

/// External id keys
pub mod ext_ids {
    /// Tag on an ACL naming the switch port it belongs to
    pub const LPORT: &str = "neutron:lport";

    /// Network name tag on managed switches
    pub const NETWORK_NAME: &str = "neutron:network_name";

    /// Port name tag on managed switch ports
    pub const PORT_NAME: &str = "neutron:port_name";

    /// Router name tag on managed routers
    pub const ROUTER_NAME: &str = "neutron:router_name";
}

/// Option key binding a switch port to a router port
pub const ROUTER_PORT_OPTION: &str = "router-port";

/// Switch port type for router-attached ports
pub const ROUTER_PORT_TYPE: &str = "router";

/// Switch or router name for a Neutron id.
pub fn ovn_name(id: &str) -> String {
    format!("{}{}", OVN_NAME_PREFIX, id)
}

/// Router port name for a Neutron port id.
pub fn lrouter_port_name(id: &str) -> String {
    format!("{}{}", LROUTER_PORT_PREFIX, id)
}

/// Port chain, port pair group, port pair or flow classifier name.
pub fn sfc_name(id: &str) -> String {
    format!("{}{}", SFC_NAME_PREFIX, id)
}

/// Strips `prefix` when present.
pub(crate) fn strip(name: &str, prefix: &str) -> String {
    name.strip_prefix(prefix).unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(ovn_name("net1"), "neutron-net1");
        assert_eq!(lrouter_port_name("p1"), "lrp-p1");
        assert_eq!(sfc_name("pc1"), "neutron-sfc-pc1");
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip("neutron-r1", OVN_NAME_PREFIX), "r1");
        assert_eq!(strip("r1", OVN_NAME_PREFIX), "r1");
    }
}
