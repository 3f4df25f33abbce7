//! Named topology entities and their parent relationships.

use ovn_nb_store::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named topology entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Switch,
    SwitchPort,
    Router,
    RouterPort,
    PortChain,
    PortPairGroup,
    PortPair,
    FlowClassifier,
    AddressSet,
}

/// A membership column on a parent entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub parent: Entity,
    pub column: &'static str,
}

impl Entity {
    pub const ALL: [Entity; 9] = [
        Entity::Switch,
        Entity::SwitchPort,
        Entity::Router,
        Entity::RouterPort,
        Entity::PortChain,
        Entity::PortPairGroup,
        Entity::PortPair,
        Entity::FlowClassifier,
        Entity::AddressSet,
    ];

    /// Backing table.
    pub fn table(&self) -> Table {
        match self {
            Entity::Switch => Table::LogicalSwitch,
            Entity::SwitchPort => Table::LogicalSwitchPort,
            Entity::Router => Table::LogicalRouter,
            Entity::RouterPort => Table::LogicalRouterPort,
            Entity::PortChain => Table::LogicalPortChain,
            Entity::PortPairGroup => Table::LogicalPortPairGroup,
            Entity::PortPair => Table::LogicalPortPair,
            Entity::FlowClassifier => Table::LogicalFlowClassifier,
            Entity::AddressSet => Table::AddressSet,
        }
    }

    /// The owning parent, if any.
    pub fn parent(&self) -> Option<Relation> {
        let (parent, column) = match self {
            Entity::SwitchPort => (Entity::Switch, "ports"),
            Entity::RouterPort => (Entity::Router, "ports"),
            Entity::PortChain => (Entity::Switch, "port_chains"),
            Entity::PortPairGroup => (Entity::PortChain, "port_pair_groups"),
            Entity::PortPair => (Entity::Switch, "port_pairs"),
            Entity::FlowClassifier => (Entity::Switch, "flow_classifiers"),
            Entity::Switch | Entity::Router | Entity::AddressSet => return None,
        };
        Some(Relation { parent, column })
    }

    /// A secondary, non-owning membership that may be set at creation.
    pub fn link(&self) -> Option<Relation> {
        match self {
            Entity::PortPair => Some(Relation {
                parent: Entity::PortPairGroup,
                column: "port_pairs",
            }),
            Entity::FlowClassifier => Some(Relation {
                parent: Entity::PortChain,
                column: "flow_classifier",
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Entity::Switch => "logical switch",
            Entity::SwitchPort => "logical switch port",
            Entity::Router => "logical router",
            Entity::RouterPort => "logical router port",
            Entity::PortChain => "port chain",
            Entity::PortPairGroup => "port pair group",
            Entity::PortPair => "port pair",
            Entity::FlowClassifier => "flow classifier",
            Entity::AddressSet => "address set",
        };
        f.write_str(s)
    }
}

/// Returns true if `table.column` is a non-owning link rather than
/// ownership of the referenced rows.
pub(crate) fn is_link_column(table: Table, column: &str) -> bool {
    Entity::ALL
        .iter()
        .filter_map(|e| e.link())
        .any(|r| r.parent.table() == table && r.column == column)
}
