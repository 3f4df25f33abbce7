//! Static Northbound schema.
//!
//! Column types are checked on every write. Membership columns are marked
//! `managed`: they hold the parent/child linkage and are only written by
//! the relationship maintainer in the command layer.

use crate::value::Value;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Northbound tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    #[serde(rename = "Logical_Switch")]
    LogicalSwitch,
    #[serde(rename = "Logical_Switch_Port")]
    LogicalSwitchPort,
    #[serde(rename = "Logical_Router")]
    LogicalRouter,
    #[serde(rename = "Logical_Router_Port")]
    LogicalRouterPort,
    #[serde(rename = "Logical_Router_Static_Route")]
    LogicalRouterStaticRoute,
    #[serde(rename = "ACL")]
    Acl,
    #[serde(rename = "Logical_Port_Chain")]
    LogicalPortChain,
    #[serde(rename = "Logical_Port_Pair_Group")]
    LogicalPortPairGroup,
    #[serde(rename = "Logical_Port_Pair")]
    LogicalPortPair,
    #[serde(rename = "Logical_Flow_Classifier")]
    LogicalFlowClassifier,
    #[serde(rename = "Address_Set")]
    AddressSet,
}

impl Table {
    /// All tables in schema order.
    pub const ALL: [Table; 11] = [
        Table::LogicalSwitch,
        Table::LogicalSwitchPort,
        Table::LogicalRouter,
        Table::LogicalRouterPort,
        Table::LogicalRouterStaticRoute,
        Table::Acl,
        Table::LogicalPortChain,
        Table::LogicalPortPairGroup,
        Table::LogicalPortPair,
        Table::LogicalFlowClassifier,
        Table::AddressSet,
    ];

    /// Returns the database table name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::LogicalSwitch => "Logical_Switch",
            Table::LogicalSwitchPort => "Logical_Switch_Port",
            Table::LogicalRouter => "Logical_Router",
            Table::LogicalRouterPort => "Logical_Router_Port",
            Table::LogicalRouterStaticRoute => "Logical_Router_Static_Route",
            Table::Acl => "ACL",
            Table::LogicalPortChain => "Logical_Port_Chain",
            Table::LogicalPortPairGroup => "Logical_Port_Pair_Group",
            Table::LogicalPortPair => "Logical_Port_Pair",
            Table::LogicalFlowClassifier => "Logical_Flow_Classifier",
            Table::AddressSet => "Address_Set",
        }
    }

    /// Returns the schema of this table.
    pub fn schema(&self) -> &'static TableSchema {
        // Every variant is registered in SCHEMA.
        &SCHEMA[self]
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown table '{}'", s))
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Boolean,
    /// List of strings
    StringList,
    /// String to string map
    Map,
    /// Set of references into `table`, optionally capped at `max` members
    RefSet { table: Table, max: Option<usize> },
}

impl ColumnType {
    /// Returns true if `value` is well-typed for this column.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ColumnType::String, Value::String(_))
            | (ColumnType::Integer, Value::Integer(_))
            | (ColumnType::Boolean, Value::Boolean(_))
            | (ColumnType::Map, Value::Map(_)) => true,
            (ColumnType::StringList, Value::List(items)) => {
                items.iter().all(|v| matches!(v, Value::String(_)))
            }
            (ColumnType::RefSet { max, .. }, Value::List(items)) => {
                items.iter().all(|v| matches!(v, Value::Uuid(_)))
                    && max.map_or(true, |m| items.len() <= m)
            }
            _ => false,
        }
    }

    /// Returns the value an unset column reads as.
    pub fn default_value(&self) -> Value {
        match self {
            ColumnType::String => Value::String(String::new()),
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Boolean => Value::Boolean(false),
            ColumnType::StringList | ColumnType::RefSet { .. } => Value::empty_list(),
            ColumnType::Map => Value::empty_map(),
        }
    }

    /// Maximum number of members, for capped reference sets.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            ColumnType::RefSet { max, .. } => *max,
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => f.write_str("string"),
            ColumnType::Integer => f.write_str("integer"),
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::StringList => f.write_str("list of strings"),
            ColumnType::Map => f.write_str("string map"),
            ColumnType::RefSet { table, max: Some(m) } => {
                write!(f, "at most {} references to {}", m, table)
            }
            ColumnType::RefSet { table, max: None } => write!(f, "references to {}", table),
        }
    }
}

/// Schema of one column.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub kind: ColumnType,
    /// Membership column written only through the relationship maintainer
    pub managed: bool,
}

/// Schema of one table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: Table,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if rows of this table are addressed by `name`.
    pub fn is_named(&self) -> bool {
        self.column("name").is_some()
    }
}

fn col(name: &'static str, kind: ColumnType) -> ColumnSchema {
    ColumnSchema {
        name,
        kind,
        managed: false,
    }
}

fn members(name: &'static str, table: Table) -> ColumnSchema {
    ColumnSchema {
        name,
        kind: ColumnType::RefSet { table, max: None },
        managed: true,
    }
}

fn member(name: &'static str, table: Table) -> ColumnSchema {
    ColumnSchema {
        name,
        kind: ColumnType::RefSet {
            table,
            max: Some(1),
        },
        managed: true,
    }
}

static SCHEMA: Lazy<BTreeMap<Table, TableSchema>> = Lazy::new(|| {
    use ColumnType::*;

    let tables = vec![
        TableSchema {
            table: Table::LogicalSwitch,
            columns: vec![
                col("name", String),
                col("external_ids", Map),
                col("other_config", Map),
                members("ports", Table::LogicalSwitchPort),
                members("acls", Table::Acl),
                members("port_pairs", Table::LogicalPortPair),
                members("flow_classifiers", Table::LogicalFlowClassifier),
                members("port_chains", Table::LogicalPortChain),
            ],
        },
        TableSchema {
            table: Table::LogicalSwitchPort,
            columns: vec![
                col("name", String),
                col("type", String),
                col("options", Map),
                col("addresses", StringList),
                col("port_security", StringList),
                col("enabled", Boolean),
                col("up", Boolean),
                col("parent_name", String),
                col("tag", Integer),
                col("external_ids", Map),
            ],
        },
        TableSchema {
            table: Table::LogicalRouter,
            columns: vec![
                col("name", String),
                col("enabled", Boolean),
                col("options", Map),
                col("external_ids", Map),
                members("ports", Table::LogicalRouterPort),
                members("static_routes", Table::LogicalRouterStaticRoute),
            ],
        },
        TableSchema {
            table: Table::LogicalRouterPort,
            columns: vec![
                col("name", String),
                col("mac", String),
                col("networks", StringList),
                col("enabled", Boolean),
                col("peer", String),
                col("external_ids", Map),
            ],
        },
        TableSchema {
            table: Table::LogicalRouterStaticRoute,
            columns: vec![
                col("ip_prefix", String),
                col("nexthop", String),
                col("output_port", String),
                col("policy", String),
            ],
        },
        TableSchema {
            table: Table::Acl,
            columns: vec![
                col("priority", Integer),
                col("direction", String),
                col("match", String),
                col("action", String),
                col("log", Boolean),
                col("external_ids", Map),
            ],
        },
        TableSchema {
            table: Table::LogicalPortChain,
            columns: vec![
                col("name", String),
                member("flow_classifier", Table::LogicalFlowClassifier),
                members("port_pair_groups", Table::LogicalPortPairGroup),
                col("external_ids", Map),
            ],
        },
        TableSchema {
            table: Table::LogicalPortPairGroup,
            columns: vec![
                col("name", String),
                members("port_pairs", Table::LogicalPortPair),
                col("external_ids", Map),
            ],
        },
        TableSchema {
            table: Table::LogicalPortPair,
            columns: vec![
                col("name", String),
                col("inport", String),
                col("outport", String),
                col("external_ids", Map),
            ],
        },
        TableSchema {
            table: Table::LogicalFlowClassifier,
            columns: vec![
                col("name", String),
                col("logical_source_port", String),
                col("logical_destination_port", String),
                col("ethertype", String),
                col("protocol", String),
                col("source_ip_prefix", String),
                col("destination_ip_prefix", String),
                col("source_port_range_min", Integer),
                col("source_port_range_max", Integer),
                col("destination_port_range_min", Integer),
                col("destination_port_range_max", Integer),
                col("external_ids", Map),
            ],
        },
        TableSchema {
            table: Table::AddressSet,
            columns: vec![
                col("name", String),
                col("addresses", StringList),
                col("external_ids", Map),
            ],
        },
    ];

    tables.into_iter().map(|t| (t.table, t)).collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_has_schema() {
        for table in Table::ALL {
            assert_eq!(table.schema().table, table);
        }
    }

    #[test]
    fn test_table_from_str() {
        assert_eq!("ACL".parse::<Table>().unwrap(), Table::Acl);
        assert_eq!(
            "Logical_Switch_Port".parse::<Table>().unwrap(),
            Table::LogicalSwitchPort
        );
        assert!("Bogus".parse::<Table>().is_err());
    }

    #[test]
    fn test_named_tables() {
        assert!(Table::LogicalSwitch.schema().is_named());
        assert!(!Table::Acl.schema().is_named());
        assert!(!Table::LogicalRouterStaticRoute.schema().is_named());
    }

    #[test]
    fn test_managed_columns() {
        let schema = Table::LogicalSwitch.schema();
        assert!(schema.column("ports").unwrap().managed);
        assert!(!schema.column("external_ids").unwrap().managed);
    }

    #[test]
    fn test_ref_set_capacity() {
        let kind = Table::LogicalPortChain
            .schema()
            .column("flow_classifier")
            .unwrap()
            .kind;
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        assert_eq!(kind.capacity(), Some(1));
        assert!(kind.accepts(&Value::from(vec![a])));
        assert!(!kind.accepts(&Value::from(vec![a, b])));
    }

    #[test]
    fn test_accepts() {
        assert!(ColumnType::String.accepts(&Value::from("x")));
        assert!(!ColumnType::String.accepts(&Value::from(1i64)));
        assert!(ColumnType::StringList.accepts(&Value::strings(["a"])));
        assert!(!ColumnType::StringList.accepts(&Value::from(vec![uuid::Uuid::new_v4()])));
    }
}
