//! Schema-checked column maps.
//!
//! Commands carry their column assignments as a [`ColumnMap`]. Every entry
//! is checked against the table schema when it is added, so a command that
//! was built successfully can only fail at run time on state, never on a
//! misspelled column.

use crate::error::{NbError, NbResult};
use ovn_nb_store::{ColumnType, RowRef, StoreTxn, Table, Value};
use std::collections::BTreeMap;

/// Column assignments for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    table: Table,
    entries: BTreeMap<String, Value>,
}

impl ColumnMap {
    /// Creates an empty column map for `table`.
    pub fn new(table: Table) -> Self {
        Self {
            table,
            entries: BTreeMap::new(),
        }
    }

    /// Builder form of [`ColumnMap::insert`].
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> NbResult<Self> {
        self.insert(column, value.into())?;
        Ok(self)
    }

    /// Builds a column map from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(table: Table, pairs: I) -> NbResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut map = Self::new(table);
        for (column, value) in pairs {
            map.insert(column.as_ref(), value.into())?;
        }
        Ok(map)
    }

    /// Builds a column map from a JSON object, converting each value
    /// according to the declared column type.
    pub fn from_json(
        table: Table,
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> NbResult<Self> {
        let mut map = Self::new(table);
        for (column, json) in object {
            let schema = table
                .schema()
                .column(column)
                .ok_or_else(|| NbError::invalid_column(table, column, "unknown column"))?;
            let value = json_to_value(&schema.kind, json)
                .ok_or_else(|| NbError::invalid_column(table, column, format!("expected {}", schema.kind)))?;
            map.insert(column, value)?;
        }
        Ok(map)
    }

    /// Adds one assignment after checking it against the schema.
    ///
    /// Rejects unknown columns, ill-typed values, the `name` key column and
    /// membership columns maintained by the command layer.
    pub fn insert(&mut self, column: &str, value: Value) -> NbResult<()> {
        let table = self.table;
        let schema = table
            .schema()
            .column(column)
            .ok_or_else(|| NbError::invalid_column(table, column, "unknown column"))?;
        if column == "name" {
            return Err(NbError::invalid_column(
                table,
                column,
                "name is set by the command, not the column map",
            ));
        }
        if schema.managed {
            return Err(NbError::invalid_column(
                table,
                column,
                "membership column is maintained by the command layer",
            ));
        }
        if !schema.kind.accepts(&value) {
            return Err(NbError::invalid_column(
                table,
                column,
                format!("expected {}, got {}", schema.kind, value),
            ));
        }
        self.entries.insert(column.to_string(), value);
        Ok(())
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Writes every assignment to `row`.
    pub(crate) fn apply<T: StoreTxn>(&self, txn: &mut T, row: RowRef) -> NbResult<()> {
        for (column, value) in &self.entries {
            txn.set(row, column, value.clone())?;
        }
        Ok(())
    }
}

fn json_to_value(kind: &ColumnType, json: &serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;

    match (kind, json) {
        (ColumnType::String, Json::String(s)) => Some(Value::String(s.clone())),
        (ColumnType::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
        (ColumnType::Boolean, Json::Bool(b)) => Some(Value::Boolean(*b)),
        (ColumnType::StringList, Json::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(|s| Value::String(s.to_string())))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        (ColumnType::Map, Json::Object(entries)) => entries
            .iter()
            .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect::<Option<BTreeMap<_, _>>>()
            .map(Value::Map),
        _ => None,
    }
}
