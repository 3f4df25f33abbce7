//! Typed column values.
//!
//! `Value` has no floating point variant, so it derives a total order and a
//! hash. Two rows with the same column values always compare equal, which
//! is what set-based reconciliation relies on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// UTF-8 string
    String(String),
    /// 64-bit signed integer
    Integer(i64),
    /// Boolean
    Boolean(bool),
    /// Reference to a row
    Uuid(Uuid),
    /// Ordered list (strings or row references)
    List(Vec<Value>),
    /// String to string map
    Map(BTreeMap<String, String>),
}

impl Value {
    /// Creates an empty list.
    pub fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    /// Creates an empty map.
    pub fn empty_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Creates a list of strings.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    /// Creates a map from key/value pairs.
    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Consumes the value and returns its list elements.
    ///
    /// Non-list values yield an empty vector.
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::List(items) => items,
            _ => Vec::new(),
        }
    }

    /// Consumes the value and returns its map.
    ///
    /// Non-map values yield an empty map.
    pub fn into_map(self) -> BTreeMap<String, String> {
        match self {
            Value::Map(m) => m,
            _ => BTreeMap::new(),
        }
    }

    /// Returns the row references held in a list value.
    pub fn uuids(&self) -> Vec<Uuid> {
        self.as_list()
            .map(|items| items.iter().filter_map(Value::as_uuid).collect())
            .unwrap_or_default()
    }

    /// Returns the strings held in a list value.
    pub fn string_items(&self) -> Vec<String> {
        self.as_list()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}={:?}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<Vec<Uuid>> for Value {
    fn from(ids: Vec<Uuid>) -> Self {
        Value::List(ids.into_iter().map(Value::Uuid).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(m: BTreeMap<String, String>) -> Self {
        Value::Map(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuids_from_list() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let value = Value::from(vec![a, b]);
        assert_eq!(value.uuids(), vec![a, b]);
        assert!(Value::from("x").uuids().is_empty());
    }

    #[test]
    fn test_map_ordering_is_canonical() {
        let one = Value::map([("b", "2"), ("a", "1")]);
        let two = Value::map([("a", "1"), ("b", "2")]);
        assert_eq!(one, two);
        assert_eq!(one.to_string(), "{\"a\"=\"1\", \"b\"=\"2\"}");
    }

    #[test]
    fn test_into_list_non_list() {
        assert!(Value::Integer(3).into_list().is_empty());
        assert_eq!(Value::strings(["x"]).into_list(), vec![Value::from("x")]);
    }

    #[test]
    fn test_string_items() {
        let value = Value::strings(["10.0.0.1", "10.0.0.2"]);
        assert_eq!(value.string_items(), vec!["10.0.0.1", "10.0.0.2"]);
    }
}
