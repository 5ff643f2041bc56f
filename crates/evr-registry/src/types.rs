//! Argument types and operation names.
//!
//! The batch-array query takes an ordered [`KeyList`]: its order is the
//! order of the response. The cascading update takes an [`UpdateMap`], which
//! is deliberately unordered; each of its pairs is validated on its own.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{RegistryError, Result};

/// Every operation the registry exposes, by dispatch name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Init,
    Register,
    RegisterWithUpdate,
    Exists,
    Query,
    QueryByKeys,
    QueryByPredicate,
    QueryByRange,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Self::Init,
        Self::Register,
        Self::RegisterWithUpdate,
        Self::Exists,
        Self::Query,
        Self::QueryByKeys,
        Self::QueryByPredicate,
        Self::QueryByRange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Register => "Register",
            Self::RegisterWithUpdate => "RegisterWithUpdate",
            Self::Exists => "Exists",
            Self::Query => "Query",
            Self::QueryByKeys => "QueryByKeys",
            Self::QueryByPredicate => "QueryByPredicate",
            Self::QueryByRange => "QueryByRange",
        }
    }

    /// Names of the positional arguments, in order.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            Self::Init => &[],
            Self::Register => &["key", "payload"],
            Self::RegisterWithUpdate => &["key", "payload", "updates"],
            Self::Exists | Self::Query => &["key"],
            Self::QueryByKeys => &["keys"],
            Self::QueryByPredicate => &["query"],
            Self::QueryByRange => &["start_key", "end_key"],
        }
    }

    /// Whether the operation stages writes.
    pub fn is_write(self) -> bool {
        matches!(self, Self::Register | Self::RegisterWithUpdate)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownOperation(s.to_string()))
    }
}

/// Ordered keys of a batch-array query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyList(Vec<String>);

impl KeyList {
    /// Parse a JSON array of strings. The literal `null` is an empty list.
    pub fn parse(op: &'static str, raw: &str) -> Result<Self> {
        serde_json::from_str::<Option<Vec<String>>>(raw)
            .map(|keys| Self(keys.unwrap_or_default()))
            .map_err(|e| RegistryError::MalformedInput {
                op,
                arg: "key array",
                reason: e.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Target key to replacement payload, for a cascading update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateMap(HashMap<String, String>);

impl UpdateMap {
    /// Parse a JSON object whose values are all strings. The literal `null`
    /// is an empty map.
    pub fn parse(op: &'static str, raw: &str) -> Result<Self> {
        serde_json::from_str::<Option<HashMap<String, String>>>(raw)
            .map(|updates| Self(updates.unwrap_or_default()))
            .map_err(|e| RegistryError::MalformedInput {
                op,
                arg: "update map",
                reason: e.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert!(matches!(
            "Delete".parse::<Operation>(),
            Err(RegistryError::UnknownOperation(name)) if name == "Delete"
        ));
    }

    #[test]
    fn only_registrations_write() {
        let writes: Vec<_> = Operation::ALL.into_iter().filter(|op| op.is_write()).collect();
        assert_eq!(writes, [Operation::Register, Operation::RegisterWithUpdate]);
    }

    #[test]
    fn key_list_keeps_order() {
        let keys = KeyList::parse("QueryByKeys", r#"["c","a","b"]"#).unwrap();
        assert_eq!(keys.iter().collect::<Vec<_>>(), ["c", "a", "b"]);
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn key_list_null_is_empty() {
        assert!(KeyList::parse("QueryByKeys", "null").unwrap().is_empty());
        assert!(KeyList::parse("QueryByKeys", " null ").unwrap().is_empty());
    }

    #[test]
    fn key_list_rejects_non_string_arrays() {
        for raw in ["not json", r#"{"a":1}"#, "[1,2]", r#""a""#] {
            assert!(matches!(
                KeyList::parse("QueryByKeys", raw),
                Err(RegistryError::MalformedInput { arg: "key array", .. })
            ));
        }
    }

    #[test]
    fn update_map_requires_string_values() {
        let map = UpdateMap::parse("RegisterWithUpdate", r#"{"k1":"v1","k2":"v2"}"#).unwrap();
        assert_eq!(map.len(), 2);
        assert!(UpdateMap::parse("RegisterWithUpdate", "{}").unwrap().is_empty());
        assert!(UpdateMap::parse("RegisterWithUpdate", "null").unwrap().is_empty());
        assert!(matches!(
            UpdateMap::parse("RegisterWithUpdate", r#"{"k1":{"nested":true}}"#),
            Err(RegistryError::MalformedInput { arg: "update map", .. })
        ));
    }
}
