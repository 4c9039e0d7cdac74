//! Wire-level values and the key/value mapping exchanged with the vault.
//!
//! The provider understands four value shapes (string, number, boolean and
//! raw bytes) keyed by short attribute identifiers. [`AttributeMap`] is the
//! ordered mapping used for requests, update change sets and query results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Provider attribute identifiers.
pub mod keys {
    /// Item class discriminator.
    pub const CLASS: &str = "class";
    pub const ACCOUNT: &str = "acct";
    pub const SERVICE: &str = "svce";

    pub const ACCESS_GROUP: &str = "agrp";
    pub const DESCRIPTION: &str = "desc";
    pub const COMMENT: &str = "icmt";
    pub const CREATOR: &str = "crtr";
    pub const TYPE: &str = "type";
    pub const IS_INVISIBLE: &str = "invi";
    pub const IS_NEGATIVE: &str = "nega";
    pub const GENERIC: &str = "gena";
    pub const ACCESSIBLE: &str = "pdmn";

    pub const SERVER: &str = "srvr";
    pub const PORT: &str = "port";
    pub const PROTOCOL: &str = "ptcl";
    pub const AUTHENTICATION_TYPE: &str = "atyp";
    pub const PATH: &str = "path";
    pub const SECURITY_DOMAIN: &str = "sdmn";

    /// Encoded payload blob.
    pub const DATA: &str = "v_Data";

    /// Creation timestamp added by the provider.
    pub const CREATED_AT: &str = "cdat";
    /// Modification timestamp added by the provider.
    pub const MODIFIED_AT: &str = "mdat";

    /// Keys that address an item and must never appear in a change set.
    pub const IDENTITY: [&str; 3] = [CLASS, ACCOUNT, SERVICE];
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single attribute value as the provider stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Number(i64),
    Bool(bool),
    Data(Vec<u8>),
}

impl Value {
    /// The wire type of this value.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::String(_) => WireType::String,
            Self::Number(_) => WireType::Number,
            Self::Bool(_) => WireType::Bool,
            Self::Data(_) => WireType::Data,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Data(bytes)
    }
}

/// The shape of a [`Value`], used for decode type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    String,
    Number,
    Bool,
    Data,
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Bool => f.write_str("bool"),
            Self::Data => f.write_str("data"),
        }
    }
}

// ---------------------------------------------------------------------------
// AttributeMap
// ---------------------------------------------------------------------------

/// Ordered key/value mapping in the provider's native shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap(BTreeMap<String, Value>);

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one for `key` if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Fetch a string value, `None` if absent or of another wire type.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if every entry of `query` is present in `self` with an
    /// equal value.
    pub fn matches(&self, query: &AttributeMap) -> bool {
        query.iter().all(|(k, v)| self.get(k) == Some(v))
    }

    /// Overwrite entries of `self` with every entry of `changes`.
    pub fn merge(&mut self, changes: &AttributeMap) {
        for (k, v) in changes.iter() {
            self.0.insert(k.to_string(), v.clone());
        }
    }

    /// Returns `true` if any identity key (class, account, service) is present.
    pub fn touches_identity(&self) -> bool {
        keys::IDENTITY.iter().any(|k| self.contains_key(k))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
