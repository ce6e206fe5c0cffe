//! Value model for candidate data
//!
//! Candidate data is loosely typed: plain JSON shapes plus the boxed
//! scalar types that show up at a persistence boundary (identifiers,
//! document references, dates). Absence is modeled as key-not-present in
//! the containing object, never as a "falsy" value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key/value container used for objects and for validation working copies.
pub type ObjectMap = BTreeMap<String, Value>;

/// A two-part reference to a document in another collection.
///
/// The `db` part is optional origin information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    /// Target collection (namespace)
    pub collection: String,
    /// Identifier of the referenced document
    pub id: Uuid,
    /// Optional database of origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
}

impl DocRef {
    /// Creates a reference into `collection` with no origin database.
    pub fn new(collection: impl Into<String>, id: Uuid) -> Self {
        Self {
            collection: collection.into(),
            id,
            db: None,
        }
    }

    /// Creates a reference carrying an origin database.
    pub fn with_db(collection: impl Into<String>, id: Uuid, db: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id,
            db: Some(db.into()),
        }
    }
}

/// A candidate value under validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null (present but empty)
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered sequence
    Array(Vec<Value>),
    /// Key/value container
    Object(ObjectMap),
    /// Canonical opaque identifier
    Id(Uuid),
    /// Reference to a document in another collection
    Ref(DocRef),
    /// Point in time (UTC)
    Date(DateTime<Utc>),
}

impl Value {
    /// Returns the runtime type tag name for error messages and checks.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Id(_) => "id",
            Value::Ref(_) => "ref",
            Value::Date(_) => "date",
        }
    }

    /// Returns true for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string slice if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object map if this is an object value.
    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the element slice if this is an array value.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Renders this value as plain JSON.
    ///
    /// Boxed scalars use their textual spellings: identifiers become
    /// hyphenated strings, dates become RFC 3339 strings and references
    /// become `{"$ref", "$id", "$db"}` objects.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => (*b).into(),
            Value::Int(i) => (*i).into(),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => s.clone().into(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(out)
            }
            Value::Id(id) => id.to_string().into(),
            Value::Ref(r) => {
                let mut out = serde_json::Map::new();
                out.insert("$ref".into(), r.collection.clone().into());
                out.insert("$id".into(), r.id.to_string().into());
                if let Some(db) = &r.db {
                    out.insert("$db".into(), db.clone().into());
                }
                serde_json::Value::Object(out)
            }
            Value::Date(d) => d.to_rfc3339().into(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
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
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Id(id)
    }
}

impl From<DocRef> for Value {
    fn from(r: DocRef) -> Self {
        Value::Ref(r)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<ObjectMap> for Value {
    fn from(map: ObjectMap) -> Self {
        Value::Object(map)
    }
}
