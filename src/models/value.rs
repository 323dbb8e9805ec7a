//! Raw attribute values read off an audited record
//!
//! These are the inputs to snapshot capture. They may still hold references
//! to other records (`AttributeValue::Entity`); normalization replaces those
//! with their primary keys.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuditError, AuditResult};

/// Primary key of an audited record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// Integer surrogate key
    Int(i64),
    /// Textual natural key
    Text(String),
    /// Multi-column key, in column order
    Composite(Map<String, Value>),
}

impl PrimaryKey {
    /// Build a composite key from `(column, value)` pairs
    pub fn composite<I, K>(columns: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Composite(columns.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// JSON form of the key, as stored in snapshots
    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Int(id) => Value::from(*id),
            PrimaryKey::Text(id) => Value::from(id.clone()),
            PrimaryKey::Composite(columns) => Value::Object(columns.clone()),
        }
    }

    /// Parse a key given on the command line: integers first, then text
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<i64>() {
            Ok(id) => PrimaryKey::Int(id),
            Err(_) => PrimaryKey::Text(s.to_string()),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(id) => write!(f, "{}", id),
            PrimaryKey::Text(id) => write!(f, "{}", id),
            PrimaryKey::Composite(columns) => write!(f, "{}", Value::Object(columns.clone())),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(id: i64) -> Self {
        PrimaryKey::Int(id)
    }
}

impl From<i32> for PrimaryKey {
    fn from(id: i32) -> Self {
        PrimaryKey::Int(i64::from(id))
    }
}

impl From<&str> for PrimaryKey {
    fn from(id: &str) -> Self {
        PrimaryKey::Text(id.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(id: String) -> Self {
        PrimaryKey::Text(id)
    }
}

/// A single attribute value as exposed by a record
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Plain JSON data (nested arrays/objects are allowed)
    Scalar(Value),
    /// Reference to another record
    Entity(PrimaryKey),
    /// Ordered collection, e.g. a has-many relation
    Sequence(Vec<AttributeValue>),
    /// Keyed collection
    Mapping(Attributes),
}

impl AttributeValue {
    /// Shorthand for a related-record reference
    pub fn entity(key: impl Into<PrimaryKey>) -> Self {
        AttributeValue::Entity(key.into())
    }

    /// A collection of related-record references
    pub fn entities<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PrimaryKey>,
    {
        AttributeValue::Sequence(keys.into_iter().map(AttributeValue::entity).collect())
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        AttributeValue::Scalar(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Scalar(Value::from(value))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Scalar(Value::from(value))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Scalar(Value::from(value))
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Scalar(Value::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Scalar(Value::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Scalar(Value::from(value))
    }
}

impl From<PrimaryKey> for AttributeValue {
    fn from(key: PrimaryKey) -> Self {
        AttributeValue::Entity(key)
    }
}

/// Insertion-ordered attribute bag
///
/// Inserting an existing name replaces the value in place, keeping the
/// original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: IndexMap<String, AttributeValue>,
}

impl Attributes {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every top-level field of a JSON object
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        object
            .into_iter()
            .map(|(k, v)| (k, AttributeValue::Scalar(v)))
            .collect()
    }

    /// Serialize a typed record into its attribute bag
    ///
    /// The value must serialize to a JSON object.
    pub fn from_serialize<T: Serialize>(record: &T) -> AuditResult<Self> {
        match serde_json::to_value(record)? {
            Value::Object(object) => Ok(Self::from_json_object(object)),
            other => Err(AuditError::Validation(format!(
                "Record must serialize to an object, got {}",
                other
            ))),
        }
    }

    /// Insert or replace an attribute
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Look up an attribute by name
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.get(name)
    }

    /// Remove an attribute, returning its value
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.entries.shift_remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate attributes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` onto this bag; `other` wins on collisions
    pub fn merge(&mut self, other: &Attributes) {
        for (name, value) in other.iter() {
            self.insert(name, value.clone());
        }
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

impl IntoIterator for Attributes {
    type Item = (String, AttributeValue);
    type IntoIter = indexmap::map::IntoIter<String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
