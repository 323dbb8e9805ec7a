//! Audited record contracts
//!
//! `Auditable` is what the recorder needs from a record; `RecordStore` is the
//! slice of the underlying store used to re-read durable state.
//! `DynamicRecord` is a schema-less record used by the file-backed store and
//! the command line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value::{AttributeValue, Attributes, PrimaryKey};
use crate::error::AuditResult;

/// A record whose changes can be audited
pub trait Auditable {
    /// Type discriminator stored as the entry's `entity_key`
    fn entity_key(&self) -> &str;

    /// Primary key stored as the entry's `entity_id`
    fn primary_key(&self) -> PrimaryKey;

    /// The record's own flat attribute set
    fn attributes(&self) -> Attributes;

    /// Declared relations, keyed by relation name
    fn relations(&self) -> Attributes {
        Attributes::new()
    }

    /// True until the record has been written to the store once
    fn is_new_record(&self) -> bool;
}

/// Store-side operations the recorder calls into
pub trait RecordStore<R: Auditable> {
    /// Replace the in-memory record with its durable state
    fn refresh(&self, record: &mut R) -> AuditResult<()>;
}

/// Value of a relation on a `DynamicRecord`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelatedKeys {
    /// Belongs-to / has-one
    One(PrimaryKey),
    /// Has-many
    Many(Vec<PrimaryKey>),
}

impl From<&RelatedKeys> for AttributeValue {
    fn from(related: &RelatedKeys) -> Self {
        match related {
            RelatedKeys::One(key) => AttributeValue::Entity(key.clone()),
            RelatedKeys::Many(keys) => AttributeValue::entities(keys.iter().cloned()),
        }
    }
}

/// A schema-less record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicRecord {
    /// Type discriminator (e.g. "User")
    pub entity_key: String,

    /// Primary key
    pub id: PrimaryKey,

    /// Column values
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// Relation name -> related record keys
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub relations: Map<String, Value>,

    #[serde(skip)]
    new_record: bool,
}

impl DynamicRecord {
    /// Create a record that has not been persisted yet
    pub fn new(entity_key: impl Into<String>, id: impl Into<PrimaryKey>) -> Self {
        Self {
            entity_key: entity_key.into(),
            id: id.into(),
            attributes: Map::new(),
            relations: Map::new(),
            new_record: true,
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder-style relation setter
    pub fn with_relation(mut self, name: impl Into<String>, related: RelatedKeys) -> Self {
        self.set_relation(name, related);
        self
    }

    /// Set a column value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Set a relation's related keys
    pub fn set_relation(&mut self, name: impl Into<String>, related: RelatedKeys) {
        let value = match &related {
            RelatedKeys::One(key) => key.to_value(),
            RelatedKeys::Many(keys) => Value::Array(keys.iter().map(PrimaryKey::to_value).collect()),
        };
        self.relations.insert(name.into(), value);
    }

    /// Mark the record as written to the store
    pub fn mark_persisted(&mut self) {
        self.new_record = false;
    }
}

impl Auditable for DynamicRecord {
    fn entity_key(&self) -> &str {
        &self.entity_key
    }

    fn primary_key(&self) -> PrimaryKey {
        self.id.clone()
    }

    fn attributes(&self) -> Attributes {
        Attributes::from_json_object(self.attributes.clone())
    }

    fn relations(&self) -> Attributes {
        self.relations
            .iter()
            .map(|(name, value)| {
                let related = serde_json::from_value::<RelatedKeys>(value.clone())
                    .map(|keys| AttributeValue::from(&keys))
                    .unwrap_or_else(|_| AttributeValue::Scalar(value.clone()));
                (name.clone(), related)
            })
            .collect()
    }

    fn is_new_record(&self) -> bool {
        self.new_record
    }
}
