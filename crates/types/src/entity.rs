//! Editable resource snapshots and the partial change sets folded into them.
//!
//! An [`Entity`] is an opaque, insertion-ordered mapping from field name to JSON
//! value plus a stable [`EntityId`]. Edits arrive as [`ChangeSet`]s and are merged
//! shallowly: every top-level field present in the change set replaces the field
//! in the entity, and fields the entity has never seen are passed through.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the identifier field in serialized entities.
pub const ID_FIELD: &str = "id";

/// Stable identifier of a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Build an identifier, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> Result<Self, ParseEntityIdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ParseEntityIdError);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = ParseEntityIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

/// Error returned when an entity identifier is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEntityIdError;

impl fmt::Display for ParseEntityIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("entity id must not be empty")
    }
}

impl std::error::Error for ParseEntityIdError {}

/// In-memory snapshot of an editable resource (workflow, agent, ...).
///
/// Serializes flat: `{"id": "w1", "name": "A", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(flatten)]
    fields: IndexMap<String, Value>,
}

impl Entity {
    /// Create an entity with no fields besides its identifier.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            fields: IndexMap::new(),
        }
    }

    /// Create an entity from an identifier and a field map.
    ///
    /// An `id` key in `fields` is discarded; the identifier is owned by `id`.
    pub fn with_fields(id: EntityId, fields: IndexMap<String, Value>) -> Self {
        let mut entity = Self::new(id);
        entity.merge(&ChangeSet::from(fields));
        entity
    }

    /// Decode an entity from a JSON object carrying a string `id` field.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Encode the entity back into a flat JSON object.
    pub fn to_json(&self) -> Value {
        let mut object = serde_json::Map::with_capacity(self.fields.len() + 1);
        object.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Fold a change set into this entity. Later values win; `id` is never replaced.
    pub fn merge(&mut self, changes: &ChangeSet) {
        for (name, value) in changes.iter() {
            if name == ID_FIELD {
                continue;
            }
            self.fields.insert(name.clone(), value.clone());
        }
    }

    /// Return a copy of this entity with `changes` folded in.
    pub fn merged(&self, changes: &ChangeSet) -> Self {
        let mut entity = self.clone();
        entity.merge(changes);
        entity
    }
}

/// Partial mapping of field name to new value, not yet confirmed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(IndexMap<String, Value>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Fold a later change set over this one; fields from `later` win.
    pub fn absorb(&mut self, later: ChangeSet) {
        for (name, value) in later.0 {
            self.0.insert(name, value);
        }
    }

    /// Consume the change set, returning it with `later` folded on top.
    pub fn then(mut self, later: ChangeSet) -> Self {
        self.absorb(later);
        self
    }
}

impl From<IndexMap<String, Value>> for ChangeSet {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Self(fields)
    }
}

impl From<serde_json::Map<String, Value>> for ChangeSet {
    fn from(fields: serde_json::Map<String, Value>) -> Self {
        Self(fields.into_iter().collect())
    }
}

impl TryFrom<Value> for ChangeSet {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect())
    }
}
