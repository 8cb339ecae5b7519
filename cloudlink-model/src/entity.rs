use crate::error::{ModelError, ModelResult};
use crate::value::Value;
use cloudlink_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved property name for the store-assigned creation time.
pub const PROP_CREATED_AT: &str = "_createdAt";
/// Reserved property name for the store-assigned update time.
pub const PROP_UPDATED_AT: &str = "_updatedAt";
/// Reserved property name for the identity that created the entity.
pub const PROP_CREATED_BY: &str = "_createdBy";
/// Reserved property name for the identity that last updated the entity.
pub const PROP_UPDATED_BY: &str = "_updatedBy";
/// Reserved property name for the owning identity.
pub const PROP_OWNER: &str = "_owner";

/// Checks that `kind` is a bare identifier (`\w+`).
pub fn validate_kind(kind: &str) -> ModelResult<()> {
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ModelError::InvalidKind(kind.to_string()));
    }
    Ok(())
}

/// A schemaless record exchanged with the remote entity store.
///
/// Built locally with a kind and properties. The identity and audit fields
/// stay `None` until the store answers an insert or update, at which point the
/// caller receives a new `Entity` carrying them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "EntityRepr")]
pub struct Entity {
    kind_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Entity {
    /// Creates an empty entity of the given kind.
    pub fn new(kind: impl Into<String>) -> ModelResult<Self> {
        let kind_name = kind.into();
        validate_kind(&kind_name)?;
        Ok(Self {
            kind_name,
            id: None,
            created_at: None,
            updated_at: None,
            created_by: None,
            updated_by: None,
            owner: None,
            properties: BTreeMap::new(),
        })
    }

    /// The entity's kind, analogous to a table name.
    pub fn kind(&self) -> &str {
        &self.kind_name
    }

    /// Whether the store has assigned this entity an id.
    pub fn is_persisted(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets a property, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(key.into(), value.into())
    }

    /// Removes a property, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Returns a user property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_timestamp(&self, key: &str) -> Option<Timestamp> {
        self.get(key).and_then(Value::as_timestamp)
    }

    /// Resolves a property by name, including the reserved audit names
    /// (`_createdAt`, `_updatedAt`, `_createdBy`, `_updatedBy`, `_owner`).
    ///
    /// Used for filter evaluation and sorting, where audit fields behave like
    /// ordinary properties.
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            PROP_CREATED_AT => self.created_at.map(Value::Timestamp),
            PROP_UPDATED_AT => self.updated_at.map(Value::Timestamp),
            PROP_CREATED_BY => self.created_by.clone().map(Value::String),
            PROP_UPDATED_BY => self.updated_by.clone().map(Value::String),
            PROP_OWNER => self.owner.clone().map(Value::String),
            _ => self.properties.get(name).cloned(),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entity({}/{}): {} properties",
            self.kind_name,
            self.id.as_deref().unwrap_or("-"),
            self.properties.len()
        )
    }
}

/// Unvalidated wire form; deserialization goes through it so that a bad kind
/// name from the wire is rejected just like a local one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityRepr {
    kind_name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    updated_at: Option<Timestamp>,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    updated_by: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

impl TryFrom<EntityRepr> for Entity {
    type Error = ModelError;

    fn try_from(repr: EntityRepr) -> ModelResult<Self> {
        validate_kind(&repr.kind_name)?;
        Ok(Self {
            kind_name: repr.kind_name,
            id: repr.id,
            created_at: repr.created_at,
            updated_at: repr.updated_at,
            created_by: repr.created_by,
            updated_by: repr.updated_by,
            owner: repr.owner,
            properties: repr.properties,
        })
    }
}
