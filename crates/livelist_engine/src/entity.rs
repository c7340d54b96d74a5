//! Entity model.
//!
//! Remote payloads are JSON objects. They are validated once, at the point
//! where they enter the engine, and carried as [`Entity`] values from then on.
//! Entities that live in the collection are shared through [`EntityRef`]
//! handles, so that consumers holding a reference observe in-place updates.

use crate::error::{SyncError, SyncResult};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Value of an entity's primary-key field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum EntityKey {
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
}

impl EntityKey {
    /// Decodes a key from a JSON value.
    ///
    /// Only integers and strings are valid keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntityKey::Int),
            Value::String(s) => Some(EntityKey::Str(s.clone())),
            _ => None,
        }
    }

    /// Encodes the key as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            EntityKey::Int(n) => Value::from(*n),
            EntityKey::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Int(n) => write!(f, "{n}"),
            EntityKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(value: i64) -> Self {
        EntityKey::Int(value)
    }
}

impl From<&str> for EntityKey {
    fn from(value: &str) -> Self {
        EntityKey::Str(value.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(value: String) -> Self {
        EntityKey::Str(value)
    }
}

/// A single entity of a collection.
///
/// The `selected` flag is owned by the engine and is never sent to, or
/// expected from, the remote side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    #[serde(skip)]
    key: EntityKey,
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(skip)]
    selected: bool,
}

impl Entity {
    /// Decodes and validates a remote payload.
    ///
    /// The payload must be an object whose `primary_key` field is an
    /// integer or a string.
    pub fn from_value(value: Value, primary_key: &str) -> SyncResult<Self> {
        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(SyncError::Decode(format!(
                    "expected an object, got {}",
                    type_name(&other)
                )))
            }
        };

        let key = match fields.get(primary_key) {
            Some(raw) => EntityKey::from_value(raw).ok_or_else(|| {
                SyncError::Decode(format!(
                    "primary key '{primary_key}' must be an integer or string, got {}",
                    type_name(raw)
                ))
            })?,
            None => {
                return Err(SyncError::Decode(format!(
                    "missing primary key '{primary_key}'"
                )))
            }
        };

        Ok(Self {
            key,
            fields,
            selected: false,
        })
    }

    /// Decodes a JSON array of remote payloads.
    pub fn from_values(value: Value, primary_key: &str) -> SyncResult<Vec<Self>> {
        match value {
            Value::Array(values) => values
                .into_iter()
                .map(|v| Entity::from_value(v, primary_key))
                .collect(),
            other => Err(SyncError::Decode(format!(
                "expected an array, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Returns the primary key.
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns all remote fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns true if the entity is marked selected.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Encodes the remote representation (without the selection flag).
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Shared handle to an entity held by a collection.
///
/// Cloning the handle does not copy the entity: all clones observe the same
/// data. Consumers only get read access; the engine updates the entity in
/// place when the remote side changes it.
///
/// The engine writes entities while holding its own state lock, so no
/// entity lock is ever handed out: reads go through [`EntityRef::with`] or
/// [`EntityRef::snapshot`].
#[derive(Clone)]
pub struct EntityRef {
    key: EntityKey,
    inner: Arc<RwLock<Entity>>,
}

impl EntityRef {
    pub(crate) fn new(entity: Entity) -> Self {
        Self {
            key: entity.key.clone(),
            inner: Arc::new(RwLock::new(entity)),
        }
    }

    /// Returns the primary key.
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Runs `f` against the entity's current state.
    ///
    /// The entity stays locked for the duration of `f`, which must not call
    /// back into the manager that owns it.
    pub fn with<T>(&self, f: impl FnOnce(&Entity) -> T) -> T {
        f(&self.inner.read())
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.inner.read()
    }

    /// Returns a copy of the entity's current state.
    pub fn snapshot(&self) -> Entity {
        self.inner.read().clone()
    }

    /// Returns true if the entity is marked selected.
    pub fn is_selected(&self) -> bool {
        self.inner.read().selected
    }

    /// Returns true if both handles refer to the same entity object.
    pub fn same_as(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Overwrites the fields in place, keeping the selection flag.
    pub(crate) fn replace_with(&self, mut entity: Entity) {
        let mut current = self.inner.write();
        entity.selected = current.selected;
        *current = entity;
    }

    pub(crate) fn set_selected(&self, selected: bool) {
        self.inner.write().selected = selected;
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("key", &self.key)
            .field("entity", &*self.inner.read())
            .finish()
    }
}
