//! Pending remote notifications.
//!
//! Notifications are always queued on arrival and applied strictly in
//! arrival order. While a load or reload is in flight the queue only grows;
//! it is drained once the pass has reconciled (see
//! `CollectionState::drain_if_idle`).

use crate::entity::{Entity, EntityKey};
use crate::error::{SyncError, SyncResult};
use serde_json::Value;
use std::collections::VecDeque;
use std::str::FromStr;

/// Kind of remote change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyAction {
    /// An entity was created.
    Create,
    /// An entity was updated.
    Update,
    /// An entity was deleted.
    Delete,
}

impl NotifyAction {
    /// Returns the wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyAction::Create => "create",
            NotifyAction::Update => "update",
            NotifyAction::Delete => "delete",
        }
    }
}

impl FromStr for NotifyAction {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(NotifyAction::Create),
            "update" => Ok(NotifyAction::Update),
            "delete" => Ok(NotifyAction::Delete),
            other => Err(SyncError::UnknownAction(other.to_string())),
        }
    }
}

/// A remote notification that has not been applied yet.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    /// Add a new entity.
    Create(Entity),
    /// Replace an existing entity.
    Update(Entity),
    /// Remove the entity with this key.
    Delete(EntityKey),
}

impl PendingAction {
    /// Decodes a raw `(action, data)` notification.
    ///
    /// Create and update carry the full entity. Delete carries either the
    /// bare key or an object holding the primary-key field.
    pub fn decode(action: &str, data: Value, primary_key: &str) -> SyncResult<Self> {
        match action.parse::<NotifyAction>()? {
            NotifyAction::Create => Ok(PendingAction::Create(Entity::from_value(
                data,
                primary_key,
            )?)),
            NotifyAction::Update => Ok(PendingAction::Update(Entity::from_value(
                data,
                primary_key,
            )?)),
            NotifyAction::Delete => {
                let raw = match &data {
                    Value::Object(fields) => fields.get(primary_key),
                    other => Some(other),
                };
                raw.and_then(EntityKey::from_value)
                    .map(PendingAction::Delete)
                    .ok_or_else(|| {
                        SyncError::Decode(format!("delete notification without a valid '{primary_key}'"))
                    })
            }
        }
    }

    /// Returns the action kind.
    pub fn action(&self) -> NotifyAction {
        match self {
            PendingAction::Create(_) => NotifyAction::Create,
            PendingAction::Update(_) => NotifyAction::Update,
            PendingAction::Delete(_) => NotifyAction::Delete,
        }
    }

    /// Returns the key of the affected entity.
    pub fn key(&self) -> &EntityKey {
        match self {
            PendingAction::Create(entity) | PendingAction::Update(entity) => entity.key(),
            PendingAction::Delete(key) => key,
        }
    }
}

/// FIFO of pending notifications.
#[derive(Debug, Clone, Default)]
pub struct NotificationQueue {
    pending: VecDeque<PendingAction>,
}

impl NotificationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a notification.
    pub fn enqueue(&mut self, action: PendingAction) {
        self.pending.push_back(action);
    }

    /// Removes the oldest notification.
    pub fn pop_front(&mut self) -> Option<PendingAction> {
        self.pending.pop_front()
    }

    /// Returns the number of queued notifications.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
