//! Property-based test generators using proptest.
//!
//! Keys, statuses and tags are drawn from small pools so that generated
//! notification sequences hit the same entities repeatedly: updates before
//! creates, duplicate creates, deletes of unknown keys, and so on.

use crate::fixtures::{node, NODE_PK};
use livelist_engine::{PendingAction, RawNotification};
use proptest::prelude::*;
use serde_json::Value;

const STATUSES: [&str; 4] = ["new", "ready", "deployed", ""];
const TAGS: [&str; 4] = ["x", "y", "z", "rack-a"];

/// Strategy for node ids from a small pool.
pub fn id_strategy() -> impl Strategy<Value = i64> {
    1i64..8
}

/// Strategy for a status, including the empty status.
pub fn status_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(STATUSES.to_vec())
}

/// Strategy for a tag list, possibly with duplicates.
pub fn tags_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(TAGS.to_vec()), 0..4)
}

/// Strategy for a full node payload.
pub fn node_strategy() -> impl Strategy<Value = Value> {
    (id_strategy(), status_strategy(), tags_strategy())
        .prop_map(|(id, status, tags)| node(id, status, &tags))
}

/// A generated notification.
#[derive(Debug, Clone)]
pub enum NotificationOp {
    /// Create notification carrying a payload.
    Create(Value),
    /// Update notification carrying a payload.
    Update(Value),
    /// Delete notification carrying a bare key.
    Delete(i64),
}

impl NotificationOp {
    /// Returns the raw form delivered by a transport.
    pub fn to_raw(&self) -> RawNotification {
        match self {
            NotificationOp::Create(value) => RawNotification::new("create", value.clone()),
            NotificationOp::Update(value) => RawNotification::new("update", value.clone()),
            NotificationOp::Delete(id) => RawNotification::new("delete", Value::from(*id)),
        }
    }

    /// Decodes the operation into a pending action.
    ///
    /// # Panics
    ///
    /// Never for generated operations.
    pub fn to_pending(&self) -> PendingAction {
        let raw = self.to_raw();
        PendingAction::decode(&raw.action, raw.data, NODE_PK)
            .expect("generated notifications are well formed")
    }
}

/// Strategy for a single notification.
pub fn notification_strategy() -> impl Strategy<Value = NotificationOp> {
    prop_oneof![
        node_strategy().prop_map(NotificationOp::Create),
        node_strategy().prop_map(NotificationOp::Update),
        id_strategy().prop_map(NotificationOp::Delete),
    ]
}

/// Strategy for a sequence of notifications.
pub fn notification_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<NotificationOp>> {
    prop::collection::vec(notification_strategy(), 0..max_len)
}

/// Reference model: applies an operation directly to an ordered list of
/// payloads with the same create/update/delete semantics as the engine.
pub fn apply_direct(model: &mut Vec<Value>, op: &NotificationOp) {
    let position = |model: &[Value], id: &Value| {
        model.iter().position(|item| item.get(NODE_PK) == Some(id))
    };
    match op {
        NotificationOp::Create(value) | NotificationOp::Update(value) => {
            let id = value.get(NODE_PK).cloned().unwrap_or(Value::Null);
            match position(model.as_slice(), &id) {
                Some(idx) => model[idx] = value.clone(),
                None if matches!(op, NotificationOp::Create(_)) => model.push(value.clone()),
                None => {}
            }
        }
        NotificationOp::Delete(id) => {
            if let Some(idx) = position(model.as_slice(), &Value::from(*id)) {
                model.remove(idx);
            }
        }
    }
}
