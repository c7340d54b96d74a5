//! Collection state and its mutation primitives.
//!
//! Every change to the live list goes through [`CollectionState::add_item`],
//! [`CollectionState::replace_at`] or [`CollectionState::remove_at`], which
//! update the selection, the active item and the metadata index in the same
//! step. Reconciliation and notification draining are both built on them.

use crate::config::CollectionConfig;
use crate::entity::{Entity, EntityKey, EntityRef};
use crate::metadata::{MetadataAction, MetadataIndex};
use crate::pk_index;
use crate::queue::{NotificationQueue, PendingAction};
use crate::selection::SelectionSet;
use std::time::Instant;
use tracing::{debug, warn};

/// Statistics about a collection.
#[derive(Debug, Clone, Default)]
pub struct ManagerStats {
    /// Number of completed initial loads.
    pub loads: u64,
    /// Number of completed reloads.
    pub reloads: u64,
    /// Number of entities received from list pages.
    pub entities_fetched: u64,
    /// Number of notifications applied.
    pub notifications_applied: u64,
    /// Time of the last completed load or reload.
    pub last_sync_time: Option<Instant>,
    /// Last load or reload error.
    pub last_error: Option<String>,
}

/// Everything a collection owns.
#[derive(Debug)]
pub(crate) struct CollectionState {
    pub(crate) items: Vec<EntityRef>,
    pub(crate) selection: SelectionSet,
    pub(crate) active: Option<EntityRef>,
    pub(crate) metadata: MetadataIndex,
    pub(crate) queue: NotificationQueue,
    pub(crate) loaded: bool,
    /// Number of load/reload passes currently fetching.
    pub(crate) passes_in_flight: usize,
    pub(crate) stats: ManagerStats,
}

impl CollectionState {
    pub(crate) fn new(config: &CollectionConfig) -> Self {
        Self {
            items: Vec::new(),
            selection: SelectionSet::new(),
            active: None,
            metadata: MetadataIndex::new(config.metadata_attributes.iter().cloned()),
            queue: NotificationQueue::new(),
            loaded: false,
            passes_in_flight: 0,
            stats: ManagerStats::default(),
        }
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.passes_in_flight > 0
    }

    pub(crate) fn position_of(&self, key: &EntityKey) -> Option<usize> {
        pk_index::position_of(&self.items, key)
    }

    pub(crate) fn find(&self, key: &EntityKey) -> Option<&EntityRef> {
        pk_index::find(&self.items, key)
    }

    /// Appends a new entity, unselected.
    ///
    /// An entity whose key is already present replaces the existing one
    /// instead, so keys stay unique.
    pub(crate) fn add_item(&mut self, mut entity: Entity) -> EntityRef {
        if let Some(idx) = self.position_of(entity.key()) {
            warn!(key = %entity.key(), "create for a key already in the collection, replacing");
            return self.replace_at(idx, entity);
        }
        entity.set_selected(false);
        self.metadata.update(&entity, MetadataAction::Create, None);
        let handle = EntityRef::new(entity);
        self.items.push(handle.clone());
        handle
    }

    /// Replaces the entity at `idx` in place, keeping its selection flag.
    ///
    /// Selection and active references share the handle, so they observe
    /// the new fields without being touched.
    pub(crate) fn replace_at(&mut self, idx: usize, entity: Entity) -> EntityRef {
        let handle = self.items[idx].clone();
        {
            let old = handle.read();
            self.metadata
                .update(&entity, MetadataAction::Update, Some(&*old));
        }
        handle.replace_with(entity);
        handle
    }

    /// Replaces the entity with the same key, if present.
    pub(crate) fn replace_item(&mut self, entity: Entity) -> Option<EntityRef> {
        let idx = self.position_of(entity.key())?;
        Some(self.replace_at(idx, entity))
    }

    /// Removes the entity at `idx` from the list, the selection and the
    /// active slot.
    pub(crate) fn remove_at(&mut self, idx: usize) -> EntityRef {
        let handle = self.items.remove(idx);
        {
            let entity = handle.read();
            self.metadata.update(&entity, MetadataAction::Delete, None);
        }
        self.selection.remove(handle.key());
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.key() == handle.key())
        {
            debug!(key = %handle.key(), "active item deleted");
            self.active = None;
        }
        handle
    }

    /// Removes the entity with `key`, if present.
    pub(crate) fn remove_item(&mut self, key: &EntityKey) -> Option<EntityRef> {
        let idx = self.position_of(key)?;
        Some(self.remove_at(idx))
    }

    /// Applies one notification.
    pub(crate) fn apply(&mut self, action: PendingAction) {
        match action {
            PendingAction::Create(entity) => {
                self.add_item(entity);
            }
            PendingAction::Update(entity) => {
                let key = entity.key().clone();
                if self.replace_item(entity).is_none() {
                    debug!(%key, "update for a key not in the collection, ignoring");
                }
            }
            PendingAction::Delete(key) => {
                if self.remove_item(&key).is_none() {
                    debug!(%key, "delete for a key not in the collection, ignoring");
                }
            }
        }
    }

    /// Applies every queued notification unless the collection has not
    /// been loaded yet or a load or reload is in flight. Returns the number
    /// applied.
    pub(crate) fn drain_if_idle(&mut self) -> usize {
        if !self.loaded {
            debug!(
                pending = self.queue.len(),
                "collection not loaded, deferring notifications"
            );
            return 0;
        }
        if self.is_loading() {
            debug!(
                pending = self.queue.len(),
                "load in progress, deferring notifications"
            );
            return 0;
        }
        let mut applied = 0;
        while let Some(action) = self.queue.pop_front() {
            self.apply(action);
            applied += 1;
        }
        if applied > 0 {
            debug!(applied, "drained notifications");
        }
        self.stats.notifications_applied += applied as u64;
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn config() -> CollectionConfig {
        CollectionConfig::new("node", "id").with_metadata_attributes(["status", "tags"])
    }

    fn entity(value: Value) -> Entity {
        Entity::from_value(value, "id").unwrap()
    }

    fn assert_metadata_consistent(state: &CollectionState) {
        let snapshots: Vec<Entity> = state.items.iter().map(EntityRef::snapshot).collect();
        let rebuilt = MetadataIndex::rebuild(["status", "tags"], snapshots.iter());
        assert!(state.metadata.same_counts(&rebuilt));
    }

    #[test]
    fn add_replace_remove() {
        let mut state = CollectionState::new(&config());
        let handle = state.add_item(entity(json!({"id": 1, "status": "new"})));
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.metadata.count("status", &json!("new")), 1);

        let replaced = state
            .replace_item(entity(json!({"id": 1, "status": "ready"})))
            .unwrap();
        assert!(replaced.same_as(&handle));
        assert_eq!(state.metadata.count("status", &json!("new")), 0);
        assert_eq!(state.metadata.count("status", &json!("ready")), 1);

        state.remove_item(&EntityKey::Int(1)).unwrap();
        assert!(state.items.is_empty());
        assert!(state.metadata.entries("status").is_empty());
    }

    #[test]
    fn duplicate_create_replaces() {
        let mut state = CollectionState::new(&config());
        let first = state.add_item(entity(json!({"id": 1, "status": "a"})));
        let second = state.add_item(entity(json!({"id": 1, "status": "b"})));
        assert!(first.same_as(&second));
        assert_eq!(state.items.len(), 1);
        assert_metadata_consistent(&state);
    }

    #[test]
    fn remove_clears_selection_and_active() {
        let mut state = CollectionState::new(&config());
        let handle = state.add_item(entity(json!({"id": 1})));
        state.add_item(entity(json!({"id": 2})));
        let items = state.items.clone();
        state.selection.select(&items, &EntityKey::Int(1));
        state.active = Some(handle);

        state.remove_item(&EntityKey::Int(1));
        assert!(state.selection.is_empty());
        assert!(state.active.is_none());
    }

    #[test]
    fn replace_keeps_selection() {
        let mut state = CollectionState::new(&config());
        state.add_item(entity(json!({"id": 1, "status": "a"})));
        let items = state.items.clone();
        state.selection.select(&items, &EntityKey::Int(1));

        state.replace_item(entity(json!({"id": 1, "status": "b"})));
        assert!(state.items[0].is_selected());
        assert_eq!(
            state.selection.selected()[0].read().get("status"),
            Some(&json!("b"))
        );
    }

    #[test]
    fn drain_waits_for_load() {
        let mut state = CollectionState::new(&config());
        state.queue.enqueue(PendingAction::Create(entity(json!({"id": 1}))));
        assert_eq!(state.drain_if_idle(), 0);
        assert!(state.items.is_empty());

        state.loaded = true;
        state.passes_in_flight = 1;
        assert_eq!(state.drain_if_idle(), 0);
        assert!(state.items.is_empty());

        state.passes_in_flight = 0;
        assert_eq!(state.drain_if_idle(), 1);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.stats.notifications_applied, 1);
    }

    #[test]
    fn update_before_create_is_tolerated() {
        let mut state = CollectionState::new(&config());
        state.apply(PendingAction::Update(entity(json!({"id": 5, "status": "x"}))));
        state.apply(PendingAction::Delete(EntityKey::Int(6)));
        assert!(state.items.is_empty());
        assert!(state.metadata.entries("status").is_empty());
    }
}
