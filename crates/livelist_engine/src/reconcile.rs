//! Merging a fresh snapshot into the live list.

use crate::entity::Entity;
use crate::pk_index;
use crate::state::CollectionState;
use tracing::debug;

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Entities present locally and remotely (replaced in place).
    pub updated: usize,
    /// Entities no longer present remotely.
    pub removed: usize,
    /// Entities new to the live list.
    pub added: usize,
}

/// Reconciles the live list against `fetched`, the authoritative snapshot.
///
/// The live list is walked from the end so removals do not shift the
/// indices still to be visited. Survivors keep their handle and relative
/// order; entities only in `fetched` are appended in fetch order.
pub(crate) fn reconcile(state: &mut CollectionState, mut fetched: Vec<Entity>) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    for idx in (0..state.items.len()).rev() {
        let key = state.items[idx].key().clone();
        match pk_index::position_of(&fetched, &key) {
            Some(pos) => {
                let entity = fetched.remove(pos);
                state.replace_at(idx, entity);
                summary.updated += 1;
            }
            None => {
                state.remove_at(idx);
                summary.removed += 1;
            }
        }
    }

    for entity in fetched {
        state.add_item(entity);
        summary.added += 1;
    }

    debug!(
        updated = summary.updated,
        removed = summary.removed,
        added = summary.added,
        "reconciled collection"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use crate::entity::{EntityKey, EntityRef};
    use crate::metadata::MetadataIndex;
    use serde_json::{json, Value};

    fn entity(value: Value) -> Entity {
        Entity::from_value(value, "id").unwrap()
    }

    fn state_with(items: &[Value]) -> CollectionState {
        let config = CollectionConfig::new("node", "id").with_metadata_attributes(["status"]);
        let mut state = CollectionState::new(&config);
        for item in items {
            state.add_item(entity(item.clone()));
        }
        state
    }

    fn keys(state: &CollectionState) -> Vec<EntityKey> {
        state.items.iter().map(|item| item.key().clone()).collect()
    }

    #[test]
    fn update_delete_and_append() {
        let mut state = state_with(&[
            json!({"id": "A", "status": "v1"}),
            json!({"id": "B", "status": "v1"}),
        ]);
        let a_handle = state.items[0].clone();
        let items = state.items.clone();
        state.selection.select(&items, &EntityKey::from("B"));

        let summary = reconcile(
            &mut state,
            vec![
                entity(json!({"id": "A", "status": "v2"})),
                entity(json!({"id": "C", "status": "v1"})),
            ],
        );

        assert_eq!(
            summary,
            ReconcileSummary {
                updated: 1,
                removed: 1,
                added: 1
            }
        );
        assert_eq!(keys(&state), vec![EntityKey::from("A"), EntityKey::from("C")]);
        assert!(state.items[0].same_as(&a_handle));
        assert_eq!(a_handle.read().get("status"), Some(&json!("v2")));
        assert!(state.selection.is_empty());
        assert_eq!(state.metadata.count("status", &json!("v1")), 1);
        assert_eq!(state.metadata.count("status", &json!("v2")), 1);
    }

    #[test]
    fn survivors_keep_relative_order() {
        let mut state = state_with(&[json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]);
        reconcile(
            &mut state,
            vec![entity(json!({"id": 4})), entity(json!({"id": 3})), entity(json!({"id": 1}))],
        );
        assert_eq!(
            keys(&state),
            vec![EntityKey::Int(1), EntityKey::Int(3), EntityKey::Int(4)]
        );
    }

    #[test]
    fn identical_snapshot_is_stable() {
        let mut state = state_with(&[
            json!({"id": 1, "status": "a"}),
            json!({"id": 2, "status": "b"}),
        ]);
        let before_handles = state.items.clone();
        let before_metadata = state.metadata.clone();
        let snapshot: Vec<Entity> = state.items.iter().map(EntityRef::snapshot).collect();

        let summary = reconcile(&mut state, snapshot);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.added, 0);
        assert_eq!(state.metadata, before_metadata);
        for (before, after) in before_handles.iter().zip(state.items.iter()) {
            assert!(before.same_as(after));
        }
    }

    #[test]
    fn deleting_the_active_item_clears_it() {
        let mut state = state_with(&[json!({"id": 1}), json!({"id": 2})]);
        state.active = Some(state.items[1].clone());
        reconcile(&mut state, vec![entity(json!({"id": 1}))]);
        assert!(state.active.is_none());
    }

    #[test]
    fn selection_survives_update() {
        let mut state = state_with(&[json!({"id": 1, "status": "a"})]);
        let items = state.items.clone();
        state.selection.select(&items, &EntityKey::Int(1));

        reconcile(&mut state, vec![entity(json!({"id": 1, "status": "b"}))]);
        assert!(state.items[0].is_selected());
        assert_eq!(state.selection.len(), 1);
    }

    #[test]
    fn metadata_matches_rebuild() {
        let mut state = state_with(&[
            json!({"id": 1, "status": "a"}),
            json!({"id": 2, "status": "a"}),
            json!({"id": 3, "status": "b"}),
        ]);
        reconcile(
            &mut state,
            vec![
                entity(json!({"id": 2, "status": "c"})),
                entity(json!({"id": 5, "status": "a"})),
                entity(json!({"id": 3, "status": "b"})),
            ],
        );
        let snapshots: Vec<Entity> = state.items.iter().map(EntityRef::snapshot).collect();
        let rebuilt = MetadataIndex::rebuild(["status"], snapshots.iter());
        assert!(state.metadata.same_counts(&rebuilt));
    }
}
