//! Invariant checks over a live collection.

use livelist_engine::{CollectionManager, Entity, EntityKey, MetadataIndex, RemoteCall};
use std::collections::HashSet;

/// Recomputes the metadata index from the current live list.
pub fn recompute_metadata<R: RemoteCall>(manager: &CollectionManager<R>) -> MetadataIndex {
    let snapshots: Vec<Entity> = manager.items().iter().map(|item| item.snapshot()).collect();
    MetadataIndex::rebuild(manager.config().metadata_attributes.iter().cloned(), snapshots.iter())
}

/// Asserts that the incremental metadata equals a from-scratch recomputation.
///
/// # Panics
///
/// Panics with both histograms of the first differing attribute.
pub fn assert_metadata_consistent<R: RemoteCall>(manager: &CollectionManager<R>) {
    let actual = manager.metadata();
    let expected = recompute_metadata(manager);
    for attribute in &manager.config().metadata_attributes {
        assert_eq!(
            actual.histogram(attribute),
            expected.histogram(attribute),
            "metadata for '{attribute}' drifted from the live list"
        );
    }
}

/// Asserts every structural invariant of a collection:
/// unique keys, selection membership, active membership and metadata.
///
/// # Panics
///
/// Panics on the first violated invariant.
pub fn assert_invariants<R: RemoteCall>(manager: &CollectionManager<R>) {
    let items = manager.items();

    let mut keys = HashSet::new();
    for item in &items {
        assert!(keys.insert(item.key().clone()), "duplicate key {}", item.key());
    }

    let selected = manager.selected_items();
    let selected_keys: HashSet<EntityKey> = selected.iter().map(|s| s.key().clone()).collect();
    for item in &selected {
        assert!(keys.contains(item.key()), "selected {} is not live", item.key());
        assert!(item.is_selected(), "selected {} lacks its flag", item.key());
    }
    for item in &items {
        assert_eq!(
            item.is_selected(),
            selected_keys.contains(item.key()),
            "selection flag of {} disagrees with the selection set",
            item.key()
        );
    }

    if let Some(active) = manager.active_item() {
        let live = items
            .iter()
            .find(|item| item.key() == active.key())
            .unwrap_or_else(|| panic!("active {} is not live", active.key()));
        assert!(live.same_as(&active), "active {} is a copy", active.key());
    }

    assert_metadata_consistent(manager);
}
