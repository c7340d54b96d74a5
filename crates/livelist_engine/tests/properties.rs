//! Property tests: notification replay and reconciliation.

use livelist_engine::CollectionManager;
use livelist_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn payloads(manager: &CollectionManager<InMemoryRemote>) -> Vec<Value> {
    manager
        .items()
        .iter()
        .map(|item| item.snapshot().to_value())
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// A manager over an empty remote, past its initial load.
fn loaded_empty_manager() -> Arc<CollectionManager<InMemoryRemote>> {
    let manager = node_manager(InMemoryRemote::new(NODE_HANDLER, NODE_PK));
    runtime().block_on(manager.load_items()).unwrap();
    manager
}

/// A remote collection with unique keys.
fn collection_strategy() -> impl Strategy<Value = BTreeMap<i64, Value>> {
    prop::collection::btree_map(id_strategy(), (status_strategy(), tags_strategy()), 0..8).prop_map(
        |nodes| {
            nodes
                .into_iter()
                .map(|(id, (status, tags))| (id, node(id, status, &tags)))
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn notifications_match_direct_application(ops in notification_sequence_strategy(40)) {
        let manager = loaded_empty_manager();
        let mut model = Vec::new();

        for op in &ops {
            manager.notify(op.to_pending());
            apply_direct(&mut model, op);
        }

        prop_assert_eq!(payloads(&manager), model);
        prop_assert_eq!(manager.pending_notifications(), 0);
        assert_invariants(&manager);
    }

    #[test]
    fn raw_notifications_match_decoded_ones(ops in notification_sequence_strategy(20)) {
        let decoded = loaded_empty_manager();
        let raw = loaded_empty_manager();

        for op in &ops {
            decoded.notify(op.to_pending());
            let notification = op.to_raw();
            raw.handle_notification(&notification.action, notification.data).unwrap();
        }

        prop_assert_eq!(payloads(&decoded), payloads(&raw));
        prop_assert!(decoded.metadata().same_counts(&raw.metadata()));
    }

    #[test]
    fn reload_converges_on_the_remote(
        initial in collection_strategy(),
        fetched in collection_strategy(),
        selected in prop::collection::vec(id_strategy(), 0..4),
    ) {
        let remote = InMemoryRemote::new(NODE_HANDLER, NODE_PK);
        for value in initial.values() {
            remote.insert(value.clone());
        }
        let manager = node_manager_with_batch(remote, 3);
        let rt = runtime();
        rt.block_on(manager.load_items()).unwrap();
        for id in &selected {
            manager.select_item(&key(*id));
        }
        let before = manager.items();

        for id in initial.keys() {
            manager.remote().remove(&key(*id));
        }
        for value in fetched.values() {
            manager.remote().insert(value.clone());
        }
        rt.block_on(manager.reload_items()).unwrap();

        let mut live = payloads(&manager);
        live.sort_by_key(|value| value.get(NODE_PK).and_then(Value::as_i64));
        prop_assert_eq!(live, fetched.values().cloned().collect::<Vec<_>>());

        // Survivors keep their handles and their selection
        for item in manager.items() {
            if let Some(old) = before.iter().find(|old| old.key() == item.key()) {
                prop_assert!(old.same_as(&item));
            }
            let id = item.key().to_value().as_i64().unwrap();
            prop_assert_eq!(
                manager.is_selected(item.key()),
                initial.contains_key(&id) && selected.contains(&id)
            );
        }
        assert_invariants(&manager);
    }
}
