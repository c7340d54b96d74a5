//! Test fixtures and collection helpers.
//!
//! Provides a conventional "node" collection (integer `id`, scalar `status`,
//! array `tags`) and helpers to seed remotes and build managers over it.

use crate::remote::InMemoryRemote;
use livelist_engine::{CollectionConfig, CollectionManager, Entity, EntityKey};
use serde_json::{json, Value};
use std::sync::Arc;

/// Handler name of the fixture collection.
pub const NODE_HANDLER: &str = "node";

/// Primary-key field of the fixture collection.
pub const NODE_PK: &str = "id";

/// Attributes tracked by the fixture collection.
pub const NODE_ATTRIBUTES: [&str; 2] = ["status", "tags"];

/// Configuration of the fixture collection.
pub fn node_config() -> CollectionConfig {
    CollectionConfig::new(NODE_HANDLER, NODE_PK).with_metadata_attributes(NODE_ATTRIBUTES)
}

/// Builds a node payload.
pub fn node(id: i64, status: &str, tags: &[&str]) -> Value {
    json!({"id": id, "status": status, "tags": tags})
}

/// Decodes a payload of the fixture collection.
///
/// # Panics
///
/// Panics if the payload is not a valid node.
pub fn entity(value: Value) -> Entity {
    Entity::from_value(value, NODE_PK).expect("fixture payload must be a valid entity")
}

/// Shorthand for an integer key.
pub fn key(id: i64) -> EntityKey {
    EntityKey::Int(id)
}

/// Creates a remote holding nodes `1..=count`, alternating between the
/// `ready` and `new` statuses.
pub fn seeded_remote(count: i64) -> InMemoryRemote {
    let remote = InMemoryRemote::new(NODE_HANDLER, NODE_PK);
    for id in 1..=count {
        let status = if id % 2 == 0 { "ready" } else { "new" };
        remote.insert(node(id, status, &["rack-a"]));
    }
    remote
}

/// Creates a manager over `remote` with the fixture configuration.
pub fn node_manager(remote: InMemoryRemote) -> Arc<CollectionManager<InMemoryRemote>> {
    Arc::new(CollectionManager::new(node_config(), remote))
}

/// Creates a manager over `remote` with a custom page size.
pub fn node_manager_with_batch(
    remote: InMemoryRemote,
    batch_size: u32,
) -> Arc<CollectionManager<InMemoryRemote>> {
    Arc::new(CollectionManager::new(
        node_config().with_batch_size(batch_size),
        remote,
    ))
}
