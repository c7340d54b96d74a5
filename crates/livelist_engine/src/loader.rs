//! Paged fetching of a whole collection.

use crate::config::{CollectionConfig, RemoteMethod};
use crate::entity::Entity;
use crate::error::{SyncError, SyncResult};
use crate::remote::{ListParams, RemoteCall};
use tracing::debug;

/// Fetches the full remote collection page by page.
///
/// Each request asks for `batch_size` entities after the key of the last
/// entity received so far. A short page ends the fetch. Pages are requested
/// strictly one after another.
pub struct BatchLoader<'a, R: RemoteCall> {
    remote: &'a R,
    config: &'a CollectionConfig,
}

impl<'a, R: RemoteCall> BatchLoader<'a, R> {
    /// Creates a loader for one collection.
    pub fn new(remote: &'a R, config: &'a CollectionConfig) -> Self {
        Self { remote, config }
    }

    /// Appends every remaining remote entity to `existing` and returns it.
    ///
    /// `hook` runs once on each freshly decoded entity. If any page fails,
    /// the error is returned and the accumulated entities are dropped.
    pub async fn load_all<F>(&self, mut existing: Vec<Entity>, mut hook: F) -> SyncResult<Vec<Entity>>
    where
        F: FnMut(&mut Entity) + Send,
    {
        let method = self.config.method_name(RemoteMethod::List);
        let batch_size = self.config.batch_size as usize;

        loop {
            let start = existing.last().map(|entity| entity.key().clone());
            let params = ListParams {
                count: self.config.batch_size,
                start: start.as_ref().map(|key| key.to_value()),
            };
            debug!(
                collection = %self.config.handler,
                start = ?start,
                "requesting page"
            );

            let response = self.remote.call(&method, params.to_value()).await?;
            let mut page = Entity::from_values(response, &self.config.primary_key)?;
            let received = page.len();
            for entity in page.iter_mut() {
                hook(entity);
            }
            existing.append(&mut page);

            if received < batch_size {
                break;
            }
            if start.is_some() && existing.last().map(Entity::key) == start.as_ref() {
                return Err(SyncError::Remote(format!(
                    "{method} returned a full page without advancing past {:?}",
                    start
                )));
            }
        }

        debug!(
            collection = %self.config.handler,
            count = existing.len(),
            "fetched collection"
        );
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKey;
    use crate::remote::MockRemote;
    use serde_json::{json, Value};

    fn page(ids: std::ops::Range<i64>) -> Value {
        Value::Array(ids.map(|id| json!({"id": id})).collect())
    }

    fn config() -> CollectionConfig {
        CollectionConfig::new("node", "id").with_batch_size(3)
    }

    #[tokio::test]
    async fn fetches_until_short_page() {
        let remote = MockRemote::new();
        remote.push_response("node.list", page(1..4));
        remote.push_response("node.list", page(4..7));
        remote.push_response("node.list", page(7..8));
        let config = config();

        let entities = BatchLoader::new(&remote, &config)
            .load_all(Vec::new(), |_| {})
            .await
            .unwrap();

        let keys: Vec<EntityKey> = entities.iter().map(|e| e.key().clone()).collect();
        assert_eq!(keys, (1..8).map(EntityKey::Int).collect::<Vec<_>>());

        let calls = remote.calls_to("node.list");
        assert_eq!(
            calls,
            vec![
                json!({"count": 3}),
                json!({"count": 3, "start": 3}),
                json!({"count": 3, "start": 6}),
            ]
        );
    }

    #[tokio::test]
    async fn exact_multiple_needs_an_empty_page() {
        let remote = MockRemote::new();
        remote.push_response("node.list", page(1..4));
        remote.push_response("node.list", json!([]));
        let config = config();

        let entities = BatchLoader::new(&remote, &config)
            .load_all(Vec::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(entities.len(), 3);
        assert_eq!(remote.calls_to("node.list").len(), 2);
    }

    #[tokio::test]
    async fn hook_runs_once_per_entity() {
        let remote = MockRemote::new();
        remote.push_response("node.list", page(1..3));
        let config = config();
        let mut seen = Vec::new();

        BatchLoader::new(&remote, &config)
            .load_all(Vec::new(), |entity| seen.push(entity.key().clone()))
            .await
            .unwrap();
        assert_eq!(seen, vec![EntityKey::Int(1), EntityKey::Int(2)]);
    }

    #[tokio::test]
    async fn page_failure_fails_the_fetch() {
        let remote = MockRemote::new();
        remote.push_response("node.list", page(1..4));
        remote.push_error("node.list", SyncError::transport_retryable("timeout"));
        let config = config();

        let result = BatchLoader::new(&remote, &config)
            .load_all(Vec::new(), |_| {})
            .await;
        assert!(matches!(result, Err(SyncError::Transport { .. })));
    }

    #[tokio::test]
    async fn malformed_page_is_a_decode_error() {
        let remote = MockRemote::new();
        remote.push_response("node.list", json!([{"name": "no key"}]));
        let config = config();

        let result = BatchLoader::new(&remote, &config)
            .load_all(Vec::new(), |_| {})
            .await;
        assert!(matches!(result, Err(SyncError::Decode(_))));
    }

    #[tokio::test]
    async fn stalled_cursor_is_rejected() {
        let remote = MockRemote::new();
        remote.push_response("node.list", page(1..4));
        remote.push_response("node.list", json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        let config = config();

        let result = BatchLoader::new(&remote, &config)
            .load_all(Vec::new(), |_| {})
            .await;
        assert!(matches!(result, Err(SyncError::Remote(_))));
    }
}
