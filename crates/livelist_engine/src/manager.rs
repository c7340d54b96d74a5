//! The collection manager.
//!
//! [`CollectionManager`] owns one collection's live list and every structure
//! derived from it, and is the only way to change them. All methods take
//! `&self`: state sits behind a mutex that is never held across a remote
//! call, so notifications can be queued while a load is suspended.

use crate::config::{CollectionConfig, RemoteMethod};
use crate::entity::{Entity, EntityKey, EntityRef};
use crate::error::{SyncError, SyncResult};
use crate::loader::BatchLoader;
use crate::metadata::{MetadataEntry, MetadataIndex};
use crate::queue::PendingAction;
use crate::reconcile::reconcile;
use crate::remote::RemoteCall;
use crate::selection::{self, SelectOutcome};
use crate::state::{CollectionState, ManagerStats};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Keeps a local copy of a remote collection in sync.
///
/// # Example
///
/// ```rust,ignore
/// use livelist_engine::{CollectionConfig, CollectionManager};
///
/// let config = CollectionConfig::new("machine", "system_id")
///     .with_metadata_attributes(["status", "tags"]);
/// let manager = Arc::new(CollectionManager::new(config, remote));
///
/// manager.load_items().await?;
/// manager.enable_auto_reload(connection_events.subscribe());
/// let listener = manager.spawn_notification_listener(notifications);
/// ```
pub struct CollectionManager<R: RemoteCall> {
    config: CollectionConfig,
    remote: Arc<R>,
    state: Mutex<CollectionState>,
    pub(crate) auto_reload: Mutex<Option<JoinHandle<()>>>,
    pub(crate) poller: Mutex<Option<JoinHandle<()>>>,
}

/// Marks a load or reload pass as in flight for as long as it lives.
///
/// A pass that completes calls [`PassGuard::finish`] under the state lock
/// after reconciling. A pass that fails or whose future is dropped releases
/// the gate on drop, and drains whatever was queued meanwhile if the
/// collection was already loaded.
struct PassGuard<'a> {
    state: &'a Mutex<CollectionState>,
    finished: bool,
}

impl<'a> PassGuard<'a> {
    fn begin(state: &'a Mutex<CollectionState>) -> Self {
        state.lock().passes_in_flight += 1;
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self, state: &mut CollectionState) {
        state.passes_in_flight = state.passes_in_flight.saturating_sub(1);
        self.finished = true;
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.state.lock();
            state.passes_in_flight = state.passes_in_flight.saturating_sub(1);
            state.drain_if_idle();
        }
    }
}

impl<R: RemoteCall> CollectionManager<R> {
    /// Creates a manager for an empty, not yet loaded collection.
    pub fn new(config: CollectionConfig, remote: R) -> Self {
        Self::with_shared_remote(config, Arc::new(remote))
    }

    /// Creates a manager that shares its remote with other collections.
    pub fn with_shared_remote(config: CollectionConfig, remote: Arc<R>) -> Self {
        let state = CollectionState::new(&config);
        Self {
            config,
            remote,
            state: Mutex::new(state),
            auto_reload: Mutex::new(None),
            poller: Mutex::new(None),
        }
    }

    /// Returns the collection configuration.
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Returns the remote collaborator.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Returns true once the initial load has completed.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Returns true while a load or reload is fetching.
    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading()
    }

    /// Returns a snapshot of the live list.
    pub fn items(&self) -> Vec<EntityRef> {
        self.state.lock().items.clone()
    }

    /// Returns the number of entities in the live list.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if the live list is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Looks up an entity in the live list without contacting the remote.
    pub fn item(&self, key: &EntityKey) -> Option<EntityRef> {
        self.state.lock().find(key).cloned()
    }

    /// Returns a copy of the metadata index.
    pub fn metadata(&self) -> MetadataIndex {
        self.state.lock().metadata.clone()
    }

    /// Returns the metadata entries of one tracked attribute.
    pub fn metadata_entries(&self, attribute: &str) -> Vec<MetadataEntry> {
        self.state.lock().metadata.entries(attribute).to_vec()
    }

    /// Returns the number of notifications waiting to be applied.
    pub fn pending_notifications(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns the collection statistics.
    pub fn stats(&self) -> ManagerStats {
        self.state.lock().stats.clone()
    }

    /// Performs the initial load.
    ///
    /// Every page is fetched before anything is committed. Once the
    /// collection is loaded this performs a reload instead.
    pub async fn load_items(&self) -> SyncResult<Vec<EntityRef>> {
        if self.is_loaded() {
            self.reload_pass().await
        } else {
            self.load_pass().await
        }
    }

    /// Refetches the whole collection and reconciles it into the live list.
    ///
    /// Before the initial load this performs the initial load instead.
    /// Overlapping calls each fetch independently; queued notifications are
    /// applied once the last of them has reconciled.
    pub async fn reload_items(&self) -> SyncResult<Vec<EntityRef>> {
        if self.is_loaded() {
            self.reload_pass().await
        } else {
            self.load_pass().await
        }
    }

    async fn load_pass(&self) -> SyncResult<Vec<EntityRef>> {
        let guard = PassGuard::begin(&self.state);
        let result = BatchLoader::new(&*self.remote, &self.config)
            .load_all(Vec::new(), |entity| entity.set_selected(false))
            .await;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(collection = %self.config.handler, error = %err, "load failed");
                self.state.lock().stats.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let mut state = self.state.lock();
        let count = fetched.len();
        if state.loaded {
            // A concurrent pass committed first.
            reconcile(&mut state, fetched);
        } else {
            for entity in fetched {
                state.add_item(entity);
            }
            state.loaded = true;
        }
        guard.finish(&mut state);
        state.stats.loads += 1;
        state.stats.entities_fetched += count as u64;
        state.stats.last_sync_time = Some(Instant::now());
        state.stats.last_error = None;
        state.drain_if_idle();

        info!(
            collection = %self.config.handler,
            count = state.items.len(),
            "collection loaded"
        );
        Ok(state.items.clone())
    }

    async fn reload_pass(&self) -> SyncResult<Vec<EntityRef>> {
        let guard = PassGuard::begin(&self.state);
        let result = BatchLoader::new(&*self.remote, &self.config)
            .load_all(Vec::new(), |_| {})
            .await;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(collection = %self.config.handler, error = %err, "reload failed");
                self.state.lock().stats.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let (items, active_key) = {
            let mut state = self.state.lock();
            let count = fetched.len();
            let summary = reconcile(&mut state, fetched);
            guard.finish(&mut state);
            state.stats.reloads += 1;
            state.stats.entities_fetched += count as u64;
            state.stats.last_sync_time = Some(Instant::now());
            state.stats.last_error = None;
            state.drain_if_idle();

            info!(
                collection = %self.config.handler,
                updated = summary.updated,
                removed = summary.removed,
                added = summary.added,
                "collection reloaded"
            );
            (
                state.items.clone(),
                state.active.as_ref().map(|active| active.key().clone()),
            )
        };

        // The remote side forgets the active key across reconnects.
        if let Some(key) = active_key {
            if let Err(err) = self.set_active_item(&key).await {
                warn!(
                    collection = %self.config.handler,
                    %key,
                    error = %err,
                    "failed to re-mark active item after reload"
                );
            }
        }

        Ok(items)
    }

    fn key_params(&self, key: &EntityKey) -> Value {
        let mut params = Map::new();
        params.insert(self.config.primary_key.clone(), key.to_value());
        Value::Object(params)
    }

    /// Writes a remote entity into the live list, or returns it detached if
    /// its key is not present.
    fn absorb(&self, entity: Entity) -> EntityRef {
        let mut state = self.state.lock();
        match state.position_of(entity.key()) {
            Some(idx) => state.replace_at(idx, entity),
            None => EntityRef::new(entity),
        }
    }

    /// Fetches one entity from the remote and refreshes the live list.
    pub async fn get_item(&self, key: &EntityKey) -> SyncResult<EntityRef> {
        let method = self.config.method_name(RemoteMethod::Get);
        let response = self.remote.call(&method, self.key_params(key)).await?;
        let entity = Entity::from_value(response, &self.config.primary_key)?;
        Ok(self.absorb(entity))
    }

    /// Sends an entity update to the remote and applies the stored result.
    ///
    /// The selection flag is never sent.
    pub async fn update_item(&self, entity: &Entity) -> SyncResult<EntityRef> {
        let method = self.config.method_name(RemoteMethod::Update);
        let response = self.remote.call(&method, entity.to_value()).await?;
        let entity = Entity::from_value(response, &self.config.primary_key)?;
        Ok(self.absorb(entity))
    }

    /// Deletes an entity on the remote, then removes it locally.
    pub async fn delete_item(&self, key: &EntityKey) -> SyncResult<()> {
        let method = self.config.method_name(RemoteMethod::Delete);
        self.remote.call(&method, self.key_params(key)).await?;
        if self.state.lock().remove_item(key).is_none() {
            debug!(collection = %self.config.handler, %key, "deleted entity was not in the collection");
        }
        Ok(())
    }

    /// Makes the entity with `key` the active item and upgrades it to full
    /// detail.
    ///
    /// The local entity becomes the active item immediately; once the remote
    /// responds, its full representation is written into the same handle,
    /// which is returned.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotLoaded`] if called before the initial load. This is a
    ///   caller bug; it is logged at error level and returned without
    ///   contacting the remote, but does not panic.
    /// - [`SyncError::NotFound`] if the key is not in the live list. The
    ///   active item is cleared.
    /// - [`SyncError::Superseded`] if the active item was cleared or changed
    ///   while the remote call was pending. The entity is still refreshed.
    /// - The remote failure.
    pub async fn set_active_item(&self, key: &EntityKey) -> SyncResult<EntityRef> {
        {
            let mut state = self.state.lock();
            if !state.loaded {
                error!(
                    collection = %self.config.handler,
                    %key,
                    "set_active_item called before the collection was loaded"
                );
                return Err(SyncError::NotLoaded);
            }
            match state.find(key).cloned() {
                Some(item) => state.active = Some(item),
                None => {
                    state.active = None;
                    return Err(SyncError::NotFound { key: key.clone() });
                }
            }
        }

        let method = self.config.method_name(RemoteMethod::SetActive);
        let response = self.remote.call(&method, self.key_params(key)).await?;
        let entity = Entity::from_value(response, &self.config.primary_key)?;

        let mut state = self.state.lock();
        let item = state
            .replace_item(entity)
            .ok_or_else(|| SyncError::NotFound { key: key.clone() })?;
        if !state.active.as_ref().is_some_and(|active| active.same_as(&item)) {
            debug!(
                collection = %self.config.handler,
                %key,
                "active item changed while set_active was pending"
            );
            return Err(SyncError::Superseded { key: key.clone() });
        }
        Ok(item)
    }

    /// Clears the active item.
    pub fn clear_active_item(&self) {
        self.state.lock().active = None;
    }

    /// Returns the active item.
    pub fn active_item(&self) -> Option<EntityRef> {
        self.state.lock().active.clone()
    }

    /// Marks an entity selected. Unknown keys are a logged no-op.
    pub fn select_item(&self, key: &EntityKey) -> SelectOutcome {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.selection.select(&state.items, key)
    }

    /// Clears an entity's selection mark. Unknown keys are a logged no-op.
    pub fn unselect_item(&self, key: &EntityKey) -> SelectOutcome {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.selection.unselect(&state.items, key)
    }

    /// Returns true if the entity with `key` is selected.
    pub fn is_selected(&self, key: &EntityKey) -> bool {
        let state = self.state.lock();
        state.selection.is_selected(&state.items, key)
    }

    /// Returns the selected entities in selection order.
    pub fn selected_items(&self) -> Vec<EntityRef> {
        self.state.lock().selection.selected().to_vec()
    }

    /// Returns true if any entity is selected.
    pub fn has_selection(&self) -> bool {
        selection::any_selected(&self.state.lock().items)
    }

    /// Queues a notification and applies the queue unless the collection is
    /// not loaded yet or a load or reload is in flight. Returns the number of
    /// notifications applied.
    pub fn notify(&self, action: PendingAction) -> usize {
        let mut state = self.state.lock();
        state.queue.enqueue(action);
        state.drain_if_idle()
    }

    /// Decodes a raw `(action, data)` notification and queues it.
    pub fn handle_notification(&self, action: &str, data: Value) -> SyncResult<usize> {
        let action = PendingAction::decode(action, data, &self.config.primary_key)?;
        Ok(self.notify(action))
    }
}

impl<R: RemoteCall> Drop for CollectionManager<R> {
    fn drop(&mut self) {
        if let Some(task) = self.auto_reload.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.poller.get_mut().take() {
            task.abort();
        }
    }
}
