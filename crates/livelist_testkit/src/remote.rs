//! In-memory remote store.
//!
//! Implements the remote-call contract of a single collection over an
//! ordered map, so tests can exercise real paging, detail upgrades and
//! failures without a transport.

use livelist_engine::{EntityKey, RemoteCall, RemoteMethod, SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// An authoritative collection held in memory.
///
/// `list` returns entities ordered by key, without their detail fields;
/// `get`, `update` and `set_active` return the full representation.
pub struct InMemoryRemote {
    handler: String,
    primary_key: String,
    store: Mutex<BTreeMap<EntityKey, Map<String, Value>>>,
    details: Mutex<HashMap<EntityKey, Map<String, Value>>>,
    failures: Mutex<HashMap<&'static str, VecDeque<SyncError>>>,
    calls: Mutex<Vec<(String, Value)>>,
    active: Mutex<Option<EntityKey>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    blocked: AtomicUsize,
    blocked_notify: Notify,
}

impl InMemoryRemote {
    /// Creates an empty store serving `"{handler}.*"` methods.
    pub fn new(handler: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            primary_key: primary_key.into(),
            store: Mutex::new(BTreeMap::new()),
            details: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            gate: Mutex::new(None),
            blocked: AtomicUsize::new(0),
            blocked_notify: Notify::new(),
        }
    }

    fn key_of(&self, value: &Value) -> Option<EntityKey> {
        value.get(&self.primary_key).and_then(EntityKey::from_value)
    }

    /// Inserts or replaces an entity.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not an object with a valid primary key.
    pub fn insert(&self, value: Value) {
        let key = self
            .key_of(&value)
            .expect("entity must carry a valid primary key");
        let Value::Object(fields) = value else {
            panic!("entity must be an object");
        };
        self.store.lock().insert(key, fields);
    }

    /// Removes an entity and its detail fields.
    pub fn remove(&self, key: &EntityKey) -> bool {
        self.details.lock().remove(key);
        self.store.lock().remove(key).is_some()
    }

    /// Adds a field that only full-detail responses carry.
    pub fn set_detail(&self, key: &EntityKey, field: &str, value: Value) {
        self.details
            .lock()
            .entry(key.clone())
            .or_default()
            .insert(field.to_string(), value);
    }

    /// Returns the number of stored entities.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Returns the list representation of every stored entity, by key.
    pub fn values(&self) -> Vec<Value> {
        self.store
            .lock()
            .values()
            .map(|fields| Value::Object(fields.clone()))
            .collect()
    }

    /// Makes the next call to `method` fail with `error`.
    pub fn fail_next(&self, method: RemoteMethod, error: SyncError) {
        self.failures
            .lock()
            .entry(method.as_str())
            .or_default()
            .push_back(error);
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// Returns the params of every call to `method`.
    pub fn calls_to(&self, method: RemoteMethod) -> Vec<Value> {
        let name = format!("{}.{}", self.handler, method.as_str());
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| *m == name)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Returns the key last marked active.
    pub fn active_key(&self) -> Option<EntityKey> {
        self.active.lock().clone()
    }

    /// Holds every subsequent `list` call until pages are released.
    pub fn pause_lists(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets `pages` held `list` calls proceed.
    pub fn release_pages(&self, pages: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(pages);
        }
    }

    /// Stops holding `list` calls and releases every held call.
    pub fn resume_lists(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.close();
        }
    }

    /// Returns the number of `list` calls currently held.
    pub fn held_lists(&self) -> usize {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Waits until at least one `list` call is held.
    pub async fn wait_for_held_list(&self) {
        while self.held_lists() == 0 {
            self.blocked_notify.notified().await;
        }
    }

    fn full(&self, key: &EntityKey) -> SyncResult<Value> {
        let mut fields = self
            .store
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| SyncError::Remote(format!("{key} does not exist")))?;
        if let Some(details) = self.details.lock().get(key) {
            fields.extend(details.clone());
        }
        Ok(Value::Object(fields))
    }

    fn param_key(&self, params: &Value) -> SyncResult<EntityKey> {
        self.key_of(params)
            .ok_or_else(|| SyncError::Remote(format!("missing '{}'", self.primary_key)))
    }

    async fn list(&self, params: Value) -> SyncResult<Value> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _held = HeldList::enter(&self.blocked);
            self.blocked_notify.notify_one();
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let count = params
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| SyncError::Remote("missing 'count'".into()))? as usize;
        let lower = match params.get("start").and_then(EntityKey::from_value) {
            Some(start) => Bound::Excluded(start),
            None => Bound::Unbounded,
        };
        let page = self
            .store
            .lock()
            .range((lower, Bound::Unbounded))
            .take(count)
            .map(|(_, fields)| Value::Object(fields.clone()))
            .collect();
        Ok(Value::Array(page))
    }
}

/// Counts a held `list` call until it proceeds or its future is dropped.
struct HeldList<'a>(&'a AtomicUsize);

impl<'a> HeldList<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for HeldList<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RemoteCall for InMemoryRemote {
    async fn call(&self, method: &str, params: Value) -> SyncResult<Value> {
        self.calls.lock().push((method.to_string(), params.clone()));

        let suffix = method
            .strip_prefix(self.handler.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| SyncError::Remote(format!("unknown method {method}")))?;

        let failure = self
            .failures
            .lock()
            .get_mut(suffix)
            .and_then(VecDeque::pop_front);
        if let Some(err) = failure {
            return Err(err);
        }

        match suffix {
            "list" => self.list(params).await,
            "get" => {
                let key = self.param_key(&params)?;
                self.full(&key)
            }
            "update" => {
                let key = self.param_key(&params)?;
                if !self.store.lock().contains_key(&key) {
                    return Err(SyncError::Remote(format!("{key} does not exist")));
                }
                self.insert(params);
                self.full(&key)
            }
            "delete" => {
                let key = self.param_key(&params)?;
                if self.remove(&key) {
                    Ok(Value::Null)
                } else {
                    Err(SyncError::Remote(format!("{key} does not exist")))
                }
            }
            "set_active" => {
                let key = self.param_key(&params)?;
                let full = self.full(&key)?;
                *self.active.lock() = Some(key);
                Ok(full)
            }
            other => Err(SyncError::Remote(format!("unknown method {other}"))),
        }
    }
}
