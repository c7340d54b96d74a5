//! Remote-call abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::future::Future;

/// The remote collaborator that owns the authoritative collection.
///
/// This trait abstracts the transport, allowing for different implementations
/// (websocket RPC, HTTP, in-memory stores for testing, etc.). Methods are
/// addressed by fully qualified name, e.g. `"machine.list"`.
pub trait RemoteCall: Send + Sync + 'static {
    /// Calls a remote method and resolves with its JSON result.
    fn call(&self, method: &str, params: Value)
        -> impl Future<Output = SyncResult<Value>> + Send;
}

/// Parameters of a paged `list` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    /// Maximum number of entities to return.
    pub count: u32,
    /// Return only entities ordered after this key.
    pub start: Option<Value>,
}

impl ListParams {
    /// Encodes the parameters as a JSON object.
    pub fn to_value(&self) -> Value {
        let mut params = Map::new();
        params.insert("count".to_string(), Value::from(self.count));
        if let Some(start) = &self.start {
            params.insert("start".to_string(), start.clone());
        }
        Value::Object(params)
    }
}

/// A scripted remote for testing.
///
/// Responses are queued per method name and consumed in order; a method
/// with an empty queue fails with a protocol-style remote error. Every call
/// is recorded.
#[derive(Debug, Default)]
pub struct MockRemote {
    responses: Mutex<HashMap<String, VecDeque<SyncResult<Value>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockRemote {
    /// Creates a new mock remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response for `method`.
    pub fn push_response(&self, method: &str, response: Value) {
        self.push_result(method, Ok(response));
    }

    /// Queues a failure for `method`.
    pub fn push_error(&self, method: &str, error: SyncError) {
        self.push_result(method, Err(error));
    }

    fn push_result(&self, method: &str, result: SyncResult<Value>) {
        self.responses
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(result);
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// Returns the params of every call to `method`.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

impl RemoteCall for MockRemote {
    async fn call(&self, method: &str, params: Value) -> SyncResult<Value> {
        self.calls.lock().push((method.to_string(), params));
        self.responses
            .lock()
            .get_mut(method)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(SyncError::Remote(format!("no mock response for {method}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_params_encoding() {
        let first = ListParams {
            count: 50,
            start: None,
        };
        assert_eq!(first.to_value(), json!({"count": 50}));

        let next = ListParams {
            count: 50,
            start: Some(json!(17)),
        };
        assert_eq!(next.to_value(), json!({"count": 50, "start": 17}));
    }

    #[tokio::test]
    async fn mock_remote_replays_in_order() {
        let remote = MockRemote::new();
        remote.push_response("zone.get", json!({"id": 1}));
        remote.push_error("zone.get", SyncError::transport_fatal("closed"));

        assert_eq!(
            remote.call("zone.get", json!({"id": 1})).await.unwrap(),
            json!({"id": 1})
        );
        assert!(matches!(
            remote.call("zone.get", json!({"id": 1})).await,
            Err(SyncError::Transport { .. })
        ));
        assert!(matches!(
            remote.call("zone.get", json!({"id": 1})).await,
            Err(SyncError::Remote(_))
        ));
        assert_eq!(remote.calls_to("zone.get").len(), 3);
    }
}
