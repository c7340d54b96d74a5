//! Event sources driving a collection.
//!
//! Two external streams feed a [`CollectionManager`]: connection lifecycle
//! events, which trigger reloads while auto-reload is enabled, and push
//! notifications, which are decoded and queued.

use crate::manager::CollectionManager;
use crate::remote::RemoteCall;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Connection lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection to the remote was (re)opened.
    Opened,
    /// The connection was closed.
    Closed,
}

/// A push notification as received from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification {
    /// `"create"`, `"update"` or `"delete"`.
    pub action: String,
    /// Entity payload, or the key for deletes.
    pub data: Value,
}

impl RawNotification {
    /// Creates a raw notification.
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }
}

impl<R: RemoteCall> CollectionManager<R> {
    /// Reloads the collection every time the connection opens.
    ///
    /// Replaces any previously enabled subscription.
    pub fn enable_auto_reload(self: &Arc<Self>, mut events: broadcast::Receiver<ConnectionEvent>) {
        let manager = Arc::downgrade(self);
        let collection = self.config().handler.clone();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectionEvent::Opened) => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        debug!(%collection, "connection opened, reloading");
                        if let Err(err) = manager.reload_items().await {
                            warn!(%collection, error = %err, "auto reload failed");
                        }
                    }
                    Ok(ConnectionEvent::Closed) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(%collection, skipped, "connection events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(previous) = self.auto_reload.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stops reloading on connection events.
    pub fn disable_auto_reload(&self) {
        if let Some(task) = self.auto_reload.lock().take() {
            task.abort();
        }
    }

    /// Returns true while auto-reload is enabled.
    pub fn is_auto_reload_enabled(&self) -> bool {
        self.auto_reload
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Feeds every notification received on `notifications` into the queue.
    ///
    /// The task ends when the channel closes or the manager is dropped.
    /// Notifications that fail to decode are logged and skipped.
    pub fn spawn_notification_listener(
        self: &Arc<Self>,
        mut notifications: mpsc::Receiver<RawNotification>,
    ) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(raw) = notifications.recv().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if let Err(err) = manager.handle_notification(&raw.action, raw.data) {
                    warn!(
                        collection = %manager.config().handler,
                        action = %raw.action,
                        error = %err,
                        "dropping malformed notification"
                    );
                }
            }
        })
    }
}
