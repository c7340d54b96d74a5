//! Polling reloads for collections without push notifications.

use crate::manager::CollectionManager;
use crate::remote::RemoteCall;
use std::sync::Arc;
use tracing::{debug, warn};

impl<R: RemoteCall> CollectionManager<R> {
    /// Starts reloading the collection periodically.
    ///
    /// After each pass the task sleeps for the configured `error_interval`
    /// if the pass failed, `empty_interval` if the collection is empty, and
    /// `interval` otherwise. Does nothing if polling is already running.
    pub fn start_polling(self: &Arc<Self>) {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let manager = Arc::downgrade(self);
        let poll = self.config().poll.clone();
        let collection = self.config().handler.clone();
        *poller = Some(tokio::spawn(async move {
            loop {
                let Some(strong) = manager.upgrade() else {
                    break;
                };
                let delay = match strong.reload_items().await {
                    Ok(items) if items.is_empty() => poll.empty_interval,
                    Ok(_) => poll.interval,
                    Err(err) => {
                        warn!(%collection, error = %err, "poll failed");
                        poll.error_interval
                    }
                };
                drop(strong);
                debug!(%collection, delay_ms = delay.as_millis() as u64, "next poll scheduled");
                tokio::time::sleep(delay).await;
            }
        }));
    }

    /// Stops polling. A fetch in flight is abandoned without committing.
    pub fn stop_polling(&self) {
        if let Some(task) = self.poller.lock().take() {
            task.abort();
        }
    }

    /// Returns true while polling is running.
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
