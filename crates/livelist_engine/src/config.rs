//! Configuration for a synchronized collection.

use std::time::Duration;

/// Default number of entities requested per page.
pub const DEFAULT_BATCH_SIZE: u32 = 50;

/// Remote methods a collection calls, relative to its handler name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteMethod {
    /// Paged listing.
    List,
    /// Single entity fetch.
    Get,
    /// Entity update.
    Update,
    /// Entity delete.
    Delete,
    /// Mark an entity active and fetch its full detail.
    SetActive,
}

impl RemoteMethod {
    /// Returns the method suffix used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteMethod::List => "list",
            RemoteMethod::Get => "get",
            RemoteMethod::Update => "update",
            RemoteMethod::Delete => "delete",
            RemoteMethod::SetActive => "set_active",
        }
    }
}

/// Configuration for one synchronized collection.
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Remote handler name (methods are called as `"{handler}.{method}"`).
    pub handler: String,
    /// Name of the primary-key field.
    pub primary_key: String,
    /// Number of entities requested per page.
    pub batch_size: u32,
    /// Attributes tracked by the metadata index.
    pub metadata_attributes: Vec<String>,
    /// Polling behavior, for collections without push notifications.
    pub poll: PollConfig,
}

impl CollectionConfig {
    /// Creates a new collection configuration.
    pub fn new(handler: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            primary_key: primary_key.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            metadata_attributes: Vec::new(),
            poll: PollConfig::default(),
        }
    }

    /// Sets the page size.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the attributes tracked by the metadata index.
    pub fn with_metadata_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the polling configuration.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Returns the fully qualified remote method name.
    pub fn method_name(&self, method: RemoteMethod) -> String {
        format!("{}.{}", self.handler, method.as_str())
    }
}

/// Configuration for polling reloads.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between successful polls.
    pub interval: Duration,
    /// Delay after a failed poll.
    pub error_interval: Duration,
    /// Delay after a poll that left the collection empty.
    pub empty_interval: Duration,
}

impl PollConfig {
    /// Creates a polling configuration with one interval for every outcome.
    pub fn uniform(interval: Duration) -> Self {
        Self {
            interval,
            error_interval: interval,
            empty_interval: interval,
        }
    }

    /// Sets the delay between successful polls.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the delay after a failed poll.
    pub fn with_error_interval(mut self, interval: Duration) -> Self {
        self.error_interval = interval;
        self
    }

    /// Sets the delay after an empty poll.
    pub fn with_empty_interval(mut self, interval: Duration) -> Self {
        self.empty_interval = interval;
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            error_interval: Duration::from_secs(3),
            empty_interval: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_config_builder() {
        let config = CollectionConfig::new("machine", "system_id")
            .with_batch_size(25)
            .with_metadata_attributes(["status", "tags"]);

        assert_eq!(config.handler, "machine");
        assert_eq!(config.primary_key, "system_id");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.metadata_attributes, vec!["status", "tags"]);
    }

    #[test]
    fn defaults() {
        let config = CollectionConfig::new("zone", "id");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert!(config.metadata_attributes.is_empty());
        assert_eq!(config.poll.interval, Duration::from_secs(10));
        assert_eq!(config.poll.error_interval, Duration::from_secs(3));
        assert_eq!(config.poll.empty_interval, Duration::from_secs(3));
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let config = CollectionConfig::new("zone", "id").with_batch_size(0);
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn method_names() {
        let config = CollectionConfig::new("device", "id");
        assert_eq!(config.method_name(RemoteMethod::List), "device.list");
        assert_eq!(config.method_name(RemoteMethod::SetActive), "device.set_active");
    }

    #[test]
    fn poll_config_builder() {
        let poll = PollConfig::uniform(Duration::from_millis(5))
            .with_error_interval(Duration::from_millis(50));
        assert_eq!(poll.interval, Duration::from_millis(5));
        assert_eq!(poll.empty_interval, Duration::from_millis(5));
        assert_eq!(poll.error_interval, Duration::from_millis(50));
    }
}
