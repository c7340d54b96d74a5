//! Error types for the collection engine.

use crate::entity::EntityKey;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while loading or mutating a collection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Network or transport error reported by the remote collaborator.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the transport considers the call retryable.
        retryable: bool,
    },

    /// The remote side rejected the call.
    #[error("remote error: {0}")]
    Remote(String),

    /// A remote payload did not match the collection's shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// A notification named an action other than create, update or delete.
    #[error("unknown notification action: {0}")]
    UnknownAction(String),

    /// No entity with this key exists in the live list.
    #[error("no such key: {key}")]
    NotFound {
        /// The key that was looked up.
        key: EntityKey,
    },

    /// The operation requires the initial load to have completed.
    #[error("collection has not been loaded")]
    NotLoaded,

    /// The active item changed while this call was marking `key` active.
    #[error("active item changed while marking {key} active")]
    Superseded {
        /// The key the call tried to mark active.
        key: EntityKey,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the caller may retry the operation.
    ///
    /// The engine itself never retries; this only classifies the failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Remote(_) => true,
            _ => false,
        }
    }
}
