//! # livelist engine
//!
//! Client-side synchronization of a server-owned collection.
//!
//! This crate provides:
//! - Paged bulk loading (`list` pages keyed by the last primary key)
//! - Identity-preserving reconciliation of full reloads
//! - A notification queue gated on in-flight loads
//! - Incremental attribute histograms (metadata), including array attributes
//! - Selection tracking and a live-updated active item
//! - Auto-reload on reconnect and optional polling
//!
//! ## Architecture
//!
//! A [`CollectionManager`] owns one collection. Three input channels mutate
//! it, all through the same primitives:
//! 1. Loads and reloads fetch the whole collection via [`BatchLoader`] and
//!    reconcile it into the live list
//! 2. Push notifications are queued and applied in arrival order whenever no
//!    load is in flight
//! 3. Local actions (select, get, update, delete, set active) apply directly
//!    after the remote call succeeds
//!
//! ## Key Invariants
//!
//! - At most one entity per primary key in the live list
//! - Selected and active entities are always members of the live list
//! - Metadata equals a from-scratch recomputation over the live list
//! - Notifications are applied exactly once, in arrival order
//! - Entities keep their handle for as long as they stay in the list

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod entity;
mod error;
mod events;
mod loader;
mod manager;
mod metadata;
pub mod pk_index;
mod poll;
mod queue;
mod reconcile;
mod remote;
mod selection;
mod state;

pub use config::{CollectionConfig, PollConfig, RemoteMethod, DEFAULT_BATCH_SIZE};
pub use entity::{Entity, EntityKey, EntityRef};
pub use error::{SyncError, SyncResult};
pub use events::{ConnectionEvent, RawNotification};
pub use loader::BatchLoader;
pub use manager::CollectionManager;
pub use metadata::{MetadataAction, MetadataEntry, MetadataIndex};
pub use queue::{NotificationQueue, NotifyAction, PendingAction};
pub use reconcile::ReconcileSummary;
pub use remote::{ListParams, MockRemote, RemoteCall};
pub use selection::{SelectOutcome, SelectionSet};
pub use state::ManagerStats;
