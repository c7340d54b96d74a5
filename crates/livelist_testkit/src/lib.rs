//! # livelist testkit
//!
//! Test utilities for livelist.
//!
//! This crate provides:
//! - An in-memory remote store with paging, detail fields, failure
//!   injection and page gating
//! - Fixtures for a conventional "node" collection
//! - Invariant checks over a live collection
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use livelist_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn loads_everything() {
//!     let manager = node_manager(seeded_remote(120));
//!     manager.load_items().await.unwrap();
//!     assert_invariants(&manager);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod invariants;
pub mod remote;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::invariants::*;
    pub use crate::remote::*;
}

pub use fixtures::*;
pub use generators::*;
pub use invariants::*;
pub use remote::*;
