//! Cascade Core - Change records and keyed caches for cascade.
//!
//! This crate provides the foundational types shared by the reactive and
//! incremental layers:
//!
//! - `Change` / `ChangeSet`: what happened to which key during one edit
//! - `Cache`: plain key → value store
//! - `ChangeAwareCache`: a cache that records its own mutations
//! - `CacheCommand`: edits expressed as data
//! - `KeyValueCollection`, `PageRequest`, `ImmutableGroup`: snapshot types
//!   produced by the sort, page and group operators
//! - `Error`: error types for cache operations
//!
//! # Example
//!
//! ```rust
//! use cascade_core::{Change, ChangeAwareCache};
//!
//! let mut cache = ChangeAwareCache::new();
//! cache.add_or_update("alice", 30);
//! cache.add_or_update("bob", 25);
//! assert_eq!(cache.capture_changes().adds(), 2);
//!
//! cache.add_or_update("alice", 31);
//! cache.remove(&"bob");
//! let changes = cache.capture_changes();
//! assert_eq!(changes.as_slice()[0], Change::update("alice", 31, 30));
//! assert_eq!(changes.as_slice()[1], Change::remove("bob", 25));
//! ```

#![no_std]

extern crate alloc;

mod cache;
mod change;
mod change_aware_cache;
mod change_set;
mod collection;
mod command;
mod error;
mod group;
mod key;
mod page;

pub use cache::Cache;
pub use change::{Change, ChangeReason};
pub use change_aware_cache::ChangeAwareCache;
pub use change_set::ChangeSet;
pub use collection::{KeyValueCollection, KeyValueComparer, SortReason, SortedChangeSet};
pub use command::{apply_batch, CacheCommand};
pub use error::{Error, Result};
pub use group::ImmutableGroup;
pub use key::{JoinKey, Key};
pub use page::{PageRequest, PageResponse, PagedChangeSet};
