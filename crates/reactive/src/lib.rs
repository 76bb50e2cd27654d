//! Cascade Reactive - Observable keyed caches for cascade.
//!
//! This crate turns the change-tracking caches of `cascade-core` into live
//! sources. Every edit produces one change set, which is pushed synchronously
//! to every subscriber.
//!
//! # Core Concepts
//!
//! - `Observable` / `Subject` / `Subscription`: a minimal single-threaded push
//!   stream with error and completion signalling
//! - `ReaderWriter`: the single authority over a cache's committed state
//! - `ObservableCache` / `SourceCache`: caches that publish their changes
//! - `filter_changes`, `change_key`, `ref_count`: operators over change streams
//! - `ChangeSetAggregator`: records and materializes a change stream
//!
//! # Example
//!
//! ```rust
//! use cascade_reactive::{ChangeSetAggregator, ConnectConfig, ConnectableCache, SourceCache};
//!
//! #[derive(Clone, Debug)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let people = SourceCache::new(|p: &Person| p.name.clone());
//! let adults = ChangeSetAggregator::new(
//!     &people.connect(ConnectConfig::default().with_predicate(|p: &Person| p.age >= 18)),
//! );
//!
//! people
//!     .edit(|updater| {
//!         updater.add_or_update_value(Person { name: "Ann".into(), age: 34 });
//!         updater.add_or_update_value(Person { name: "Tom".into(), age: 9 });
//!     })
//!     .unwrap();
//!
//! assert_eq!(people.len(), 2);
//! assert_eq!(adults.len(), 1);
//! assert_eq!(adults.message_count(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod aggregator;
pub mod change_key;
pub mod filter;
pub mod observable;
pub mod observable_cache;
pub mod reader_writer;
pub mod ref_count;
pub mod source_cache;
pub mod subject;
pub mod subscription;

pub use aggregator::ChangeSetAggregator;
pub use change_key::change_key;
pub use filter::{filter_changes, Predicate};
pub use observable::{Observable, Observer, Subscriber};
pub use observable_cache::{ConnectConfig, ConnectableCache, ObservableCache};
pub use reader_writer::{CacheUpdater, Equality, ReaderWriter};
pub use ref_count::{ref_count, RefCountOptions};
pub use source_cache::{KeySelector, SourceCache, SourceUpdater};
pub use subject::Subject;
pub use subscription::{SharedSubscription, Subscription, SubscriptionId, SubscriptionManager};
