//! Cascade Incremental - Stateful operators over keyed change streams.
//!
//! Each operator keeps just enough state to turn one incoming change set into
//! the outgoing one, so derived views stay current without being recomputed
//! from scratch.
//!
//! # Operators
//!
//! - `sort` / `sort_with`: a sorted, indexed view of a change stream
//! - `page`: one page of a sorted view, driven by a stream of page requests
//! - `group_with_immutable_state`: groups with frozen membership snapshots
//! - `inner_join`, `left_join`, `right_join`, `full_join` and their `_many`
//!   variants: relational joins between two change streams
//! - `switch_cache`: mirrors whichever change stream arrived most recently
//! - `distinct_values`: reference-counted distinct values of a change stream
//!
//! `FilteredIndexCalculator` is the positional diff shared by the windowing
//! operators.
//!
//! # Example
//!
//! ```rust
//! use cascade_core::{KeyValueComparer, PageRequest};
//! use cascade_incremental::{page, sort};
//! use cascade_reactive::{ConnectConfig, ConnectableCache, SourceCache, Subject};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! #[derive(Clone, Debug)]
//! struct Person {
//!     name: &'static str,
//!     age: u32,
//! }
//!
//! let people = SourceCache::new(|p: &Person| p.name);
//! let requests = Subject::new();
//! let by_age = sort(&people.connect(ConnectConfig::default()), KeyValueComparer::ascending(|p: &Person| p.age));
//! let paged = page(&by_age, &requests.as_observable());
//!
//! let visible = Rc::new(RefCell::new(Vec::new()));
//! let sink = visible.clone();
//! let _sub = paged.subscribe(move |page| {
//!     *sink.borrow_mut() = page.sorted_items.keys().copied().collect::<Vec<_>>();
//! });
//!
//! people
//!     .add_or_update_values(vec![
//!         Person { name: "Ann", age: 30 },
//!         Person { name: "Bob", age: 20 },
//!         Person { name: "Cid", age: 25 },
//!     ])
//!     .unwrap();
//! requests.next(&PageRequest::new(1, 2).unwrap());
//!
//! assert_eq!(*visible.borrow(), vec!["Bob", "Cid"]);
//! ```

#![no_std]

extern crate alloc;

pub mod distinct;
pub mod group;
pub mod index_calculator;
pub mod join;
pub mod join_many;
pub mod page;
pub mod sort;
pub mod switch;

pub use distinct::{distinct_values, DistinctValues};
pub use group::{group_with_immutable_state, Grouper};
pub use index_calculator::FilteredIndexCalculator;
pub use join::{full_join, inner_join, left_join, right_join};
pub use join_many::{full_join_many, inner_join_many, left_join_many, right_join_many};
pub use page::{page, Pager};
pub use sort::{sort, sort_with, Sorter};
pub use switch::switch_cache;
