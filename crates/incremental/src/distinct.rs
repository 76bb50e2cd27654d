//! Distinct values of a change stream, reference counted.
//!
//! Every item maps to one value. A value is added the first time any item
//! maps to it and removed when the last such item goes away or maps
//! elsewhere. Output changes are keyed by the value itself.

use alloc::rc::Rc;
use cascade_core::{Change, ChangeReason, ChangeSet, Key};
use cascade_reactive::{Observable, Subscriber};
use hashbrown::HashMap;
use core::cell::RefCell;
use tracing::trace;

/// The counting state behind [`distinct_values`].
pub struct DistinctValues<K, T> {
    /// Value -> number of items currently mapping to it.
    counts: HashMap<T, usize>,
    /// Item key -> the value it maps to.
    items: HashMap<K, T>,
}

impl<K: Key, T: Key> Default for DistinctValues<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, T: Key> DistinctValues<K, T> {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            items: HashMap::new(),
        }
    }

    /// Number of items mapping to `value`.
    pub fn count(&self, value: &T) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Number of distinct values.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Applies an upstream change set and returns the value changes.
    ///
    /// `Update` and `Refresh` re-run the selector and move the item's count
    /// when its value changed. An `Update` for an unknown key counts as an
    /// `Add`; a `Remove` for one is ignored.
    pub fn update<V>(&mut self, changes: &ChangeSet<K, V>, selector: &dyn Fn(&V) -> T) -> ChangeSet<T, T> {
        let mut result = ChangeSet::new();
        for change in changes {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    let value = selector(&change.current);
                    match self.items.insert(change.key.clone(), value.clone()) {
                        Some(previous) if previous == value => {}
                        Some(previous) => {
                            self.release(previous, &mut result);
                            self.retain(value, &mut result);
                        }
                        None if change.reason == ChangeReason::Refresh => {
                            // Refresh of an item never seen
                            self.items.remove(&change.key);
                        }
                        None => self.retain(value, &mut result),
                    }
                }
                ChangeReason::Remove => {
                    if let Some(previous) = self.items.remove(&change.key) {
                        self.release(previous, &mut result);
                    }
                }
                ChangeReason::Moved => {}
            }
        }
        trace!(values = self.counts.len(), changes = result.len(), "distinct: batch applied");
        result
    }

    fn retain(&mut self, value: T, result: &mut ChangeSet<T, T>) {
        let count = self.counts.entry(value.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(Change::add(value.clone(), value));
        }
    }

    fn release(&mut self, value: T, result: &mut ChangeSet<T, T>) {
        let Some(count) = self.counts.get_mut(&value) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&value);
            result.push(Change::remove(value.clone(), value));
        }
    }
}

/// Streams the distinct values `value_selector` picks from `source`.
///
/// Only non-empty change sets are emitted. Errors and completion pass
/// straight through.
pub fn distinct_values<K, V, T, S>(source: &Observable<ChangeSet<K, V>>, value_selector: S) -> Observable<ChangeSet<T, T>>
where
    K: Key,
    V: 'static,
    T: Key,
    S: Fn(&V) -> T + 'static,
{
    let source = source.clone();
    let selector: Rc<dyn Fn(&V) -> T> = Rc::new(value_selector);
    Observable::new(move |downstream| {
        let selector = Rc::clone(&selector);
        let state = RefCell::new(DistinctValues::new());
        source.subscribe_with_subscriber(Subscriber::relay(&downstream, move |changes, out| {
            let distinct = state.borrow_mut().update(changes, &*selector);
            if !distinct.is_empty() {
                out.next(&distinct);
            }
        }))
    })
}
