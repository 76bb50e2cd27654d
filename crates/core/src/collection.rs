//! Ordered keyed snapshots.
//!
//! A `KeyValueCollection` is an immutable, ordered sequence of `(key, value)`
//! pairs tagged with the comparer that ordered it and the reason the order was
//! produced. Sorting and paging operators hand these downstream alongside
//! their change sets.

use crate::change_set::ChangeSet;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::slice;

/// Why a sorted snapshot was produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortReason {
    /// First batch of data.
    #[default]
    InitialLoad,
    /// A new comparer was supplied.
    ComparerChanged,
    /// Data was added, updated, removed or refreshed.
    DataChanged,
    /// Items were re-ordered without a data change.
    Reorder,
    /// The snapshot was rebuilt from scratch.
    Reset,
}

/// Orders `(key, value)` pairs.
pub struct KeyValueComparer<K, V> {
    compare: Rc<dyn Fn(&(K, V), &(K, V)) -> Ordering>,
}

impl<K, V> Clone for KeyValueComparer<K, V> {
    fn clone(&self) -> Self {
        Self {
            compare: Rc::clone(&self.compare),
        }
    }
}

impl<K, V> fmt::Debug for KeyValueComparer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueComparer").finish_non_exhaustive()
    }
}

impl<K: 'static, V: 'static> KeyValueComparer<K, V> {
    /// Creates a comparer over whole pairs.
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&(K, V), &(K, V)) -> Ordering + 'static,
    {
        Self {
            compare: Rc::new(compare),
        }
    }

    /// Compares values, falling back to key order for ties.
    pub fn by_value<F>(compare: F) -> Self
    where
        K: Ord,
        F: Fn(&V, &V) -> Ordering + 'static,
    {
        Self::new(move |a, b| compare(&a.1, &b.1).then_with(|| a.0.cmp(&b.0)))
    }

    /// Ascending by a projected value, ties broken by key.
    pub fn ascending<T, F>(selector: F) -> Self
    where
        K: Ord,
        T: Ord,
        F: Fn(&V) -> T + 'static,
    {
        Self::by_value(move |a, b| selector(a).cmp(&selector(b)))
    }

    /// Descending by a projected value, ties broken by ascending key.
    pub fn descending<T, F>(selector: F) -> Self
    where
        K: Ord,
        T: Ord,
        F: Fn(&V) -> T + 'static,
    {
        Self::by_value(move |a, b| selector(b).cmp(&selector(a)))
    }
}

impl<K, V> KeyValueComparer<K, V> {
    /// Compares two pairs.
    #[inline]
    pub fn compare(&self, a: &(K, V), b: &(K, V)) -> Ordering {
        (self.compare)(a, b)
    }

    /// Binary-searches the position at which `item` would be inserted.
    ///
    /// Ties go after existing equal-ranked items.
    pub fn insertion_point(&self, items: &[(K, V)], item: &(K, V)) -> usize {
        items.partition_point(|existing| self.compare(existing, item) != Ordering::Greater)
    }
}

/// An immutable ordered snapshot of keyed values.
pub struct KeyValueCollection<K, V> {
    items: Rc<Vec<(K, V)>>,
    comparer: Option<KeyValueComparer<K, V>>,
    sort_reason: SortReason,
}

impl<K, V> Clone for KeyValueCollection<K, V> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
            comparer: self.comparer.clone(),
            sort_reason: self.sort_reason,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for KeyValueCollection<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueCollection")
            .field("items", &self.items)
            .field("sort_reason", &self.sort_reason)
            .finish()
    }
}

impl<K, V> Default for KeyValueCollection<K, V> {
    fn default() -> Self {
        Self {
            items: Rc::new(Vec::new()),
            comparer: None,
            sort_reason: SortReason::InitialLoad,
        }
    }
}

impl<K, V> KeyValueCollection<K, V> {
    /// Creates a snapshot. `items` must already be ordered by `comparer`.
    pub fn new(
        items: Vec<(K, V)>,
        comparer: Option<KeyValueComparer<K, V>>,
        sort_reason: SortReason,
    ) -> Self {
        Self {
            items: Rc::new(items),
            comparer,
            sort_reason,
        }
    }

    /// Creates an empty, unordered snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the items in order.
    #[inline]
    pub fn items(&self) -> &[(K, V)] {
        &self.items
    }

    /// Iterates the items in order.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, (K, V)> {
        self.items.iter()
    }

    /// Returns the item at a position.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&(K, V)> {
        self.items.get(index)
    }

    /// Iterates the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.items.iter().map(|(k, _)| k)
    }

    /// Iterates the values in order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.items.iter().map(|(_, v)| v)
    }

    /// Returns the comparer that ordered this snapshot.
    #[inline]
    pub fn comparer(&self) -> Option<&KeyValueComparer<K, V>> {
        self.comparer.as_ref()
    }

    /// Returns why this snapshot was produced.
    #[inline]
    pub fn sort_reason(&self) -> SortReason {
        self.sort_reason
    }
}

impl<K: PartialEq, V> KeyValueCollection<K, V> {
    /// Position of a key, by linear scan.
    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.items.iter().position(|(k, _)| k == key)
    }
}

impl<'a, K, V> IntoIterator for &'a KeyValueCollection<K, V> {
    type Item = &'a (K, V);
    type IntoIter = slice::Iter<'a, (K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A change set together with the full sorted collection it produced.
#[derive(Clone, Debug)]
pub struct SortedChangeSet<K, V> {
    pub changes: ChangeSet<K, V>,
    pub sorted_items: KeyValueCollection<K, V>,
}

impl<K, V> SortedChangeSet<K, V> {
    /// Creates a sorted change set.
    pub fn new(sorted_items: KeyValueCollection<K, V>, changes: ChangeSet<K, V>) -> Self {
        Self {
            changes,
            sorted_items,
        }
    }
}
