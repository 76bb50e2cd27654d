//! Immutable group snapshots.

use crate::key::Key;
use alloc::rc::Rc;
use core::fmt;
use hashbrown::hash_map;
use hashbrown::HashMap;

/// A frozen view of one group's membership.
///
/// Snapshots share their map with the live group until the group is next
/// mutated, so cloning or emitting one never copies members.
pub struct ImmutableGroup<K, V, G> {
    key: G,
    items: Rc<HashMap<K, V>>,
}

impl<K, V, G: Clone> Clone for ImmutableGroup<K, V, G> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            items: Rc::clone(&self.items),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, G: fmt::Debug> fmt::Debug for ImmutableGroup<K, V, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmutableGroup")
            .field("key", &self.key)
            .field("items", &self.items)
            .finish()
    }
}

impl<K: Key, V: PartialEq, G: PartialEq> PartialEq for ImmutableGroup<K, V, G> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && (Rc::ptr_eq(&self.items, &other.items) || self.items == other.items)
    }
}

impl<K: Key, V, G> ImmutableGroup<K, V, G> {
    /// Creates a snapshot over a shared member map.
    pub fn new(key: G, items: Rc<HashMap<K, V>>) -> Self {
        Self { key, items }
    }

    /// Creates a snapshot with no members.
    pub fn empty(key: G) -> Self {
        Self::new(key, Rc::new(HashMap::new()))
    }

    /// Returns the group key.
    #[inline]
    pub fn key(&self) -> &G {
        &self.key
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.items.get(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn keys(&self) -> hash_map::Keys<'_, K, V> {
        self.items.keys()
    }

    pub fn values(&self) -> hash_map::Values<'_, K, V> {
        self.items.values()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, K, V> {
        self.items.iter()
    }

    /// Returns true if both snapshots share the same member map.
    #[inline]
    pub fn shares_items_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}
