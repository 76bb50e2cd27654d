//! Plain keyed store.
//!
//! `Cache` holds at most one value per key and records nothing; it is the
//! backing map for the change-tracking and observable layers and the local
//! state of operators that only need lookups.

use crate::change::ChangeReason;
use crate::change_set::ChangeSet;
use crate::key::Key;
use hashbrown::hash_map::{self, HashMap};

/// Mutable key → value store with no change tracking.
#[derive(Clone, Debug)]
pub struct Cache<K, V> {
    data: HashMap<K, V>,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
        }
    }
}

impl<K: Key, V> Cache<K, V> {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache over an existing map.
    pub fn from_map(data: HashMap<K, V>) -> Self {
        Self { data }
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Looks up the value for a key.
    #[inline]
    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.data.get(key)
    }

    /// Returns true if the key is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    /// Inserts or replaces a value, returning the replaced one.
    pub fn add_or_update(&mut self, key: K, value: V) -> Option<V> {
        self.data.insert(key, value)
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.data.remove(key)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Iterates the keys.
    pub fn keys(&self) -> hash_map::Keys<'_, K, V> {
        self.data.keys()
    }

    /// Iterates the values.
    pub fn values(&self) -> hash_map::Values<'_, K, V> {
        self.data.values()
    }

    /// Iterates the entries.
    pub fn iter(&self) -> hash_map::Iter<'_, K, V> {
        self.data.iter()
    }

    /// Returns the backing map.
    #[inline]
    pub fn as_map(&self) -> &HashMap<K, V> {
        &self.data
    }

    /// Consumes the cache, returning the backing map.
    #[inline]
    pub fn into_map(self) -> HashMap<K, V> {
        self.data
    }
}

impl<K: Key, V: Clone> Cache<K, V> {
    /// Applies an upstream change set to this cache.
    ///
    /// `Refresh` and `Moved` carry no new membership and are ignored.
    pub fn clone_changes(&mut self, changes: &ChangeSet<K, V>) {
        for change in changes {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    self.data.insert(change.key.clone(), change.current.clone());
                }
                ChangeReason::Remove => {
                    self.data.remove(&change.key);
                }
                ChangeReason::Refresh | ChangeReason::Moved => {}
            }
        }
    }
}

impl<K: Key, V> FromIterator<(K, V)> for Cache<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

impl<'a, K, V> IntoIterator for &'a Cache<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = hash_map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
