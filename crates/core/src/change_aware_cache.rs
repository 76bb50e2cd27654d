//! Change-tracking cache.
//!
//! `ChangeAwareCache` wraps a [`Cache`] and records every mutation until the
//! changes are drained with [`ChangeAwareCache::capture_changes`].
//!
//! Two capture policies exist:
//!
//! - coalescing (the default): the captured set holds the net effect per key
//!   since the last capture. Add then remove of the same key yields nothing,
//!   add then update yields one add, update then update yields one update
//!   carrying the value held at the last capture, remove then add yields an
//!   update.
//! - replace-for-updates: every primitive mutation is recorded as a separate
//!   change, so add then remove yields two changes.

use crate::cache::Cache;
use crate::change::{Change, ChangeReason};
use crate::change_set::ChangeSet;
use crate::key::Key;
use alloc::vec::Vec;
use hashbrown::hash_map;
use hashbrown::HashMap;

/// A cache that records its own mutations as change sets.
#[derive(Clone, Debug)]
pub struct ChangeAwareCache<K, V> {
    data: Cache<K, V>,
    /// Pending changes; coalesced-away entries leave a `None` hole.
    pending: Vec<Option<Change<K, V>>>,
    /// Key -> slot in `pending`, coalescing mode only.
    positions: HashMap<K, usize>,
    replace_for_updates: bool,
}

impl<K: Key, V: Clone> Default for ChangeAwareCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V: Clone> ChangeAwareCache<K, V> {
    /// Creates an empty cache using the coalescing capture policy.
    pub fn new() -> Self {
        Self::from_cache(Cache::new())
    }

    /// Creates an empty cache recording every mutation as a discrete change.
    pub fn with_replace_for_updates() -> Self {
        Self {
            replace_for_updates: true,
            ..Self::new()
        }
    }

    /// Wraps existing data. Nothing is recorded for the initial contents.
    pub fn from_cache(data: Cache<K, V>) -> Self {
        Self {
            data,
            pending: Vec::new(),
            positions: HashMap::new(),
            replace_for_updates: false,
        }
    }

    /// Returns true if every mutation is recorded separately.
    #[inline]
    pub fn replaces_for_updates(&self) -> bool {
        self.replace_for_updates
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
        self.data.lookup(key)
    }

    /// Returns true if the key is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.contains_key(key)
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

    /// Returns the underlying data.
    #[inline]
    pub fn data(&self) -> &Cache<K, V> {
        &self.data
    }

    /// Returns true if changes are waiting to be captured.
    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }

    /// Adds a value for a key that is expected to be absent.
    ///
    /// A present key is treated as an update.
    pub fn add(&mut self, key: K, value: V) {
        self.add_or_update(key, value);
    }

    /// Inserts or replaces a value, recording an add or an update.
    pub fn add_or_update(&mut self, key: K, value: V) {
        let previous = self.data.add_or_update(key.clone(), value.clone());

        if self.replace_for_updates {
            self.pending.push(Some(match previous {
                Some(previous) => Change::update(key, value, previous),
                None => Change::add(key, value),
            }));
            return;
        }

        match self.take_pending(&key) {
            None => {
                let change = match previous {
                    Some(previous) => Change::update(key.clone(), value, previous),
                    None => Change::add(key.clone(), value),
                };
                self.record(key, change);
            }
            Some((slot, existing)) => {
                let merged = match (existing.reason, existing.previous) {
                    (ChangeReason::Add, _) => Change::add(key, value),
                    (ChangeReason::Update, Some(original)) => Change::update(key, value, original),
                    (ChangeReason::Remove, _) => Change::update(key, value, existing.current),
                    (_, _) => match previous {
                        Some(previous) => Change::update(key, value, previous),
                        None => Change::add(key, value),
                    },
                };
                self.pending[slot] = Some(merged);
            }
        }
    }

    /// Removes a key, recording a remove. Absent keys are ignored.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.data.remove(key)?;

        if self.replace_for_updates {
            self.pending
                .push(Some(Change::remove(key.clone(), value.clone())));
            return Some(value);
        }

        match self.take_pending(key) {
            None => {
                self.record(key.clone(), Change::remove(key.clone(), value.clone()));
            }
            Some((slot, existing)) => match (existing.reason, existing.previous) {
                // Added since the last capture: nothing to report.
                (ChangeReason::Add, _) => {
                    self.positions.remove(key);
                }
                (ChangeReason::Update, Some(original)) => {
                    self.pending[slot] = Some(Change::remove(key.clone(), original));
                }
                (_, _) => {
                    self.pending[slot] = Some(Change::remove(key.clone(), value.clone()));
                }
            },
        }

        Some(value)
    }

    /// Records a refresh for a present key. Absent keys are ignored.
    pub fn refresh(&mut self, key: &K) -> bool {
        let Some(value) = self.data.lookup(key) else {
            return false;
        };

        if self.replace_for_updates {
            let change = Change::refresh(key.clone(), value.clone());
            self.pending.push(Some(change));
        } else if !self.positions.contains_key(key) {
            let change = Change::refresh(key.clone(), value.clone());
            self.record(key.clone(), change);
        }
        true
    }

    /// Removes every entry, recording a remove for each.
    pub fn clear(&mut self) {
        let keys: Vec<K> = self.data.keys().cloned().collect();
        for key in &keys {
            self.remove(key);
        }
    }

    /// Replays an upstream change set against this cache.
    pub fn clone_changes(&mut self, changes: &ChangeSet<K, V>) {
        for change in changes {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    self.add_or_update(change.key.clone(), change.current.clone());
                }
                ChangeReason::Remove => {
                    self.remove(&change.key);
                }
                ChangeReason::Refresh => {
                    self.refresh(&change.key);
                }
                ChangeReason::Moved => {}
            }
        }
    }

    /// Drains the pending changes into a change set.
    pub fn capture_changes(&mut self) -> ChangeSet<K, V> {
        self.positions.clear();
        self.pending.drain(..).flatten().collect()
    }

    fn take_pending(&mut self, key: &K) -> Option<(usize, Change<K, V>)> {
        let slot = *self.positions.get(key)?;
        let existing = self.pending[slot].take()?;
        Some((slot, existing))
    }

    fn record(&mut self, key: K, change: Change<K, V>) {
        self.positions.insert(key, self.pending.len());
        self.pending.push(Some(change));
    }
}
