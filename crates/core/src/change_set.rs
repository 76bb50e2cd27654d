//! Change set for tracking keyed cache changes.
//!
//! A ChangeSet is the ordered batch of changes produced by one atomic edit
//! (or one upstream emission).

use crate::change::{Change, ChangeReason};
use alloc::vec::{self, Vec};
use core::slice;

/// An ordered batch of changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet<K, V> {
    changes: Vec<Change<K, V>>,
}

impl<K, V> Default for ChangeSet<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ChangeSet<K, V> {
    /// Creates a new empty change set.
    #[inline]
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    /// Creates an empty change set with room for `capacity` changes.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: Vec::with_capacity(capacity),
        }
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Appends a change.
    #[inline]
    pub fn push(&mut self, change: Change<K, V>) {
        self.changes.push(change);
    }

    /// Appends every change of another change set.
    pub fn merge(&mut self, other: ChangeSet<K, V>) {
        self.changes.extend(other.changes);
    }

    /// Clears all changes.
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Iterates the changes in order.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Change<K, V>> {
        self.changes.iter()
    }

    /// Returns the changes as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Change<K, V>] {
        &self.changes
    }

    /// Consumes the change set, returning the changes.
    #[inline]
    pub fn into_vec(self) -> Vec<Change<K, V>> {
        self.changes
    }

    fn count_of(&self, reason: ChangeReason) -> usize {
        self.changes.iter().filter(|c| c.reason == reason).count()
    }

    /// Number of `Add` changes.
    pub fn adds(&self) -> usize {
        self.count_of(ChangeReason::Add)
    }

    /// Number of `Update` changes.
    pub fn updates(&self) -> usize {
        self.count_of(ChangeReason::Update)
    }

    /// Number of `Remove` changes.
    pub fn removes(&self) -> usize {
        self.count_of(ChangeReason::Remove)
    }

    /// Number of `Refresh` changes.
    pub fn refreshes(&self) -> usize {
        self.count_of(ChangeReason::Refresh)
    }

    /// Number of `Moved` changes.
    pub fn moves(&self) -> usize {
        self.count_of(ChangeReason::Moved)
    }
}

impl<K, V> From<Vec<Change<K, V>>> for ChangeSet<K, V> {
    fn from(changes: Vec<Change<K, V>>) -> Self {
        Self { changes }
    }
}

impl<K, V> FromIterator<Change<K, V>> for ChangeSet<K, V> {
    fn from_iter<I: IntoIterator<Item = Change<K, V>>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl<K, V> Extend<Change<K, V>> for ChangeSet<K, V> {
    fn extend<I: IntoIterator<Item = Change<K, V>>>(&mut self, iter: I) {
        self.changes.extend(iter);
    }
}

impl<K, V> IntoIterator for ChangeSet<K, V> {
    type Item = Change<K, V>;
    type IntoIter = vec::IntoIter<Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a ChangeSet<K, V> {
    type Item = &'a Change<K, V>;
    type IntoIter = slice::Iter<'a, Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
