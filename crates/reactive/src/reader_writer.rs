//! Single authority over a cache's committed state.
//!
//! Every edit goes through [`ReaderWriter::write`], which hands the caller a
//! [`CacheUpdater`] and returns the change set the edit produced. Readers
//! always see a consistent state: while a preview handler runs they see the
//! state from before the edit.
//!
//! No borrow of the store is held while caller code runs, so updater
//! closures and preview handlers may read the cache or start a nested edit.

use alloc::vec::Vec;
use cascade_core::{
    apply_batch, Cache, CacheCommand, Change, ChangeAwareCache, ChangeReason, ChangeSet, Error,
    Key, Result,
};
use core::cell::{Cell, RefCell};
use tracing::{debug, trace};

/// Equality used to drop updates that do not change a value.
pub type Equality<V> = fn(&V, &V) -> bool;

/// Owns the data of one cache and serializes edits against it.
pub struct ReaderWriter<K, V> {
    data: RefCell<ChangeAwareCache<K, V>>,
    /// Pre-edit state, visible to readers while a preview handler runs.
    preview_state: RefCell<Option<Cache<K, V>>>,
    editing: Cell<bool>,
    equality: Option<Equality<V>>,
}

impl<K: Key, V: Clone + 'static> Default for ReaderWriter<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V: Clone + 'static> ReaderWriter<K, V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_equality(None)
    }

    /// Creates an empty store that skips updates by `equality`.
    pub fn with_equality(equality: Option<Equality<V>>) -> Self {
        Self {
            data: RefCell::new(ChangeAwareCache::new()),
            preview_state: RefCell::new(None),
            editing: Cell::new(false),
            equality,
        }
    }

    /// Creates an empty store that ignores updates to an equal value.
    pub fn with_deep_equal() -> Self
    where
        V: PartialEq,
    {
        Self::with_equality(Some(<V as PartialEq>::eq))
    }

    /// Returns true while a `write` is in progress.
    #[inline]
    pub fn is_editing(&self) -> bool {
        self.editing.get()
    }

    /// Runs an edit and returns the changes it produced.
    ///
    /// If `preview` is given it receives the change set before the new state
    /// becomes visible to readers. Changes made from inside the preview
    /// handler are appended to the returned set.
    ///
    /// If `action` fails, every mutation it made is undone and the error is
    /// returned.
    pub fn write<F>(&self, action: F, preview: Option<&dyn Fn(&ChangeSet<K, V>)>) -> Result<ChangeSet<K, V>>
    where
        F: FnOnce(&CacheUpdater<'_, K, V>) -> Result<()>,
    {
        if self.editing.get() {
            return Err(Error::invalid_operation("write while an edit is already in progress"));
        }

        let before = preview.map(|_| self.data.borrow().data().clone());
        self.editing.set(true);
        let outcome = action(&CacheUpdater { owner: self });

        let mut changes = self.data.borrow_mut().capture_changes();
        if let Err(error) = outcome {
            self.rollback(&changes);
            self.editing.set(false);
            return Err(error);
        }

        if let (Some(preview), Some(before)) = (preview, before) {
            *self.preview_state.borrow_mut() = Some(before);
            preview(&changes);
            self.preview_state.borrow_mut().take();
            changes.merge(self.data.borrow_mut().capture_changes());
        }
        self.editing.set(false);

        trace!(changes = changes.len(), size = self.len(), "captured edit");
        Ok(changes)
    }

    /// Reverts captured changes, newest first, without reporting them.
    fn rollback(&self, changes: &ChangeSet<K, V>) {
        debug!(changes = changes.len(), "rolling back failed edit");
        let mut data = self.data.borrow_mut();
        for change in changes.as_slice().iter().rev() {
            match change.reason {
                ChangeReason::Add => {
                    data.remove(&change.key);
                }
                ChangeReason::Update => {
                    if let Some(previous) = &change.previous {
                        data.add_or_update(change.key.clone(), previous.clone());
                    }
                }
                ChangeReason::Remove => data.add_or_update(change.key.clone(), change.current.clone()),
                ChangeReason::Refresh | ChangeReason::Moved => {}
            }
        }
        data.capture_changes();
    }

    /// Runs an edit inside the write already in progress.
    ///
    /// Its changes join the in-flight change set.
    pub fn write_nested<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&CacheUpdater<'_, K, V>) -> Result<()>,
    {
        if !self.editing.get() {
            return Err(Error::invalid_operation("nested write without an edit in progress"));
        }
        action(&CacheUpdater { owner: self })
    }

    /// An `Add` for every held item, optionally filtered.
    pub fn initial_updates(&self, predicate: Option<&dyn Fn(&V) -> bool>) -> ChangeSet<K, V> {
        self.read(|data| {
            data.iter()
                .filter(|&(_, v)| predicate.map_or(true, |p| p(v)))
                .map(|(k, v)| Change::add(k.clone(), v.clone()))
                .collect()
        })
    }

    pub fn lookup(&self, key: &K) -> Option<V> {
        self.read(|data| data.lookup(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.read(Cache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.read(|data| data.keys().cloned().collect())
    }

    pub fn values(&self) -> Vec<V> {
        self.read(|data| data.values().cloned().collect())
    }

    pub fn items(&self) -> Vec<(K, V)> {
        self.read(|data| data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn read<R>(&self, f: impl FnOnce(&Cache<K, V>) -> R) -> R {
        if let Some(before) = self.preview_state.borrow().as_ref() {
            return f(before);
        }
        f(self.data.borrow().data())
    }
}

/// Mutation handle passed to edit closures.
///
/// Each call borrows the store only for its own duration.
pub struct CacheUpdater<'a, K, V> {
    owner: &'a ReaderWriter<K, V>,
}

impl<K: Key, V: Clone + 'static> CacheUpdater<'_, K, V> {
    /// Adds a value for a key expected to be absent.
    pub fn add(&self, key: K, value: V) {
        self.add_or_update(key, value);
    }

    /// Inserts or replaces a value.
    pub fn add_or_update(&self, key: K, value: V) {
        let mut data = self.owner.data.borrow_mut();
        if let Some(equality) = self.owner.equality {
            if data.lookup(&key).is_some_and(|current| equality(current, &value)) {
                return;
            }
        }
        data.add_or_update(key, value);
    }

    /// Inserts or replaces many values.
    pub fn add_or_update_all<I>(&self, items: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in items {
            self.add_or_update(key, value);
        }
    }

    /// Removes a key, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.owner.data.borrow_mut().remove(key)
    }

    /// Removes many keys.
    pub fn remove_keys<'k, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'k K>,
    {
        let mut data = self.owner.data.borrow_mut();
        for key in keys {
            data.remove(key);
        }
    }

    /// Signals that a held value changed in place.
    pub fn refresh(&self, key: &K) -> bool {
        self.owner.data.borrow_mut().refresh(key)
    }

    /// Refreshes every held item.
    pub fn refresh_all(&self) {
        let keys = self.keys();
        let mut data = self.owner.data.borrow_mut();
        for key in &keys {
            data.refresh(key);
        }
    }

    /// Removes every item.
    pub fn clear(&self) {
        self.owner.data.borrow_mut().clear();
    }

    /// Applies a batch of commands in order.
    pub fn apply_batch<I>(&self, commands: I)
    where
        I: IntoIterator<Item = CacheCommand<K, V>>,
    {
        if self.owner.equality.is_none() {
            apply_batch(&mut *self.owner.data.borrow_mut(), commands);
            return;
        }
        for command in commands {
            match command {
                CacheCommand::AddOrUpdate { key, value } => self.add_or_update(key, value),
                other => apply_batch(&mut *self.owner.data.borrow_mut(), [other]),
            }
        }
    }

    /// Replays an upstream change set.
    pub fn clone_changes(&self, changes: &ChangeSet<K, V>) {
        self.apply_batch(CacheCommand::from_changes(changes));
    }

    /// Looks up the current value, including changes made in this edit.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.owner.data.borrow().lookup(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.owner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.owner.data.borrow().keys().cloned().collect()
    }

    pub fn items(&self) -> Vec<(K, V)> {
        self.owner
            .data
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
