//! Caches keyed by a selector over their values.

use crate::filter::Predicate;
use crate::observable::Observable;
use crate::observable_cache::{ConnectConfig, ConnectableCache, ObservableCache};
use crate::reader_writer::CacheUpdater;
use alloc::rc::Rc;
use cascade_core::{Change, ChangeSet, Key, Result};
use core::fmt;
use core::ops::Deref;

/// Derives the key of a value.
pub type KeySelector<K, V> = Rc<dyn Fn(&V) -> K>;

/// An [`ObservableCache`] whose keys come from the values themselves.
pub struct SourceCache<K: Key, V: Clone + 'static> {
    cache: ObservableCache<K, V>,
    key_selector: KeySelector<K, V>,
}

impl<K: Key, V: Clone + 'static> Clone for SourceCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            key_selector: Rc::clone(&self.key_selector),
        }
    }
}

impl<K: Key, V: Clone + 'static> fmt::Debug for SourceCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCache").field("cache", &self.cache).finish()
    }
}

impl<K: Key, V: Clone + 'static> SourceCache<K, V> {
    /// Creates an empty source cache.
    pub fn new<S>(key_selector: S) -> Self
    where
        S: Fn(&V) -> K + 'static,
    {
        Self {
            cache: ObservableCache::new(),
            key_selector: Rc::new(key_selector),
        }
    }

    /// Creates an empty source cache that ignores updates to an equal value.
    pub fn with_deep_equal<S>(key_selector: S) -> Self
    where
        V: PartialEq,
        S: Fn(&V) -> K + 'static,
    {
        Self {
            cache: ObservableCache::with_deep_equal(),
            key_selector: Rc::new(key_selector),
        }
    }

    /// Returns the key a value would be stored under.
    pub fn key_of(&self, value: &V) -> K {
        (self.key_selector)(value)
    }

    /// Runs an edit with value-aware helpers.
    pub fn edit<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&SourceUpdater<'_, '_, K, V>),
    {
        self.try_edit(|updater| {
            action(updater);
            Ok(())
        })
    }

    /// Runs a fallible edit.
    pub fn try_edit<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&SourceUpdater<'_, '_, K, V>) -> Result<()>,
    {
        let key_selector = &*self.key_selector;
        self.cache.try_edit(|updater| {
            action(&SourceUpdater {
                updater,
                key_selector,
            })
        })
    }

    pub fn add_or_update(&self, value: V) -> Result<()> {
        self.edit(|u| u.add_or_update_value(value))
    }

    pub fn add_or_update_values<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
    {
        self.edit(|u| u.add_or_update_values(values))
    }

    pub fn remove_value(&self, value: &V) -> Result<()> {
        self.edit(|u| {
            u.remove_value(value);
        })
    }

    pub fn remove_key(&self, key: &K) -> Result<()> {
        self.edit(|u| {
            u.remove(key);
        })
    }

    pub fn remove_keys<'k, I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'k K>,
    {
        self.edit(|u| u.remove_keys(keys))
    }

    pub fn refresh_key(&self, key: &K) -> Result<()> {
        self.edit(|u| {
            u.refresh(key);
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.edit(|u| u.clear())
    }

    /// Returns the underlying observable cache.
    #[inline]
    pub fn as_observable_cache(&self) -> &ObservableCache<K, V> {
        &self.cache
    }
}

impl<K: Key, V: Clone + 'static> Deref for SourceCache<K, V> {
    type Target = ObservableCache<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl<K: Key, V: Clone + 'static> ConnectableCache<K, V> for SourceCache<K, V> {
    fn connect(&self, config: ConnectConfig<V>) -> Observable<ChangeSet<K, V>> {
        self.cache.connect(config)
    }

    fn watch(&self, key: K) -> Observable<Change<K, V>> {
        self.cache.watch(key)
    }

    fn preview(&self, predicate: Option<Predicate<V>>) -> Observable<ChangeSet<K, V>> {
        self.cache.preview(predicate)
    }

    fn count_changed(&self) -> Observable<usize> {
        self.cache.count_changed()
    }
}

/// [`CacheUpdater`] plus operations that derive keys from values.
pub struct SourceUpdater<'u, 'a, K, V> {
    updater: &'u CacheUpdater<'a, K, V>,
    key_selector: &'u dyn Fn(&V) -> K,
}

impl<K: Key, V: Clone + 'static> SourceUpdater<'_, '_, K, V> {
    pub fn add_or_update_value(&self, value: V) {
        let key = (self.key_selector)(&value);
        self.updater.add_or_update(key, value);
    }

    pub fn add_or_update_values<I>(&self, values: I)
    where
        I: IntoIterator<Item = V>,
    {
        for value in values {
            self.add_or_update_value(value);
        }
    }

    pub fn remove_value(&self, value: &V) -> Option<V> {
        self.updater.remove(&(self.key_selector)(value))
    }

    pub fn remove_values<'v, I>(&self, values: I)
    where
        I: IntoIterator<Item = &'v V>,
    {
        for value in values {
            self.remove_value(value);
        }
    }

    pub fn refresh_value(&self, value: &V) -> bool {
        self.updater.refresh(&(self.key_selector)(value))
    }
}

impl<'a, K, V> Deref for SourceUpdater<'_, 'a, K, V> {
    type Target = CacheUpdater<'a, K, V>;

    fn deref(&self) -> &Self::Target {
        self.updater
    }
}
