//! Observable keyed caches.
//!
//! An [`ObservableCache`] owns a [`ReaderWriter`] and publishes the change set
//! of every edit. Consumers attach through the [`ConnectableCache`] methods:
//!
//! - `connect`: current contents as `Add`s, then live changes
//! - `watch`: changes to one key
//! - `preview`: change sets before they are committed
//! - `count_changed`: the number of items, whenever it changes
//!
//! Edits nest. Only the outermost edit notifies, with one consolidated change
//! set covering everything done inside it.

use crate::filter::{filter_changes, Predicate};
use crate::observable::{Observable, Subscriber};
use crate::reader_writer::{CacheUpdater, Equality, ReaderWriter};
use crate::subject::Subject;
use crate::subscription::Subscription;
use alloc::rc::Rc;
use alloc::vec::Vec;
use cascade_core::{Change, ChangeSet, Error, Key, Result};
use core::cell::{Cell, RefCell};
use core::fmt;
use tracing::{debug, warn};

/// Options for [`ConnectableCache::connect`].
pub struct ConnectConfig<V> {
    /// Only items matching the predicate are emitted.
    pub predicate: Option<Predicate<V>>,
    pub suppress_empty_change_sets: bool,
}

impl<V> Clone for ConnectConfig<V> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            suppress_empty_change_sets: self.suppress_empty_change_sets,
        }
    }
}

impl<V> Default for ConnectConfig<V> {
    fn default() -> Self {
        Self {
            predicate: None,
            suppress_empty_change_sets: true,
        }
    }
}

impl<V> fmt::Debug for ConnectConfig<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("predicate", &self.predicate.is_some())
            .field("suppress_empty_change_sets", &self.suppress_empty_change_sets)
            .finish()
    }
}

impl<V> ConnectConfig<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters the stream by `predicate`.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&V) -> bool + 'static,
    {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    /// Emits change sets even when they are empty.
    pub fn emit_empty_change_sets(mut self) -> Self {
        self.suppress_empty_change_sets = false;
        self
    }
}

/// Read-side surface shared by every observable cache.
pub trait ConnectableCache<K, V> {
    /// Current contents as `Add`s, followed by every later change set.
    fn connect(&self, config: ConnectConfig<V>) -> Observable<ChangeSet<K, V>>;

    /// Changes for one key, starting with its current value if present.
    fn watch(&self, key: K) -> Observable<Change<K, V>>;

    /// Change sets delivered before the new state is visible to readers.
    fn preview(&self, predicate: Option<Predicate<V>>) -> Observable<ChangeSet<K, V>>;

    /// The number of items, starting with the current count.
    fn count_changed(&self) -> Observable<usize>;
}

struct CacheInner<K: Key, V: Clone + 'static> {
    data: ReaderWriter<K, V>,
    changes: Subject<ChangeSet<K, V>>,
    previews: Subject<ChangeSet<K, V>>,
    counts: RefCell<Option<Subject<usize>>>,
    edit_level: Cell<usize>,
    terminated: Cell<bool>,
    source: RefCell<Option<Subscription>>,
}

impl<K: Key, V: Clone + 'static> CacheInner<K, V> {
    fn new(equality: Option<Equality<V>>) -> Self {
        Self {
            data: ReaderWriter::with_equality(equality),
            changes: Subject::new(),
            previews: Subject::new(),
            counts: RefCell::new(None),
            edit_level: Cell::new(0),
            terminated: Cell::new(false),
            source: RefCell::new(None),
        }
    }

    fn edit<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&CacheUpdater<'_, K, V>) -> Result<()>,
    {
        if self.terminated.get() {
            return Err(Error::Terminated);
        }

        let level = self.edit_level.get();
        if level > 0 {
            return self.data.write_nested(action);
        }

        self.edit_level.set(1);
        let previews = self.previews.clone();
        let notify_preview = move |changes: &ChangeSet<K, V>| {
            if !changes.is_empty() {
                previews.next(changes);
            }
        };
        let preview: Option<&dyn Fn(&ChangeSet<K, V>)> = if self.previews.has_observers() {
            Some(&notify_preview)
        } else {
            None
        };
        let outcome = self.data.write(action, preview);
        self.edit_level.set(0);

        match outcome {
            Ok(changes) => {
                self.notify(&changes);
                Ok(())
            }
            Err(error) => {
                warn!(%error, "edit failed, terminating cache");
                self.fail(&error);
                Err(error)
            }
        }
    }

    fn notify(&self, changes: &ChangeSet<K, V>) {
        if changes.is_empty() {
            return;
        }
        self.changes.next(changes);
        let counts = self.counts.borrow().clone();
        if let Some(counts) = counts {
            counts.next(&self.data.len());
        }
    }

    fn count_subject(&self) -> Subject<usize> {
        let mut counts = self.counts.borrow_mut();
        if let Some(subject) = counts.as_ref() {
            return subject.clone();
        }
        let subject = Subject::new();
        if self.terminated.get() {
            subject.complete();
        }
        *counts = Some(subject.clone());
        subject
    }

    fn fail(&self, error: &Error) {
        self.terminated.set(true);
        self.previews.error(error);
        self.changes.error(error);
        let counts = self.counts.borrow().clone();
        if let Some(counts) = counts {
            counts.error(error);
        }
    }

    fn complete(&self) {
        self.previews.complete();
        self.changes.complete();
        let counts = self.counts.borrow().clone();
        if let Some(counts) = counts {
            counts.complete();
        }
    }

    fn dispose(&self) {
        let source = self.source.borrow_mut().take();
        drop(source);
        if !self.terminated.replace(true) {
            debug!(size = self.data.len(), "cache disposed");
        }
        self.complete();
    }
}


/// Disposes the cache when the last user handle goes away.
struct CacheHandle<K: Key, V: Clone + 'static> {
    inner: Rc<CacheInner<K, V>>,
}

impl<K: Key, V: Clone + 'static> Drop for CacheHandle<K, V> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

/// A keyed cache that publishes its changes.
///
/// Handles are cheap to clone and share one store. The cache is disposed when
/// [`dispose`](ObservableCache::dispose) is called or the last handle is
/// dropped; streams created from it then complete.
pub struct ObservableCache<K: Key, V: Clone + 'static> {
    handle: Rc<CacheHandle<K, V>>,
}

impl<K: Key, V: Clone + 'static> Clone for ObservableCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            handle: Rc::clone(&self.handle),
        }
    }
}

impl<K: Key, V: Clone + 'static> Default for ObservableCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V: Clone + 'static> fmt::Debug for ObservableCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCache")
            .field("len", &self.len())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl<K: Key, V: Clone + 'static> ObservableCache<K, V> {
    /// Creates an empty cache edited with explicit keys.
    pub fn new() -> Self {
        Self::with_equality(None)
    }

    /// Creates an empty cache that ignores updates to an equal value.
    pub fn with_deep_equal() -> Self
    where
        V: PartialEq,
    {
        Self::with_equality(Some(<V as PartialEq>::eq))
    }

    pub(crate) fn with_equality(equality: Option<Equality<V>>) -> Self {
        Self {
            handle: Rc::new(CacheHandle {
                inner: Rc::new(CacheInner::new(equality)),
            }),
        }
    }

    /// Creates a cache that mirrors an upstream change stream.
    ///
    /// An upstream error terminates the cache's streams with that error and
    /// upstream completion completes them.
    pub fn from_stream(source: &Observable<ChangeSet<K, V>>) -> Self {
        Self::from_stream_with_equality(source, None)
    }

    /// Mirrors an upstream change stream, ignoring updates to an equal value.
    pub fn from_stream_deep_equal(source: &Observable<ChangeSet<K, V>>) -> Self
    where
        V: PartialEq,
    {
        Self::from_stream_with_equality(source, Some(<V as PartialEq>::eq))
    }

    pub(crate) fn from_stream_with_equality(
        source: &Observable<ChangeSet<K, V>>,
        equality: Option<Equality<V>>,
    ) -> Self {
        let cache = Self::with_equality(equality);
        let on_next = Rc::downgrade(cache.inner());
        let on_error = on_next.clone();
        let on_completed = on_next.clone();

        let subscription = source.subscribe_all(
            move |changes: &ChangeSet<K, V>| {
                if let Some(inner) = on_next.upgrade() {
                    let _ = inner.edit(|updater| {
                        updater.clone_changes(changes);
                        Ok(())
                    });
                }
            },
            move |error| {
                if let Some(inner) = on_error.upgrade() {
                    warn!(%error, "upstream error, terminating cache");
                    inner.fail(error);
                }
            },
            move || {
                if let Some(inner) = on_completed.upgrade() {
                    inner.complete();
                }
            },
        );
        *cache.inner().source.borrow_mut() = Some(subscription);
        cache
    }

    #[inline]
    fn inner(&self) -> &Rc<CacheInner<K, V>> {
        &self.handle.inner
    }

    /// Runs an edit. Notification happens when the outermost edit returns.
    pub fn edit<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&CacheUpdater<'_, K, V>),
    {
        self.inner().edit(|updater| {
            action(updater);
            Ok(())
        })
    }

    /// Runs a fallible edit.
    ///
    /// An error from the action is returned, delivered on the preview and
    /// change streams, and terminates the cache.
    pub fn try_edit<F>(&self, action: F) -> Result<()>
    where
        F: FnOnce(&CacheUpdater<'_, K, V>) -> Result<()>,
    {
        self.inner().edit(action)
    }

    pub fn lookup(&self, key: &K) -> Option<V> {
        self.inner().data.lookup(key)
    }

    pub fn len(&self) -> usize {
        self.inner().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().data.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner().data.keys()
    }

    pub fn values(&self) -> Vec<V> {
        self.inner().data.values()
    }

    pub fn items(&self) -> Vec<(K, V)> {
        self.inner().data.items()
    }

    /// Returns true once the cache has errored or been disposed.
    pub fn is_terminated(&self) -> bool {
        self.inner().terminated.get()
    }

    /// Completes every stream and releases the upstream, if any.
    pub fn dispose(&self) {
        self.inner().dispose();
    }
}

impl<K: Key, V: Clone + 'static> ConnectableCache<K, V> for ObservableCache<K, V> {
    fn connect(&self, config: ConnectConfig<V>) -> Observable<ChangeSet<K, V>> {
        let inner = Rc::clone(self.inner());
        let seeded = Observable::new(move |subscriber: Subscriber<ChangeSet<K, V>>| {
            let live = inner
                .changes
                .as_observable()
                .subscribe_with_subscriber(subscriber.clone());
            subscriber.next(&inner.data.initial_updates(None));
            live
        });

        let stream = match config.predicate {
            Some(predicate) => filter_changes(&seeded, predicate),
            None => seeded,
        };
        if config.suppress_empty_change_sets {
            stream.filter(|changes| !changes.is_empty())
        } else {
            stream
        }
    }

    fn watch(&self, key: K) -> Observable<Change<K, V>> {
        let inner = Rc::clone(self.inner());
        Observable::new(move |subscriber| {
            let watched = key.clone();
            let live = inner.changes.as_observable().subscribe_with_subscriber(Subscriber::relay(
                &subscriber,
                move |changes: &ChangeSet<K, V>, out| {
                    for change in changes.iter().filter(|c| c.key == watched) {
                        out.next(change);
                    }
                },
            ));
            if let Some(value) = inner.data.lookup(&key) {
                subscriber.next(&Change::add(key.clone(), value));
            }
            live
        })
    }

    fn preview(&self, predicate: Option<Predicate<V>>) -> Observable<ChangeSet<K, V>> {
        let previews = self.inner().previews.as_observable();
        match predicate {
            None => previews,
            Some(predicate) => previews
                .map(move |changes: &ChangeSet<K, V>| {
                    changes
                        .iter()
                        .filter(|c| predicate(&c.current))
                        .cloned()
                        .collect::<ChangeSet<K, V>>()
                })
                .filter(|changes| !changes.is_empty()),
        }
    }

    fn count_changed(&self) -> Observable<usize> {
        let inner = Rc::clone(self.inner());
        Observable::new(move |subscriber| {
            let live = inner
                .count_subject()
                .as_observable()
                .subscribe_with_subscriber(subscriber.clone());
            subscriber.next(&inner.data.len());
            live
        })
        .distinct_until_changed()
    }
}
