//! Following the most recent of a stream of change streams.

use alloc::rc::Rc;
use cascade_core::{ChangeSet, Error, Key};
use cascade_reactive::{
    CacheUpdater, ConnectConfig, ConnectableCache, Observable, ObservableCache, SharedSubscription,
    Subscriber, Subscription,
};
use core::cell::{Cell, RefCell};
use tracing::{debug, warn};

/// Shared state of one `switch_cache` subscription.
struct Switcher<K: Key, V: Clone + 'static> {
    destination: ObservableCache<K, V>,
    downstream: Subscriber<ChangeSet<K, V>>,
    owned: SharedSubscription,
    inner: RefCell<Option<Subscription>>,
    /// Bumped on every switch so a stale inner stream cannot complete the output.
    generation: Cell<u64>,
    outer_done: Cell<bool>,
    inner_done: Cell<bool>,
    forward_empty: bool,
    live: Cell<bool>,
}

impl<K: Key, V: Clone + 'static> Switcher<K, V> {
    fn switch_to(self: &Rc<Self>, source: &Observable<ChangeSet<K, V>>) {
        self.release_inner();
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.inner_done.set(false);
        debug!(generation, "switch_cache: new source");
        self.apply(|updater| updater.clear());

        let on_next = Rc::clone(self);
        let on_error = Rc::clone(self);
        let on_completed = Rc::clone(self);
        let subscription = source.subscribe_all(
            move |changes: &ChangeSet<K, V>| on_next.forward(changes),
            move |error| on_error.fail(error),
            move || on_completed.inner_completed(generation),
        );
        if self.owned.is_released() || self.generation.get() != generation {
            drop(subscription);
            return;
        }
        *self.inner.borrow_mut() = Some(subscription);
    }

    fn forward(&self, changes: &ChangeSet<K, V>) {
        if changes.is_empty() {
            if self.forward_empty && self.live.get() {
                self.downstream.next(changes);
            }
            return;
        }
        self.apply(|updater| updater.clone_changes(changes));
    }

    fn apply<F>(&self, action: F)
    where
        F: FnOnce(&CacheUpdater<'_, K, V>),
    {
        if let Err(error) = self.destination.edit(action) {
            self.fail(&error);
        }
    }

    fn inner_completed(&self, generation: u64) {
        if self.generation.get() != generation {
            return;
        }
        self.inner_done.set(true);
        if self.outer_done.get() {
            self.complete();
        }
    }

    fn outer_completed(&self) {
        self.outer_done.set(true);
        if self.inner_done.get() {
            self.complete();
        }
    }

    fn complete(&self) {
        debug!("switch_cache: all sources completed");
        self.downstream.complete();
        self.owned.release();
        self.release_inner();
    }

    fn fail(&self, error: &Error) {
        warn!(%error, "switch_cache: source failed");
        self.downstream.error(error);
        self.owned.release();
        self.release_inner();
    }

    fn release_inner(&self) {
        let previous = self.inner.borrow_mut().take();
        drop(previous);
    }
}

/// Mirrors the most recent change stream emitted by `sources`.
///
/// Each new inner stream unsubscribes the previous one and clears the
/// result before the new stream's changes are applied. The output completes
/// once `sources` and the current inner stream have both completed; the
/// first error from either terminates it.
///
/// `config` shapes the output. The initial empty snapshot is never emitted,
/// and empty inner change sets are forwarded only when `config` asks for
/// empty change sets.
pub fn switch_cache<K, V>(
    sources: &Observable<Observable<ChangeSet<K, V>>>,
    config: ConnectConfig<V>,
) -> Observable<ChangeSet<K, V>>
where
    K: Key,
    V: Clone + 'static,
{
    let sources = sources.clone();
    Observable::new(move |downstream: Subscriber<ChangeSet<K, V>>| {
        let switcher = Rc::new(Switcher {
            destination: ObservableCache::new(),
            downstream: downstream.clone(),
            owned: SharedSubscription::new(),
            inner: RefCell::new(None),
            generation: Cell::new(0),
            outer_done: Cell::new(false),
            inner_done: Cell::new(true),
            forward_empty: !config.suppress_empty_change_sets,
            live: Cell::new(false),
        });

        let on_next = Rc::clone(&switcher);
        let on_error = Rc::clone(&switcher);
        let on_completed = Rc::clone(&switcher);
        let mut subscription = sources.subscribe_all(
            move |source: &Observable<ChangeSet<K, V>>| on_next.switch_to(source),
            move |error| on_error.fail(error),
            move || on_completed.outer_completed(),
        );

        let first = Cell::new(true);
        subscription.add(
            switcher
                .destination
                .connect(config.clone())
                .subscribe_with_subscriber(Subscriber::relay(&downstream, move |changes: &ChangeSet<K, V>, out| {
                    if first.replace(false) && changes.is_empty() {
                        return;
                    }
                    out.next(changes);
                })),
        );
        switcher.live.set(true);

        let teardown = Rc::clone(&switcher);
        subscription.add_teardown(move || {
            teardown.release_inner();
            teardown.destination.dispose();
        });
        switcher.owned.set(subscription);
        switcher.owned.handle()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use cascade_reactive::{ChangeSetAggregator, SourceCache, Subject};

    #[derive(Clone, Debug, PartialEq)]
    struct Person {
        id: u32,
        age: u32,
    }

    fn people(start: u32, count: u32) -> Vec<Person> {
        (start..start + count).map(|id| Person { id, age: id }).collect()
    }

    fn source() -> SourceCache<u32, Person> {
        SourceCache::new(|p: &Person| p.id)
    }

    struct Fixture {
        first: SourceCache<u32, Person>,
        switchable: Subject<Observable<ChangeSet<u32, Person>>>,
        results: ChangeSetAggregator<u32, Person>,
    }

    fn fixture(config: ConnectConfig<Person>) -> Fixture {
        let first = source();
        let switchable = Subject::new();
        let sources = switchable
            .as_observable()
            .start_with(first.connect(ConnectConfig::default()));
        let results = ChangeSetAggregator::new(&switch_cache(&sources, config));
        Fixture {
            first,
            switchable,
            results,
        }
    }

    #[test]
    fn test_populates_first_source() {
        let f = fixture(ConnectConfig::default());
        f.first.add_or_update_values(people(1, 100)).unwrap();

        assert_eq!(f.results.len(), 100);
    }

    #[test]
    fn test_clears_for_new_source() {
        let f = fixture(ConnectConfig::default());
        f.first.add_or_update_values(people(1, 100)).unwrap();
        assert_eq!(f.results.len(), 100);

        let next = source();
        f.switchable.next(&next.connect(ConnectConfig::default()));
        assert_eq!(f.results.len(), 0);

        next.add_or_update_values(people(1, 100)).unwrap();
        assert_eq!(f.results.len(), 100);

        next.add_or_update_values(people(101, 100)).unwrap();
        assert_eq!(f.results.len(), 200);
    }

    #[test]
    fn test_previous_source_is_ignored() {
        let f = fixture(ConnectConfig::default());
        f.first.add_or_update_values(people(1, 10)).unwrap();

        let next = source();
        f.switchable.next(&next.connect(ConnectConfig::default()));
        let before = f.results.message_count();

        f.first.add_or_update_values(people(50, 5)).unwrap();
        assert_eq!(f.results.message_count(), before);
        assert!(f.results.is_empty());
    }

    #[test]
    fn test_suppresses_empty() {
        let f = fixture(ConnectConfig::default());
        f.first.edit(|_| {}).unwrap();

        assert_eq!(f.results.message_count(), 0);
    }

    #[test]
    fn test_allows_empty() {
        let inner: Subject<ChangeSet<u32, Person>> = Subject::new();
        let sources = Observable::never().start_with(inner.as_observable());
        let results = ChangeSetAggregator::new(&switch_cache(
            &sources,
            ConnectConfig::default().emit_empty_change_sets(),
        ));
        assert_eq!(results.message_count(), 0);

        inner.next(&ChangeSet::new());
        assert_eq!(results.message_count(), 1);
    }

    #[test]
    fn test_inner_error_releases_sources() {
        let inner: Subject<ChangeSet<u32, Person>> = Subject::new();
        let switchable: Subject<Observable<ChangeSet<u32, Person>>> = Subject::new();
        let results = ChangeSetAggregator::new(&switch_cache(&switchable.as_observable(), ConnectConfig::default()));
        switchable.next(&inner.as_observable());
        assert_eq!(inner.observer_count(), 1);

        inner.error(&Error::Terminated);
        assert_eq!(results.error(), Some(Error::Terminated));
        assert_eq!(switchable.observer_count(), 0);
    }

    #[test]
    fn test_completes_after_outer_and_current_inner() {
        let inner: Subject<ChangeSet<u32, Person>> = Subject::new();
        let switchable: Subject<Observable<ChangeSet<u32, Person>>> = Subject::new();
        let results = ChangeSetAggregator::new(&switch_cache(&switchable.as_observable(), ConnectConfig::default()));
        switchable.next(&inner.as_observable());

        switchable.complete();
        assert!(!results.is_completed());

        inner.complete();
        assert!(results.is_completed());
    }

    #[test]
    fn test_unsubscribe_releases_current_inner() {
        let inner: Subject<ChangeSet<u32, Person>> = Subject::new();
        let switchable: Subject<Observable<ChangeSet<u32, Person>>> = Subject::new();
        let subscription = switch_cache(&switchable.as_observable(), ConnectConfig::default()).subscribe(|_| {});
        switchable.next(&inner.as_observable());
        assert_eq!(inner.observer_count(), 1);

        drop(subscription);
        assert_eq!(inner.observer_count(), 0);
        assert_eq!(switchable.observer_count(), 0);
    }
}
