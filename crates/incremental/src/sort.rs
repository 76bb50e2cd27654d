//! Incrementally sorted views of a change stream.

use crate::index_calculator::settle;
use alloc::rc::Rc;
use alloc::vec::Vec;
use cascade_core::{
    Cache, Change, ChangeReason, ChangeSet, Key, KeyValueCollection, KeyValueComparer, SortReason,
    SortedChangeSet,
};
use cascade_reactive::{Observable, SharedSubscription, Subscriber};
use core::cell::RefCell;
use tracing::{trace, warn};

/// Keeps a sorted copy of a keyed collection up to date.
///
/// Nothing is produced until both a comparer and some data are present. The
/// first output carries every item as an indexed `Add` tagged
/// [`SortReason::InitialLoad`].
pub struct Sorter<K, V> {
    data: Cache<K, V>,
    sorted: Vec<(K, V)>,
    comparer: Option<KeyValueComparer<K, V>>,
    loaded: bool,
}

impl<K: Key, V: Clone + 'static> Sorter<K, V> {
    pub fn new(comparer: Option<KeyValueComparer<K, V>>) -> Self {
        Self {
            data: Cache::new(),
            sorted: Vec::new(),
            comparer,
            loaded: false,
        }
    }

    /// Returns the current sorted items.
    #[inline]
    pub fn items(&self) -> &[(K, V)] {
        &self.sorted
    }

    /// Installs a new comparer and re-sorts everything.
    pub fn on_comparer(&mut self, comparer: KeyValueComparer<K, V>) -> Option<SortedChangeSet<K, V>> {
        self.comparer = Some(comparer.clone());
        if !self.loaded {
            return self.initial_load();
        }

        self.sorted.sort_by(|a, b| comparer.compare(a, b));
        trace!(items = self.sorted.len(), "sort: comparer changed");
        Some(SortedChangeSet::new(
            self.snapshot(SortReason::ComparerChanged),
            ChangeSet::new(),
        ))
    }

    /// Applies an upstream change set.
    pub fn on_changes(&mut self, changes: &ChangeSet<K, V>) -> Option<SortedChangeSet<K, V>> {
        self.data.clone_changes(changes);
        let comparer = self.comparer.clone()?;
        if !self.loaded {
            return self.initial_load();
        }

        let mut result = ChangeSet::with_capacity(changes.len());
        let refreshed: Vec<(K, V)> = changes
            .iter()
            .filter(|change| change.reason == ChangeReason::Refresh)
            .map(|change| (change.key.clone(), change.current.clone()))
            .collect();
        settle(&comparer, refreshed, &mut self.sorted, |key, value, index, old| {
            let (key, current) = (key.clone(), value.clone());
            result.push(if index == old {
                Change::refresh(key, current).at(index)
            } else {
                Change::moved(key, current, index, old)
            });
        });

        for change in changes {
            let old = self.sorted.iter().position(|(k, _)| *k == change.key);
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    let previous = old.map(|index| self.sorted.remove(index).1);
                    let item = (change.key.clone(), change.current.clone());
                    let index = comparer.insertion_point(&self.sorted, &item);
                    self.sorted.insert(index, item);

                    let key = change.key.clone();
                    let current = change.current.clone();
                    result.push(match (old, previous) {
                        (Some(old), Some(previous)) => {
                            Change::update(key, current, previous).at_indices(index, old)
                        }
                        _ => Change::add(key, current).at(index),
                    });
                }
                ChangeReason::Remove => {
                    if let Some(index) = old {
                        let (key, value) = self.sorted.remove(index);
                        result.push(Change::remove(key, value).at(index));
                    }
                }
                ChangeReason::Refresh | ChangeReason::Moved => {}
            }
        }

        if result.is_empty() {
            return None;
        }
        Some(SortedChangeSet::new(self.snapshot(SortReason::DataChanged), result))
    }

    fn initial_load(&mut self) -> Option<SortedChangeSet<K, V>> {
        let comparer = self.comparer.clone()?;
        if self.data.is_empty() {
            return None;
        }

        self.sorted = self.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.sorted.sort_by(|a, b| comparer.compare(a, b));
        self.loaded = true;
        trace!(items = self.sorted.len(), "sort: initial load");

        let changes = self
            .sorted
            .iter()
            .enumerate()
            .map(|(index, (k, v))| Change::add(k.clone(), v.clone()).at(index))
            .collect();
        Some(SortedChangeSet::new(self.snapshot(SortReason::InitialLoad), changes))
    }

    fn snapshot(&self, reason: SortReason) -> KeyValueCollection<K, V> {
        KeyValueCollection::new(self.sorted.clone(), self.comparer.clone(), reason)
    }
}

/// Sorts a change stream with a fixed comparer.
pub fn sort<K, V>(source: &Observable<ChangeSet<K, V>>, comparer: KeyValueComparer<K, V>) -> Observable<SortedChangeSet<K, V>>
where
    K: Key,
    V: Clone + 'static,
{
    let source = source.clone();
    Observable::new(move |downstream| {
        let sorter = RefCell::new(Sorter::new(Some(comparer.clone())));
        source.subscribe_with_subscriber(Subscriber::relay(&downstream, move |changes, out| {
            let sorted = sorter.borrow_mut().on_changes(changes);
            if let Some(sorted) = sorted {
                out.next(&sorted);
            }
        }))
    })
}

/// Sorts a change stream with the most recent comparer from `comparer_changes`.
///
/// An error from either input terminates the output and releases both.
pub fn sort_with<K, V>(
    source: &Observable<ChangeSet<K, V>>,
    comparer_changes: &Observable<KeyValueComparer<K, V>>,
) -> Observable<SortedChangeSet<K, V>>
where
    K: Key,
    V: Clone + 'static,
{
    let source = source.clone();
    let comparer_changes = comparer_changes.clone();
    Observable::new(move |downstream| {
        let sorter = Rc::new(RefCell::new(Sorter::new(None)));
        let owned = SharedSubscription::new();

        let on_comparer = Rc::clone(&sorter);
        let out = downstream.clone();
        let on_error = downstream.clone();
        let comparer_failed = owned.clone();
        let mut subscription = comparer_changes.subscribe_all(
            move |comparer: &KeyValueComparer<K, V>| {
                let sorted = on_comparer.borrow_mut().on_comparer(comparer.clone());
                if let Some(sorted) = sorted {
                    out.next(&sorted);
                }
            },
            move |error| {
                warn!(%error, "comparer stream failed");
                on_error.error(error);
                comparer_failed.release();
            },
            || {},
        );

        let out = downstream.clone();
        let on_error = downstream.clone();
        let on_completed = downstream.clone();
        let source_failed = owned.clone();
        subscription.add(source.subscribe_with_subscriber(Subscriber::from_fn(
            move |changes| {
                let sorted = sorter.borrow_mut().on_changes(changes);
                if let Some(sorted) = sorted {
                    out.next(&sorted);
                }
            },
            move |error| {
                on_error.error(error);
                source_failed.release();
            },
            move || on_completed.complete(),
        )));
        owned.set(subscription);
        owned.handle()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use cascade_reactive::{Subject, Subscription};

    fn by_value() -> KeyValueComparer<u32, u32> {
        KeyValueComparer::ascending(|v: &u32| *v)
    }

    fn capture(source: &Observable<SortedChangeSet<u32, u32>>) -> (Rc<RefCell<Vec<SortedChangeSet<u32, u32>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let sub = source.subscribe(move |s: &SortedChangeSet<u32, u32>| log_clone.borrow_mut().push(s.clone()));
        (log, sub)
    }

    fn keys(sorted: &SortedChangeSet<u32, u32>) -> Vec<u32> {
        sorted.sorted_items.keys().copied().collect()
    }

    #[test]
    fn test_sort_initial_load() {
        let subject: Subject<ChangeSet<u32, u32>> = Subject::new();
        let (log, _sub) = capture(&sort(&subject.as_observable(), by_value()));

        subject.next(&vec![Change::add(1, 30), Change::add(2, 20), Change::add(3, 25)].into());

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sorted_items.sort_reason(), SortReason::InitialLoad);
        assert_eq!(keys(&log[0]), vec![2, 3, 1]);
        assert_eq!(
            log[0].changes.as_slice(),
            &[Change::add(2, 20).at(0), Change::add(3, 25).at(1), Change::add(1, 30).at(2)]
        );
    }

    #[test]
    fn test_sort_data_changes() {
        let subject: Subject<ChangeSet<u32, u32>> = Subject::new();
        let (log, _sub) = capture(&sort(&subject.as_observable(), by_value()));

        subject.next(&vec![Change::add(1, 10), Change::add(2, 20)].into());
        subject.next(&vec![Change::add(3, 15)].into());
        subject.next(&vec![Change::update(1, 30, 10)].into());
        subject.next(&vec![Change::remove(3, 15)].into());

        let log = log.borrow();
        assert_eq!(log.len(), 4);
        assert_eq!(log[1].sorted_items.sort_reason(), SortReason::DataChanged);
        assert_eq!(log[1].changes.as_slice(), &[Change::add(3, 15).at(1)]);
        assert_eq!(
            log[2].changes.as_slice(),
            &[Change::update(1, 30, 10).at_indices(2, 0)]
        );
        assert_eq!(keys(&log[2]), vec![3, 2, 1]);
        assert_eq!(log[3].changes.as_slice(), &[Change::remove(3, 15).at(0)]);
    }

    #[test]
    fn test_sort_settles_refresh_batch() {
        let cells: Vec<Rc<core::cell::Cell<u32>>> =
            [10, 20, 30, 40].iter().map(|v| Rc::new(core::cell::Cell::new(*v))).collect();
        let mut sorter = Sorter::new(Some(KeyValueComparer::ascending(|v: &Rc<core::cell::Cell<u32>>| v.get())));
        let adds: ChangeSet<u32, _> = (0u32..4).map(|k| Change::add(k, cells[k as usize].clone())).collect();
        sorter.on_changes(&adds).unwrap();

        cells[0].set(35);
        cells[3].set(5);
        cells[1].set(33);
        let batch: ChangeSet<u32, _> = vec![
            Change::refresh(0, cells[0].clone()),
            Change::refresh(3, cells[3].clone()),
            Change::refresh(1, cells[1].clone()),
            Change::add(4, Rc::new(core::cell::Cell::new(34))),
        ]
        .into();
        let sorted = sorter.on_changes(&batch).unwrap();

        let expected = vec![3, 2, 1, 4, 0];
        assert_eq!(sorted.sorted_items.keys().copied().collect::<Vec<_>>(), expected);

        let mut replayed = vec![0u32, 1, 2, 3];
        for change in sorted.changes.iter() {
            match change.reason {
                ChangeReason::Add => replayed.insert(change.current_index.unwrap(), change.key),
                ChangeReason::Moved => {
                    replayed.remove(change.previous_index.unwrap());
                    replayed.insert(change.current_index.unwrap(), change.key);
                }
                _ => {}
            }
        }
        assert_eq!(replayed, expected);
    }

    #[test]
    fn test_sort_refresh_moves_or_passes() {
        let subject: Subject<ChangeSet<u32, u32>> = Subject::new();
        let (log, _sub) = capture(&sort(&subject.as_observable(), by_value()));

        subject.next(&vec![Change::add(1, 10), Change::add(2, 20)].into());
        subject.next(&vec![Change::refresh(1, 10)].into());
        subject.next(&vec![Change::refresh(1, 25)].into());

        let log = log.borrow();
        assert_eq!(log[1].changes.as_slice(), &[Change::refresh(1, 10).at(0)]);
        assert_eq!(log[2].changes.as_slice(), &[Change::moved(1, 25, 1, 0)]);
        assert_eq!(keys(&log[2]), vec![2, 1]);
    }

    #[test]
    fn test_sort_waits_for_comparer() {
        let data: Subject<ChangeSet<u32, u32>> = Subject::new();
        let comparers: Subject<KeyValueComparer<u32, u32>> = Subject::new();
        let (log, _sub) = capture(&sort_with(&data.as_observable(), &comparers.as_observable()));

        data.next(&vec![Change::add(1, 10), Change::add(2, 20)].into());
        assert!(log.borrow().is_empty());

        comparers.next(&by_value());
        comparers.next(&KeyValueComparer::descending(|v: &u32| *v));

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].sorted_items.sort_reason(), SortReason::InitialLoad);
        assert_eq!(keys(&log[0]), vec![1, 2]);
        assert_eq!(log[1].sorted_items.sort_reason(), SortReason::ComparerChanged);
        assert!(log[1].changes.is_empty());
        assert_eq!(keys(&log[1]), vec![2, 1]);
    }

    #[test]
    fn test_sort_skips_empty_first_batch() {
        let subject: Subject<ChangeSet<u32, u32>> = Subject::new();
        let (log, _sub) = capture(&sort(&subject.as_observable(), by_value()));

        subject.next(&ChangeSet::new());
        assert!(log.borrow().is_empty());

        subject.next(&vec![Change::add(1, 1)].into());
        assert_eq!(log.borrow()[0].sorted_items.sort_reason(), SortReason::InitialLoad);
    }

    #[test]
    fn test_sort_with_error_releases_inputs() {
        let data: Subject<ChangeSet<u32, u32>> = Subject::new();
        let comparers: Subject<KeyValueComparer<u32, u32>> = Subject::new();
        let (log, _sub) = capture(&sort_with(&data.as_observable(), &comparers.as_observable()));

        comparers.error(&cascade_core::Error::Terminated);
        assert_eq!(data.observer_count(), 0);

        data.next(&vec![Change::add(1, 1)].into());
        assert!(log.borrow().is_empty());

        let data: Subject<ChangeSet<u32, u32>> = Subject::new();
        let comparers: Subject<KeyValueComparer<u32, u32>> = Subject::new();
        let (_log, _sub) = capture(&sort_with(&data.as_observable(), &comparers.as_observable()));
        data.error(&cascade_core::Error::Terminated);
        assert_eq!(comparers.observer_count(), 0);
    }
}
