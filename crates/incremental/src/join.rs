//! Joins between two keyed change streams.
//!
//! Every join materializes both inputs into local caches and keeps one
//! result cache. A change on either side is looked up against the other
//! side's cache, the result cache is patched, and whatever it captured is
//! emitted. Left and right batches are handled as separate notifications.
//!
//! Refreshes on either side become refreshes of the affected results; the
//! result selector is not re-run for them.

use crate::group::group_with_immutable_state;
use alloc::rc::Rc;
use cascade_core::{ChangeAwareCache, ChangeReason, ChangeSet, JoinKey, Key};
use cascade_reactive::{
    change_key, ConnectConfig, ConnectableCache, Observable, ObservableCache, SharedSubscription,
    Subscriber, Subscription,
};
use core::cell::RefCell;
use tracing::{debug, warn};

type Joined<K, D> = Rc<RefCell<ChangeAwareCache<K, D>>>;

fn joined_cache<K: Key, D: Clone>() -> Joined<K, D> {
    Rc::new(RefCell::new(ChangeAwareCache::with_replace_for_updates()))
}

/// Feeds both loaders into `downstream`, skipping empty results.
///
/// The output completes once both inputs have completed. The first error
/// from either side terminates it and releases `owned`.
fn run_loaders<LK, L, RK, R, K, D, FL, FR>(
    downstream: &Subscriber<ChangeSet<K, D>>,
    owned: &SharedSubscription,
    left: &Observable<ChangeSet<LK, L>>,
    on_left: FL,
    right: &Observable<ChangeSet<RK, R>>,
    on_right: FR,
) -> Subscription
where
    LK: 'static,
    L: 'static,
    RK: 'static,
    R: 'static,
    K: 'static,
    D: 'static,
    FL: Fn(&ChangeSet<LK, L>) -> ChangeSet<K, D> + 'static,
    FR: Fn(&ChangeSet<RK, R>) -> ChangeSet<K, D> + 'static,
{
    left.map(on_left)
        .merge(&right.map(on_right))
        .filter(|changes| !changes.is_empty())
        .subscribe_with_subscriber(forward(downstream, owned))
}

fn forward<T: 'static>(downstream: &Subscriber<T>, owned: &SharedSubscription) -> Subscriber<T> {
    let on_next = downstream.clone();
    let on_error = downstream.clone();
    let on_completed = downstream.clone();
    let owned = owned.clone();
    Subscriber::from_fn(
        move |value| on_next.next(value),
        move |error| {
            warn!(%error, "join input failed");
            on_error.error(error);
            owned.release();
        },
        move || on_completed.complete(),
    )
}

/// Forwards errors from a cache the loaders read but do not subscribe to.
fn watch_errors<K, V, T>(
    cache: &ObservableCache<K, V>,
    downstream: &Subscriber<T>,
    owned: &SharedSubscription,
) -> Subscription
where
    K: Key,
    V: Clone + 'static,
    T: 'static,
{
    let on_error = downstream.clone();
    let owned = owned.clone();
    cache.connect(ConnectConfig::default()).subscribe_all(
        |_| {},
        move |error| {
            warn!(%error, "join grouping failed");
            on_error.error(error);
            owned.release();
        },
        || {},
    )
}

/// Joins rows present on both sides, like SQL `INNER JOIN`.
///
/// Results are keyed by the pair of left and right keys. `right_key`
/// extracts the left key a right row refers to. A right update that changes
/// that reference removes the row for the old pair.
pub fn inner_join<LK, L, RK, R, D, FK, S>(
    left: &Observable<ChangeSet<LK, L>>,
    right: &Observable<ChangeSet<RK, R>>,
    right_key: FK,
    select: S,
) -> Observable<ChangeSet<JoinKey<LK, RK>, D>>
where
    LK: Key,
    L: Clone + 'static,
    RK: Key,
    R: Clone + 'static,
    D: Clone + 'static,
    FK: Fn(&R) -> LK + 'static,
    S: Fn(&JoinKey<LK, RK>, &L, &R) -> D + 'static,
{
    let left = left.clone();
    let right = right.clone();
    let right_key: Rc<dyn Fn(&R) -> LK> = Rc::new(right_key);
    let select = Rc::new(select);

    Observable::new(move |downstream| {
        debug!("inner_join: subscribed");
        let left_cache = ObservableCache::from_stream(&left);
        let right_cache = ObservableCache::from_stream(&right);
        let grouping_key = Rc::clone(&right_key);
        let right_grouped = ObservableCache::from_stream(&group_with_immutable_state(
            &right,
            move |r: &R| grouping_key(r),
            None,
        ));
        let joined = joined_cache();

        let on_left = {
            let joined = Rc::clone(&joined);
            let right_grouped = right_grouped.clone();
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<LK, L>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    let Some(group) = right_grouped.lookup(&change.key) else {
                        continue;
                    };
                    match change.reason {
                        ChangeReason::Add | ChangeReason::Update => {
                            for (rk, r) in group.iter() {
                                let key = JoinKey::new(change.key.clone(), rk.clone());
                                let value = select(&key, &change.current, r);
                                joined.add_or_update(key, value);
                            }
                        }
                        ChangeReason::Remove => {
                            for rk in group.keys() {
                                joined.remove(&JoinKey::new(change.key.clone(), rk.clone()));
                            }
                        }
                        ChangeReason::Refresh => {
                            for rk in group.keys() {
                                joined.refresh(&JoinKey::new(change.key.clone(), rk.clone()));
                            }
                        }
                        ChangeReason::Moved => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let on_right = {
            let joined = Rc::clone(&joined);
            let left_cache = left_cache.clone();
            let right_key = Rc::clone(&right_key);
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<RK, R>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    let left_key = right_key(&change.current);
                    let key = JoinKey::new(left_key.clone(), change.key.clone());
                    match change.reason {
                        ChangeReason::Add | ChangeReason::Update => {
                            match left_cache.lookup(&left_key) {
                                Some(l) => {
                                    let value = select(&key, &l, &change.current);
                                    joined.add_or_update(key.clone(), value);
                                }
                                None => {
                                    joined.remove(&key);
                                }
                            }
                            if let Some(previous) = change.previous() {
                                let previous_key = JoinKey::new(right_key(previous), change.key.clone());
                                if previous_key != key {
                                    joined.remove(&previous_key);
                                }
                            }
                        }
                        ChangeReason::Remove => {
                            joined.remove(&key);
                        }
                        ChangeReason::Refresh => {
                            joined.refresh(&key);
                        }
                        ChangeReason::Moved => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let owned = SharedSubscription::new();
        let mut subscription = run_loaders(
            &downstream,
            &owned,
            &left_cache.connect(ConnectConfig::default()),
            on_left,
            &right_cache.connect(ConnectConfig::default()),
            on_right,
        );
        subscription.add(watch_errors(&right_grouped, &downstream, &owned));
        subscription.add_teardown(move || {
            debug!("inner_join: disposing");
            left_cache.dispose();
            right_cache.dispose();
            right_grouped.dispose();
        });
        owned.set(subscription);
        owned.handle()
    })
}

/// Keeps one row per left item, like SQL `LEFT JOIN`.
///
/// Right rows are re-keyed by the left key they refer to; when several
/// share a reference the most recent one wins.
pub fn left_join<LK, L, RK, R, D, FK, S>(
    left: &Observable<ChangeSet<LK, L>>,
    right: &Observable<ChangeSet<RK, R>>,
    right_key: FK,
    select: S,
) -> Observable<ChangeSet<LK, D>>
where
    LK: Key,
    L: Clone + 'static,
    RK: Key,
    R: Clone + 'static,
    D: Clone + 'static,
    FK: Fn(&R) -> LK + 'static,
    S: Fn(&LK, &L, Option<&R>) -> D + 'static,
{
    let left = left.clone();
    let right = change_key(right, right_key);
    let select = Rc::new(select);

    Observable::new(move |downstream| {
        debug!("left_join: subscribed");
        let left_cache = ObservableCache::from_stream(&left);
        let right_cache = ObservableCache::from_stream(&right);
        let joined = joined_cache();

        let on_left = {
            let joined = Rc::clone(&joined);
            let right_cache = right_cache.clone();
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<LK, L>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    match change.reason {
                        ChangeReason::Add | ChangeReason::Update => {
                            let r = right_cache.lookup(&change.key);
                            let value = select(&change.key, &change.current, r.as_ref());
                            joined.add_or_update(change.key.clone(), value);
                        }
                        ChangeReason::Remove => {
                            joined.remove(&change.key);
                        }
                        ChangeReason::Refresh => {
                            joined.refresh(&change.key);
                        }
                        ChangeReason::Moved => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let on_right = {
            let joined = Rc::clone(&joined);
            let left_cache = left_cache.clone();
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<LK, R>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    let l = left_cache.lookup(&change.key);
                    match (change.reason, l) {
                        (ChangeReason::Add | ChangeReason::Update, Some(l)) => {
                            let value = select(&change.key, &l, Some(&change.current));
                            joined.add_or_update(change.key.clone(), value);
                        }
                        (ChangeReason::Remove, Some(l)) => {
                            let value = select(&change.key, &l, None);
                            joined.add_or_update(change.key.clone(), value);
                        }
                        (ChangeReason::Add | ChangeReason::Update | ChangeReason::Remove, None) => {
                            joined.remove(&change.key);
                        }
                        (ChangeReason::Refresh, _) => {
                            joined.refresh(&change.key);
                        }
                        (ChangeReason::Moved, _) => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let owned = SharedSubscription::new();
        let mut subscription = run_loaders(
            &downstream,
            &owned,
            &left_cache.connect(ConnectConfig::default()),
            on_left,
            &right_cache.connect(ConnectConfig::default()),
            on_right,
        );
        subscription.add_teardown(move || {
            debug!("left_join: disposing");
            left_cache.dispose();
            right_cache.dispose();
        });
        owned.set(subscription);
        owned.handle()
    })
}

/// Keeps one row per right item, like SQL `RIGHT JOIN`.
///
/// Results are keyed by the right key.
pub fn right_join<LK, L, RK, R, D, FK, S>(
    left: &Observable<ChangeSet<LK, L>>,
    right: &Observable<ChangeSet<RK, R>>,
    right_key: FK,
    select: S,
) -> Observable<ChangeSet<RK, D>>
where
    LK: Key,
    L: Clone + 'static,
    RK: Key,
    R: Clone + 'static,
    D: Clone + 'static,
    FK: Fn(&R) -> LK + 'static,
    S: Fn(&RK, Option<&L>, &R) -> D + 'static,
{
    let left = left.clone();
    let right = right.clone();
    let right_key: Rc<dyn Fn(&R) -> LK> = Rc::new(right_key);
    let select = Rc::new(select);

    Observable::new(move |downstream| {
        debug!("right_join: subscribed");
        let left_cache = ObservableCache::from_stream(&left);
        let right_cache = ObservableCache::from_stream(&right);
        let grouping_key = Rc::clone(&right_key);
        let right_grouped = ObservableCache::from_stream(&group_with_immutable_state(
            &right,
            move |r: &R| grouping_key(r),
            None,
        ));
        let joined = joined_cache();

        let on_left = {
            let joined = Rc::clone(&joined);
            let right_grouped = right_grouped.clone();
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<LK, L>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    let Some(group) = right_grouped.lookup(&change.key) else {
                        continue;
                    };
                    match change.reason {
                        ChangeReason::Add | ChangeReason::Update => {
                            for (rk, r) in group.iter() {
                                joined.add_or_update(rk.clone(), select(rk, Some(&change.current), r));
                            }
                        }
                        ChangeReason::Remove => {
                            for (rk, r) in group.iter() {
                                joined.add_or_update(rk.clone(), select(rk, None, r));
                            }
                        }
                        ChangeReason::Refresh => {
                            for rk in group.keys() {
                                joined.refresh(rk);
                            }
                        }
                        ChangeReason::Moved => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let on_right = {
            let joined = Rc::clone(&joined);
            let left_cache = left_cache.clone();
            let right_key = Rc::clone(&right_key);
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<RK, R>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    match change.reason {
                        ChangeReason::Add | ChangeReason::Update => {
                            let l = left_cache.lookup(&right_key(&change.current));
                            let value = select(&change.key, l.as_ref(), &change.current);
                            joined.add_or_update(change.key.clone(), value);
                        }
                        ChangeReason::Remove => {
                            joined.remove(&change.key);
                        }
                        ChangeReason::Refresh => {
                            joined.refresh(&change.key);
                        }
                        ChangeReason::Moved => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let owned = SharedSubscription::new();
        let mut subscription = run_loaders(
            &downstream,
            &owned,
            &left_cache.connect(ConnectConfig::default()),
            on_left,
            &right_cache.connect(ConnectConfig::default()),
            on_right,
        );
        subscription.add(watch_errors(&right_grouped, &downstream, &owned));
        subscription.add_teardown(move || {
            debug!("right_join: disposing");
            left_cache.dispose();
            right_cache.dispose();
            right_grouped.dispose();
        });
        owned.set(subscription);
        owned.handle()
    })
}

/// Keeps a row while either side is present, like SQL `FULL OUTER JOIN`.
///
/// Results are keyed by the left key; right rows are re-keyed by the left
/// key they refer to.
pub fn full_join<LK, L, RK, R, D, FK, S>(
    left: &Observable<ChangeSet<LK, L>>,
    right: &Observable<ChangeSet<RK, R>>,
    right_key: FK,
    select: S,
) -> Observable<ChangeSet<LK, D>>
where
    LK: Key,
    L: Clone + 'static,
    RK: Key,
    R: Clone + 'static,
    D: Clone + 'static,
    FK: Fn(&R) -> LK + 'static,
    S: Fn(&LK, Option<&L>, Option<&R>) -> D + 'static,
{
    let left = left.clone();
    let right = change_key(right, right_key);
    let select = Rc::new(select);

    Observable::new(move |downstream| {
        debug!("full_join: subscribed");
        let left_cache = ObservableCache::from_stream(&left);
        let right_cache = ObservableCache::from_stream(&right);
        let joined = joined_cache();

        let on_left = {
            let joined = Rc::clone(&joined);
            let right_cache = right_cache.clone();
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<LK, L>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    let r = right_cache.lookup(&change.key);
                    match (change.reason, r) {
                        (ChangeReason::Add | ChangeReason::Update, r) => {
                            let value = select(&change.key, Some(&change.current), r.as_ref());
                            joined.add_or_update(change.key.clone(), value);
                        }
                        (ChangeReason::Remove, Some(r)) => {
                            let value = select(&change.key, None, Some(&r));
                            joined.add_or_update(change.key.clone(), value);
                        }
                        (ChangeReason::Remove, None) => {
                            joined.remove(&change.key);
                        }
                        (ChangeReason::Refresh, _) => {
                            joined.refresh(&change.key);
                        }
                        (ChangeReason::Moved, _) => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let on_right = {
            let joined = Rc::clone(&joined);
            let left_cache = left_cache.clone();
            let select = Rc::clone(&select);
            move |changes: &ChangeSet<LK, R>| {
                let mut joined = joined.borrow_mut();
                for change in changes {
                    let l = left_cache.lookup(&change.key);
                    match (change.reason, l) {
                        (ChangeReason::Add | ChangeReason::Update, l) => {
                            let value = select(&change.key, l.as_ref(), Some(&change.current));
                            joined.add_or_update(change.key.clone(), value);
                        }
                        (ChangeReason::Remove, Some(l)) => {
                            let value = select(&change.key, Some(&l), None);
                            joined.add_or_update(change.key.clone(), value);
                        }
                        (ChangeReason::Remove, None) => {
                            joined.remove(&change.key);
                        }
                        (ChangeReason::Refresh, _) => {
                            joined.refresh(&change.key);
                        }
                        (ChangeReason::Moved, _) => {}
                    }
                }
                joined.capture_changes()
            }
        };

        let owned = SharedSubscription::new();
        let mut subscription = run_loaders(
            &downstream,
            &owned,
            &left_cache.connect(ConnectConfig::default()),
            on_left,
            &right_cache.connect(ConnectConfig::default()),
            on_right,
        );
        subscription.add_teardown(move || {
            debug!("full_join: disposing");
            left_cache.dispose();
            right_cache.dispose();
        });
        owned.set(subscription);
        owned.handle()
    })
}
