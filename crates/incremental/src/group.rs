//! Grouping a change stream into immutable group snapshots.
//!
//! Each output change describes a whole group: `Add` when it gains its first
//! member, `Update` when its membership changes and `Remove` when it loses
//! its last one. Snapshots never change after they are emitted, so joins and
//! other consumers can hold on to them safely.

use alloc::rc::Rc;
use alloc::vec::Vec;
use cascade_core::{Change, ChangeReason, ChangeSet, Error, ImmutableGroup, Key, Result};
use cascade_reactive::{Observable, SharedSubscription, Subscriber};
use core::cell::RefCell;
use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

type Members<K, V> = Rc<HashMap<K, V>>;

/// Groups touched by one batch, with their state before the batch.
struct Touched<K, V, G> {
    order: Vec<(G, Option<ImmutableGroup<K, V, G>>)>,
    seen: HashSet<G>,
}

impl<K, V, G: Key> Touched<K, V, G> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

/// The grouping state behind [`group_with_immutable_state`].
pub struct Grouper<K, V, G> {
    selector: Rc<dyn Fn(&V) -> G>,
    groups: HashMap<G, Members<K, V>>,
    /// Item key -> assigned group and last seen value.
    assignments: HashMap<K, (G, V)>,
}

impl<K: Key, V: Clone + 'static, G: Key> Grouper<K, V, G> {
    pub fn new(selector: Rc<dyn Fn(&V) -> G>) -> Self {
        Self {
            selector,
            groups: HashMap::new(),
            assignments: HashMap::new(),
        }
    }

    /// Returns the current snapshot of a group.
    pub fn group(&self, key: &G) -> Option<ImmutableGroup<K, V, G>> {
        self.groups
            .get(key)
            .map(|items| ImmutableGroup::new(key.clone(), Rc::clone(items)))
    }

    /// Number of non-empty groups.
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Applies an upstream change set and returns the group changes.
    pub fn update(&mut self, changes: &ChangeSet<K, V>) -> Result<ChangeSet<G, ImmutableGroup<K, V, G>>> {
        let mut touched = Touched::new();
        for change in changes {
            self.apply(change, &mut touched)?;
        }
        Ok(self.collect(touched))
    }

    /// Re-evaluates the group of every item.
    pub fn regroup(&mut self) -> Result<ChangeSet<G, ImmutableGroup<K, V, G>>> {
        let refreshes: ChangeSet<K, V> = self
            .assignments
            .iter()
            .map(|(key, (_, value))| Change::refresh(key.clone(), value.clone()))
            .collect();
        self.update(&refreshes)
    }

    fn apply(&mut self, change: &Change<K, V>, touched: &mut Touched<K, V, G>) -> Result<()> {
        let key = &change.key;
        let group_key = (self.selector)(&change.current);

        match change.reason {
            ChangeReason::Add | ChangeReason::Update => {
                let previous = match self.assignments.get(key) {
                    Some((previous, _)) => Some(previous.clone()),
                    None if change.reason == ChangeReason::Update => {
                        return Err(Error::missing_key(key, ChangeReason::Update));
                    }
                    None => None,
                };

                self.insert(&group_key, key, &change.current, touched);
                if let Some(previous) = previous.filter(|previous| *previous != group_key) {
                    self.remove_from(&previous, key, touched);
                }
                self.assignments
                    .insert(key.clone(), (group_key, change.current.clone()));
            }
            ChangeReason::Remove => {
                let (previous, _) = self
                    .assignments
                    .remove(key)
                    .ok_or_else(|| Error::missing_key(key, ChangeReason::Remove))?;
                self.remove_from(&previous, key, touched);
            }
            ChangeReason::Refresh => {
                let previous = self.assignments.get(key).map(|(previous, _)| previous.clone());
                match previous {
                    Some(previous) if previous == group_key => {}
                    Some(previous) => {
                        self.remove_from(&previous, key, touched);
                        self.insert(&group_key, key, &change.current, touched);
                    }
                    None => self.insert(&group_key, key, &change.current, touched),
                }
                self.assignments
                    .insert(key.clone(), (group_key, change.current.clone()));
            }
            ChangeReason::Moved => {}
        }
        Ok(())
    }

    fn touch(&self, group_key: &G, touched: &mut Touched<K, V, G>) {
        if touched.seen.insert(group_key.clone()) {
            touched.order.push((group_key.clone(), self.group(group_key)));
        }
    }

    fn insert(&mut self, group_key: &G, key: &K, value: &V, touched: &mut Touched<K, V, G>) {
        self.touch(group_key, touched);
        let members = self.groups.entry(group_key.clone()).or_default();
        Rc::make_mut(members).insert(key.clone(), value.clone());
    }

    fn remove_from(&mut self, group_key: &G, key: &K, touched: &mut Touched<K, V, G>) {
        self.touch(group_key, touched);
        if let Some(members) = self.groups.get_mut(group_key) {
            Rc::make_mut(members).remove(key);
        }
    }

    fn collect(&mut self, touched: Touched<K, V, G>) -> ChangeSet<G, ImmutableGroup<K, V, G>> {
        let mut result = ChangeSet::with_capacity(touched.order.len());
        for (group_key, initial) in touched.order {
            let live = self
                .groups
                .get(&group_key)
                .filter(|members| !members.is_empty())
                .map(Rc::clone);

            match (initial, live) {
                (None, None) => {
                    self.groups.remove(&group_key);
                }
                (Some(previous), None) => {
                    self.groups.remove(&group_key);
                    result.push(Change::remove(group_key, previous));
                }
                (None, Some(members)) => {
                    let current = ImmutableGroup::new(group_key.clone(), members);
                    result.push(Change::add(group_key, current));
                }
                (Some(previous), Some(members)) => {
                    let current = ImmutableGroup::new(group_key.clone(), members);
                    if !current.shares_items_with(&previous) {
                        result.push(Change::update(group_key, current, previous));
                    }
                }
            }
        }
        result
    }
}

/// Groups `source` by `group_selector`, emitting one change per affected group.
///
/// When `regroup` fires every item's group is re-evaluated, which picks up
/// membership changes caused by mutable state the selector reads. An `Update`
/// or `Remove` for an item that was never grouped terminates the output with
/// [`Error::MissingKey`]. Any error releases both `source` and `regroup`.
pub fn group_with_immutable_state<K, V, G, S>(
    source: &Observable<ChangeSet<K, V>>,
    group_selector: S,
    regroup: Option<&Observable<()>>,
) -> Observable<ChangeSet<G, ImmutableGroup<K, V, G>>>
where
    K: Key,
    V: Clone + 'static,
    G: Key,
    S: Fn(&V) -> G + 'static,
{
    let source = source.clone();
    let regroup = regroup.cloned();
    let selector: Rc<dyn Fn(&V) -> G> = Rc::new(group_selector);

    Observable::new(move |downstream| {
        debug!("group_with_immutable_state: subscribed");
        let grouper = Rc::new(RefCell::new(Grouper::new(Rc::clone(&selector))));

        let owned = SharedSubscription::new();

        let on_regroup = Rc::clone(&grouper);
        let out = downstream.clone();
        let on_error = downstream.clone();
        let on_completed = downstream.clone();
        let (update_owner, update_failed) = (owned.clone(), owned.clone());
        let mut subscription = source.subscribe_with_subscriber(Subscriber::from_fn(
            move |changes| {
                let groups = grouper.borrow_mut().update(changes);
                emit(&out, &update_owner, groups);
            },
            move |error| {
                on_error.error(error);
                update_failed.release();
            },
            move || on_completed.complete(),
        ));

        if let Some(regroup) = &regroup {
            let out = downstream.clone();
            let on_error = downstream.clone();
            let (regroup_owner, regroup_failed) = (owned.clone(), owned.clone());
            subscription.add(regroup.subscribe_all(
                move |_| {
                    let groups = on_regroup.borrow_mut().regroup();
                    emit(&out, &regroup_owner, groups);
                },
                move |error| {
                    warn!(%error, "regroup signal failed");
                    on_error.error(error);
                    regroup_failed.release();
                },
                || {},
            ));
        }

        subscription.add_teardown(|| debug!("group_with_immutable_state: unsubscribed"));
        owned.set(subscription);
        owned.handle()
    })
}

fn emit<G, T>(out: &Subscriber<ChangeSet<G, T>>, owned: &SharedSubscription, groups: Result<ChangeSet<G, T>>) {
    match groups {
        Ok(groups) if groups.is_empty() => {}
        Ok(groups) => out.next(&groups),
        Err(error) => {
            warn!(%error, "grouping failed");
            out.error(&error);
            owned.release();
        }
    }
}
