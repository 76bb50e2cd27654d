//! Stateful change-set filtering.

use crate::observable::{Observable, Subscriber};
use alloc::rc::Rc;
use cascade_core::{Change, ChangeReason, ChangeSet, Key};
use core::cell::RefCell;
use hashbrown::HashSet;

/// Shared value predicate.
pub type Predicate<V> = Rc<dyn Fn(&V) -> bool>;

/// Keeps only the items that satisfy `predicate`.
///
/// Each subscription tracks which keys are currently included, so an update
/// that stops matching becomes a `Remove` and one that starts matching
/// becomes an `Add`. Refreshes re-evaluate the predicate.
pub fn filter_changes<K, V>(source: &Observable<ChangeSet<K, V>>, predicate: Predicate<V>) -> Observable<ChangeSet<K, V>>
where
    K: Key,
    V: Clone + 'static,
{
    let source = source.clone();
    Observable::new(move |downstream| {
        let state = RefCell::new(FilterState::new(Rc::clone(&predicate)));
        source.subscribe_with_subscriber(Subscriber::relay(&downstream, move |changes, out| {
            out.next(&state.borrow_mut().process(changes));
        }))
    })
}

struct FilterState<K, V> {
    predicate: Predicate<V>,
    included: HashSet<K>,
}

impl<K: Key, V: Clone> FilterState<K, V> {
    fn new(predicate: Predicate<V>) -> Self {
        Self {
            predicate,
            included: HashSet::new(),
        }
    }

    fn matches(&self, value: &V) -> bool {
        (self.predicate)(value)
    }

    fn process(&mut self, changes: &ChangeSet<K, V>) -> ChangeSet<K, V> {
        let mut result = ChangeSet::new();
        for change in changes {
            let was = self.included.contains(&change.key);
            match change.reason {
                ChangeReason::Add => {
                    if self.matches(&change.current) {
                        self.included.insert(change.key.clone());
                        result.push(change.clone());
                    }
                }
                ChangeReason::Update | ChangeReason::Refresh => {
                    let now = self.matches(&change.current);
                    match (was, now) {
                        (true, true) => result.push(change.clone()),
                        (false, true) => {
                            self.included.insert(change.key.clone());
                            result.push(Change::add(change.key.clone(), change.current.clone()));
                        }
                        (true, false) => {
                            self.included.remove(&change.key);
                            let last = change.previous.as_ref().unwrap_or(&change.current);
                            result.push(Change::remove(change.key.clone(), last.clone()));
                        }
                        (false, false) => {}
                    }
                }
                ChangeReason::Remove => {
                    if self.included.remove(&change.key) {
                        result.push(change.clone());
                    }
                }
                ChangeReason::Moved => {
                    if was {
                        result.push(change.clone());
                    }
                }
            }
        }
        result
    }
}
