//! Recording a change stream.
//!
//! [`ChangeSetAggregator`] subscribes to a change stream, keeps every message
//! and materializes the net result. It is how the operator tests observe
//! their output.

use crate::observable::Observable;
use crate::subscription::Subscription;
use alloc::rc::Rc;
use alloc::vec::Vec;
use cascade_core::{Cache, ChangeSet, Error, Key};
use core::cell::RefCell;

struct Recorded<K, V> {
    data: Cache<K, V>,
    messages: Vec<ChangeSet<K, V>>,
    error: Option<Error>,
    completed: bool,
}

/// Materializes and records everything a change stream emits.
pub struct ChangeSetAggregator<K, V> {
    state: Rc<RefCell<Recorded<K, V>>>,
    subscription: Subscription,
}

impl<K: Key, V: Clone + 'static> ChangeSetAggregator<K, V> {
    /// Subscribes to `source` and starts recording.
    pub fn new(source: &Observable<ChangeSet<K, V>>) -> Self {
        let state = Rc::new(RefCell::new(Recorded {
            data: Cache::new(),
            messages: Vec::new(),
            error: None,
            completed: false,
        }));

        let on_next = Rc::clone(&state);
        let on_error = Rc::clone(&state);
        let on_completed = Rc::clone(&state);
        let subscription = source.subscribe_all(
            move |changes: &ChangeSet<K, V>| {
                let mut state = on_next.borrow_mut();
                state.data.clone_changes(changes);
                state.messages.push(changes.clone());
            },
            move |error| on_error.borrow_mut().error = Some(error.clone()),
            move || on_completed.borrow_mut().completed = true,
        );

        Self {
            state,
            subscription,
        }
    }

    /// The materialized result of every message so far.
    pub fn data(&self) -> Cache<K, V> {
        self.state.borrow().data.clone()
    }

    pub fn lookup(&self, key: &K) -> Option<V> {
        self.state.borrow().data.lookup(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().data.is_empty()
    }

    /// Every change set received, in order.
    pub fn messages(&self) -> Vec<ChangeSet<K, V>> {
        self.state.borrow().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.borrow().messages.len()
    }

    /// The most recent change set.
    pub fn last_message(&self) -> Option<ChangeSet<K, V>> {
        self.state.borrow().messages.last().cloned()
    }

    pub fn error(&self) -> Option<Error> {
        self.state.borrow().error.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// Stops recording. The recorded data stays readable.
    pub fn dispose(&mut self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use alloc::vec;
    use cascade_core::Change;

    #[test]
    fn test_aggregator_materializes() {
        let subject: Subject<ChangeSet<&str, u32>> = Subject::new();
        let mut results = ChangeSetAggregator::new(&subject.as_observable());

        subject.next(&vec![Change::add("a", 1), Change::add("b", 2)].into());
        subject.next(&vec![Change::update("a", 3, 1), Change::remove("b", 2)].into());

        assert_eq!(results.message_count(), 2);
        assert_eq!(results.len(), 1);
        assert_eq!(results.lookup(&"a"), Some(3));
        assert_eq!(results.last_message().map(|m| m.removes()), Some(1));

        results.dispose();
        subject.next(&vec![Change::add("c", 4)].into());
        assert_eq!(results.message_count(), 2);
    }

    #[test]
    fn test_aggregator_records_error() {
        let subject: Subject<ChangeSet<u32, u32>> = Subject::new();
        let results = ChangeSetAggregator::new(&subject.as_observable());

        subject.error(&Error::Terminated);
        assert_eq!(results.error(), Some(Error::Terminated));
        assert!(!results.is_completed());
    }
}
