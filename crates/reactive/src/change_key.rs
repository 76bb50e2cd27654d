//! Re-keying change streams.

use crate::observable::{Observable, Subscriber};
use alloc::rc::Rc;
use cascade_core::{Change, ChangeReason, ChangeSet, Key};

/// Re-keys every change with `key_selector`.
///
/// An update whose previous value maps to a different key is split into a
/// `Remove` under the old key and an `Add` under the new one.
pub fn change_key<K, V, K2, S>(source: &Observable<ChangeSet<K, V>>, key_selector: S) -> Observable<ChangeSet<K2, V>>
where
    K: Key,
    V: Clone + 'static,
    K2: Key,
    S: Fn(&V) -> K2 + 'static,
{
    let source = source.clone();
    let key_selector = Rc::new(key_selector);
    Observable::new(move |downstream| {
        let key_selector = Rc::clone(&key_selector);
        source.subscribe_with_subscriber(Subscriber::relay(&downstream, move |changes, out| {
            out.next(&rekey(changes, &*key_selector));
        }))
    })
}

fn rekey<K, V, K2>(changes: &ChangeSet<K, V>, key_selector: &dyn Fn(&V) -> K2) -> ChangeSet<K2, V>
where
    K: Clone,
    V: Clone,
    K2: Key,
{
    let mut result = ChangeSet::with_capacity(changes.len());
    for change in changes {
        let key = key_selector(&change.current);
        if change.reason == ChangeReason::Update {
            if let Some(previous) = &change.previous {
                let previous_key = key_selector(previous);
                if previous_key != key {
                    result.push(Change::remove(previous_key, previous.clone()));
                    result.push(Change::add(key, change.current.clone()));
                    continue;
                }
            }
        }
        result.push(change.clone().map_key(key));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn test_change_key_rekeys() {
        let subject: Subject<ChangeSet<u32, (char, i32)>> = Subject::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let _sub = change_key(&subject.as_observable(), |v: &(char, i32)| v.0)
            .subscribe(move |cs: &ChangeSet<char, (char, i32)>| log_clone.borrow_mut().push(cs.clone()));

        subject.next(&vec![Change::add(1, ('a', 1)), Change::update(2, ('b', 3), ('b', 2))].into());

        let log = log.borrow();
        assert_eq!(
            log[0].as_slice(),
            &[Change::add('a', ('a', 1)), Change::update('b', ('b', 3), ('b', 2))]
        );
    }

    #[test]
    fn test_change_key_splits_moved_update() {
        let subject: Subject<ChangeSet<u32, (char, i32)>> = Subject::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let _sub = change_key(&subject.as_observable(), |v: &(char, i32)| v.0)
            .subscribe(move |cs: &ChangeSet<char, (char, i32)>| log_clone.borrow_mut().push(cs.clone()));

        subject.next(&vec![Change::update(1, ('z', 1), ('a', 1))].into());

        let log = log.borrow();
        assert_eq!(
            log[0].as_slice(),
            &[Change::remove('a', ('a', 1)), Change::add('z', ('z', 1))]
        );
    }
}
