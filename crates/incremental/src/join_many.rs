//! Joins against the whole group of right rows sharing a reference.
//!
//! The right side is grouped by the left key it refers to, and the
//! corresponding join runs against the group stream. Selectors receive an
//! [`ImmutableGroup`]; the left and full variants pass an empty group when no
//! right row refers to the left key.

use crate::group::group_with_immutable_state;
use crate::join::{full_join, inner_join, left_join, right_join};
use cascade_core::{ChangeSet, ImmutableGroup, JoinKey, Key};
use cascade_reactive::Observable;

/// Like [`inner_join`], but each left row is paired with all its right rows.
///
/// Results are keyed by the left key.
pub fn inner_join_many<LK, L, RK, R, D, FK, S>(
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
    S: Fn(&L, &ImmutableGroup<RK, R, LK>) -> D + 'static,
{
    let grouped = group_with_immutable_state(right, right_key, None);
    inner_join(
        left,
        &grouped,
        |group: &ImmutableGroup<RK, R, LK>| group.key().clone(),
        move |_: &JoinKey<LK, LK>, l: &L, group: &ImmutableGroup<RK, R, LK>| select(l, group),
    )
    .map(|changes: &ChangeSet<JoinKey<LK, LK>, D>| {
        changes
            .iter()
            .map(|change| change.clone().map_key(change.key.left.clone()))
            .collect()
    })
}

/// Like [`left_join`], but each left row sees all its right rows.
pub fn left_join_many<LK, L, RK, R, D, FK, S>(
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
    S: Fn(&LK, &L, &ImmutableGroup<RK, R, LK>) -> D + 'static,
{
    let grouped = group_with_immutable_state(right, right_key, None);
    left_join(
        left,
        &grouped,
        |group: &ImmutableGroup<RK, R, LK>| group.key().clone(),
        move |key: &LK, l: &L, group: Option<&ImmutableGroup<RK, R, LK>>| match group {
            Some(group) => select(key, l, group),
            None => select(key, l, &ImmutableGroup::empty(key.clone())),
        },
    )
}

/// Like [`right_join`], but over right groups. Results are keyed by the left
/// key the group refers to.
pub fn right_join_many<LK, L, RK, R, D, FK, S>(
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
    S: Fn(&LK, Option<&L>, &ImmutableGroup<RK, R, LK>) -> D + 'static,
{
    let grouped = group_with_immutable_state(right, right_key, None);
    right_join(
        left,
        &grouped,
        |group: &ImmutableGroup<RK, R, LK>| group.key().clone(),
        select,
    )
}

/// Like [`full_join`], but over right groups.
pub fn full_join_many<LK, L, RK, R, D, FK, S>(
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
    S: Fn(&LK, Option<&L>, &ImmutableGroup<RK, R, LK>) -> D + 'static,
{
    let grouped = group_with_immutable_state(right, right_key, None);
    full_join(
        left,
        &grouped,
        |group: &ImmutableGroup<RK, R, LK>| group.key().clone(),
        move |key: &LK, l: Option<&L>, group: Option<&ImmutableGroup<RK, R, LK>>| match group {
            Some(group) => select(key, l, group),
            None => select(key, l, &ImmutableGroup::empty(key.clone())),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use cascade_reactive::{ChangeSetAggregator, ConnectConfig, ConnectableCache, SourceCache};

    #[derive(Clone, Debug, PartialEq)]
    struct Person {
        name: &'static str,
        parent: Option<&'static str>,
    }

    fn person(name: &'static str, parent: Option<&'static str>) -> Person {
        Person { name, parent }
    }

    fn family() -> (SourceCache<&'static str, Person>, Observable<ChangeSet<&'static str, Person>>) {
        let people = SourceCache::new(|p: &Person| p.name);
        let stream = people.connect(ConnectConfig::default());
        (people, stream)
    }

    fn parent_of(p: &Person) -> &'static str {
        p.parent.unwrap_or("")
    }

    fn names(group: &ImmutableGroup<&'static str, Person, &'static str>) -> Vec<&'static str> {
        let mut names: Vec<_> = group.keys().copied().collect();
        names.sort();
        names
    }

    #[test]
    fn test_inner_join_many_pairs_left_with_children() {
        let (people, stream) = family();
        let results = ChangeSetAggregator::new(&inner_join_many(
            &stream,
            &stream,
            parent_of,
            |parent: &Person, children: &ImmutableGroup<&'static str, Person, &'static str>| {
                (parent.name, names(children))
            },
        ));

        people
            .add_or_update_values(vec![
                person("Ann", None),
                person("Bob", Some("Ann")),
                person("Cid", Some("Ann")),
                person("Dee", Some("Bob")),
            ])
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results.lookup(&"Ann"), Some(("Ann", vec!["Bob", "Cid"])));
        assert_eq!(results.lookup(&"Bob"), Some(("Bob", vec!["Dee"])));

        people.remove_key(&"Dee").unwrap();
        assert!(results.lookup(&"Bob").is_none());
    }

    #[test]
    fn test_left_join_many_defaults_to_empty_group() {
        let (people, stream) = family();
        let results = ChangeSetAggregator::new(&left_join_many(
            &stream,
            &stream,
            parent_of,
            |_: &&'static str, _: &Person, children: &ImmutableGroup<&'static str, Person, &'static str>| {
                children.len()
            },
        ));

        people
            .add_or_update_values(vec![person("Ann", None), person("Bob", Some("Ann"))])
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results.lookup(&"Ann"), Some(1));
        assert_eq!(results.lookup(&"Bob"), Some(0));

        people.add_or_update(person("Eve", Some("Ann"))).unwrap();
        assert_eq!(results.lookup(&"Ann"), Some(2));
    }

    #[test]
    fn test_right_join_many_keyed_by_group() {
        let (people, stream) = family();
        let results = ChangeSetAggregator::new(&right_join_many(
            &stream,
            &stream,
            parent_of,
            |_: &&'static str, parent: Option<&Person>, children: &ImmutableGroup<&'static str, Person, &'static str>| {
                (parent.map(|p| p.name), children.len())
            },
        ));

        people
            .add_or_update_values(vec![person("Bob", Some("Ann")), person("Cid", Some("Ann"))])
            .unwrap();
        assert_eq!(results.lookup(&"Ann"), Some((None, 2)));

        people.add_or_update(person("Ann", None)).unwrap();
        assert_eq!(results.lookup(&"Ann"), Some((Some("Ann"), 2)));
    }

    #[test]
    fn test_full_join_many() {
        let (people, stream) = family();
        let results = ChangeSetAggregator::new(&full_join_many(
            &stream,
            &stream,
            parent_of,
            |_: &&'static str, parent: Option<&Person>, children: &ImmutableGroup<&'static str, Person, &'static str>| {
                (parent.is_some(), children.len())
            },
        ));

        people
            .add_or_update_values(vec![person("Ann", None), person("Bob", Some("Zed"))])
            .unwrap();

        assert_eq!(results.lookup(&"Ann"), Some((true, 0)));
        assert_eq!(results.lookup(&"Bob"), Some((true, 0)));
        assert_eq!(results.lookup(&"Zed"), Some((false, 1)));
        assert_eq!(results.lookup(&""), Some((false, 1)));
    }
}
