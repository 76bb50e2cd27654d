//! End-to-end scenarios wiring source caches through the operators.

use cascade_core::{ChangeReason, ChangeSet, ImmutableGroup, KeyValueComparer, PageRequest, PagedChangeSet};
use cascade_incremental::{full_join, group_with_immutable_state, page, sort};
use cascade_reactive::{ChangeSetAggregator, ConnectConfig, ConnectableCache, SourceCache, Subject, Subscription};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
struct Person {
    name: &'static str,
    age: u32,
    parent: &'static str,
}

fn person(name: &'static str, age: u32, parent: &'static str) -> Person {
    Person { name, age, parent }
}

type Pages = Rc<RefCell<Vec<PagedChangeSet<&'static str, Person>>>>;

fn paged_people() -> (SourceCache<&'static str, Person>, Subject<PageRequest>, Pages, Subscription) {
    let people = SourceCache::new(|p: &Person| p.name);
    let requests = Subject::new();
    let by_age = sort(
        &people.connect(ConnectConfig::default()),
        KeyValueComparer::ascending(|p: &Person| p.age),
    );

    let pages: Pages = Rc::new(RefCell::new(Vec::new()));
    let sink = pages.clone();
    let subscription = page(&by_age, &requests.as_observable())
        .subscribe(move |p: &PagedChangeSet<&'static str, Person>| sink.borrow_mut().push(p.clone()));
    (people, requests, pages, subscription)
}

fn names(paged: &PagedChangeSet<&'static str, Person>) -> Vec<&'static str> {
    paged.sorted_items.keys().copied().collect()
}

#[test]
fn test_paging_walks_sorted_people() {
    let (people, requests, pages, _sub) = paged_people();
    people
        .add_or_update_values(vec![
            person("Ann", 30, ""),
            person("Bob", 20, ""),
            person("Cid", 25, ""),
        ])
        .unwrap();

    requests.next(&PageRequest::new(1, 2).unwrap());
    {
        let pages = pages.borrow();
        let first = pages.last().unwrap();
        assert_eq!(names(first), vec!["Bob", "Cid"]);
        assert_eq!(first.response.pages, 2);
        assert_eq!(first.response.total_size, 3);
    }

    requests.next(&PageRequest::new(2, 2).unwrap());
    let pages = pages.borrow();
    let second = pages.last().unwrap();
    assert_eq!(names(second), vec!["Ann"]);
    assert_eq!(second.response.page, 2);
    assert_eq!(second.response.pages, 2);
    assert_eq!(second.changes.removes(), 2);
    assert_eq!(second.changes.adds(), 1);
    assert_eq!(second.changes.as_slice()[2].key, "Ann");
    assert_eq!(second.changes.as_slice()[2].current_index, Some(0));
}

#[test]
fn test_paging_follows_source_edits() {
    let (people, requests, pages, _sub) = paged_people();
    requests.next(&PageRequest::new(1, 2).unwrap());
    people
        .add_or_update_values(vec![person("Ann", 30, ""), person("Bob", 20, "")])
        .unwrap();
    assert_eq!(names(pages.borrow().last().unwrap()), vec!["Bob", "Ann"]);

    // A younger person pushes Ann off the first page
    people.add_or_update(person("Dee", 10, "")).unwrap();
    {
        let pages = pages.borrow();
        let last = pages.last().unwrap();
        assert_eq!(names(last), vec!["Dee", "Bob"]);
        assert_eq!(last.response.pages, 2);
        assert_eq!(last.changes.adds(), 1);
        assert_eq!(last.changes.removes(), 1);
    }

    // Removing the last item of a later page leaves page one as it is but
    // shrinks the page count
    let before = pages.borrow().len();
    people.remove_key(&"Ann").unwrap();
    {
        let pages = pages.borrow();
        assert_eq!(pages.len(), before + 1);
        let last = pages.last().unwrap();
        assert!(last.changes.is_empty());
        assert_eq!(names(last), vec!["Dee", "Bob"]);
        assert_eq!(last.response.pages, 1);
        assert_eq!(last.response.total_size, 2);
    }

    // An edit off the page that keeps the totals emits nothing
    requests.next(&PageRequest::new(1, 1).unwrap());
    let before = pages.borrow().len();
    people.add_or_update(person("Bob", 21, "")).unwrap();
    assert_eq!(pages.borrow().len(), before);
}

#[test]
fn test_paging_clamps_and_single_page() {
    let (people, requests, pages, _sub) = paged_people();
    people
        .add_or_update_values((0..5).map(|i| person(["a", "b", "c", "d", "e"][i], i as u32, "")))
        .unwrap();

    requests.next(&PageRequest::new(9, 2).unwrap());
    {
        let pages = pages.borrow();
        let last = pages.last().unwrap();
        assert_eq!(last.response.page, 3);
        assert_eq!(names(last), vec!["e"]);
    }

    requests.next(&PageRequest::new(1, 5).unwrap());
    let pages = pages.borrow();
    let last = pages.last().unwrap();
    assert_eq!(last.response.pages, 1);
    assert_eq!(last.sorted_items.len(), 5);
}

#[test]
fn test_negative_page_request_rejected() {
    assert!(PageRequest::new(-1, 10).is_err());
    assert!(PageRequest::new(1, -10).is_err());
}

#[test]
fn test_grouping_moves_between_parents() {
    const NAMES: [&str; 10] = ["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8", "n9"];
    const PARENTS: [&str; 3] = ["p0", "p1", "p2"];

    let people = SourceCache::new(|p: &Person| p.name);
    let groups = ChangeSetAggregator::new(&group_with_immutable_state(
        &people.connect(ConnectConfig::default()),
        |p: &Person| p.parent,
        None,
    ));

    people
        .add_or_update_values(NAMES.iter().enumerate().map(|(i, name)| {
            let parent = if i == 9 { "solo" } else { PARENTS[i % 3] };
            person(name, i as u32, parent)
        }))
        .unwrap();
    assert_eq!(groups.len(), 4);
    assert_eq!(groups.lookup(&"p0").map(|g| g.len()), Some(3));
    let solo = groups.lookup(&"solo").unwrap();

    people.add_or_update(person("n9", 9, "fresh")).unwrap();

    let last = groups.last_message().unwrap();
    let reasons: Vec<(&str, ChangeReason)> = last.iter().map(|c| (c.key, c.reason)).collect();
    assert_eq!(reasons, vec![("fresh", ChangeReason::Add), ("solo", ChangeReason::Remove)]);

    // The removed group carries the membership it had before the move
    let removed = &last.as_slice()[1].current;
    assert!(removed.contains_key(&"n9"));
    assert!(solo.shares_items_with(removed));
    assert_eq!(groups.lookup(&"fresh").map(|g| g.len()), Some(1));
    assert!(groups.lookup(&"solo").is_none());
}

#[test]
fn test_grouping_snapshots_stay_frozen() {
    let people = SourceCache::new(|p: &Person| p.name);
    let groups = ChangeSetAggregator::new(&group_with_immutable_state(
        &people.connect(ConnectConfig::default()),
        |p: &Person| p.parent,
        None,
    ));

    people.add_or_update(person("Ann", 1, "x")).unwrap();
    let before: ImmutableGroup<&str, Person, &str> = groups.lookup(&"x").unwrap();
    people.add_or_update(person("Bob", 2, "x")).unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(groups.lookup(&"x").map(|g| g.len()), Some(2));
    assert_eq!(groups.last_message().map(|m| m.updates()), Some(1));
}

#[derive(Clone, Debug, PartialEq)]
struct Order {
    id: u32,
    customer: &'static str,
}

#[test]
fn test_full_join_covers_both_sides() {
    let customers = SourceCache::new(|c: &&'static str| *c);
    let orders = SourceCache::new(|o: &Order| o.id);

    let rows = ChangeSetAggregator::new(&full_join(
        &customers.connect(ConnectConfig::default()),
        &orders.connect(ConnectConfig::default()),
        |o: &Order| o.customer,
        |key: &&'static str, customer: Option<&&'static str>, order: Option<&Order>| {
            (*key, customer.is_some(), order.map(|o| o.id))
        },
    ));

    customers.add_or_update_values(vec!["A", "B"]).unwrap();
    orders
        .add_or_update_values(vec![Order { id: 1, customer: "B" }, Order { id: 2, customer: "C" }])
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows.lookup(&"A"), Some(("A", true, None)));
    assert_eq!(rows.lookup(&"B"), Some(("B", true, Some(1))));
    assert_eq!(rows.lookup(&"C"), Some(("C", false, Some(2))));

    customers.remove_key(&"B").unwrap();
    assert_eq!(rows.lookup(&"B"), Some(("B", false, Some(1))));

    orders.remove_key(&2).unwrap();
    assert!(rows.lookup(&"C").is_none());
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_nested_edits_reach_operators_once() {
    let people = SourceCache::new(|p: &Person| p.name);
    let groups = ChangeSetAggregator::new(&group_with_immutable_state(
        &people.connect(ConnectConfig::default()),
        |p: &Person| p.parent,
        None,
    ));

    people
        .edit(|outer| {
            outer.add_or_update_value(person("Ann", 1, "x"));
            people.add_or_update(person("Bob", 2, "x")).unwrap();
        })
        .unwrap();

    assert_eq!(groups.message_count(), 1);
    let only: ChangeSet<&str, ImmutableGroup<&str, Person, &str>> = groups.last_message().unwrap();
    assert_eq!(only.adds(), 1);
    assert_eq!(groups.lookup(&"x").map(|g| g.len()), Some(2));
}
