//! Virtual paging over a sorted change stream.

use crate::index_calculator::FilteredIndexCalculator;
use alloc::rc::Rc;
use alloc::vec::Vec;
use cascade_core::{
    Key, KeyValueCollection, PageRequest, PageResponse, PagedChangeSet, Result, SortReason,
    SortedChangeSet,
};
use cascade_reactive::{Observable, SharedSubscription, Subscriber};
use core::cell::RefCell;
use tracing::{trace, warn};

/// Number of pages needed for `total` items. Never less than one.
#[inline]
fn page_count(total: usize, size: usize) -> usize {
    if size >= total {
        1
    } else {
        total.div_ceil(size)
    }
}

/// Keeps one page of a sorted collection and diffs it as either side moves.
pub struct Pager<K, V> {
    all: KeyValueCollection<K, V>,
    current: KeyValueCollection<K, V>,
    request: PageRequest,
    response: Option<PageResponse>,
    loaded: bool,
}

impl<K, V> Default for Pager<K, V> {
    fn default() -> Self {
        Self {
            all: KeyValueCollection::empty(),
            current: KeyValueCollection::empty(),
            request: PageRequest::EMPTY,
            response: None,
            loaded: false,
        }
    }
}

impl<K: Key, V: Clone> Pager<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request currently in force.
    #[inline]
    pub fn request(&self) -> PageRequest {
        self.request
    }

    /// The page last produced.
    #[inline]
    pub fn current(&self) -> &KeyValueCollection<K, V> {
        &self.current
    }

    /// Switches to a new page request.
    ///
    /// A request that has not been issued, or one equal to the request in
    /// force, produces nothing.
    pub fn on_request(&mut self, request: PageRequest) -> Result<Option<PagedChangeSet<K, V>>> {
        if request.is_empty() || request == self.request {
            return Ok(None);
        }
        self.request = request;
        self.paginate(None)
    }

    /// Applies a new upstream sorted snapshot.
    pub fn on_update(&mut self, update: &SortedChangeSet<K, V>) -> Result<Option<PagedChangeSet<K, V>>> {
        self.loaded = true;
        self.all = update.sorted_items.clone();
        self.paginate(Some(update))
    }

    fn paginate(&mut self, update: Option<&SortedChangeSet<K, V>>) -> Result<Option<PagedChangeSet<K, V>>> {
        if !self.loaded || self.request.is_empty() {
            return Ok(None);
        }

        let size = self.request.size;
        let total = self.all.len();
        let pages = page_count(total, size);
        let page = self.request.page.min(pages);
        if page != self.request.page {
            trace!(requested = self.request.page, page, pages, "pager: clamped to last page");
        }
        let skip = size * (page - 1);

        let items: Vec<(K, V)> = self.all.iter().skip(skip).take(size).cloned().collect();
        trace!(skip, visible = items.len(), total, "pager: sliced");

        let reason = match update.map(|u| u.sorted_items.sort_reason()) {
            Some(reason @ (SortReason::InitialLoad | SortReason::ComparerChanged)) => reason,
            _ => SortReason::DataChanged,
        };
        let current = KeyValueCollection::new(items, self.all.comparer().cloned(), reason);
        let changes = FilteredIndexCalculator::calculate(&current, &self.current, update.map(|u| &u.changes))?;

        let response = PageResponse::new(size, total, page, pages);
        self.current = current;
        if changes.is_empty() && self.response == Some(response) {
            return Ok(None);
        }
        self.response = Some(response);

        Ok(Some(PagedChangeSet::new(
            self.current.clone(),
            changes.into(),
            response,
        )))
    }
}

/// Pages a sorted change stream.
///
/// Every request or upstream change produces the changes to the visible page
/// along with its contents and a [`PageResponse`]. Errors from either input,
/// and from diffing, terminate the output and release both inputs. The
/// output completes with `source`.
pub fn page<K, V>(source: &Observable<SortedChangeSet<K, V>>, requests: &Observable<PageRequest>) -> Observable<PagedChangeSet<K, V>>
where
    K: Key,
    V: Clone + 'static,
{
    let source = source.clone();
    let requests = requests.clone();
    Observable::new(move |downstream| {
        let pager = Rc::new(RefCell::new(Pager::new()));
        let owned = SharedSubscription::new();

        let on_request = Rc::clone(&pager);
        let out = downstream.clone();
        let on_error = downstream.clone();
        let (request_owner, request_failed) = (owned.clone(), owned.clone());
        let mut subscription = requests.subscribe_all(
            move |request: &PageRequest| {
                let paged = on_request.borrow_mut().on_request(*request);
                emit(&out, &request_owner, paged);
            },
            move |error| {
                warn!(%error, "page requests failed");
                on_error.error(error);
                request_failed.release();
            },
            || {},
        );

        let out = downstream.clone();
        let on_error = downstream.clone();
        let on_completed = downstream.clone();
        let (update_owner, update_failed) = (owned.clone(), owned.clone());
        subscription.add(source.subscribe_with_subscriber(Subscriber::from_fn(
            move |update| {
                let paged = pager.borrow_mut().on_update(update);
                emit(&out, &update_owner, paged);
            },
            move |error| {
                on_error.error(error);
                update_failed.release();
            },
            move || on_completed.complete(),
        )));
        owned.set(subscription);
        owned.handle()
    })
}

fn emit<K, V>(
    out: &Subscriber<PagedChangeSet<K, V>>,
    owned: &SharedSubscription,
    paged: Result<Option<PagedChangeSet<K, V>>>,
) {
    match paged {
        Ok(Some(paged)) => out.next(&paged),
        Ok(None) => {}
        Err(error) => {
            warn!(%error, "paging failed");
            out.error(&error);
            owned.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Sorter;
    use alloc::vec;
    use cascade_core::{Change, ChangeSet, Error, KeyValueComparer};
    use cascade_reactive::Subject;

    fn sorter() -> Sorter<u32, u32> {
        Sorter::new(Some(KeyValueComparer::ascending(|v: &u32| *v)))
    }

    fn load(sorter: &mut Sorter<u32, u32>, changes: Vec<Change<u32, u32>>) -> SortedChangeSet<u32, u32> {
        sorter.on_changes(&ChangeSet::from(changes)).unwrap()
    }

    fn visible(paged: &PagedChangeSet<u32, u32>) -> Vec<u32> {
        paged.sorted_items.values().copied().collect()
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 1);
        assert_eq!(page_count(3, 3), 1);
        assert_eq!(page_count(3, 5), 1);
        assert_eq!(page_count(10, 3), 4);
        assert_eq!(page_count(9, 3), 3);
    }

    #[test]
    fn test_unissued_request_produces_nothing() {
        let mut data = sorter();
        let mut pager = Pager::new();

        let sorted = load(&mut data, vec![Change::add(1, 1)]);
        assert!(pager.on_update(&sorted).unwrap().is_none());
        assert!(pager.on_request(PageRequest::new(0, 10).unwrap()).unwrap().is_none());
        assert!(pager.on_request(PageRequest::new(1, 0).unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_request_before_data_waits() {
        let mut data = sorter();
        let mut pager = Pager::new();

        assert!(pager.on_request(PageRequest::new(1, 2).unwrap()).unwrap().is_none());
        let sorted = load(&mut data, vec![Change::add(1, 30), Change::add(2, 20), Change::add(3, 25)]);
        let paged = pager.on_update(&sorted).unwrap().unwrap();

        assert_eq!(visible(&paged), vec![20, 25]);
        assert_eq!(paged.sorted_items.sort_reason(), SortReason::InitialLoad);
        assert_eq!(paged.response, PageResponse::new(2, 3, 1, 2));
    }

    #[test]
    fn test_identical_request_is_noop() {
        let mut data = sorter();
        let mut pager = Pager::new();

        pager.on_update(&load(&mut data, vec![Change::add(1, 1), Change::add(2, 2)])).unwrap();
        assert!(pager.on_request(PageRequest::new(1, 1).unwrap()).unwrap().is_some());
        assert!(pager.on_request(PageRequest::new(1, 1).unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_page_clamps_to_last() {
        let mut data = sorter();
        let mut pager = Pager::new();

        pager.on_update(&load(&mut data, (1..=5).map(|i| Change::add(i, i)).collect())).unwrap();
        let paged = pager.on_request(PageRequest::new(10, 2).unwrap()).unwrap().unwrap();

        assert_eq!(paged.response.page, 3);
        assert_eq!(paged.response.pages, 3);
        assert_eq!(visible(&paged), vec![5]);
    }

    #[test]
    fn test_change_off_page_is_suppressed() {
        let mut data = sorter();
        let mut pager = Pager::new();

        pager.on_update(&load(&mut data, vec![Change::add(1, 1), Change::add(2, 2), Change::add(3, 3)])).unwrap();
        pager.on_request(PageRequest::new(1, 2).unwrap()).unwrap();

        let sorted = load(&mut data, vec![Change::update(3, 4, 3)]);
        assert!(pager.on_update(&sorted).unwrap().is_none());

        let sorted = load(&mut data, vec![Change::add(0, 0)]);
        let paged = pager.on_update(&sorted).unwrap().unwrap();
        assert_eq!(visible(&paged), vec![0, 1]);
        assert_eq!(
            paged.changes.as_slice(),
            &[Change::remove(2, 2).at(1), Change::add(0, 0).at(0)]
        );
    }

    #[test]
    fn test_change_off_page_refreshes_response() {
        let mut data = sorter();
        let mut pager = Pager::new();

        pager.on_update(&load(&mut data, (1..=4).map(|i| Change::add(i, i)).collect())).unwrap();
        let first = pager.on_request(PageRequest::new(1, 2).unwrap()).unwrap().unwrap();
        assert_eq!(first.response, PageResponse::new(2, 4, 1, 2));

        let sorted = load(&mut data, vec![Change::add(5, 5)]);
        let paged = pager.on_update(&sorted).unwrap().unwrap();
        assert!(paged.changes.is_empty());
        assert_eq!(visible(&paged), vec![1, 2]);
        assert_eq!(paged.response, PageResponse::new(2, 5, 1, 3));

        let sorted = load(&mut data, vec![Change::remove(5, 5)]);
        let paged = pager.on_update(&sorted).unwrap().unwrap();
        assert_eq!(paged.response, PageResponse::new(2, 4, 1, 2));
    }

    #[test]
    fn test_update_on_page_carries_indices() {
        let mut data = sorter();
        let mut pager = Pager::new();

        pager.on_update(&load(&mut data, vec![Change::add(1, 10), Change::add(2, 20), Change::add(3, 30)])).unwrap();
        pager.on_request(PageRequest::new(1, 3).unwrap()).unwrap();

        let sorted = load(&mut data, vec![Change::update(1, 25, 10)]);
        let paged = pager.on_update(&sorted).unwrap().unwrap();
        assert_eq!(
            paged.changes.as_slice(),
            &[Change::update(1, 25, 10).at_indices(1, 0)]
        );
        assert_eq!(paged.sorted_items.sort_reason(), SortReason::DataChanged);
    }

    #[test]
    fn test_source_error_releases_requests() {
        let source: Subject<SortedChangeSet<u32, u32>> = Subject::new();
        let requests: Subject<PageRequest> = Subject::new();
        let paged = page(&source.as_observable(), &requests.as_observable());
        let failed = Rc::new(RefCell::new(None));
        let failed_clone = failed.clone();
        let _sub = paged.subscribe_all(|_| {}, move |e| *failed_clone.borrow_mut() = Some(e.clone()), || {});
        assert!(requests.has_observers());

        source.error(&Error::Terminated);
        assert_eq!(*failed.borrow(), Some(Error::Terminated));
        assert_eq!(requests.observer_count(), 0);
    }

    #[test]
    fn test_request_error_releases_source() {
        let source: Subject<SortedChangeSet<u32, u32>> = Subject::new();
        let requests: Subject<PageRequest> = Subject::new();
        let seen = Rc::new(RefCell::new(0));
        let seen_clone = seen.clone();
        let _sub = page(&source.as_observable(), &requests.as_observable())
            .subscribe(move |_: &PagedChangeSet<u32, u32>| *seen_clone.borrow_mut() += 1);

        requests.next(&PageRequest::new(1, 10).unwrap());
        requests.error(&Error::Terminated);
        assert_eq!(source.observer_count(), 0);

        let mut data = sorter();
        source.next(&load(&mut data, vec![Change::add(1, 1)]));
        assert_eq!(*seen.borrow(), 0);
    }
}
