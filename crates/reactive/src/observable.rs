//! Synchronous push streams.
//!
//! An [`Observable`] is a recipe for producing values: subscribing runs the
//! recipe against a [`Subscriber`] and returns a [`Subscription`] that tears
//! it down. Delivery is synchronous and single-threaded; a value pushed by a
//! producer reaches every subscriber before the producer's call returns.
//!
//! A subscriber stops receiving values once it has seen an error or
//! completion, or once its subscription has been released.

use crate::subscription::{SharedSubscription, Subscription};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use cascade_core::Error;
use core::cell::{Cell, RefCell};
use core::fmt;

/// Receives the notifications of a stream.
pub trait Observer<T> {
    fn on_next(&self, value: &T);
    fn on_error(&self, error: &Error);
    fn on_completed(&self);
}

struct FnObserver<N, E, C> {
    next: N,
    error: E,
    completed: C,
}

impl<T, N, E, C> Observer<T> for FnObserver<N, E, C>
where
    N: Fn(&T),
    E: Fn(&Error),
    C: Fn(),
{
    fn on_next(&self, value: &T) {
        (self.next)(value)
    }

    fn on_error(&self, error: &Error) {
        (self.error)(error)
    }

    fn on_completed(&self) {
        (self.completed)()
    }
}

struct SubscriberInner<T> {
    observer: Box<dyn Observer<T>>,
    closed: Cell<bool>,
}

/// A shared handle to one observer, with a closed flag.
///
/// Every notification after the first error or completion is dropped.
pub struct Subscriber<T> {
    inner: Rc<SubscriberInner<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}

impl<T: 'static> Subscriber<T> {
    /// Wraps an observer.
    pub fn new<O>(observer: O) -> Self
    where
        O: Observer<T> + 'static,
    {
        Self {
            inner: Rc::new(SubscriberInner {
                observer: Box::new(observer),
                closed: Cell::new(false),
            }),
        }
    }

    /// Builds a subscriber from three callbacks.
    pub fn from_fn<N, E, C>(next: N, error: E, completed: C) -> Self
    where
        N: Fn(&T) + 'static,
        E: Fn(&Error) + 'static,
        C: Fn() + 'static,
    {
        Self::new(FnObserver {
            next,
            error,
            completed,
        })
    }

    /// Builds a subscriber that handles values itself and passes errors and
    /// completion straight on to `downstream`.
    pub fn relay<U, N>(downstream: &Subscriber<U>, next: N) -> Self
    where
        U: 'static,
        N: Fn(&T, &Subscriber<U>) + 'static,
    {
        let on_next = downstream.clone();
        let on_error = downstream.clone();
        let on_completed = downstream.clone();
        Self::from_fn(
            move |value| next(value, &on_next),
            move |error| on_error.error(error),
            move || on_completed.complete(),
        )
    }
}

impl<T> Subscriber<T> {
    /// Delivers a value unless closed.
    pub fn next(&self, value: &T) {
        if !self.inner.closed.get() {
            self.inner.observer.on_next(value);
        }
    }

    /// Delivers an error and closes.
    pub fn error(&self, error: &Error) {
        if !self.inner.closed.replace(true) {
            self.inner.observer.on_error(error);
        }
    }

    /// Delivers completion and closes.
    pub fn complete(&self) {
        if !self.inner.closed.replace(true) {
            self.inner.observer.on_completed();
        }
    }

    /// Closes without notifying.
    pub fn close(&self) {
        self.inner.closed.set(true);
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }
}

type SubscribeFn<T> = dyn Fn(Subscriber<T>) -> Subscription;

/// A cold, synchronous stream of values.
pub struct Observable<T> {
    subscribe: Rc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Rc::clone(&self.subscribe),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: 'static> Observable<T> {
    /// Creates an observable from its subscribe function.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Subscriber<T>) -> Subscription + 'static,
    {
        Self {
            subscribe: Rc::new(subscribe),
        }
    }

    /// A stream that never emits and never terminates.
    pub fn never() -> Self {
        Self::new(|_| Subscription::empty())
    }

    /// A stream that completes immediately.
    pub fn empty() -> Self {
        Self::new(|subscriber| {
            subscriber.complete();
            Subscription::empty()
        })
    }

    /// A stream that fails immediately.
    pub fn throw(error: Error) -> Self {
        Self::new(move |subscriber| {
            subscriber.error(&error);
            Subscription::empty()
        })
    }

    /// Emits each value in order, then completes.
    pub fn of(values: Vec<T>) -> Self {
        let values = Rc::new(values);
        Self::new(move |subscriber| {
            for value in values.iter() {
                if subscriber.is_closed() {
                    break;
                }
                subscriber.next(value);
            }
            subscriber.complete();
            Subscription::empty()
        })
    }

    /// Subscribes an existing subscriber.
    ///
    /// Releasing the returned subscription closes the subscriber before the
    /// upstream is torn down, so no late values are delivered.
    pub fn subscribe_with_subscriber(&self, subscriber: Subscriber<T>) -> Subscription {
        let closer = subscriber.clone();
        let upstream = (self.subscribe)(subscriber);
        let mut subscription = Subscription::new(move || closer.close());
        subscription.add(upstream);
        subscription
    }

    /// Subscribes to values, ignoring errors and completion.
    pub fn subscribe<N>(&self, next: N) -> Subscription
    where
        N: Fn(&T) + 'static,
    {
        self.subscribe_with_subscriber(Subscriber::from_fn(next, |_| {}, || {}))
    }

    /// Subscribes to values, errors and completion.
    pub fn subscribe_all<N, E, C>(&self, next: N, error: E, completed: C) -> Subscription
    where
        N: Fn(&T) + 'static,
        E: Fn(&Error) + 'static,
        C: Fn() + 'static,
    {
        self.subscribe_with_subscriber(Subscriber::from_fn(next, error, completed))
    }

    /// Transforms each value.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: 'static,
        F: Fn(&T) -> U + 'static,
    {
        let source = self.clone();
        let f = Rc::new(f);
        Observable::new(move |downstream| {
            let f = Rc::clone(&f);
            source.subscribe_with_subscriber(Subscriber::relay(&downstream, move |value, out| {
                out.next(&f(value))
            }))
        })
    }

    /// Drops values that fail the predicate.
    pub fn filter<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let source = self.clone();
        let predicate = Rc::new(predicate);
        Observable::new(move |downstream| {
            let predicate = Rc::clone(&predicate);
            source.subscribe_with_subscriber(Subscriber::relay(&downstream, move |value, out| {
                if predicate(value) {
                    out.next(value);
                }
            }))
        })
    }

    /// Interleaves two streams. Completes once both have completed; the first
    /// error from either terminates the output and releases the other.
    pub fn merge(&self, other: &Observable<T>) -> Observable<T> {
        let left = self.clone();
        let right = other.clone();
        Observable::new(move |downstream| {
            let remaining = Rc::new(Cell::new(2u8));
            let owned = SharedSubscription::new();
            let mut subscription = Subscription::empty();
            for source in [&left, &right] {
                let on_next = downstream.clone();
                let on_error = downstream.clone();
                let on_completed = downstream.clone();
                let remaining = Rc::clone(&remaining);
                let failed = owned.clone();
                subscription.add(source.subscribe_with_subscriber(Subscriber::from_fn(
                    move |value| on_next.next(value),
                    move |error| {
                        on_error.error(error);
                        failed.release();
                    },
                    move || {
                        remaining.set(remaining.get() - 1);
                        if remaining.get() == 0 {
                            on_completed.complete();
                        }
                    },
                )));
            }
            owned.set(subscription);
            owned.handle()
        })
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Emits `value` first, then everything from this stream.
    pub fn start_with(&self, value: T) -> Observable<T> {
        let source = self.clone();
        Observable::new(move |downstream| {
            downstream.next(&value);
            source.subscribe_with_subscriber(downstream)
        })
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Drops values equal to the one delivered just before.
    pub fn distinct_until_changed(&self) -> Observable<T> {
        let source = self.clone();
        Observable::new(move |downstream| {
            let last: RefCell<Option<T>> = RefCell::new(None);
            source.subscribe_with_subscriber(Subscriber::relay(&downstream, move |value, out| {
                let changed = last.borrow().as_ref() != Some(value);
                if changed {
                    *last.borrow_mut() = Some(value.clone());
                    out.next(value);
                }
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn collect<T: Clone + 'static>(source: &Observable<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let values = Rc::new(RefCell::new(Vec::new()));
        let values_clone = values.clone();
        let sub = source.subscribe(move |v: &T| values_clone.borrow_mut().push(v.clone()));
        (values, sub)
    }

    #[test]
    fn test_of_emits_then_completes() {
        let completed = Rc::new(Cell::new(false));
        let completed_clone = completed.clone();
        let values = Rc::new(RefCell::new(Vec::new()));
        let values_clone = values.clone();

        let _sub = Observable::of(vec![1, 2, 3]).subscribe_all(
            move |v| values_clone.borrow_mut().push(*v),
            |_| {},
            move || completed_clone.set(true),
        );

        assert_eq!(*values.borrow(), vec![1, 2, 3]);
        assert!(completed.get());
    }

    #[test]
    fn test_map_and_filter() {
        let source = Observable::of(vec![1, 2, 3, 4]).map(|v| v * 10).filter(|v| *v > 15);
        let (values, _sub) = collect(&source);
        assert_eq!(*values.borrow(), vec![20, 30, 40]);
    }

    #[test]
    fn test_start_with() {
        let source = Observable::of(vec![2, 3]).start_with(1);
        let (values, _sub) = collect(&source);
        assert_eq!(*values.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_distinct_until_changed() {
        let source = Observable::of(vec![1, 1, 2, 2, 1, 3, 3]).distinct_until_changed();
        let (values, _sub) = collect(&source);
        assert_eq!(*values.borrow(), vec![1, 2, 1, 3]);
    }

    #[test]
    fn test_merge_completes_after_both() {
        let completed = Rc::new(Cell::new(0));
        let completed_clone = completed.clone();

        let merged = Observable::of(vec![1]).merge(&Observable::never());
        let _sub = merged.subscribe_all(|_| {}, |_| {}, move || completed_clone.set(1));
        assert_eq!(completed.get(), 0);

        let merged = Observable::of(vec![1]).merge(&Observable::of(vec![2]));
        let completed_clone = completed.clone();
        let _sub = merged.subscribe_all(|_| {}, |_| {}, move || completed_clone.set(2));
        assert_eq!(completed.get(), 2);
    }

    #[test]
    fn test_merge_error_releases_other() {
        let left: crate::Subject<u32> = crate::Subject::new();
        let right: crate::Subject<u32> = crate::Subject::new();
        let values = Rc::new(RefCell::new(Vec::new()));
        let values_clone = values.clone();
        let _sub = left
            .as_observable()
            .merge(&right.as_observable())
            .subscribe(move |v: &u32| values_clone.borrow_mut().push(*v));
        assert_eq!(right.observer_count(), 1);

        left.error(&Error::Terminated);
        assert_eq!(right.observer_count(), 0);
        right.next(&7);
        assert!(values.borrow().is_empty());
    }

    #[test]
    fn test_throw_closes_subscriber() {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let errors_clone = errors.clone();

        let _sub = Observable::<u32>::throw(Error::Terminated).subscribe_all(
            |_| panic!("no values expected"),
            move |e| errors_clone.borrow_mut().push(e.clone()),
            || panic!("no completion expected"),
        );

        assert_eq!(*errors.borrow(), vec![Error::Terminated]);
    }

    #[test]
    fn test_subscriber_ignores_after_complete() {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let subscriber = Subscriber::from_fn(
            move |_: &u32| count_clone.set(count_clone.get() + 1),
            |_| {},
            || {},
        );

        subscriber.next(&1);
        subscriber.complete();
        subscriber.next(&2);
        subscriber.error(&Error::Terminated);

        assert_eq!(count.get(), 1);
        assert!(subscriber.is_closed());
    }
}
