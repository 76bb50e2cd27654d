//! Subscription handles and listener bookkeeping.
//!
//! A [`Subscription`] releases whatever it guards when it is dropped or
//! explicitly unsubscribed. A [`SharedSubscription`] lets an operator
//! release its own resources from inside a callback, such as an error
//! handler. A [`SubscriptionManager`] keeps the listeners of one
//! [`Subject`](crate::Subject) in registration order.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

/// Unique identifier for a registered listener.
pub type SubscriptionId = u64;

/// Handle to an active subscription.
///
/// Dropping the handle unsubscribes. Teardown actions run once, in the order
/// they were added.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Default)]
pub struct Subscription {
    teardowns: Vec<Box<dyn FnOnce()>>,
    closed: bool,
}

impl Subscription {
    /// Creates a subscription that runs `teardown` on unsubscribe.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            teardowns: alloc::vec![Box::new(teardown) as Box<dyn FnOnce()>],
            closed: false,
        }
    }

    /// Creates a subscription with nothing to release.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Ties another subscription to this one.
    ///
    /// If this subscription is already closed, `other` is released at once.
    pub fn add(&mut self, other: Subscription) {
        if self.closed {
            drop(other);
            return;
        }
        self.teardowns.push(Box::new(move || drop(other)));
    }

    /// Adds a teardown action.
    pub fn add_teardown<F>(&mut self, teardown: F)
    where
        F: FnOnce() + 'static,
    {
        if self.closed {
            teardown();
            return;
        }
        self.teardowns.push(Box::new(teardown));
    }

    /// Returns true once unsubscribed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Runs every teardown action. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for teardown in core::mem::take(&mut self.teardowns) {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("teardowns", &self.teardowns.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[derive(Default)]
struct SharedState {
    held: Option<Subscription>,
    released: bool,
}

/// A subscription slot shared between an operator and its callbacks.
///
/// Callbacks hold a clone and call [`release`](Self::release) to tear the
/// operator down early. A subscription stored after release is released at
/// once, which covers errors delivered while subscribing.
#[derive(Clone, Default)]
pub struct SharedSubscription {
    state: Rc<RefCell<SharedState>>,
}

impl SharedSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `subscription`, replacing and releasing any held one.
    pub fn set(&self, subscription: Subscription) {
        let dropped = {
            let mut state = self.state.borrow_mut();
            if state.released {
                Some(subscription)
            } else {
                state.held.replace(subscription)
            }
        };
        // Teardowns may touch this slot again
        drop(dropped);
    }

    /// Releases the held subscription. Later calls do nothing.
    pub fn release(&self) {
        let held = {
            let mut state = self.state.borrow_mut();
            state.released = true;
            state.held.take()
        };
        drop(held);
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.state.borrow().released
    }

    /// A subscription that releases this slot when dropped.
    pub fn handle(&self) -> Subscription {
        let slot = self.clone();
        Subscription::new(move || slot.release())
    }
}

impl fmt::Debug for SharedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SharedSubscription")
            .field("held", &state.held.is_some())
            .field("released", &state.released)
            .finish()
    }
}

/// Listener list with stable ids, kept in registration order.
pub struct SubscriptionManager<L> {
    listeners: Vec<(SubscriptionId, L)>,
    next_id: SubscriptionId,
}

impl<L> Default for SubscriptionManager<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> SubscriptionManager<L> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    /// Registers a listener.
    ///
    /// Returns the id that can be used to unsubscribe.
    pub fn subscribe(&mut self, listener: L) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Unsubscribes by id.
    ///
    /// Returns true if the listener was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.listeners.iter().position(|(lid, _)| *lid == id) {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns the number of listeners.
    #[inline]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if there are no listeners.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns all subscription ids in registration order.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.listeners.iter().map(|(id, _)| *id).collect()
    }

    /// Removes every listener, returning them in registration order.
    pub fn drain(&mut self) -> Vec<L> {
        self.listeners.drain(..).map(|(_, l)| l).collect()
    }

    /// Clears all listeners.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<L: Clone> SubscriptionManager<L> {
    /// Copies the current listener list.
    ///
    /// Delivery iterates the copy so listeners can subscribe or unsubscribe
    /// while being notified.
    pub fn snapshot(&self) -> Vec<L> {
        self.listeners.iter().map(|(_, l)| l.clone()).collect()
    }
}
