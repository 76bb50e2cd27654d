//! Hot multicast streams.

use crate::observable::{Observable, Subscriber};
use crate::subscription::{Subscription, SubscriptionManager};
use alloc::rc::Rc;
use cascade_core::Error;
use core::cell::RefCell;

enum Terminal {
    Completed,
    Errored(Error),
}

struct SubjectState<T> {
    listeners: SubscriptionManager<Subscriber<T>>,
    terminal: Option<Terminal>,
}

/// Pushes each value to every current subscriber.
///
/// Delivery is in registration order over a copy of the listener list.
/// Once terminated, late subscribers receive the terminal notification
/// immediately.
pub struct Subject<T> {
    state: Rc<RefCell<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subject<T> {
    /// Creates a subject with no subscribers.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                listeners: SubscriptionManager::new(),
                terminal: None,
            })),
        }
    }

    /// Pushes a value to every subscriber.
    pub fn next(&self, value: &T) {
        let listeners = {
            let state = self.state.borrow();
            if state.terminal.is_some() {
                return;
            }
            state.listeners.snapshot()
        };
        for listener in listeners {
            listener.next(value);
        }
    }

    /// Terminates every subscriber with an error.
    pub fn error(&self, error: &Error) {
        let listeners = {
            let mut state = self.state.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(Terminal::Errored(error.clone()));
            state.listeners.drain()
        };
        for listener in listeners {
            listener.error(error);
        }
    }

    /// Completes every subscriber.
    pub fn complete(&self) {
        let listeners = {
            let mut state = self.state.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(Terminal::Completed);
            state.listeners.drain()
        };
        for listener in listeners {
            listener.complete();
        }
    }

    /// Returns true once completed or errored.
    pub fn is_stopped(&self) -> bool {
        self.state.borrow().terminal.is_some()
    }

    /// Returns the number of live subscribers.
    pub fn observer_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    /// Returns true if anyone is listening.
    pub fn has_observers(&self) -> bool {
        !self.state.borrow().listeners.is_empty()
    }

    /// Exposes the subject as a stream.
    pub fn as_observable(&self) -> Observable<T> {
        let state = Rc::clone(&self.state);
        Observable::new(move |subscriber| {
            let id = {
                let mut guard = state.borrow_mut();
                match guard.terminal {
                    Some(_) => None,
                    None => Some(guard.listeners.subscribe(subscriber.clone())),
                }
            };

            let Some(id) = id else {
                let terminal = match &state.borrow().terminal {
                    Some(Terminal::Errored(error)) => Some(error.clone()),
                    _ => None,
                };
                match terminal {
                    Some(error) => subscriber.error(&error),
                    None => subscriber.complete(),
                }
                return Subscription::empty();
            };

            let weak = Rc::downgrade(&state);
            Subscription::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.borrow_mut().listeners.unsubscribe(id);
                }
            })
        })
    }
}
