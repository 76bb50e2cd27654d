//! Sharing one materialized cache among many subscribers.

use crate::observable::Observable;
use crate::observable_cache::{ConnectConfig, ConnectableCache, ObservableCache};
use crate::reader_writer::Equality;
use alloc::rc::Rc;
use cascade_core::{ChangeSet, Key};
use core::cell::RefCell;
use core::fmt;
use tracing::debug;

/// Options for [`ref_count`].
pub struct RefCountOptions<V> {
    /// Updates equal to the held value by this comparison are dropped.
    pub equality: Option<Equality<V>>,
    pub suppress_empty_change_sets: bool,
}

impl<V> Clone for RefCountOptions<V> {
    fn clone(&self) -> Self {
        Self {
            equality: self.equality,
            suppress_empty_change_sets: self.suppress_empty_change_sets,
        }
    }
}

impl<V> Default for RefCountOptions<V> {
    fn default() -> Self {
        Self {
            equality: None,
            suppress_empty_change_sets: true,
        }
    }
}

impl<V> fmt::Debug for RefCountOptions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCountOptions")
            .field("deep_equal", &self.equality.is_some())
            .field("suppress_empty_change_sets", &self.suppress_empty_change_sets)
            .finish()
    }
}

impl<V> RefCountOptions<V> {
    /// Drops updates to an equal value.
    pub fn deep_equal(mut self) -> Self
    where
        V: PartialEq,
    {
        self.equality = Some(<V as PartialEq>::eq);
        self
    }

    pub fn emit_empty_change_sets(mut self) -> Self {
        self.suppress_empty_change_sets = false;
        self
    }
}

struct Shared<K: Key, V: Clone + 'static> {
    subscribers: usize,
    cache: Option<ObservableCache<K, V>>,
}

/// Shares one upstream subscription among every subscriber.
///
/// The first subscriber materializes `source` into a cache; later subscribers
/// connect to that cache and receive its current contents first. When the
/// last subscriber leaves the cache is disposed and the upstream released. A
/// subscriber arriving after that starts over.
pub fn ref_count<K, V>(source: &Observable<ChangeSet<K, V>>, options: RefCountOptions<V>) -> Observable<ChangeSet<K, V>>
where
    K: Key,
    V: Clone + 'static,
{
    let source = source.clone();
    let shared = Rc::new(RefCell::new(Shared {
        subscribers: 0,
        cache: None,
    }));

    Observable::new(move |subscriber| {
        let cache = {
            let mut state = shared.borrow_mut();
            state.subscribers += 1;
            let existing = state.cache.clone();
            match existing {
                Some(cache) => cache,
                None => {
                    debug!("ref_count: materializing upstream");
                    let cache = ObservableCache::from_stream_with_equality(&source, options.equality);
                    state.cache = Some(cache.clone());
                    cache
                }
            }
        };

        let mut config = ConnectConfig::default();
        config.suppress_empty_change_sets = options.suppress_empty_change_sets;
        let mut subscription = cache.connect(config).subscribe_with_subscriber(subscriber);
        drop(cache);

        let shared = Rc::clone(&shared);
        subscription.add_teardown(move || {
            let released = {
                let mut state = shared.borrow_mut();
                state.subscribers -= 1;
                if state.subscribers == 0 {
                    state.cache.take()
                } else {
                    None
                }
            };
            if let Some(cache) = released {
                debug!("ref_count: last subscriber left, disposing");
                cache.dispose();
            }
        });
        subscription
    })
}
