//! Edits expressed as data.
//!
//! A batch of `CacheCommand`s is the explicit form of an edit: it can be
//! built ahead of time, inspected, and applied in one call.

use crate::change::ChangeReason;
use crate::change_aware_cache::ChangeAwareCache;
use crate::change_set::ChangeSet;
use crate::key::Key;
use alloc::vec::Vec;

/// One primitive cache mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheCommand<K, V> {
    AddOrUpdate { key: K, value: V },
    Remove { key: K },
    Refresh { key: K },
    Clear,
}

impl<K: Clone, V: Clone> CacheCommand<K, V> {
    /// Converts a change set into the commands that reproduce it.
    ///
    /// `Moved` changes carry no membership information and are dropped.
    pub fn from_changes(changes: &ChangeSet<K, V>) -> Vec<Self> {
        changes
            .iter()
            .filter_map(|change| match change.reason {
                ChangeReason::Add | ChangeReason::Update => Some(CacheCommand::AddOrUpdate {
                    key: change.key.clone(),
                    value: change.current.clone(),
                }),
                ChangeReason::Remove => Some(CacheCommand::Remove {
                    key: change.key.clone(),
                }),
                ChangeReason::Refresh => Some(CacheCommand::Refresh {
                    key: change.key.clone(),
                }),
                ChangeReason::Moved => None,
            })
            .collect()
    }
}

/// Applies a batch of commands in order.
pub fn apply_batch<K, V, I>(cache: &mut ChangeAwareCache<K, V>, commands: I)
where
    K: Key,
    V: Clone,
    I: IntoIterator<Item = CacheCommand<K, V>>,
{
    for command in commands {
        match command {
            CacheCommand::AddOrUpdate { key, value } => cache.add_or_update(key, value),
            CacheCommand::Remove { key } => {
                cache.remove(&key);
            }
            CacheCommand::Refresh { key } => {
                cache.refresh(&key);
            }
            CacheCommand::Clear => cache.clear(),
        }
    }
}
