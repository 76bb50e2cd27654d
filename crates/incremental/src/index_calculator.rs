//! Positional diffs between two ordered snapshots.
//!
//! Paging and other windowing operators keep the last snapshot they emitted.
//! When a new snapshot is produced, `FilteredIndexCalculator` works out the
//! indexed changes that turn the old one into the new one, so a consumer
//! holding a plain list can replay them with `insert`/`remove` calls.

use alloc::vec::Vec;
use cascade_core::{Change, ChangeReason, ChangeSet, Error, Key, KeyValueCollection, KeyValueComparer, Result, SortReason};
use core::cmp::Ordering;
use hashbrown::HashSet;
use tracing::trace;

/// Computes indexed changes between ordered snapshots.
pub struct FilteredIndexCalculator;

impl FilteredIndexCalculator {
    /// Returns the changes that transform `previous` into `current`.
    ///
    /// `source_updates` are the upstream changes that produced `current`.
    /// They are used to spot updates, moves and refreshes of items visible in
    /// both snapshots; without them only adds and removes are reported.
    ///
    /// Replaying the result in order on a list equal to `previous` yields the
    /// keys of `current` in the same order.
    pub fn calculate<K, V>(
        current: &KeyValueCollection<K, V>,
        previous: &KeyValueCollection<K, V>,
        source_updates: Option<&ChangeSet<K, V>>,
    ) -> Result<Vec<Change<K, V>>>
    where
        K: Key,
        V: Clone,
    {
        if matches!(
            current.sort_reason(),
            SortReason::InitialLoad | SortReason::ComparerChanged
        ) {
            trace!(
                previous = previous.len(),
                current = current.len(),
                "index calculator: reset"
            );
            return Ok(Self::reset(current, previous));
        }

        let current_keys: HashSet<&K> = current.keys().collect();
        let previous_keys: HashSet<&K> = previous.keys().collect();
        let mut working: Vec<(K, V)> = previous.items().to_vec();
        let mut result = Vec::new();

        // Hints for items visible in both snapshots
        let remaining: Vec<&Change<K, V>> = source_updates
            .into_iter()
            .flat_map(|updates| updates.iter())
            .filter(|change| {
                matches!(
                    change.reason,
                    ChangeReason::Update | ChangeReason::Moved | ChangeReason::Refresh
                ) && current_keys.contains(&change.key)
                    && previous_keys.contains(&change.key)
            })
            .collect();

        // Keys only in previous
        for (key, value) in previous.iter().filter(|(k, _)| !current_keys.contains(k)) {
            if let Some(index) = position(&working, key) {
                working.remove(index);
                result.push(Change::remove(key.clone(), value.clone()).at(index));
            }
        }

        // Refreshed and moved items go back into comparer order before
        // anything is inserted by comparison
        let settled: Vec<(K, V)> = remaining
            .iter()
            .filter(|change| matches!(change.reason, ChangeReason::Moved | ChangeReason::Refresh))
            .map(|change| (change.key.clone(), change.current.clone()))
            .collect();
        if let Some(comparer) = current.comparer() {
            settle_moved(comparer, &settled, &mut working, &mut result);
        }

        // Keys only in current
        for (key, value) in current.iter().filter(|(k, _)| !previous_keys.contains(k)) {
            let item = (key.clone(), value.clone());
            let index = insertion_point(current, &working, &item);
            working.insert(index, item);
            result.push(Change::add(key.clone(), value.clone()).at(index));
        }

        if source_updates.is_none() {
            trace!(changes = result.len(), "index calculator: diff without hints");
            return Ok(result);
        }

        for change in remaining {
            match change.reason {
                ChangeReason::Update => {
                    let previous_index = position(&working, &change.key);
                    if let Some(index) = previous_index {
                        working.remove(index);
                    }
                    let item = (change.key.clone(), change.current.clone());
                    let index = insertion_point(current, &working, &item);
                    working.insert(index, item);

                    let mut update = change.clone();
                    update.current_index = Some(index);
                    update.previous_index = previous_index;
                    result.push(update);

                    if let Some(comparer) = current.comparer() {
                        settle_moved(comparer, &settled, &mut working, &mut result);
                    }
                }
                ChangeReason::Moved if current.comparer().is_none() => {
                    let desired = current
                        .index_of(&change.key)
                        .ok_or_else(|| Error::index_not_found(&change.key))?;
                    let previous_index = position(&working, &change.key)
                        .ok_or_else(|| Error::index_not_found(&change.key))?;
                    if previous_index == desired {
                        continue;
                    }

                    working.remove(previous_index);
                    let desired = desired.min(working.len());
                    working.insert(desired, (change.key.clone(), change.current.clone()));
                    result.push(Change::moved(
                        change.key.clone(),
                        change.current.clone(),
                        desired,
                        previous_index,
                    ));
                }
                ChangeReason::Refresh => {
                    let index = position(&working, &change.key)
                        .ok_or_else(|| Error::index_not_found(&change.key))?;
                    result.push(Change::refresh(change.key.clone(), change.current.clone()).at(index));
                }
                _ => {}
            }
        }

        trace!(changes = result.len(), "index calculator: diff with hints");
        Ok(result)
    }

    fn reset<K: Clone, V: Clone>(
        current: &KeyValueCollection<K, V>,
        previous: &KeyValueCollection<K, V>,
    ) -> Vec<Change<K, V>> {
        let mut result = Vec::with_capacity(previous.len() + current.len());
        result.extend(
            previous
                .iter()
                .enumerate()
                .map(|(index, (k, v))| Change::remove(k.clone(), v.clone()).at(index)),
        );
        result.extend(
            current
                .iter()
                .enumerate()
                .map(|(index, (k, v))| Change::add(k.clone(), v.clone()).at(index)),
        );
        result
    }
}

#[inline]
fn position<K: PartialEq, V>(items: &[(K, V)], key: &K) -> Option<usize> {
    items.iter().position(|(k, _)| k == key)
}

/// Where `item` belongs in `working`. Without a comparer the order of
/// `current` decides.
fn insertion_point<K: PartialEq, V>(
    current: &KeyValueCollection<K, V>,
    working: &[(K, V)],
    item: &(K, V),
) -> usize {
    match current.comparer() {
        Some(comparer) => comparer.insertion_point(working, item),
        None => current
            .index_of(&item.0)
            .unwrap_or(working.len())
            .min(working.len()),
    }
}

/// Settles `items` and reports every one that changed position.
fn settle_moved<K: Clone + PartialEq, V: Clone>(
    comparer: &KeyValueComparer<K, V>,
    items: &[(K, V)],
    working: &mut Vec<(K, V)>,
    result: &mut Vec<Change<K, V>>,
) {
    if items.is_empty() {
        return;
    }
    settle(comparer, items.to_vec(), working, |key, value, new, old| {
        if new != old {
            result.push(Change::moved(key.clone(), value.clone(), new, old));
        }
    });
}

/// Moves items whose value changed in place back into comparer order.
///
/// Every settled entry first takes its new value. Items are then placed from
/// the greatest down, each just before the first entry that sorts after it,
/// so the rest of `working` must already be in order. `placed` sees each item
/// with its new and old index, including items that stay put.
pub(crate) fn settle<K: PartialEq, V: Clone>(
    comparer: &KeyValueComparer<K, V>,
    mut items: Vec<(K, V)>,
    working: &mut Vec<(K, V)>,
    mut placed: impl FnMut(&K, &V, usize, usize),
) {
    items.retain(|(key, value)| match position(working, key) {
        Some(index) => {
            working[index].1 = value.clone();
            true
        }
        None => false,
    });
    items.sort_by(|a, b| comparer.compare(b, a));

    for (key, value) in items {
        let Some(old) = position(working, &key) else {
            continue;
        };
        let mut new = working
            .iter()
            .position(|existing| comparer.compare(&working[old], existing) == Ordering::Less)
            .unwrap_or(working.len());
        // The item's own slot is vacated before it is re-inserted
        if old < new {
            new -= 1;
        }
        if old != new {
            let item = working.remove(old);
            working.insert(new, item);
        }
        placed(&key, &value, new, old);
    }
}
