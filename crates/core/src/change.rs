//! Change records.
//!
//! A `Change` describes what happened to a single key during one edit: it was
//! added, updated, removed, refreshed in place, or moved to a new position in
//! an ordered view.

use core::fmt;

/// Why a change was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeReason {
    /// The key was not present before.
    Add,
    /// The value for an existing key was replaced.
    Update,
    /// The key was removed.
    Remove,
    /// The value changed in a way that may affect derived state
    /// (sort position, group membership) without being replaced.
    Refresh,
    /// The position of the key in an ordered view changed.
    Moved,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeReason::Add => "add",
            ChangeReason::Update => "update",
            ChangeReason::Remove => "remove",
            ChangeReason::Refresh => "refresh",
            ChangeReason::Moved => "moved",
        };
        f.write_str(name)
    }
}

/// A single change to a keyed value.
///
/// `previous` is only populated for `Update`. Indices are `None` outside of an
/// ordered context; `Moved` always carries both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change<K, V> {
    pub reason: ChangeReason,
    pub key: K,
    pub current: V,
    pub previous: Option<V>,
    pub current_index: Option<usize>,
    pub previous_index: Option<usize>,
}

impl<K, V> Change<K, V> {
    fn with_reason(reason: ChangeReason, key: K, current: V) -> Self {
        Self {
            reason,
            key,
            current,
            previous: None,
            current_index: None,
            previous_index: None,
        }
    }

    /// Creates an add change.
    #[inline]
    pub fn add(key: K, current: V) -> Self {
        Self::with_reason(ChangeReason::Add, key, current)
    }

    /// Creates an update change carrying the replaced value.
    #[inline]
    pub fn update(key: K, current: V, previous: V) -> Self {
        Self {
            previous: Some(previous),
            ..Self::with_reason(ChangeReason::Update, key, current)
        }
    }

    /// Creates a remove change. `current` is the value that was removed.
    #[inline]
    pub fn remove(key: K, current: V) -> Self {
        Self::with_reason(ChangeReason::Remove, key, current)
    }

    /// Creates a refresh change.
    #[inline]
    pub fn refresh(key: K, current: V) -> Self {
        Self::with_reason(ChangeReason::Refresh, key, current)
    }

    /// Creates a moved change.
    #[inline]
    pub fn moved(key: K, current: V, current_index: usize, previous_index: usize) -> Self {
        Self {
            current_index: Some(current_index),
            previous_index: Some(previous_index),
            ..Self::with_reason(ChangeReason::Moved, key, current)
        }
    }

    /// Sets the current index.
    #[inline]
    pub fn at(mut self, current_index: usize) -> Self {
        self.current_index = Some(current_index);
        self
    }

    /// Sets both indices.
    #[inline]
    pub fn at_indices(mut self, current_index: usize, previous_index: usize) -> Self {
        self.current_index = Some(current_index);
        self.previous_index = Some(previous_index);
        self
    }

    /// Returns the previous value, if any.
    #[inline]
    pub fn previous(&self) -> Option<&V> {
        self.previous.as_ref()
    }

    /// Re-keys the change, keeping reason, values and indices.
    pub fn map_key<K2>(self, key: K2) -> Change<K2, V> {
        Change {
            reason: self.reason,
            key,
            current: self.current,
            previous: self.previous,
            current_index: self.current_index,
            previous_index: self.previous_index,
        }
    }

    /// Transforms the current and previous values.
    pub fn map_value<V2, F>(self, mut f: F) -> Change<K, V2>
    where
        F: FnMut(V) -> V2,
    {
        Change {
            reason: self.reason,
            key: self.key,
            current: f(self.current),
            previous: self.previous.map(&mut f),
            current_index: self.current_index,
            previous_index: self.previous_index,
        }
    }
}
