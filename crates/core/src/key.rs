//! Key bounds and composite join keys.

use core::fmt::{self, Debug, Display};
use core::hash::Hash;

/// Bound satisfied by every type usable as a cache key.
///
/// Equality and hashing are structural, so composite keys work without any
/// scanning fallback.
pub trait Key: Clone + Eq + Hash + Debug + 'static {}

impl<T> Key for T where T: Clone + Eq + Hash + Debug + 'static {}

/// Composite key identifying one (left, right) pair of an inner join.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinKey<L, R> {
    pub left: L,
    pub right: R,
}

impl<L, R> JoinKey<L, R> {
    /// Creates a join key from both sides.
    #[inline]
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L: Display, R: Display> Display for JoinKey<L, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.left, self.right)
    }
}
