//! Page requests and paged change sets.

use crate::change_set::ChangeSet;
use crate::collection::KeyValueCollection;
use crate::error::{Error, Result};

/// A request for one page of a sorted collection.
///
/// Pages are 1-based. A request with page 0 or size 0 has not been issued
/// yet and produces no output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    /// The request that has not been issued.
    pub const EMPTY: PageRequest = PageRequest { page: 0, size: 0 };

    /// Creates a page request, rejecting negative values and values that do
    /// not fit in a `usize`.
    pub fn new(page: i64, size: i64) -> Result<Self> {
        let invalid = || Error::invalid_page_request(page, size);
        Ok(Self {
            page: usize::try_from(page).map_err(|_| invalid())?,
            size: usize::try_from(size).map_err(|_| invalid())?,
        })
    }

    /// Returns true if the request will not produce a page.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page == 0 || self.size == 0
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 25 }
    }
}

/// Where the current page sits within the whole collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageResponse {
    pub page_size: usize,
    pub total_size: usize,
    pub page: usize,
    pub pages: usize,
}

impl PageResponse {
    pub fn new(page_size: usize, total_size: usize, page: usize, pages: usize) -> Self {
        Self {
            page_size,
            total_size,
            page,
            pages,
        }
    }
}

/// Changes to a visible page together with its contents.
#[derive(Clone, Debug)]
pub struct PagedChangeSet<K, V> {
    pub response: PageResponse,
    pub sorted_items: KeyValueCollection<K, V>,
    pub changes: ChangeSet<K, V>,
}

impl<K, V> PagedChangeSet<K, V> {
    pub fn new(
        sorted_items: KeyValueCollection<K, V>,
        changes: ChangeSet<K, V>,
        response: PageResponse,
    ) -> Self {
        Self {
            response,
            sorted_items,
            changes,
        }
    }
}
