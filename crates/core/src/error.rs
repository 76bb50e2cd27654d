//! Error types for cascade caches and operators.

use crate::change::ChangeReason;
use alloc::format;
use alloc::string::String;
use core::fmt::Debug;

/// Result type alias for cascade operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by caches and operators.
///
/// Keys are carried in their `Debug` form so the error stays independent of
/// the key type of the cache that raised it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A page request with a negative page number or size.
    #[error("invalid page request: page {page}, size {size} (both must be positive)")]
    InvalidPageRequest { page: i64, size: i64 },

    /// A moved change references a key the current collection does not contain.
    #[error("cannot determine current index for key {key}")]
    IndexNotFound { key: String },

    /// An update or remove references a key with no recorded prior state.
    #[error("{key} is missing from previous group on {reason}")]
    MissingKey { key: String, reason: ChangeReason },

    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// The cache has errored or been disposed and accepts no further edits.
    #[error("cache has been terminated")]
    Terminated,
}

impl Error {
    /// Creates an invalid page request error.
    pub fn invalid_page_request(page: i64, size: i64) -> Self {
        Error::InvalidPageRequest { page, size }
    }

    /// Creates an index not found error.
    pub fn index_not_found<K: Debug>(key: &K) -> Self {
        Error::IndexNotFound {
            key: format!("{:?}", key),
        }
    }

    /// Creates a missing key error.
    pub fn missing_key<K: Debug>(key: &K, reason: ChangeReason) -> Self {
        Error::MissingKey {
            key: format!("{:?}", key),
            reason,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
