//! Errors surfaced by the caching engine to the caller that awaited an operation.
//!
//! Observers of a [`Subscription`](crate::cache::Subscription) never see these: a failed
//! fetch leaves the published value untouched, and only the caller path that awaited the
//! request (a [`refresh`](crate::cache::KeyValueCache::refresh), an
//! [`add`](crate::cache::KeyValueCache::add), a mutation) receives the failure.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors produced by [`KeyValueCache`](crate::cache::KeyValueCache) operations.
///
/// `Clone` because a single coalesced fetch delivers its outcome to every caller that
/// joined it.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A value came back from the backend with no derivable key.
    #[error("{operation} returned a value with no derivable key")]
    MissingKey { operation: &'static str },

    /// The fetch was abandoned before it resolved (the cache was dropped mid-flight).
    #[error("fetch abandoned before it resolved")]
    Closed,
}

impl CacheError {
    /// Returns `true` if the failure came from the transport or server rather than
    /// from the cache itself.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
