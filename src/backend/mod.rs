//! Backend port is the capability a concrete transport implements for one entity type.
//!
//! The cache never talks to the network itself. Each entity type supplies a
//! [`BackendPort`] implementation (HTTP-backed in production, an in-memory fake in
//! tests) and the engine only ever sees fresh snapshots coming back from it.
//!
//! ## Core types
//!
//! - [`BackendPort`]: fetch-by-key, create, and optional whole-collection fetch.
//! - [`BackendFuture`] is the boxed, `Send` future every port operation returns.
//! - [`BackendError`]: transport failures, server rejections, unsupported operations.
//!
//! Domain-specific mutation endpoints (join a game, end recruitment, ...) are declared
//! on sub-traits in [`crate::domain`]; they return a [`BackendFuture`] resolving to the
//! post-mutation snapshot.

use std::{error::Error as StdError, future::Future, pin::Pin, sync::Arc};

use thiserror::Error;

/// A boxed future returned by every backend operation.
///
/// The future may borrow the backend (`'a`) but must be `Send` so fetches can run on
/// spawned Tokio tasks.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Failures reported by a [`BackendPort`].
///
/// "Does not exist" is **not** an error: [`BackendPort::fetch`] reports it as `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The request never produced a usable reply (connection refused, timeout, bad body).
    #[error("transport failure: {0}")]
    Transport(Arc<dyn StdError + Send + Sync>),

    /// The server understood the request and refused it.
    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    /// The backend does not provide this operation.
    #[error("{operation} is not supported by this backend")]
    Unsupported { operation: &'static str },
}

impl BackendError {
    /// Wraps any error as a [`BackendError::Transport`].
    pub fn transport<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transport(Arc::new(error))
    }
}

/// The capability interface a transport implements for one entity type.
///
/// Implementations are stateless from the cache's point of view: every call is an
/// independent request returning a newly constructed snapshot.
///
/// # Contract
///
/// - `Value` equality must be structural. The cache compares a freshly fetched value
///   against the last published one to decide whether observers are notified.
/// - Returned futures must not hold locks shared with the cache.
///
/// # Examples
///
/// ```rust,no_run
/// use std::convert::Infallible;
/// use mc_cache::backend::{BackendFuture, BackendPort};
///
/// struct Echo;
///
/// impl BackendPort for Echo {
///     type Key = String;
///     type Value = String;
///     type CreateArgs = Infallible;
///
///     fn fetch(&self, key: String) -> BackendFuture<'_, Option<String>> {
///         Box::pin(async move { Ok(Some(key)) })
///     }
///
///     fn create(&self, args: Infallible) -> BackendFuture<'_, String> {
///         match args {}
///     }
/// }
/// ```
pub trait BackendPort: Send + Sync + 'static {
    /// Structured identifier of one entity.
    type Key: Clone + Send + Sync + 'static;
    /// Immutable snapshot of one entity.
    type Value: Clone + PartialEq + Send + Sync + 'static;
    /// Arguments accepted by [`create`](Self::create). Use
    /// [`Infallible`](std::convert::Infallible) for read-only entity types.
    type CreateArgs: Send;

    /// Returns the current server value for `key`, or `None` if it does not exist.
    fn fetch(&self, key: Self::Key) -> BackendFuture<'_, Option<Self::Value>>;

    /// Creates a new entity and returns its initial snapshot, including its
    /// server-assigned key.
    fn create(&self, args: Self::CreateArgs) -> BackendFuture<'_, Self::Value>;

    /// Returns every entity of this type, or `None` if the backend cannot list them.
    fn fetch_all(&self) -> BackendFuture<'_, Option<Vec<Self::Value>>> {
        Box::pin(async { Ok(None) })
    }
}
