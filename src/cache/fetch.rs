//! Handles for awaiting one coalesced fetch.

use tokio::sync::watch;

use crate::error::CacheError;

/// Result of one backend fetch: the value, `None` for not-found, or the failure.
pub type FetchOutcome<V> = Result<Option<V>, CacheError>;

/// The resolving side of a fetch, owned by the cache entry while the fetch is pending.
pub(crate) struct Pending<V> {
    tx: watch::Sender<Option<FetchOutcome<V>>>,
}

impl<V: Clone> Pending<V> {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// A new handle that resolves together with this fetch.
    pub(crate) fn join(&self) -> Fetch<V> {
        Fetch {
            rx: self.tx.subscribe(),
        }
    }

    /// Delivers `outcome` to every joined handle.
    pub(crate) fn resolve(self, outcome: FetchOutcome<V>) {
        self.tx.send_replace(Some(outcome));
    }
}

/// A handle on one in-flight (or queued) fetch.
///
/// Any number of handles may join the same fetch; each receives a clone of its outcome.
/// Dropping a handle does not cancel the fetch.
pub struct Fetch<V> {
    rx: watch::Receiver<Option<FetchOutcome<V>>>,
}

impl<V: Clone> Fetch<V> {
    /// Waits for the fetch to resolve.
    ///
    /// # Errors
    ///
    /// Returns the backend failure for this fetch, or [`CacheError::Closed`] if the fetch
    /// was abandoned without resolving.
    pub async fn outcome(mut self) -> FetchOutcome<V> {
        let resolved = match self.rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        resolved.unwrap_or(Err(CacheError::Closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    #[tokio::test]
    async fn every_joined_handle_sees_the_outcome() {
        let pending = Pending::new();
        let first = pending.join();
        let second = pending.join();
        pending.resolve(Ok(Some(7)));
        assert_eq!(first.outcome().await.unwrap(), Some(7));
        assert_eq!(second.outcome().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn failures_are_shared() {
        let pending: Pending<u32> = Pending::new();
        let handle = pending.join();
        pending.resolve(Err(BackendError::Unsupported { operation: "fetch" }.into()));
        assert!(handle.outcome().await.unwrap_err().is_backend());
    }

    #[tokio::test]
    async fn abandoned_fetch_reports_closed() {
        let pending: Pending<u32> = Pending::new();
        let handle = pending.join();
        drop(pending);
        assert!(matches!(handle.outcome().await, Err(CacheError::Closed)));
    }

    #[tokio::test]
    async fn resolution_before_await_is_not_lost() {
        let pending = Pending::new();
        let handle = pending.join();
        pending.resolve(Ok(None::<u32>));
        tokio::task::yield_now().await;
        assert_eq!(handle.outcome().await.unwrap(), None);
    }
}
