//! Observer streams over one cache entry.

use std::future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;

/// A live view of one cache entry.
///
/// Returned by [`KeyValueCache::get`](super::KeyValueCache::get). The first call to
/// [`next`](Self::next) yields the entry's current value immediately if one has been
/// published (late-subscriber replay); later calls wait for publications.
///
/// A subscription never yields two consecutive structurally-equal values, even if the
/// entry changed and changed back between polls.
///
/// `Subscription` is also a [`Stream`], so `tokio_stream::StreamExt` combinators apply.
///
/// # Examples
///
/// ```rust,no_run
/// # async fn demo(mut players: mc_cache::cache::Subscription<String>) {
/// while let Some(value) = players.next().await {
///     println!("now: {value}");
/// }
/// # }
/// ```
pub struct Subscription<V> {
    rx: watch::Receiver<Option<V>>,
    changes: WatchStream<Option<V>>,
    // Last value handed to this observer.
    last: Option<V>,
}

// No field is structurally pinned.
impl<V> Unpin for Subscription<V> {}

impl<V> Subscription<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(rx: watch::Receiver<Option<V>>) -> Self {
        let changes = WatchStream::new(rx.clone());
        Self {
            rx,
            changes,
            last: None,
        }
    }

    /// Waits for the next value this observer has not yet seen.
    ///
    /// Returns `None` once the owning cache has been dropped.
    pub async fn next(&mut self) -> Option<V> {
        future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Returns the current value if this observer has not yet seen it, without waiting.
    pub fn try_next(&mut self) -> Option<V> {
        let current = self.rx.borrow().clone()?;
        self.deliver(current)
    }

    /// The entry's latest stored value, whether or not this observer has seen it.
    pub fn current(&self) -> Option<V> {
        self.rx.borrow().clone()
    }

    fn deliver(&mut self, value: V) -> Option<V> {
        if self.last.as_ref() == Some(&value) {
            return None;
        }
        self.last = Some(value.clone());
        Some(value)
    }
}

impl<V> Stream for Subscription<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    type Item = V;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<V>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.changes).poll_next(cx) {
                Poll::Ready(Some(Some(value))) => {
                    if let Some(value) = this.deliver(value) {
                        return Poll::Ready(Some(value));
                    }
                }
                Poll::Ready(Some(None)) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
