//! Per-key cache entry: the published value and at most one outstanding fetch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::fetch::{Fetch, FetchOutcome, Pending};
use super::subscription::Subscription;
use crate::config::RefreshPolicy;

/// Observable lifecycle of one cache entry.
///
/// ```text
/// Empty ──get/update──▶ Fetching ──resolve──▶ Populated ──update──▶ Refreshing
///   ▲                      │                      ▲                     │
///   └──── fail/not-found ──┘                      └───── resolve/fail ──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No value and no fetch in flight.
    Empty,
    /// First fetch in flight.
    Fetching,
    /// Value present, nothing in flight.
    Populated,
    /// Value present and a new fetch in flight.
    Refreshing,
}

/// How a refresh was admitted.
pub(crate) enum Admission<V> {
    /// A new fetch was installed; the caller must start it.
    Started(Fetch<V>),
    /// The refresh shares an in-flight or queued fetch.
    Joined(Fetch<V>),
}

struct FetchSlots<V> {
    in_flight: Option<Pending<V>>,
    queued: Option<Pending<V>>,
    // Bumped by every seeded value.
    generation: u64,
    // `generation` when the in-flight fetch started.
    started_at: u64,
}

/// One cache slot, addressed by canonical key string.
pub(crate) struct Entry<V> {
    cache: Arc<str>,
    key: String,
    published: watch::Sender<Option<V>>,
    fetches: Mutex<FetchSlots<V>>,
}

impl<V> Entry<V>
where
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(cache: Arc<str>, key: String) -> Self {
        let (published, _rx) = watch::channel(None);
        Self {
            cache,
            key,
            published,
            fetches: Mutex::new(FetchSlots {
                in_flight: None,
                queued: None,
                generation: 0,
                started_at: 0,
            }),
        }
    }

    pub(crate) fn subscribe(&self) -> Subscription<V> {
        Subscription::new(self.published.subscribe())
    }

    pub(crate) fn current(&self) -> Option<V> {
        self.published.borrow().clone()
    }

    pub(crate) fn state(&self) -> EntryState {
        let fetching = self.lock().in_flight.is_some();
        let populated = self.published.borrow().is_some();
        match (populated, fetching) {
            (false, false) => EntryState::Empty,
            (false, true) => EntryState::Fetching,
            (true, false) => EntryState::Populated,
            (true, true) => EntryState::Refreshing,
        }
    }

    /// Installs a fetch if the entry has neither a value nor a fetch in flight.
    ///
    /// Returns the handle of the new fetch, which the caller must start. The check and
    /// the install happen under one lock, so two callers can never both start a fetch.
    pub(crate) fn load(&self) -> Option<Fetch<V>> {
        let mut slots = self.lock();
        if slots.in_flight.is_some() {
            trace!(cache = %self.cache, key = %self.key, "joining in-flight fetch");
            return None;
        }
        if self.published.borrow().is_some() {
            return None;
        }
        Some(self.install(&mut slots))
    }

    /// Requests a fetch that starts no earlier than this call, subject to `policy`.
    pub(crate) fn refresh(&self, policy: RefreshPolicy) -> Admission<V> {
        let mut guard = self.lock();
        let slots = &mut *guard;

        let Some(in_flight) = slots.in_flight.as_ref() else {
            return Admission::Started(self.install(slots));
        };

        match policy {
            RefreshPolicy::Attach => {
                trace!(cache = %self.cache, key = %self.key, "joining in-flight fetch");
                Admission::Joined(in_flight.join())
            }
            RefreshPolicy::Queue => {
                trace!(cache = %self.cache, key = %self.key, "queueing follow-up fetch");
                Admission::Joined(slots.queued.get_or_insert_with(Pending::new).join())
            }
        }
    }

    /// Records the outcome of the in-flight fetch.
    ///
    /// Publishes a successful value unless a value was seeded after the fetch started,
    /// resolves every handle joined to the fetch and promotes a queued follow-up.
    /// Returns `true` if the caller must run that follow-up.
    pub(crate) fn complete(&self, outcome: FetchOutcome<V>) -> bool {
        let mut guard = self.lock();
        let slots = &mut *guard;

        match &outcome {
            Ok(Some(_)) if slots.started_at != slots.generation => {
                debug!(cache = %self.cache, key = %self.key, "fetch outdated by a newer value; not published");
            }
            Ok(Some(value)) => {
                self.publish(value.clone());
            }
            Ok(None) => {
                debug!(cache = %self.cache, key = %self.key, "not found");
            }
            Err(e) => {
                warn!(cache = %self.cache, key = %self.key, error = %e, "fetch failed; keeping previous state");
            }
        }

        if let Some(pending) = slots.in_flight.take() {
            pending.resolve(outcome);
        }

        match slots.queued.take() {
            Some(next) => {
                slots.in_flight = Some(next);
                slots.started_at = slots.generation;
                debug!(cache = %self.cache, key = %self.key, "starting queued fetch");
                true
            }
            None => false,
        }
    }

    /// Publishes a value obtained outside the fetch slot, such as a mutation result.
    ///
    /// A fetch already in flight when this is called will not publish over it.
    pub(crate) fn seed(&self, value: V) -> bool {
        let mut slots = self.lock();
        slots.generation += 1;
        self.publish(value)
    }

    /// Stores `value` and wakes observers only if it differs from the stored one.
    ///
    /// An equal value still replaces the stored instance so later replays hand out the
    /// latest snapshot. Returns `true` if observers were notified.
    fn publish(&self, value: V) -> bool {
        let changed = self.published.send_if_modified(|current| {
            let changed = current.as_ref() != Some(&value);
            *current = Some(value);
            changed
        });
        if changed {
            debug!(cache = %self.cache, key = %self.key, "published new value");
        } else {
            trace!(cache = %self.cache, key = %self.key, "value unchanged; suppressed");
        }
        changed
    }

    fn install(&self, slots: &mut FetchSlots<V>) -> Fetch<V> {
        let pending = Pending::new();
        let fetch = pending.join();
        slots.in_flight = Some(pending);
        slots.started_at = slots.generation;
        debug!(cache = %self.cache, key = %self.key, "starting fetch");
        fetch
    }

    fn lock(&self) -> MutexGuard<'_, FetchSlots<V>> {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;

    fn entry() -> Entry<u32> {
        Entry::new(Arc::from("test"), "k".to_owned())
    }

    fn started(admission: Admission<u32>) -> Fetch<u32> {
        match admission {
            Admission::Started(fetch) => fetch,
            Admission::Joined(_) => panic!("expected a new fetch"),
        }
    }

    fn joined(admission: Admission<u32>) -> Fetch<u32> {
        match admission {
            Admission::Joined(fetch) => fetch,
            Admission::Started(_) => panic!("expected to join a fetch"),
        }
    }

    #[test]
    fn new_entry_is_empty() {
        assert_eq!(entry().state(), EntryState::Empty);
    }

    #[test]
    fn load_on_empty_starts_fetch() {
        let e = entry();
        assert!(e.load().is_some());
        assert_eq!(e.state(), EntryState::Fetching);
    }

    #[test]
    fn second_load_joins_in_flight_fetch() {
        let e = entry();
        assert!(e.load().is_some());
        assert!(e.load().is_none());
        assert_eq!(e.state(), EntryState::Fetching);
    }

    #[test]
    fn load_on_populated_is_served_from_cache() {
        let e = entry();
        e.publish(1);
        assert!(e.load().is_none());
        assert_eq!(e.state(), EntryState::Populated);
    }

    #[test]
    fn refresh_on_populated_starts_fetch() {
        let e = entry();
        e.publish(1);
        started(e.refresh(RefreshPolicy::Queue));
        assert_eq!(e.state(), EntryState::Refreshing);
    }

    #[tokio::test]
    async fn refresh_during_fetch_queues_one_follow_up() {
        let e = entry();
        let first = e.load().unwrap();
        let a = joined(e.refresh(RefreshPolicy::Queue));
        let b = joined(e.refresh(RefreshPolicy::Queue));

        assert!(e.complete(Ok(Some(1))));
        assert_eq!(first.outcome().await.unwrap(), Some(1));
        assert_eq!(e.state(), EntryState::Refreshing);

        assert!(!e.complete(Ok(Some(2))));
        assert_eq!(a.outcome().await.unwrap(), Some(2));
        assert_eq!(b.outcome().await.unwrap(), Some(2));
        assert_eq!(e.state(), EntryState::Populated);
    }

    #[tokio::test]
    async fn attach_policy_joins_in_flight_fetch() {
        let e = entry();
        let first = e.load().unwrap();
        let refresh = joined(e.refresh(RefreshPolicy::Attach));
        assert!(!e.complete(Ok(Some(3))));
        assert_eq!(first.outcome().await.unwrap(), Some(3));
        assert_eq!(refresh.outcome().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn failed_fetch_returns_to_previous_state() {
        let e = entry();
        e.publish(1);
        let fetch = started(e.refresh(RefreshPolicy::Queue));
        let failure = BackendError::Unsupported { operation: "fetch" };
        assert!(!e.complete(Err(failure.into())));
        assert!(fetch.outcome().await.is_err());
        assert_eq!(e.current(), Some(1));
        assert_eq!(e.state(), EntryState::Populated);
    }

    #[test]
    fn not_found_leaves_entry_empty() {
        let e = entry();
        assert!(e.load().is_some());
        assert!(!e.complete(Ok(None)));
        assert_eq!(e.state(), EntryState::Empty);
        assert!(e.load().is_some());
    }

    #[tokio::test]
    async fn fetch_started_before_seed_does_not_overwrite_it() {
        let e = entry();
        let fetch = e.load().unwrap();
        assert!(e.seed(9));

        assert!(!e.complete(Ok(Some(1))));
        assert_eq!(fetch.outcome().await.unwrap(), Some(1));
        assert_eq!(e.current(), Some(9));
        assert_eq!(e.state(), EntryState::Populated);
    }

    #[test]
    fn fetch_started_after_seed_publishes() {
        let e = entry();
        e.seed(9);
        started(e.refresh(RefreshPolicy::Queue));
        e.complete(Ok(Some(10)));
        assert_eq!(e.current(), Some(10));
    }

    #[test]
    fn queued_follow_up_starts_after_seed_and_publishes() {
        let e = entry();
        assert!(e.load().is_some());
        joined(e.refresh(RefreshPolicy::Queue));
        e.seed(9);

        assert!(e.complete(Ok(Some(1))));
        assert_eq!(e.current(), Some(9));
        assert!(!e.complete(Ok(Some(2))));
        assert_eq!(e.current(), Some(2));
    }

    #[test]
    fn publish_suppresses_equal_values() {
        let e = entry();
        let mut sub = e.subscribe();
        assert!(e.publish(1));
        assert_eq!(sub.try_next(), Some(1));
        assert!(!e.publish(1));
        assert_eq!(sub.try_next(), None);
        assert!(e.publish(2));
        assert_eq!(sub.try_next(), Some(2));
    }
}
