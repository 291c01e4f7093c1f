//! Reactive per-key cache: request coalescing, late-subscriber replay and
//! change-suppressed publication over any [`BackendPort`].
//!
//! ## Core types
//!
//! - [`KeyValueCache`]: the engine; one instance per entity type.
//! - [`KeySpace`]: canonical-key and key-extraction hooks for one entity type.
//! - [`Subscription`]: a live view of one key.
//! - [`Fetch`]: a handle on one coalesced fetch.
//! - [`EntryState`]: observable lifecycle of one key.
//!
//! ## Guarantees
//!
//! - At most one backend fetch is outstanding per canonical key. Every caller waiting on
//!   that key shares its outcome.
//! - A subscriber receives the current value immediately, then every later value that
//!   differs structurally from the last one it received.
//! - A failed fetch never overwrites a published value, and a fetch started before a
//!   mutation or `add` never overwrites the value that mutation seeded.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::backend::{BackendError, BackendPort};
use crate::config::CacheConfig;
use crate::error::CacheError;

mod entry;
mod fetch;
mod key;
mod subscription;

use entry::{Admission, Entry};

pub use entry::EntryState;
pub use fetch::{Fetch, FetchOutcome};
pub use key::KeySpace;
pub use subscription::Subscription;

/// A reactive cache of one entity type, keyed by canonical key string.
///
/// Cloning is cheap; clones share the same entries and backend.
///
/// Fetches run on spawned Tokio tasks, so [`get`](Self::get), [`update`](Self::update)
/// and [`refresh`](Self::refresh) must be called from within a Tokio runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use mc_cache::cache::{KeySpace, KeyValueCache};
/// use mc_cache::config::CacheConfig;
/// # use mc_cache::backend::{BackendFuture, BackendPort};
/// # struct Names;
/// # impl BackendPort for Names {
/// #     type Key = u32; type Value = String; type CreateArgs = String;
/// #     fn fetch(&self, key: u32) -> BackendFuture<'_, Option<String>> { Box::pin(async move { Ok(Some(key.to_string())) }) }
/// #     fn create(&self, name: String) -> BackendFuture<'_, String> { Box::pin(async move { Ok(name) }) }
/// # }
///
/// struct NameKeys;
///
/// impl KeySpace for NameKeys {
///     type Key = u32;
///     type Value = String;
///     fn canonical(&self, key: &u32) -> String { key.to_string() }
///     fn extract_key(&self, value: &String) -> Option<u32> { value.parse().ok() }
/// }
///
/// # async fn demo() {
/// let cache = KeyValueCache::new(Names, NameKeys, CacheConfig::named("names"));
/// let mut view = cache.get(&42);
/// assert_eq!(view.next().await.as_deref(), Some("42"));
/// # }
/// ```
pub struct KeyValueCache<B, S>
where
    B: BackendPort,
{
    inner: Arc<Inner<B, S>>,
}

struct Inner<B, S>
where
    B: BackendPort,
{
    backend: Arc<B>,
    keys: S,
    config: CacheConfig,
    name: Arc<str>,
    entries: Mutex<HashMap<String, Arc<Entry<B::Value>>>>,
}

impl<B, S> Clone for KeyValueCache<B, S>
where
    B: BackendPort,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, S> KeyValueCache<B, S>
where
    B: BackendPort,
    S: KeySpace<Key = B::Key, Value = B::Value>,
{
    /// Creates an empty cache over `backend`, addressing slots through `keys`.
    pub fn new(backend: B, keys: S, config: CacheConfig) -> Self {
        let name = Arc::from(config.name.as_str());
        Self {
            inner: Arc::new(Inner {
                backend: Arc::new(backend),
                keys,
                config,
                name,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The backend this cache fetches from.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns a live view of `key`.
    ///
    /// Starts a backend fetch only if the key has neither a cached value nor a fetch in
    /// flight; otherwise the view is served from the existing value or fetch.
    pub fn get(&self, key: &B::Key) -> Subscription<B::Value> {
        let entry = self.entry(key);
        let subscription = entry.subscribe();
        if entry.load().is_some() {
            self.spawn_fetch(key.clone(), entry);
        }
        subscription
    }

    /// Requests a fresh fetch of `key` and returns immediately.
    ///
    /// Observers are notified only if the fetched value differs from the published one.
    /// See [`RefreshPolicy`](crate::config::RefreshPolicy) for what happens when a fetch
    /// is already in flight.
    pub fn update(&self, key: &B::Key) {
        drop(self.request_refresh(key));
    }

    /// Like [`update`](Self::update), but waits for the fetch and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns the backend failure of the fetch this call joined. The published value is
    /// left untouched on failure.
    pub async fn refresh(&self, key: &B::Key) -> FetchOutcome<B::Value> {
        self.request_refresh(key).outcome().await
    }

    /// Creates an entity through the backend and seeds its slot with the result.
    ///
    /// # Errors
    ///
    /// Returns the backend failure, or [`CacheError::MissingKey`] if the created value
    /// has no derivable key.
    pub async fn add(&self, args: B::CreateArgs) -> Result<B::Value, CacheError> {
        let value = self.inner.backend.create(args).await?;
        self.seed("create", value)
    }

    /// Awaits a backend mutation and publishes the snapshot it returns.
    ///
    /// `operation` names the mutation in errors and logs.
    ///
    /// # Errors
    ///
    /// Returns the backend failure, or [`CacheError::MissingKey`] if the returned value
    /// has no derivable key. Nothing is published on failure.
    pub async fn apply<F>(&self, operation: &'static str, mutation: F) -> Result<B::Value, CacheError>
    where
        F: Future<Output = Result<B::Value, BackendError>>,
    {
        let value = mutation.await?;
        self.seed(operation, value)
    }

    /// Fetches every entity and seeds each into its own slot.
    ///
    /// Returns `Ok(None)` if the backend cannot list entities.
    ///
    /// # Errors
    ///
    /// Returns the backend failure, or [`CacheError::MissingKey`] at the first value with
    /// no derivable key; values before it have already been seeded.
    pub async fn get_all(&self) -> Result<Option<Vec<B::Value>>, CacheError> {
        let Some(values) = self.inner.backend.fetch_all().await? else {
            return Ok(None);
        };
        for value in &values {
            self.seed("fetch_all", value.clone())?;
        }
        Ok(Some(values))
    }

    /// The cached value of `key`, without fetching.
    pub fn peek(&self, key: &B::Key) -> Option<B::Value> {
        self.existing(key).and_then(|entry| entry.current())
    }

    /// The lifecycle state of `key`. Never creates an entry.
    pub fn state(&self, key: &B::Key) -> EntryState {
        self.existing(key)
            .map_or(EntryState::Empty, |entry| entry.state())
    }

    /// Number of keys this cache has seen.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if no key has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn request_refresh(&self, key: &B::Key) -> Fetch<B::Value> {
        let entry = self.entry(key);
        match entry.refresh(self.inner.config.refresh_policy) {
            Admission::Started(fetch) => {
                self.spawn_fetch(key.clone(), entry);
                fetch
            }
            Admission::Joined(fetch) => fetch,
        }
    }

    fn seed(&self, operation: &'static str, value: B::Value) -> Result<B::Value, CacheError> {
        let key = self
            .inner
            .keys
            .extract_key(&value)
            .ok_or(CacheError::MissingKey { operation })?;
        self.entry(&key).seed(value.clone());
        Ok(value)
    }

    // Runs the entry's in-flight fetch, then any follow-up queued while it was pending.
    fn spawn_fetch(&self, key: B::Key, entry: Arc<Entry<B::Value>>) {
        let backend = Arc::clone(&self.inner.backend);
        tokio::spawn(async move {
            loop {
                let outcome = backend.fetch(key.clone()).await.map_err(CacheError::from);
                if !entry.complete(outcome) {
                    break;
                }
            }
        });
    }

    fn entry(&self, key: &B::Key) -> Arc<Entry<B::Value>> {
        let canonical = self.inner.keys.canonical(key);
        let mut entries = self.entries();
        if let Some(entry) = entries.get(&canonical) {
            return Arc::clone(entry);
        }
        debug!(cache = %self.inner.name, key = %canonical, "creating entry");
        let entry = Arc::new(Entry::new(Arc::clone(&self.inner.name), canonical.clone()));
        entries.insert(canonical, Arc::clone(&entry));
        entry
    }

    fn existing(&self, key: &B::Key) -> Option<Arc<Entry<B::Value>>> {
        let canonical = self.inner.keys.canonical(key);
        self.entries().get(&canonical).cloned()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<Entry<B::Value>>>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
