//! Users: added by administrators, listed as a whole.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::BackendPort;
use crate::cache::{FetchOutcome, KeySpace, KeyValueCache, Subscription};
use crate::config::CacheConfig;
use crate::error::CacheError;

/// A permission granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Authority {
    #[serde(rename = "ROLE_PLAYER")]
    PlayerRole,
    #[serde(rename = "ROLE_MANAGE_USERS")]
    ManageUsers,
    #[serde(rename = "ROLE_MANAGE_GAMES")]
    ManageGames,
}

/// Snapshot of one user. The password never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub authorities: BTreeSet<Authority>,
}

impl User {
    pub fn has(&self, authority: Authority) -> bool {
        self.authorities.contains(&authority)
    }
}

/// Details for a user to be added.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub username: String,
    pub password: String,
    pub authorities: BTreeSet<Authority>,
}

impl fmt::Debug for UserDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDetails")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("authorities", &self.authorities)
            .finish()
    }
}

/// Transport for users: fetch by ID, add, and list all.
pub trait UserBackend: BackendPort<Key = Uuid, Value = User, CreateArgs = UserDetails> {}

impl<T> UserBackend for T where T: BackendPort<Key = Uuid, Value = User, CreateArgs = UserDetails> {}

/// Key hooks for [`User`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UserKeys;

impl KeySpace for UserKeys {
    type Key = Uuid;
    type Value = User;

    fn canonical(&self, key: &Uuid) -> String {
        key.to_string()
    }

    fn extract_key(&self, value: &User) -> Option<Uuid> {
        (!value.id.is_nil()).then_some(value.id)
    }
}

/// Cached access to users.
pub struct UserService<B: UserBackend> {
    cache: KeyValueCache<B, UserKeys>,
}

impl<B: UserBackend> UserService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CacheConfig::named("users"))
    }

    pub fn with_config(backend: B, config: CacheConfig) -> Self {
        Self {
            cache: KeyValueCache::new(backend, UserKeys, config),
        }
    }

    pub fn cache(&self) -> &KeyValueCache<B, UserKeys> {
        &self.cache
    }

    pub fn get(&self, id: &Uuid) -> Subscription<User> {
        self.cache.get(id)
    }

    pub fn update(&self, id: &Uuid) {
        self.cache.update(id);
    }

    pub async fn refresh(&self, id: &Uuid) -> FetchOutcome<User> {
        self.cache.refresh(id).await
    }

    /// Adds a user. A [`Rejected`](crate::backend::BackendError::Rejected) failure means
    /// the server refused the details (for example, a duplicate username).
    pub async fn add(&self, details: UserDetails) -> Result<User, CacheError> {
        self.cache.add(details).await
    }

    /// Lists every user, seeding each into the cache.
    pub async fn get_all(&self) -> Result<Vec<User>, CacheError> {
        Ok(self.cache.get_all().await?.unwrap_or_default())
    }
}
