//! Per-cache configuration.
//!
//! A [`CacheConfig`] is usually built in code with [`CacheConfig::named`], but it also
//! deserializes from JSON so an application can keep per-entity settings alongside the
//! rest of its configuration:
//!
//! ```
//! use mc_cache::config::{CacheConfig, RefreshPolicy};
//!
//! let config = CacheConfig::from_json(r#"{ "name": "games", "refresh_policy": "attach" }"#).unwrap();
//! assert_eq!(config.name, "games");
//! assert_eq!(config.refresh_policy, RefreshPolicy::Attach);
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Errors produced while loading a [`CacheConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse cache config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid cache config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// What [`update`](crate::cache::KeyValueCache::update) does when a fetch for the same
/// key is already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Queue one follow-up fetch, shared by every update made while the current fetch is
    /// pending. The follow-up starts when the current fetch resolves, so only one fetch
    /// is ever outstanding and every update observes a fetch started after it.
    #[default]
    Queue,
    /// Join the in-flight fetch; no extra backend call.
    Attach,
}

/// Configuration for one [`KeyValueCache`](crate::cache::KeyValueCache) instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Label attached to every log record emitted by this cache.
    pub name: String,
    /// Behavior of `update` while a fetch is in flight.
    pub refresh_policy: RefreshPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "cache".to_owned(),
            refresh_policy: RefreshPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Default configuration with the given log label.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the [`RefreshPolicy`].
    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields, and
    /// [`ConfigError::InvalidValue`] if `name` is blank.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if config.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "name",
                reason: "must not be blank".to_owned(),
            });
        }
        Ok(config)
    }
}
