//! Scenarios: read-only descriptions of the situations games are played in.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NamedUuid;
use crate::backend::{BackendFuture, BackendPort};
use crate::cache::{FetchOutcome, KeySpace, KeyValueCache, Subscription};
use crate::config::CacheConfig;
use crate::error::CacheError;

/// Snapshot of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub identifier: NamedUuid,
    pub description: String,
    /// Playable characters, in order of decreasing seniority.
    pub characters: Vec<NamedUuid>,
}

/// Transport for scenarios. Scenarios are defined server-side; clients cannot create them.
pub trait ScenarioBackend: BackendPort<Key = Uuid, Value = Scenario, CreateArgs = Infallible> {
    /// Names and IDs of every scenario, for pickers that do not need full descriptions.
    fn scenario_identifiers(&self) -> BackendFuture<'_, Vec<NamedUuid>>;
}

/// Key hooks for [`Scenario`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioKeys;

impl KeySpace for ScenarioKeys {
    type Key = Uuid;
    type Value = Scenario;

    fn canonical(&self, key: &Uuid) -> String {
        key.to_string()
    }

    fn extract_key(&self, value: &Scenario) -> Option<Uuid> {
        Some(value.identifier.id)
    }
}

/// Cached access to scenarios.
pub struct ScenarioService<B: ScenarioBackend> {
    cache: KeyValueCache<B, ScenarioKeys>,
}

impl<B: ScenarioBackend> ScenarioService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CacheConfig::named("scenarios"))
    }

    pub fn with_config(backend: B, config: CacheConfig) -> Self {
        Self {
            cache: KeyValueCache::new(backend, ScenarioKeys, config),
        }
    }

    pub fn cache(&self) -> &KeyValueCache<B, ScenarioKeys> {
        &self.cache
    }

    pub fn get(&self, id: &Uuid) -> Subscription<Scenario> {
        self.cache.get(id)
    }

    pub fn update(&self, id: &Uuid) {
        self.cache.update(id);
    }

    pub async fn refresh(&self, id: &Uuid) -> FetchOutcome<Scenario> {
        self.cache.refresh(id).await
    }

    /// Lists the identifiers of every scenario. The list itself is not cached.
    pub async fn scenario_identifiers(&self) -> Result<Vec<NamedUuid>, CacheError> {
        Ok(self.cache.backend().scenario_identifiers().await?)
    }
}
