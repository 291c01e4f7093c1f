//! Games: created per scenario, then started and stopped.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GameIdentifier;
use crate::backend::{BackendFuture, BackendPort};
use crate::cache::{FetchOutcome, KeySpace, KeyValueCache, Subscription};
use crate::config::CacheConfig;
use crate::error::CacheError;

/// Whether a game is waiting, in progress, or over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    WaitingToStart,
    Running,
    Stopped,
}

/// Snapshot of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub identifier: GameIdentifier,
    pub run_state: RunState,
}

/// Transport for games. [`BackendPort::create`] takes the scenario to play.
pub trait GameBackend:
    BackendPort<Key = GameIdentifier, Value = Game, CreateArgs = Uuid>
{
    fn start_game(&self, game: GameIdentifier) -> BackendFuture<'_, Game>;

    fn stop_game(&self, game: GameIdentifier) -> BackendFuture<'_, Game>;
}

/// Key hooks for [`Game`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GameKeys;

impl KeySpace for GameKeys {
    type Key = GameIdentifier;
    type Value = Game;

    fn canonical(&self, key: &GameIdentifier) -> String {
        key.to_string()
    }

    fn extract_key(&self, value: &Game) -> Option<GameIdentifier> {
        Some(value.identifier.clone())
    }
}

/// Cached access to games.
pub struct GameService<B: GameBackend> {
    cache: KeyValueCache<B, GameKeys>,
}

impl<B: GameBackend> GameService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CacheConfig::named("games"))
    }

    pub fn with_config(backend: B, config: CacheConfig) -> Self {
        Self {
            cache: KeyValueCache::new(backend, GameKeys, config),
        }
    }

    pub fn cache(&self) -> &KeyValueCache<B, GameKeys> {
        &self.cache
    }

    pub fn get(&self, game: &GameIdentifier) -> Subscription<Game> {
        self.cache.get(game)
    }

    pub fn update(&self, game: &GameIdentifier) {
        self.cache.update(game);
    }

    pub async fn refresh(&self, game: &GameIdentifier) -> FetchOutcome<Game> {
        self.cache.refresh(game).await
    }

    /// Creates a new game of `scenario`. The created game's identifier carries the same
    /// scenario and a server-assigned creation instant.
    pub async fn create_game(&self, scenario: Uuid) -> Result<Game, CacheError> {
        self.cache.add(scenario).await
    }

    pub async fn start_game(&self, game: &GameIdentifier) -> Result<Game, CacheError> {
        let backend = self.cache.backend();
        self.cache
            .apply("start_game", backend.start_game(game.clone()))
            .await
    }

    pub async fn stop_game(&self, game: &GameIdentifier) -> Result<Game, CacheError> {
        let backend = self.cache.backend();
        self.cache
            .apply("stop_game", backend.stop_game(game.clone()))
            .await
    }
}
