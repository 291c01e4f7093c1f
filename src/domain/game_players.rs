//! Game rosters: which users play which characters, and whether the game still recruits.

use std::collections::BTreeMap;
use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GameIdentifier;
use crate::backend::{BackendFuture, BackendPort};
use crate::cache::{FetchOutcome, KeySpace, KeyValueCache, Subscription};
use crate::config::CacheConfig;
use crate::error::CacheError;

/// Snapshot of one game's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayers {
    pub game: GameIdentifier,
    pub recruiting: bool,
    /// Character ID to the ID of the user playing it.
    pub users: BTreeMap<Uuid, Uuid>,
}

impl GamePlayers {
    /// Whether `user` plays any character in this game.
    pub fn is_playing(&self, user: Uuid) -> bool {
        self.users.values().any(|&u| u == user)
    }
}

/// Transport for rosters. Rosters come into existence with their game, so there is no
/// create operation.
pub trait GamePlayersBackend:
    BackendPort<Key = GameIdentifier, Value = GamePlayers, CreateArgs = Infallible>
{
    /// Adds the current user to the game.
    fn join_game(&self, game: GameIdentifier) -> BackendFuture<'_, GamePlayers>;

    fn end_recruitment(&self, game: GameIdentifier) -> BackendFuture<'_, GamePlayers>;
}

/// Key hooks for [`GamePlayers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GamePlayersKeys;

impl KeySpace for GamePlayersKeys {
    type Key = GameIdentifier;
    type Value = GamePlayers;

    fn canonical(&self, key: &GameIdentifier) -> String {
        key.to_string()
    }

    fn extract_key(&self, value: &GamePlayers) -> Option<GameIdentifier> {
        Some(value.game.clone())
    }
}

/// Cached access to game rosters.
pub struct GamePlayersService<B: GamePlayersBackend> {
    cache: KeyValueCache<B, GamePlayersKeys>,
}

impl<B: GamePlayersBackend> GamePlayersService<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, CacheConfig::named("game-players"))
    }

    pub fn with_config(backend: B, config: CacheConfig) -> Self {
        Self {
            cache: KeyValueCache::new(backend, GamePlayersKeys, config),
        }
    }

    pub fn cache(&self) -> &KeyValueCache<B, GamePlayersKeys> {
        &self.cache
    }

    pub fn get(&self, game: &GameIdentifier) -> Subscription<GamePlayers> {
        self.cache.get(game)
    }

    pub fn update(&self, game: &GameIdentifier) {
        self.cache.update(game);
    }

    pub async fn refresh(&self, game: &GameIdentifier) -> FetchOutcome<GamePlayers> {
        self.cache.refresh(game).await
    }

    pub async fn join_game(&self, game: &GameIdentifier) -> Result<GamePlayers, CacheError> {
        let backend = self.cache.backend();
        self.cache
            .apply("join_game", backend.join_game(game.clone()))
            .await
    }

    pub async fn end_recruitment(&self, game: &GameIdentifier) -> Result<GamePlayers, CacheError> {
        let backend = self.cache.backend();
        self.cache
            .apply("end_recruitment", backend.end_recruitment(game.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::backend::BackendError;

    // Serves queued snapshots to `fetch`; mutations apply to the last one served.
    struct MockRoster {
        game: GameIdentifier,
        self_user: Uuid,
        snapshots: Mutex<VecDeque<GamePlayers>>,
        current: Mutex<Option<GamePlayers>>,
        fetches: AtomicUsize,
    }

    impl MockRoster {
        fn new(game: GameIdentifier, self_user: Uuid) -> Self {
            Self {
                game,
                self_user,
                snapshots: Mutex::new(VecDeque::new()),
                current: Mutex::new(None),
                fetches: AtomicUsize::new(0),
            }
        }

        fn serve(&self, players: GamePlayers) {
            self.snapshots.lock().unwrap().push_back(players);
        }

        fn mutate(
            &self,
            game: GameIdentifier,
            change: impl FnOnce(&mut GamePlayers),
        ) -> Result<GamePlayers, BackendError> {
            assert_eq!(game, self.game, "mock serves a single game");
            let mut current = self.current.lock().unwrap();
            let players = current.as_mut().ok_or(BackendError::Rejected {
                operation: "mutate",
                reason: "no roster yet".into(),
            })?;
            change(players);
            // Reply with a fresh copy, as a real server would.
            Ok(players.clone())
        }
    }

    impl BackendPort for MockRoster {
        type Key = GameIdentifier;
        type Value = GamePlayers;
        type CreateArgs = Infallible;

        fn fetch(&self, game: GameIdentifier) -> BackendFuture<'_, Option<GamePlayers>> {
            assert_eq!(game, self.game, "mock serves a single game");
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut current = self.current.lock().unwrap();
            if let Some(next) = self.snapshots.lock().unwrap().pop_front() {
                *current = Some(next);
            }
            let reply = current.clone();
            Box::pin(async move { Ok(reply) })
        }

        fn create(&self, args: Infallible) -> BackendFuture<'_, GamePlayers> {
            match args {}
        }
    }

    impl GamePlayersBackend for MockRoster {
        fn join_game(&self, game: GameIdentifier) -> BackendFuture<'_, GamePlayers> {
            let user = self.self_user;
            let result = self.mutate(game, |players| {
                if !players.is_playing(user) {
                    players.users.insert(Uuid::new_v4(), user);
                }
            });
            Box::pin(async move { result })
        }

        fn end_recruitment(&self, game: GameIdentifier) -> BackendFuture<'_, GamePlayers> {
            let result = self.mutate(game, |players| players.recruiting = false);
            Box::pin(async move { result })
        }
    }

    fn game() -> GameIdentifier {
        GameIdentifier::new(
            Uuid::new_v4(),
            Utc.with_ymd_and_hms(2020, 12, 31, 23, 59, 59).unwrap(),
        )
    }

    fn roster(game: &GameIdentifier, recruiting: bool, users: &[(Uuid, Uuid)]) -> GamePlayers {
        GamePlayers {
            game: game.clone(),
            recruiting,
            users: users.iter().copied().collect(),
        }
    }

    fn fetches(service: &GamePlayersService<MockRoster>) -> usize {
        service.cache().backend().fetches.load(Ordering::SeqCst)
    }

    #[test]
    fn is_playing_checks_users_not_characters() {
        let (character, user) = (Uuid::new_v4(), Uuid::new_v4());
        let players = roster(&game(), true, &[(character, user)]);
        assert!(players.is_playing(user));
        assert!(!players.is_playing(character));
    }

    #[tokio::test]
    async fn roster_scenario_suppresses_unchanged_refresh() {
        let g = game();
        let u1 = (Uuid::new_v4(), Uuid::new_v4());
        let empty = roster(&g, true, &[]);
        let joined = roster(&g, true, &[u1]);

        let backend = MockRoster::new(g.clone(), u1.1);
        backend.serve(empty.clone());
        backend.serve(joined.clone());
        backend.serve(joined.clone());
        let service = GamePlayersService::new(backend);

        let mut view = service.get(&g);
        assert_eq!(view.next().await, Some(empty));

        service.update(&g);
        assert_eq!(view.next().await, Some(joined.clone()));

        // Same content, newly constructed reply.
        assert_eq!(service.refresh(&g).await.unwrap(), Some(joined));
        assert_eq!(view.try_next(), None);
        assert_eq!(fetches(&service), 3);
    }

    #[tokio::test]
    async fn join_game_publishes_without_refetch() {
        let g = game();
        let me = Uuid::new_v4();
        let backend = MockRoster::new(g.clone(), me);
        backend.serve(roster(&g, true, &[]));
        let service = GamePlayersService::new(backend);

        let mut view = service.get(&g);
        assert!(!view.next().await.unwrap().is_playing(me));

        let after = service.join_game(&g).await.unwrap();
        assert!(after.is_playing(me));
        assert_eq!(view.try_next(), Some(after));
        assert_eq!(fetches(&service), 1);
    }

    #[tokio::test]
    async fn joining_twice_is_not_renotified() {
        let g = game();
        let me = Uuid::new_v4();
        let backend = MockRoster::new(g.clone(), me);
        backend.serve(roster(&g, true, &[]));
        let service = GamePlayersService::new(backend);

        let mut view = service.get(&g);
        view.next().await;
        service.join_game(&g).await.unwrap();
        assert!(view.try_next().is_some());

        service.join_game(&g).await.unwrap();
        assert_eq!(view.try_next(), None);
    }

    #[tokio::test]
    async fn end_recruitment_is_seen_by_later_get() {
        let g = game();
        let backend = MockRoster::new(g.clone(), Uuid::new_v4());
        backend.serve(roster(&g, true, &[]));
        let service = GamePlayersService::new(backend);

        service.refresh(&g).await.unwrap();
        let ended = service.end_recruitment(&g).await.unwrap();
        assert!(!ended.recruiting);

        // Equal identifier, distinct instance.
        let copy = GameIdentifier::new(g.scenario, g.created);
        assert_eq!(service.get(&copy).try_next(), Some(ended));
        assert_eq!(fetches(&service), 1);
    }

    #[tokio::test]
    async fn mutation_failure_surfaces_to_caller_only() {
        let g = game();
        let service = GamePlayersService::new(MockRoster::new(g.clone(), Uuid::new_v4()));
        let err = service.end_recruitment(&g).await.unwrap_err();
        assert!(err.is_backend());
        assert!(service.cache().is_empty());
    }
}
