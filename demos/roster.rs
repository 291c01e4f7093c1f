//! Walks a game roster through the cache: first fetch, a changed refresh, and an
//! unchanged refresh that observers never hear about.
//!
//! ```text
//! RUST_LOG=mc_cache=trace cargo run --example roster
//! ```

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Mutex;

use chrono::Utc;
use mc_cache::backend::{BackendError, BackendFuture, BackendPort};
use mc_cache::domain::{GameIdentifier, GamePlayers, GamePlayersBackend, GamePlayersService};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// A single-game server kept in memory. Every reply is a fresh copy.
struct InMemoryRoster {
    me: Uuid,
    players: Mutex<GamePlayers>,
}

impl InMemoryRoster {
    fn mutate(
        &self,
        game: &GameIdentifier,
        change: impl FnOnce(&mut GamePlayers),
    ) -> Result<GamePlayers, BackendError> {
        let mut players = self.players.lock().unwrap_or_else(|e| e.into_inner());
        if players.game != *game {
            return Err(BackendError::Rejected {
                operation: "mutate",
                reason: format!("no game {game}"),
            });
        }
        change(&mut players);
        Ok(players.clone())
    }
}

impl BackendPort for InMemoryRoster {
    type Key = GameIdentifier;
    type Value = GamePlayers;
    type CreateArgs = Infallible;

    fn fetch(&self, game: GameIdentifier) -> BackendFuture<'_, Option<GamePlayers>> {
        let players = self.players.lock().unwrap_or_else(|e| e.into_inner());
        let reply = (players.game == game).then(|| players.clone());
        Box::pin(async move { Ok(reply) })
    }

    fn create(&self, args: Infallible) -> BackendFuture<'_, GamePlayers> {
        match args {}
    }
}

impl GamePlayersBackend for InMemoryRoster {
    fn join_game(&self, game: GameIdentifier) -> BackendFuture<'_, GamePlayers> {
        let me = self.me;
        let result = self.mutate(&game, |players| {
            if !players.is_playing(me) {
                players.users.insert(Uuid::new_v4(), me);
            }
        });
        Box::pin(async move { result })
    }

    fn end_recruitment(&self, game: GameIdentifier) -> BackendFuture<'_, GamePlayers> {
        let result = self.mutate(&game, |players| players.recruiting = false);
        Box::pin(async move { result })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let game = GameIdentifier::new(Uuid::new_v4(), Utc::now());
    let other_player = Uuid::new_v4();
    let backend = InMemoryRoster {
        me: Uuid::new_v4(),
        players: Mutex::new(GamePlayers {
            game: game.clone(),
            recruiting: true,
            users: BTreeMap::new(),
        }),
    };
    let service = GamePlayersService::new(backend);

    let mut view = service.get(&game);
    if let Some(initial) = view.next().await {
        println!("initial roster: {} users", initial.users.len());
    }
    let observer = tokio::spawn(async move {
        while let Some(players) = view.next().await {
            println!(
                "observer: recruiting={} users={}",
                players.recruiting,
                players.users.len()
            );
        }
    });

    // Another client joins server-side; our refresh picks it up.
    service
        .cache()
        .backend()
        .mutate(&game, |players| {
            players.users.insert(Uuid::new_v4(), other_player);
        })?;
    let refreshed = service.refresh(&game).await?;
    println!("refresh #1 returned {} users", refreshed.map_or(0, |p| p.users.len()));

    // Nothing changed server-side: observers are not notified.
    service.refresh(&game).await?;
    println!("refresh #2 returned the same roster");

    let joined = service.join_game(&game).await?;
    println!("joined: {} users", joined.users.len());

    let ended = service.end_recruitment(&game).await?;
    println!("recruitment ended: recruiting={}", ended.recruiting);

    tokio::task::yield_now().await;
    drop(service);
    observer.await?;
    Ok(())
}
