//! Domain specializations: concrete caches for each entity type the client shows.
//!
//! Each submodule supplies the entity's value types, a backend sub-trait declaring its
//! mutation endpoints, the [`KeySpace`](crate::cache::KeySpace) hooks, and a thin
//! service wrapping a [`KeyValueCache`](crate::cache::KeyValueCache).
//!
//! | Module           | Key                | Value          | Operations beyond get/update |
//! |------------------|--------------------|----------------|------------------------------|
//! | [`game`]         | [`GameIdentifier`] | `Game`         | create, start, stop          |
//! | [`game_players`] | [`GameIdentifier`] | `GamePlayers`  | join, end recruitment        |
//! | [`user`]         | `Uuid`             | `User`         | add, list                    |
//! | [`scenario`]     | `Uuid`             | `Scenario`     | list identifiers             |

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod game;
pub mod game_players;
pub mod scenario;
pub mod user;

pub use game::{Game, GameBackend, GameService, RunState};
pub use game_players::{GamePlayers, GamePlayersBackend, GamePlayersService};
pub use scenario::{Scenario, ScenarioBackend, ScenarioService};
pub use user::{Authority, User, UserBackend, UserDetails, UserService};

/// Identifies one game: the scenario it plays and the instant it was created.
///
/// Displays as `"{scenario}/{created}"` with `created` in RFC 3339 UTC, which is also
/// its canonical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameIdentifier {
    pub scenario: Uuid,
    pub created: DateTime<Utc>,
}

impl GameIdentifier {
    pub fn new(scenario: Uuid, created: DateTime<Utc>) -> Self {
        Self { scenario, created }
    }
}

impl fmt::Display for GameIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.scenario,
            self.created.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        )
    }
}

/// A UUID paired with a human-readable title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUuid {
    pub id: Uuid,
    pub title: String,
}
