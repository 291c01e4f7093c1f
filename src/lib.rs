//! # mc-cache
//!
//! A reactive per-key entity cache for clients of a game server.
//!
//! Components ask a [`KeyValueCache`] for a live view of an entity; the cache turns
//! repeated requests into at most one outstanding backend call per key, replays the
//! current value to every new observer, and only notifies observers when a refreshed
//! value actually differs from what they already hold.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mc_cache::domain::{GameIdentifier, GamePlayersBackend, GamePlayersService};
//!
//! async fn watch_roster<B: GamePlayersBackend>(backend: B, game: GameIdentifier) {
//!     let service = GamePlayersService::new(backend);
//!     let mut roster = service.get(&game);
//!     while let Some(players) = roster.next().await {
//!         println!("{} players, recruiting: {}", players.users.len(), players.recruiting);
//!     }
//! }
//! ```

// ── Caching engine ───────────────────────────────────────────────────────────
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;

// ── Entity types built on the engine ─────────────────────────────────────────
pub mod domain;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use backend::{BackendError, BackendFuture, BackendPort};
pub use cache::{EntryState, Fetch, KeySpace, KeyValueCache, Subscription};
pub use config::{CacheConfig, RefreshPolicy};
pub use error::CacheError;
