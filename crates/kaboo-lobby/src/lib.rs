//! Lobby layer for Kaboo: games, the rules for joining them, and the
//! registry that enforces those rules.
//!
//! - [`GameRegistry`]: authoritative in-memory index of active games
//! - [`GameStore`]: the durable store the registry writes through to
//! - [`MemoryStore`]: an in-process [`GameStore`]
//! - [`Notifier`]: where "user joined" events go once a join is durable
//! - [`GameState`]: forward-only lifecycle of a game
//!
//! The invariants held here: a user plays in at most one active game, a
//! game never has more than `max_players` players, and the owner is always
//! the first player.

#![allow(async_fn_in_trait)]

mod error;
mod game;
mod memory;
mod notifier;
mod registry;
mod store;

pub use error::{ErrorClass, LobbyError, StoreError};
pub use game::{GAME_SEED_LENGTH, Game, GameDraft, GameSnapshot, GameState, User};
pub use memory::MemoryStore;
pub use notifier::Notifier;
pub use registry::GameRegistry;
pub use store::GameStore;
