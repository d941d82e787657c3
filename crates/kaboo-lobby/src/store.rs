//! Persistence gateway: the durable store behind the registry.
//!
//! The registry never reports success before the store has accepted the
//! write, so every mutating method here is the commit point of a lobby
//! operation.

use std::future::Future;
use std::sync::Arc;

use kaboo_protocol::{ExternalId, GameId, UserId};

use crate::{Game, GameDraft, StoreError, User};

/// Durable storage for users and games.
///
/// Implementations must make [`append_player`](GameStore::append_player)
/// conditional on the stored player list, so that several registries in
/// different processes cannot overfill a game.
pub trait GameStore: Send + Sync + 'static {
    /// Stores a new game and returns the id assigned to it.
    fn insert_game(
        &self,
        draft: &GameDraft,
    ) -> impl Future<Output = Result<GameId, StoreError>> + Send;

    /// Returns every game whose `active` flag is set.
    fn find_active_games(
        &self,
    ) -> impl Future<Output = Result<Vec<Game>, StoreError>> + Send;

    /// Returns `true` if `user_id` is a player of any active game.
    fn is_user_in_active_game(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Appends `new_player` to the game's player list.
    ///
    /// # Errors
    /// - `StoreError::Conflict` if the stored list is not exactly
    ///   `expected_players`
    /// - `StoreError::NotFound` if the game does not exist
    fn append_player(
        &self,
        game_id: &GameId,
        expected_players: &[UserId],
        new_player: &UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Resolves an auth-provider subject to the internal user record.
    fn find_user_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;
}

impl<T: GameStore> GameStore for Arc<T> {
    fn insert_game(
        &self,
        draft: &GameDraft,
    ) -> impl Future<Output = Result<GameId, StoreError>> + Send {
        (**self).insert_game(draft)
    }

    fn find_active_games(
        &self,
    ) -> impl Future<Output = Result<Vec<Game>, StoreError>> + Send {
        (**self).find_active_games()
    }

    fn is_user_in_active_game(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        (**self).is_user_in_active_game(user_id)
    }

    fn append_player(
        &self,
        game_id: &GameId,
        expected_players: &[UserId],
        new_player: &UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).append_player(game_id, expected_players, new_player)
    }

    fn find_user_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> impl Future<Output = Result<User, StoreError>> + Send {
        (**self).find_user_by_external_id(external_id)
    }
}
