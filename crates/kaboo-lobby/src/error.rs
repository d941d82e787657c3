//! Error types for the lobby layer.

use kaboo_protocol::{GameId, UserId};

/// Errors returned by a [`GameStore`](crate::GameStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A conditional update failed: the stored player list of this game
    /// no longer matches what the caller last saw.
    #[error("concurrent modification of game {0}")]
    Conflict(GameId),

    /// The referenced record does not exist.
    #[error("{0} not found")]
    NotFound(String),
}

/// Errors returned by [`GameRegistry`](crate::GameRegistry) operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// `max_players` was below 1.
    #[error("max players must be at least 1, got {0}")]
    InvalidMaxPlayers(i64),

    /// The user is already a player in an active game.
    #[error("user {0} is already in an active game")]
    UserAlreadyInGame(UserId),

    /// No active game with this id.
    #[error("game {0} not found")]
    GameNotFound(GameId),

    /// The game is no longer waiting for players.
    #[error("game {0} has already started")]
    GameAlreadyStarted(GameId),

    /// The supplied password does not match the game's.
    #[error("wrong password for game {0}")]
    WrongPassword(GameId),

    /// The game already has `max_players` players.
    #[error("game {0} is full")]
    GameFull(GameId),

    /// The durable store failed. Nothing was changed in memory.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Broad category of a [`LobbyError`], used to pick a log level and a
/// response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is malformed. Never retried.
    InputValidation,
    /// The request is valid but conflicts with current lobby state.
    StateConflict,
    /// A collaborator (the store) failed.
    Dependency,
}

impl LobbyError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidMaxPlayers(_) => ErrorClass::InputValidation,
            Self::UserAlreadyInGame(_)
            | Self::GameNotFound(_)
            | Self::GameAlreadyStarted(_)
            | Self::WrongPassword(_)
            | Self::GameFull(_) => ErrorClass::StateConflict,
            Self::Persistence(_) => ErrorClass::Dependency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_maps_each_variant() {
        let g = GameId::new("g");
        assert_eq!(
            LobbyError::InvalidMaxPlayers(0).class(),
            ErrorClass::InputValidation
        );
        assert_eq!(
            LobbyError::GameFull(g.clone()).class(),
            ErrorClass::StateConflict
        );
        assert_eq!(
            LobbyError::WrongPassword(g.clone()).class(),
            ErrorClass::StateConflict
        );
        assert_eq!(
            LobbyError::from(StoreError::Conflict(g)).class(),
            ErrorClass::Dependency
        );
    }

    #[test]
    fn test_store_error_display_names_game() {
        let err = StoreError::Conflict(GameId::new("abc"));
        assert_eq!(err.to_string(), "concurrent modification of game abc");
    }
}
