//! Core protocol types: identifiers and the messages that travel on the
//! realtime channel.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Declares a string-backed identifier newtype.
///
/// Identifiers are opaque: storage (or the auth provider) assigns them and
/// nothing in the server parses them. They serialize as bare strings.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id! {
    /// Internal identifier of a user, assigned by storage.
    UserId
}

string_id! {
    /// Identifier of a game, assigned by storage when the game is inserted.
    /// Immutable for the lifetime of the game.
    GameId
}

string_id! {
    /// Identifier issued by the external auth provider (the token subject).
    /// Resolved to a [`UserId`] through storage.
    ExternalId
}

/// The public face of a user inside an event: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// ServerEvent: lobby notifications
// ---------------------------------------------------------------------------

/// Lobby events pushed to connected clients.
///
/// Internally tagged, so every frame is a JSON object with a `type` field:
///
/// ```json
/// {"type":"user_joined_game","gameID":"65f0…","user":{"id":"…","name":"ann"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A user was appended to a game's player list. Sent to every player of
    /// the game, the joiner included.
    UserJoinedGame {
        #[serde(rename = "gameID")]
        game_id: GameId,
        user: UserSummary,
    },
}

// ---------------------------------------------------------------------------
// SystemMessage: connection plumbing
// ---------------------------------------------------------------------------

/// Messages used to set up the realtime channel.
///
/// The client opens with `Handshake`; the server answers with either
/// `HandshakeAck` or `Error` and, in the error case, closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: protocol version and bearer token.
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Server → Client: the token resolved to this user; the connection is
    /// now registered and will receive lobby events.
    HandshakeAck { user_id: UserId },

    /// Server → Client: something went wrong. `code` follows HTTP
    /// semantics (400 bad request, 401 unauthorized).
    Error { code: u16, message: String },
}
