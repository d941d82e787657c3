//! Game model: lifecycle state, the stored record, and caller snapshots.

use kaboo_protocol::{ExternalId, GameId, UserId, UserSummary};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of random bytes in a game seed. Hex-encoded, the seed is twice
/// as long.
pub const GAME_SEED_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The lifecycle state of a game.
///
/// Forward-only, no cycles:
///
/// ```text
/// WaitingForPlayers → Ongoing → Ended
/// ```
///
/// - **WaitingForPlayers**: created, accepting joins.
/// - **Ongoing**: the match has started; no more joins.
/// - **Ended**: terminal. The game leaves the live index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    WaitingForPlayers,
    Ongoing,
    Ended,
}

impl GameState {
    /// Returns `true` if the game accepts new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::WaitingForPlayers)
    }

    /// Returns `true` if the game counts towards a user's single active
    /// membership.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Ended)
    }

    /// Returns the following state, or `None` from `Ended`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::WaitingForPlayers => Some(Self::Ongoing),
            Self::Ongoing => Some(Self::Ended),
            Self::Ended => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::Ongoing => write!(f, "Ongoing"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

// ---------------------------------------------------------------------------
// Game records
// ---------------------------------------------------------------------------

/// A user record as the store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: ExternalId,
    pub name: String,
}

impl User {
    /// The id and display name, as carried by lobby events.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// A game as held by the registry and the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub owner: UserId,
    pub state: GameState,
    /// Join order. The owner is always first.
    pub players: Vec<UserId>,
    pub max_players: usize,
    pub name: String,
    /// Empty means no password is required.
    pub password: String,
    /// Loaded into the live index on startup while `true`.
    pub active: bool,
    pub seed: String,
}

impl Game {
    /// Returns `true` if `password` opens this game.
    pub fn password_matches(&self, password: &str) -> bool {
        self.password.is_empty() || self.password == password
    }

    /// Returns `true` if no slot is left.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id.clone(),
            owner: self.owner.clone(),
            state: self.state,
            players: self.players.clone(),
            max_players: self.max_players,
            name: self.name.clone(),
        }
    }
}

/// A game that has not been stored yet and so has no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDraft {
    pub owner: UserId,
    pub max_players: usize,
    pub name: String,
    pub password: String,
    pub seed: String,
}

impl GameDraft {
    /// A fresh game owned by `owner`, with a newly generated seed.
    pub fn new(
        owner: UserId,
        name: impl Into<String>,
        max_players: usize,
        password: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            max_players,
            name: name.into(),
            password: password.into(),
            seed: generate_seed(),
        }
    }

    /// The stored form of this draft under the id the store assigned.
    pub fn into_game(self, id: GameId) -> Game {
        Game {
            id,
            players: vec![self.owner.clone()],
            owner: self.owner,
            state: GameState::WaitingForPlayers,
            max_players: self.max_players,
            name: self.name,
            password: self.password,
            active: true,
            seed: self.seed,
        }
    }
}

/// Copy of a game handed to callers. Never carries the password or seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub id: GameId,
    pub owner: UserId,
    pub state: GameState,
    pub players: Vec<UserId>,
    pub max_players: usize,
    pub name: String,
}

/// Returns `GAME_SEED_LENGTH` bytes from the thread-local CSPRNG, hex
/// encoded.
fn generate_seed() -> String {
    let bytes: [u8; GAME_SEED_LENGTH] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
