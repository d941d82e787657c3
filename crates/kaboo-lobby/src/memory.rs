//! In-memory [`GameStore`] used by the development server and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use kaboo_protocol::{ExternalId, GameId, UserId};
use rand::Rng;
use tokio::sync::RwLock;

use crate::{Game, GameDraft, GameState, GameStore, StoreError, User};

/// A [`GameStore`] backed by maps behind a `RwLock`.
///
/// Implements the conditional player append exactly, and can be told to
/// fail reads or writes so that callers' failure paths can be exercised.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

#[derive(Debug, Default)]
struct Inner {
    games: HashMap<GameId, Game>,
    users: HashMap<UserId, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user record.
    pub async fn insert_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id.clone(), user);
    }

    /// Returns the stored copy of a game.
    pub async fn game(&self, game_id: &GameId) -> Option<Game> {
        self.inner.read().await.games.get(game_id).cloned()
    }

    /// Sets a game's `active` flag. Returns `false` if there is no such game.
    pub async fn set_active(&self, game_id: &GameId, active: bool) -> bool {
        match self.inner.write().await.games.get_mut(game_id) {
            Some(game) => {
                game.active = active;
                true
            }
            None => false,
        }
    }

    /// Sets a game's state. Returns `false` if there is no such game.
    pub async fn set_state(&self, game_id: &GameId, state: GameState) -> bool {
        match self.inner.write().await.games.get_mut(game_id) {
            Some(game) => {
                game.state = state;
                true
            }
            None => false,
        }
    }

    /// Makes every mutating call fail with `StoreError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every query fail with `StoreError::Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }
}

impl GameStore for MemoryStore {
    async fn insert_game(&self, draft: &GameDraft) -> Result<GameId, StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.write().await;
        let id = loop {
            let id = generate_game_id();
            if !inner.games.contains_key(&id) {
                break id;
            }
        };
        inner
            .games
            .insert(id.clone(), draft.clone().into_game(id.clone()));
        Ok(id)
    }

    async fn find_active_games(&self) -> Result<Vec<Game>, StoreError> {
        self.check_reads()?;
        let inner = self.inner.read().await;
        Ok(inner.games.values().filter(|g| g.active).cloned().collect())
    }

    async fn is_user_in_active_game(&self, user_id: &UserId) -> Result<bool, StoreError> {
        self.check_reads()?;
        let inner = self.inner.read().await;
        Ok(inner
            .games
            .values()
            .any(|g| g.active && g.players.contains(user_id)))
    }

    async fn append_player(
        &self,
        game_id: &GameId,
        expected_players: &[UserId],
        new_player: &UserId,
    ) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut inner = self.inner.write().await;
        let game = inner
            .games
            .get_mut(game_id)
            .ok_or_else(|| StoreError::NotFound(format!("game {game_id}")))?;
        if game.players != expected_players {
            return Err(StoreError::Conflict(game_id.clone()));
        }
        game.players.push(new_player.clone());
        Ok(())
    }

    async fn find_user_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> Result<User, StoreError> {
        self.check_reads()?;
        let inner = self.inner.read().await;
        inner
            .users
            .values()
            .find(|u| &u.external_id == external_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {external_id}")))
    }
}

/// 96 random bits as 24 lowercase hex characters.
fn generate_game_id() -> GameId {
    let bytes: [u8; 12] = rand::rng().random();
    GameId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
