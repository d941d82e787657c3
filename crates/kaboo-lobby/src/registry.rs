//! The game registry: in-memory view of active games, kept in step with
//! the durable store.
//!
//! Every operation runs under one `tokio::sync::Mutex`, and the lock stays
//! held across the store call. That makes each check-then-write atomic
//! within the process and gives joins on a game a total order. The store's
//! conditional append covers other processes.
//!
//! Writes go to the store first. Memory changes only after the store
//! accepted the write, so a failed write leaves nothing to roll back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use kaboo_protocol::{GameId, ServerEvent, UserId};
use tokio::sync::Mutex;

use crate::{
    ErrorClass, Game, GameDraft, GameSnapshot, GameStore, LobbyError,
    Notifier, User,
};

/// The two indices over the live games.
#[derive(Debug, Default)]
struct GameIndex {
    games: HashMap<GameId, Game>,
    /// Every player of every live game, owner included.
    user_games: HashMap<UserId, GameId>,
}

impl GameIndex {
    fn insert(&mut self, game: Game) {
        for player in &game.players {
            self.user_games.insert(player.clone(), game.id.clone());
        }
        self.games.insert(game.id.clone(), game);
    }
}

/// Authoritative in-memory registry of active games.
///
/// Constructed once at startup with its store and notifier, then shared
/// (usually behind an `Arc`) by every request handler.
pub struct GameRegistry<S: GameStore, N: Notifier> {
    store: S,
    notifier: N,
    index: Mutex<GameIndex>,
    degraded: AtomicBool,
}

impl<S: GameStore, N: Notifier> GameRegistry<S, N> {
    /// Creates an empty registry. Call
    /// [`load_active_games`](Self::load_active_games) before serving.
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            index: Mutex::new(GameIndex::default()),
            degraded: AtomicBool::new(false),
        }
    }

    /// The store this registry writes through to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replaces the index with the store's active games and returns how
    /// many were loaded.
    ///
    /// On failure the index is left empty and [`is_degraded`](Self::is_degraded)
    /// turns `true`; the registry still serves requests.
    pub async fn load_active_games(&self) -> Result<usize, LobbyError> {
        let mut index = self.index.lock().await;
        match self.store.find_active_games().await {
            Ok(games) => {
                *index = GameIndex::default();
                for game in games.into_iter().filter(|g| g.state.is_active()) {
                    index.insert(game);
                }
                self.degraded.store(false, Ordering::SeqCst);
                let count = index.games.len();
                tracing::info!(games = count, "loaded active games");
                Ok(count)
            }
            Err(e) => {
                *index = GameIndex::default();
                self.degraded.store(true, Ordering::SeqCst);
                tracing::error!(error = %e, "failed to load active games, starting empty");
                Err(e.into())
            }
        }
    }

    /// `true` if the last load failed and the index may be missing games.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Creates a game owned by `user` and returns its id.
    ///
    /// # Errors
    /// - `InvalidMaxPlayers` if `max_players < 1`
    /// - `UserAlreadyInGame` if the store reports the user in an active game
    /// - `Persistence` if the store failed; the game is then not indexed
    pub async fn create_game(
        &self,
        user: &User,
        name: &str,
        max_players: i64,
        password: &str,
    ) -> Result<GameId, LobbyError> {
        self.try_create(user, name, max_players, password)
            .await
            .inspect_err(|e| log_failure("create_game", &user.id, None, e))
    }

    async fn try_create(
        &self,
        user: &User,
        name: &str,
        max_players: i64,
        password: &str,
    ) -> Result<GameId, LobbyError> {
        let max = usize::try_from(max_players)
            .ok()
            .filter(|&m| m >= 1)
            .ok_or(LobbyError::InvalidMaxPlayers(max_players))?;

        let mut index = self.index.lock().await;

        if index.user_games.contains_key(&user.id)
            || self.store.is_user_in_active_game(&user.id).await?
        {
            return Err(LobbyError::UserAlreadyInGame(user.id.clone()));
        }

        let draft = GameDraft::new(user.id.clone(), name, max, password);
        let game_id = self.store.insert_game(&draft).await?;
        index.insert(draft.into_game(game_id.clone()));

        tracing::info!(
            %game_id,
            owner = %user.id,
            max_players = max,
            "game created"
        );
        Ok(game_id)
    }

    /// Adds `user` to a waiting game and returns the updated player list.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// `GameNotFound`, `UserAlreadyInGame`, `GameAlreadyStarted`,
    /// `WrongPassword`, `GameFull`. On success every player, the joiner
    /// included, is sent a `user_joined_game` event.
    pub async fn join_game(
        &self,
        user: &User,
        game_id: &GameId,
        password: &str,
    ) -> Result<Vec<UserId>, LobbyError> {
        self.try_join(user, game_id, password)
            .await
            .inspect_err(|e| log_failure("join_game", &user.id, Some(game_id), e))
    }

    async fn try_join(
        &self,
        user: &User,
        game_id: &GameId,
        password: &str,
    ) -> Result<Vec<UserId>, LobbyError> {
        let mut index = self.index.lock().await;

        let game = index
            .games
            .get(game_id)
            .ok_or_else(|| LobbyError::GameNotFound(game_id.clone()))?;
        if index.user_games.contains_key(&user.id)
            || self.store.is_user_in_active_game(&user.id).await?
        {
            return Err(LobbyError::UserAlreadyInGame(user.id.clone()));
        }
        if !game.state.is_joinable() {
            return Err(LobbyError::GameAlreadyStarted(game_id.clone()));
        }
        if !game.password_matches(password) {
            return Err(LobbyError::WrongPassword(game_id.clone()));
        }
        if game.is_full() {
            return Err(LobbyError::GameFull(game_id.clone()));
        }
        let expected = game.players.clone();

        self.store
            .append_player(game_id, &expected, &user.id)
            .await?;

        let index = &mut *index;
        let game = index
            .games
            .get_mut(game_id)
            .ok_or_else(|| LobbyError::GameNotFound(game_id.clone()))?;
        game.players.push(user.id.clone());
        index.user_games.insert(user.id.clone(), game_id.clone());
        let players = game.players.clone();

        tracing::info!(
            %game_id,
            user_id = %user.id,
            players = players.len(),
            max_players = game.max_players,
            "user joined game"
        );

        // Still under the lock, so events for one game leave in join order.
        self.notifier.notify(
            &players,
            &ServerEvent::UserJoinedGame {
                game_id: game_id.clone(),
                user: user.summary(),
            },
        );

        Ok(players)
    }

    /// Returns a copy of a live game.
    pub async fn game(&self, game_id: &GameId) -> Option<GameSnapshot> {
        self.index.lock().await.games.get(game_id).map(Game::snapshot)
    }

    /// Returns the live game `user_id` plays in, if any.
    pub async fn active_game_of(&self, user_id: &UserId) -> Option<GameSnapshot> {
        let index = self.index.lock().await;
        let game_id = index.user_games.get(user_id)?;
        index.games.get(game_id).map(Game::snapshot)
    }

    /// Number of games in the live index.
    pub async fn active_game_count(&self) -> usize {
        self.index.lock().await.games.len()
    }
}

/// Logs a failed operation at a level matching its class.
fn log_failure(
    op: &'static str,
    user_id: &UserId,
    game_id: Option<&GameId>,
    err: &LobbyError,
) {
    let game_id = game_id.map(GameId::as_str).unwrap_or("-");
    match err.class() {
        ErrorClass::Dependency => {
            tracing::error!(op, %user_id, game_id, error = %err, "lobby operation failed");
        }
        ErrorClass::InputValidation | ErrorClass::StateConflict => {
            tracing::debug!(op, %user_id, game_id, error = %err, "lobby operation rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for `GameRegistry` against `MemoryStore`, with a notifier
    //! that records instead of sending.

    use std::sync::Arc;

    use kaboo_protocol::{ExternalId, UserSummary};

    use super::*;
    use crate::{GameState, MemoryStore, StoreError};

    type Sent = Vec<(Vec<UserId>, ServerEvent)>;

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<std::sync::Mutex<Sent>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Sent {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, users: &[UserId], event: &ServerEvent) {
            self.sent
                .lock()
                .unwrap()
                .push((users.to_vec(), event.clone()));
        }
    }

    type Registry = GameRegistry<Arc<MemoryStore>, RecordingNotifier>;

    fn setup() -> (Registry, Arc<MemoryStore>, RecordingNotifier) {
        let store = Arc::new(MemoryStore::new());
        let notifier = RecordingNotifier::default();
        let registry = GameRegistry::new(Arc::clone(&store), notifier.clone());
        (registry, store, notifier)
    }

    fn user(id: &str) -> User {
        User {
            id: UserId::new(id),
            external_id: ExternalId::new(format!("auth0|{id}")),
            name: id.to_uppercase(),
        }
    }

    fn ids(names: &[&str]) -> Vec<UserId> {
        names.iter().map(|n| UserId::new(*n)).collect()
    }

    // -- create_game ------------------------------------------------------

    #[tokio::test]
    async fn test_create_game_indexes_owner_as_only_player() {
        let (registry, store, notifier) = setup();

        let id = registry
            .create_game(&user("a"), "game1", 2, "pw")
            .await
            .unwrap();

        let snap = registry.game(&id).await.unwrap();
        assert_eq!(snap.players, ids(&["a"]));
        assert_eq!(snap.owner, UserId::new("a"));
        assert_eq!(snap.state, GameState::WaitingForPlayers);
        assert_eq!(snap.max_players, 2);
        assert!(store.game(&id).await.unwrap().active);
        assert!(notifier.sent().is_empty(), "creation broadcasts nothing");
    }

    #[tokio::test]
    async fn test_create_game_invalid_max_players_rejected_first() {
        let (registry, _store, _) = setup();
        registry.create_game(&user("a"), "g", 2, "").await.unwrap();

        for bad in [0, -3] {
            let err = registry
                .create_game(&user("a"), "g", bad, "")
                .await
                .unwrap_err();
            assert!(matches!(err, LobbyError::InvalidMaxPlayers(n) if n == bad));
        }
    }

    #[tokio::test]
    async fn test_create_game_owner_already_in_game_rejected() {
        let (registry, _store, _) = setup();
        registry.create_game(&user("a"), "g1", 2, "").await.unwrap();

        let err = registry
            .create_game(&user("a"), "g2", 2, "")
            .await
            .unwrap_err();

        assert!(matches!(err, LobbyError::UserAlreadyInGame(_)));
        assert_eq!(registry.active_game_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_game_consults_store_membership() {
        let (registry, store, _) = setup();
        // Game created by another process: in the store, not in this index.
        store
            .insert_game(&GameDraft::new(UserId::new("a"), "elsewhere", 2, ""))
            .await
            .unwrap();

        let err = registry
            .create_game(&user("a"), "g", 2, "")
            .await
            .unwrap_err();

        assert!(matches!(err, LobbyError::UserAlreadyInGame(_)));
    }

    #[tokio::test]
    async fn test_create_game_store_failure_leaves_index_untouched() {
        let (registry, store, _) = setup();
        store.set_fail_writes(true);

        let err = registry
            .create_game(&user("a"), "g", 2, "")
            .await
            .unwrap_err();

        assert!(matches!(err, LobbyError::Persistence(StoreError::Unavailable(_))));
        assert_eq!(registry.active_game_count().await, 0);
        assert!(registry.active_game_of(&UserId::new("a")).await.is_none());
    }

    // -- join_game --------------------------------------------------------

    #[tokio::test]
    async fn test_lobby_scenario_create_join_full_wrong_password() {
        let (registry, _store, _) = setup();

        let game1 = registry
            .create_game(&user("a"), "game1", 2, "pw")
            .await
            .unwrap();
        assert_eq!(registry.game(&game1).await.unwrap().players, ids(&["a"]));

        let players = registry.join_game(&user("b"), &game1, "pw").await.unwrap();
        assert_eq!(players, ids(&["a", "b"]));

        let err = registry.join_game(&user("c"), &game1, "pw").await.unwrap_err();
        assert!(matches!(err, LobbyError::GameFull(_)));

        let game2 = registry
            .create_game(&user("e"), "game2", 4, "pw")
            .await
            .unwrap();
        let err = registry.join_game(&user("b"), &game2, "pw").await.unwrap_err();
        assert!(matches!(err, LobbyError::UserAlreadyInGame(_)));

        let err = registry
            .join_game(&user("d"), &game1, "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, LobbyError::WrongPassword(_)));
    }

    #[tokio::test]
    async fn test_join_game_unknown_game_returns_not_found() {
        let (registry, _store, _) = setup();
        let err = registry
            .join_game(&user("b"), &GameId::new("missing"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, LobbyError::GameNotFound(_)));
    }

    #[tokio::test]
    async fn test_join_game_rejoin_same_game_returns_membership_error() {
        let (registry, _store, _) = setup();
        let id = registry.create_game(&user("a"), "g", 3, "").await.unwrap();
        registry.join_game(&user("b"), &id, "").await.unwrap();

        let owner = registry.join_game(&user("a"), &id, "").await.unwrap_err();
        let joiner = registry.join_game(&user("b"), &id, "").await.unwrap_err();

        assert!(matches!(owner, LobbyError::UserAlreadyInGame(_)));
        assert!(matches!(joiner, LobbyError::UserAlreadyInGame(_)));
        assert_eq!(registry.game(&id).await.unwrap().players, ids(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_join_game_started_game_rejected_before_password() {
        let (registry, store, _) = setup();
        let id = registry.create_game(&user("a"), "g", 3, "pw").await.unwrap();
        store.set_state(&id, GameState::Ongoing).await;
        registry.load_active_games().await.unwrap();

        let err = registry.join_game(&user("b"), &id, "wrong").await.unwrap_err();

        assert!(matches!(err, LobbyError::GameAlreadyStarted(_)));
    }

    #[tokio::test]
    async fn test_join_game_wrong_password_wins_over_full() {
        let (registry, _store, _) = setup();
        let id = registry.create_game(&user("a"), "g", 1, "pw").await.unwrap();

        let err = registry.join_game(&user("b"), &id, "nope").await.unwrap_err();
        assert!(matches!(err, LobbyError::WrongPassword(_)));

        let err = registry.join_game(&user("b"), &id, "pw").await.unwrap_err();
        assert!(matches!(err, LobbyError::GameFull(_)));
    }

    #[tokio::test]
    async fn test_join_game_empty_stored_password_accepts_any() {
        let (registry, _store, _) = setup();
        let id = registry.create_game(&user("a"), "g", 4, "").await.unwrap();

        registry.join_game(&user("b"), &id, "").await.unwrap();
        registry.join_game(&user("c"), &id, "anything").await.unwrap();

        assert_eq!(registry.game(&id).await.unwrap().players.len(), 3);
    }

    #[tokio::test]
    async fn test_join_game_notifies_all_players_including_joiner() {
        let (registry, _store, notifier) = setup();
        let id = registry.create_game(&user("a"), "g", 3, "").await.unwrap();

        registry.join_game(&user("b"), &id, "").await.unwrap();
        registry.join_game(&user("c"), &id, "").await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, ids(&["a", "b"]));
        assert_eq!(sent[1].0, ids(&["a", "b", "c"]));
        assert_eq!(
            sent[1].1,
            ServerEvent::UserJoinedGame {
                game_id: id.clone(),
                user: UserSummary {
                    id: UserId::new("c"),
                    name: "C".into(),
                },
            }
        );
    }

    #[tokio::test]
    async fn test_join_game_rejection_sends_nothing() {
        let (registry, _store, notifier) = setup();
        let id = registry.create_game(&user("a"), "g", 2, "pw").await.unwrap();

        let _ = registry.join_game(&user("b"), &id, "bad").await;

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_join_game_store_failure_rolls_nothing_forward() {
        let (registry, store, notifier) = setup();
        let id = registry.create_game(&user("a"), "g", 3, "").await.unwrap();
        store.set_fail_writes(true);

        let err = registry.join_game(&user("b"), &id, "").await.unwrap_err();

        assert!(matches!(err, LobbyError::Persistence(_)));
        assert_eq!(registry.game(&id).await.unwrap().players, ids(&["a"]));
        assert!(registry.active_game_of(&UserId::new("b")).await.is_none());
        assert_eq!(store.game(&id).await.unwrap().players, ids(&["a"]));
        assert!(notifier.sent().is_empty());

        // The same join succeeds once the store recovers.
        store.set_fail_writes(false);
        registry.join_game(&user("b"), &id, "").await.unwrap();
    }

    #[tokio::test]
    async fn test_join_game_stale_index_returns_conflict() {
        let (registry, store, _) = setup();
        let id = registry.create_game(&user("a"), "g", 3, "").await.unwrap();
        // Another process appended a player behind this registry's back.
        store
            .append_player(&id, &ids(&["a"]), &UserId::new("x"))
            .await
            .unwrap();

        let err = registry.join_game(&user("b"), &id, "").await.unwrap_err();

        assert!(matches!(err, LobbyError::Persistence(StoreError::Conflict(_))));
        assert_eq!(registry.game(&id).await.unwrap().players, ids(&["a"]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_join_game_concurrent_joins_never_exceed_capacity() {
        let (registry, store, _) = setup();
        let registry = Arc::new(registry);
        let max = 4;
        let extra = 6;
        let id = registry
            .create_game(&user("owner"), "race", max, "")
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..(max as usize + extra) {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                registry.join_game(&user(&format!("p{i}")), &id, "").await
            }));
        }

        let mut ok = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert!(matches!(e, LobbyError::GameFull(_))),
            }
        }

        assert_eq!(ok, max as usize - 1, "owner holds one slot");
        let snap = registry.game(&id).await.unwrap();
        assert_eq!(snap.players.len(), max as usize);
        assert_eq!(store.game(&id).await.unwrap().players, snap.players);
    }

    #[tokio::test]
    async fn test_membership_is_exclusive_across_games() {
        let (registry, _store, _) = setup();
        let g1 = registry.create_game(&user("a"), "g1", 4, "").await.unwrap();
        let g2 = registry.create_game(&user("b"), "g2", 4, "").await.unwrap();

        registry.join_game(&user("c"), &g1, "").await.unwrap();
        let err = registry.join_game(&user("c"), &g2, "").await.unwrap_err();
        assert!(matches!(err, LobbyError::UserAlreadyInGame(_)));
        let err = registry.create_game(&user("c"), "g3", 2, "").await.unwrap_err();
        assert!(matches!(err, LobbyError::UserAlreadyInGame(_)));

        assert_eq!(
            registry.active_game_of(&UserId::new("c")).await.unwrap().id,
            g1
        );
    }

    // -- load_active_games ------------------------------------------------

    #[tokio::test]
    async fn test_load_active_games_rebuilds_both_indices() {
        let store = Arc::new(MemoryStore::new());
        let first = GameRegistry::new(Arc::clone(&store), RecordingNotifier::default());
        let id = first.create_game(&user("a"), "g", 3, "").await.unwrap();
        first.join_game(&user("b"), &id, "").await.unwrap();
        let archived = first.create_game(&user("z"), "old", 2, "").await.unwrap();
        store.set_active(&archived, false).await;

        let second = GameRegistry::new(Arc::clone(&store), RecordingNotifier::default());
        let loaded = second.load_active_games().await.unwrap();

        assert_eq!(loaded, 1);
        assert!(!second.is_degraded());
        assert_eq!(
            second.active_game_of(&UserId::new("b")).await.unwrap().id,
            id
        );
        assert!(second.game(&archived).await.is_none());
    }

    #[tokio::test]
    async fn test_load_active_games_failure_enters_degraded_mode() {
        let (registry, store, _) = setup();
        store.set_fail_reads(true);

        let err = registry.load_active_games().await.unwrap_err();

        assert!(matches!(err, LobbyError::Persistence(_)));
        assert!(registry.is_degraded());
        assert_eq!(registry.active_game_count().await, 0);

        store.set_fail_reads(false);
        registry.load_active_games().await.unwrap();
        assert!(!registry.is_degraded());
    }
}
