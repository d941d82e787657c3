//! REST surface: create and join games, read the caller's game.
//!
//! Every route authenticates the `Authorization: Bearer <token>` header
//! through the server's [`Authenticator`] and resolves the subject to a
//! user record before touching the registry. Authentication runs as the
//! first extractor, ahead of the body, so an anonymous request is always
//! a 401 whatever it carries.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use kaboo_hub::{Authenticator, HubError};
use kaboo_lobby::{GameSnapshot, GameStore, LobbyError, StoreError, User};
use kaboo_protocol::{GameId, UserId};
use serde::{Deserialize, Serialize};

use crate::server::ServerState;

/// Builds the REST router over the shared server state.
pub(crate) fn router<S: GameStore, A: Authenticator>(
    state: Arc<ServerState<S, A>>,
) -> Router {
    Router::new()
        .route("/api/game/new", post(new_game::<S, A>))
        .route("/api/game/join", post(join_game::<S, A>))
        .route("/api/game/leave", post(leave_game))
        .route("/api/state", get(current_game::<S, A>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error returned by REST handlers. Rendered as `{"error": "..."}`.
#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    /// The body was missing, not JSON, or the wrong shape.
    Body(JsonRejection),
    NotFound(String),
    NotImplemented,
    Lobby(LobbyError),
    Internal,
}

impl From<LobbyError> for ApiError {
    fn from(err: LobbyError) -> Self {
        Self::Lobby(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        tracing::error!(error = %err, "hub unavailable");
        Self::Internal
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Body(rejection) => rejection.status(),
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Lobby(err) => match err {
                LobbyError::InvalidMaxPlayers(_) => StatusCode::BAD_REQUEST,
                LobbyError::GameNotFound(_) => StatusCode::NOT_FOUND,
                LobbyError::UserAlreadyInGame(_)
                | LobbyError::GameAlreadyStarted(_)
                | LobbyError::GameFull(_) => StatusCode::CONFLICT,
                LobbyError::WrongPassword(_) => StatusCode::FORBIDDEN,
                LobbyError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Unauthorized(m) => (*m).to_string(),
            Self::Body(rejection) => rejection.body_text(),
            Self::NotFound(m) => m.clone(),
            Self::NotImplemented => "not implemented".to_string(),
            // Store details stay in the logs.
            Self::Internal | Self::Lobby(LobbyError::Persistence(_)) => {
                "internal error".to_string()
            }
            Self::Lobby(err) => err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message() }));
        (self.status(), body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The authenticated caller of a REST route.
pub(crate) struct CurrentUser(pub User);

impl<S: GameStore, A: Authenticator> FromRequestParts<Arc<ServerState<S, A>>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState<S, A>>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(state, &parts.headers).await.map(CurrentUser)
    }
}

/// Resolves the bearer token to the calling user.
async fn authenticate<S: GameStore, A: Authenticator>(
    state: &ServerState<S, A>,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("missing bearer token"))?;

    let external_id = state.auth.authenticate(token).await.map_err(|e| {
        tracing::debug!(error = %e, "rejected token");
        ApiError::Unauthorized("unauthorized")
    })?;

    match state.registry.store().find_user_by_external_id(&external_id).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(_)) => Err(ApiError::Unauthorized("unknown user")),
        Err(e) => {
            tracing::error!(%external_id, error = %e, "user lookup failed");
            Err(ApiError::Internal)
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewGameRequest {
    pub name: String,
    pub max_players: i64,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewGameResponse {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JoinGameRequest {
    #[serde(rename = "gameID")]
    pub game_id: GameId,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct JoinGameResponse {
    pub players: Vec<UserId>,
}

/// The caller's game plus which of its players are online right now.
#[derive(Debug, Serialize)]
pub(crate) struct GameStateResponse {
    #[serde(flatten)]
    pub game: GameSnapshot,
    pub connected: Vec<UserId>,
}

/// POST /api/game/new
async fn new_game<S: GameStore, A: Authenticator>(
    State(state): State<Arc<ServerState<S, A>>>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<NewGameRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NewGameResponse>), ApiError> {
    let Json(req) = body?;
    let game_id = state
        .registry
        .create_game(&user, &req.name, req.max_players, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(NewGameResponse { game_id })))
}

/// POST /api/game/join
async fn join_game<S: GameStore, A: Authenticator>(
    State(state): State<Arc<ServerState<S, A>>>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<JoinGameRequest>, JsonRejection>,
) -> Result<Json<JoinGameResponse>, ApiError> {
    let Json(req) = body?;
    let players = state
        .registry
        .join_game(&user, &req.game_id, &req.password)
        .await?;
    Ok(Json(JoinGameResponse { players }))
}

/// POST /api/game/leave
async fn leave_game() -> ApiError {
    ApiError::NotImplemented
}

/// GET /api/state
async fn current_game<S: GameStore, A: Authenticator>(
    State(state): State<Arc<ServerState<S, A>>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<GameStateResponse>, ApiError> {
    let game = state
        .registry
        .active_game_of(&user.id)
        .await
        .ok_or_else(|| ApiError::NotFound("not in a game".to_string()))?;

    let online = state.hub.connected_users().await?;
    let connected = game
        .players
        .iter()
        .filter(|p| online.contains(p))
        .cloned()
        .collect();
    Ok(Json(GameStateResponse { game, connected }))
}
