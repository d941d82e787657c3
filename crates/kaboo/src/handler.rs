//! Realtime handshake: turn an accepted socket into a hub registration.
//!
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → external id → user record
//!   3. Send HandshakeAck
//!   4. Hand both socket halves to the hub
//!
//! Any failure answers with an `Error` frame (where the socket still
//! works) and closes.

use std::sync::Arc;
use std::time::Duration;

use kaboo_hub::Authenticator;
use kaboo_lobby::{GameStore, StoreError, User};
use kaboo_protocol::{Codec, JsonCodec, ProtocolError, SystemMessage};
use kaboo_transport::{
    Connection, Frame, FrameReceiver, FrameSender, WebSocketConnection,
};

use crate::KabooError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// How long a new connection may take to send its handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles a single connection from accept to hub registration.
pub(crate) async fn handle_connection<S, A>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, A>>,
) -> Result<(), KabooError>
where
    S: GameStore,
    A: Authenticator,
{
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let (mut tx, mut rx) = conn.split();

    let user = match perform_handshake(&mut tx, &mut rx, &state).await {
        Ok(user) => user,
        Err(e) => {
            let _ = tx.close().await;
            return Err(e);
        }
    };

    let ack = SystemMessage::HandshakeAck {
        user_id: user.id.clone(),
    };
    tx.send(&state.codec.encode(&ack)?).await?;

    tracing::info!(%conn_id, user_id = %user.id, "user connected");
    state.hub.register(user.id, conn_id, tx, rx);
    Ok(())
}

/// Reads the Handshake and resolves it to a user.
async fn perform_handshake<S, A, Tx, Rx>(
    tx: &mut Tx,
    rx: &mut Rx,
    state: &ServerState<S, A>,
) -> Result<User, KabooError>
where
    S: GameStore,
    A: Authenticator,
    Tx: FrameSender,
    Rx: FrameReceiver,
{
    let data = read_first_frame(rx).await?;

    let (version, token) = match state.codec.decode::<SystemMessage>(&data) {
        Ok(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            send_error(tx, &state.codec, 400, "expected Handshake").await;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Handshake".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        let message =
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        send_error(tx, &state.codec, 400, &message).await;
        return Err(ProtocolError::InvalidMessage(message).into());
    }

    let external_id = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(id) => id,
        Err(e) => {
            send_error(tx, &state.codec, 401, "unauthorized").await;
            return Err(e.into());
        }
    };

    match state.registry.store().find_user_by_external_id(&external_id).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(what)) => {
            send_error(tx, &state.codec, 401, "unknown user").await;
            Err(StoreError::NotFound(what).into())
        }
        Err(e) => {
            tracing::error!(%external_id, error = %e, "user lookup failed");
            send_error(tx, &state.codec, 500, "internal error").await;
            Err(e.into())
        }
    }
}

/// Waits up to [`HANDSHAKE_TIMEOUT`] for the first data frame.
async fn read_first_frame<Rx: FrameReceiver>(rx: &mut Rx) -> Result<Vec<u8>, KabooError> {
    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(Some(Frame::Data(data)))) => return Ok(data),
            Ok(Ok(Some(Frame::Pong))) => continue,
            Ok(Ok(None)) => {
                return Err(ProtocolError::InvalidMessage(
                    "connection closed before handshake".into(),
                )
                .into());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
            }
        }
    }
}

/// Sends an `Error` frame. Failures are ignored: the connection is about
/// to be closed anyway.
async fn send_error<Tx: FrameSender>(tx: &mut Tx, codec: &JsonCodec, code: u16, message: &str) {
    let msg = SystemMessage::Error {
        code,
        message: message.to_string(),
    };
    if let Ok(bytes) = codec.encode(&msg) {
        let _ = tx.send(&bytes).await;
    }
}
