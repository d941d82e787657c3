//! Per-connection reader and writer tasks.
//!
//! Each registered connection gets two tasks. The writer is the only code
//! that writes to the socket; the reader is the only code that reads from
//! it. Either one ending unregisters the connection, and unregistering
//! stops the other one:
//!
//! - reader ends → `Unregister` → hub drops the entry → outbound queue
//!   closes → writer sends a close frame and exits
//! - writer fails → `Unregister` → hub drops the entry → shutdown signal
//!   fires → reader exits

use std::sync::Arc;
use std::time::Duration;

use kaboo_protocol::UserId;
use kaboo_transport::{ConnectionId, Frame, FrameReceiver, FrameSender};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout, timeout_at};

use crate::HubConfig;
use crate::hub::HubCommand;

/// A serialized frame shared by every connection it is queued on.
pub(crate) type OutboundFrame = Arc<[u8]>;

/// A data frame received from an authenticated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// The user the connection belongs to.
    pub user_id: UserId,
    /// The connection the frame arrived on.
    pub connection_id: ConnectionId,
    /// Frame payload with newlines turned into spaces and surrounding
    /// whitespace trimmed.
    pub data: Vec<u8>,
}

/// The hub's record of one live connection.
pub(crate) struct ClientEntry {
    pub(crate) user_id: UserId,
    pub(crate) outbound: mpsc::Sender<OutboundFrame>,
    /// Dropped together with the entry, which stops the reader.
    pub(crate) _shutdown: oneshot::Sender<()>,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Drains the outbound queue onto the socket and sends keepalive pings.
///
/// Every write is bounded by `write_wait`. Exits when the hub closes the
/// queue (after trying to send a close frame) or when a write fails.
pub(crate) async fn write_pump<Tx: FrameSender>(
    conn_id: ConnectionId,
    mut sender: Tx,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    commands: mpsc::UnboundedSender<HubCommand>,
    config: Arc<HubConfig>,
) {
    let period = config.ping_period.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // Queue closed: the hub has already forgotten us.
                    let _ = timeout(config.write_wait, sender.close()).await;
                    tracing::debug!(%conn_id, "writer closed");
                    return;
                };
                match timeout(config.write_wait, sender.send(&frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "write failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(%conn_id, "write deadline exceeded");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                match timeout(config.write_wait, sender.ping()).await {
                    Ok(Ok(())) => tracing::trace!(%conn_id, "ping sent"),
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "ping failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(%conn_id, "ping deadline exceeded");
                        break;
                    }
                }
            }
        }
    }

    let _ = commands.send(HubCommand::Unregister { conn_id });
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reads frames until the peer goes away, breaks the protocol, or stays
/// silent past the read deadline.
///
/// The deadline starts at `pong_wait` and is pushed forward only by pongs.
/// Data frames go to the inbox after normalization.
pub(crate) async fn read_pump<Rx: FrameReceiver>(
    conn_id: ConnectionId,
    user_id: UserId,
    mut receiver: Rx,
    mut shutdown: oneshot::Receiver<()>,
    inbox: mpsc::Sender<InboundMessage>,
    commands: mpsc::UnboundedSender<HubCommand>,
    config: Arc<HubConfig>,
) {
    let mut deadline = Instant::now() + config.pong_wait;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            read = timeout_at(deadline, receiver.recv()) => match read {
                Err(_) => {
                    tracing::debug!(%conn_id, %user_id, "read deadline exceeded");
                    break;
                }
                Ok(Ok(Some(Frame::Pong))) => {
                    deadline = Instant::now() + config.pong_wait;
                }
                Ok(Ok(Some(Frame::Data(data)))) => {
                    if data.len() > config.max_message_size {
                        tracing::warn!(
                            %conn_id,
                            %user_id,
                            size = data.len(),
                            limit = config.max_message_size,
                            "inbound frame too large"
                        );
                        break;
                    }
                    let message = InboundMessage {
                        user_id: user_id.clone(),
                        connection_id: conn_id,
                        data: normalize(data),
                    };
                    // A full inbox must not keep a replaced connection alive.
                    tokio::select! {
                        _ = &mut shutdown => break,
                        sent = inbox.send(message) => if sent.is_err() {
                            tracing::trace!(%conn_id, "inbox closed, frame discarded");
                        },
                    }
                }
                Ok(Ok(None)) => {
                    tracing::debug!(%conn_id, %user_id, "peer closed");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::debug!(%conn_id, %user_id, error = %e, "read failed");
                    break;
                }
            }
        }
    }

    let _ = commands.send(HubCommand::Unregister { conn_id });
}

/// Turns newlines into spaces and trims surrounding ASCII whitespace.
fn normalize(mut data: Vec<u8>) -> Vec<u8> {
    for byte in data.iter_mut() {
        if *byte == b'\n' {
            *byte = b' ';
        }
    }
    data.trim_ascii().to_vec()
}
