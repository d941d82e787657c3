//! The hub: a single task that owns the connection map.
//!
//! All mutations of the map (register, unregister, broadcast dispatch) are
//! commands on one channel, processed in order by [`HubActor`]. Connections
//! themselves are serviced by their own reader and writer tasks, which only
//! talk to the hub through the same command channel, so the map needs no
//! lock.
//!
//! ```text
//!  HubHandle ──Register/Unregister/Broadcast──▶ HubActor
//!                                                  │ try_send(frame)
//!                                                  ▼
//!                     outbound queue ──▶ write pump ──▶ socket
//!                     socket ──▶ read pump ──▶ Inbox
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kaboo_protocol::{Codec, UserId};
use kaboo_transport::{ConnectionId, FrameReceiver, FrameSender};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::client::{self, ClientEntry, InboundMessage, OutboundFrame};
use crate::{HubConfig, HubError};

/// Receiving end of the application-level inbox.
///
/// Every data frame a client sends after its handshake lands here, in
/// per-connection FIFO order. Nothing is interpreted by the hub.
pub type Inbox = mpsc::Receiver<InboundMessage>;

/// Commands processed by the hub task.
pub(crate) enum HubCommand {
    /// Make `entry` the live endpoint for its user.
    Register {
        conn_id: ConnectionId,
        entry: ClientEntry,
    },

    /// Forget a connection. No-op if it is already gone.
    Unregister { conn_id: ConnectionId },

    /// Enqueue an already-serialized frame for every listed user.
    Broadcast {
        users: Vec<UserId>,
        frame: OutboundFrame,
    },

    /// Snapshot of currently connected users.
    ConnectedUsers { reply: oneshot::Sender<Vec<UserId>> },
}

/// Entry point for starting a hub.
pub struct Hub;

impl Hub {
    /// Spawns the hub task and returns a handle plus the inbox receiver.
    ///
    /// The task runs until every [`HubHandle`] clone (including the ones
    /// held by connection tasks) has been dropped.
    pub fn spawn<C: Codec>(config: HubConfig, codec: C) -> (HubHandle<C>, Inbox) {
        let config = config.validated();
        let (commands, receiver) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity);

        let actor = HubActor {
            connections: HashMap::new(),
            users: HashMap::new(),
            receiver,
        };
        tokio::spawn(actor.run());

        let handle = HubHandle {
            commands,
            inbox: inbox_tx,
            codec: Arc::new(codec),
            config: Arc::new(config),
        };
        (handle, inbox_rx)
    }
}

/// Handle to a running hub. Cheap to clone.
pub struct HubHandle<C: Codec> {
    commands: mpsc::UnboundedSender<HubCommand>,
    inbox: mpsc::Sender<InboundMessage>,
    codec: Arc<C>,
    config: Arc<HubConfig>,
}

impl<C: Codec> Clone for HubHandle<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            inbox: self.inbox.clone(),
            codec: Arc::clone(&self.codec),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C: Codec> HubHandle<C> {
    /// Registers an authenticated connection as the live endpoint for
    /// `user_id` and starts its reader and writer tasks.
    ///
    /// A previous connection for the same user is closed and replaced.
    pub fn register<Tx, Rx>(
        &self,
        user_id: UserId,
        conn_id: ConnectionId,
        sender: Tx,
        receiver: Rx,
    ) where
        Tx: FrameSender,
        Rx: FrameReceiver,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.send_buffer);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let entry = ClientEntry {
            user_id: user_id.clone(),
            outbound: outbound_tx,
            _shutdown: shutdown_tx,
        };

        // Register goes on the channel before the tasks exist, so any
        // Unregister they send is ordered after it.
        if self
            .commands
            .send(HubCommand::Register { conn_id, entry })
            .is_err()
        {
            tracing::warn!(%user_id, %conn_id, "hub stopped, dropping connection");
            return;
        }

        tokio::spawn(client::write_pump(
            conn_id,
            sender,
            outbound_rx,
            self.commands.clone(),
            Arc::clone(&self.config),
        ));
        tokio::spawn(client::read_pump(
            conn_id,
            user_id,
            receiver,
            shutdown_rx,
            self.inbox.clone(),
            self.commands.clone(),
            Arc::clone(&self.config),
        ));
    }

    /// Removes a connection. Safe to call any number of times.
    pub fn unregister(&self, conn_id: ConnectionId) {
        let _ = self.commands.send(HubCommand::Unregister { conn_id });
    }

    /// Serializes `payload` once and queues it for each listed user that
    /// currently has a live connection.
    ///
    /// Never blocks and never fails from the caller's point of view: users
    /// without a connection are skipped, and unhealthy connections are
    /// dropped by the hub.
    pub fn broadcast<T: Serialize>(&self, users: &[UserId], payload: &T) {
        let frame: OutboundFrame = match self.codec.encode(payload) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast payload");
                return;
            }
        };
        let command = HubCommand::Broadcast {
            users: users.to_vec(),
            frame,
        };
        if self.commands.send(command).is_err() {
            tracing::warn!("hub stopped, broadcast dropped");
        }
    }

    /// Returns the users that currently have a live connection.
    pub async fn connected_users(&self) -> Result<Vec<UserId>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(HubCommand::ConnectedUsers { reply })
            .map_err(|_| HubError::Stopped)?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    /// Returns `true` if `user_id` has a live connection.
    pub async fn is_connected(&self, user_id: &UserId) -> Result<bool, HubError> {
        Ok(self.connected_users().await?.contains(user_id))
    }
}

/// The hub task state. Only ever touched from inside [`HubActor::run`].
struct HubActor {
    /// Every registered connection.
    connections: HashMap<ConnectionId, ClientEntry>,
    /// The live connection of each user. Always points into `connections`.
    users: HashMap<UserId, ConnectionId>,
    receiver: mpsc::UnboundedReceiver<HubCommand>,
}

impl HubActor {
    async fn run(mut self) {
        tracing::info!("hub started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Register { conn_id, entry } => {
                    self.handle_register(conn_id, entry);
                }
                HubCommand::Unregister { conn_id } => {
                    self.handle_unregister(conn_id);
                }
                HubCommand::Broadcast { users, frame } => {
                    self.handle_broadcast(users, frame);
                }
                HubCommand::ConnectedUsers { reply } => {
                    let _ = reply.send(self.users.keys().cloned().collect());
                }
            }
        }

        tracing::info!("hub stopped");
    }

    fn handle_register(&mut self, conn_id: ConnectionId, entry: ClientEntry) {
        let user_id = entry.user_id.clone();
        if let Some(previous) = self.users.insert(user_id.clone(), conn_id) {
            if previous != conn_id {
                // Dropping the old entry closes its queue and stops its
                // reader; its writer sends a close frame on the way out.
                self.connections.remove(&previous);
                tracing::info!(
                    %user_id,
                    old = %previous,
                    new = %conn_id,
                    "replaced existing connection"
                );
            }
        }
        self.connections.insert(conn_id, entry);
        tracing::debug!(
            %user_id,
            %conn_id,
            connections = self.connections.len(),
            "client registered"
        );
    }

    fn handle_unregister(&mut self, conn_id: ConnectionId) {
        let Some(entry) = self.connections.remove(&conn_id) else {
            return;
        };
        if self.users.get(&entry.user_id) == Some(&conn_id) {
            self.users.remove(&entry.user_id);
        }
        tracing::debug!(
            user_id = %entry.user_id,
            %conn_id,
            connections = self.connections.len(),
            "client unregistered"
        );
    }

    fn handle_broadcast(&mut self, users: Vec<UserId>, frame: OutboundFrame) {
        let mut seen = HashSet::with_capacity(users.len());
        let mut dead = Vec::new();

        for user_id in users {
            if !seen.insert(user_id.clone()) {
                continue;
            }
            let Some(conn_id) = self.users.get(&user_id).copied() else {
                tracing::trace!(%user_id, "not connected, skipping");
                continue;
            };
            let Some(entry) = self.connections.get(&conn_id) else {
                continue;
            };
            match entry.outbound.try_send(Arc::clone(&frame)) {
                Ok(()) => tracing::debug!(%user_id, %conn_id, "queued message"),
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        %user_id,
                        %conn_id,
                        "outbound queue full, dropping slow client"
                    );
                    dead.push(conn_id);
                }
                Err(TrySendError::Closed(_)) => dead.push(conn_id),
            }
        }

        for conn_id in dead {
            self.handle_unregister(conn_id);
        }
    }
}
