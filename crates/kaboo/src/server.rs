//! `KabooServer` builder and server loops.
//!
//! Ties the layers together: the realtime listener feeds authenticated
//! connections into the hub, and the REST listener drives the game
//! registry, whose joins fan out through the same hub.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use kaboo_hub::{Authenticator, Hub, HubConfig, HubHandle, Inbox};
use kaboo_lobby::{GameRegistry, GameStore};
use kaboo_protocol::JsonCodec;
use kaboo_transport::{Transport, WebSocketTransport};
use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::{KabooError, ServerConfig, rest};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to every connection task and REST handler.
pub(crate) struct ServerState<S: GameStore, A: Authenticator> {
    pub(crate) registry: GameRegistry<S, HubHandle<JsonCodec>>,
    pub(crate) hub: HubHandle<JsonCodec>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Kaboo server.
///
/// # Example
///
/// ```rust,no_run
/// use kaboo::prelude::*;
///
/// # async fn start() -> Result<(), KabooError> {
/// let server = KabooServerBuilder::new()
///     .rest_addr("127.0.0.1:3001")
///     .ws_addr("127.0.0.1:3002")
///     .build(MemoryStore::new(), DevAuthenticator)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct KabooServerBuilder {
    config: ServerConfig,
}

impl KabooServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the REST listen address.
    pub fn rest_addr(mut self, addr: &str) -> Self {
        self.config.rest_addr = addr.to_string();
        self
    }

    /// Sets the realtime listen address.
    pub fn ws_addr(mut self, addr: &str) -> Self {
        self.config.ws_addr = addr.to_string();
        self
    }

    /// Sets the hub configuration.
    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.config.hub = config;
        self
    }

    /// Binds both listeners, starts the hub, and loads active games.
    ///
    /// A failed game load does not fail the build: the registry starts
    /// empty in degraded mode and the failure is logged.
    pub async fn build<S: GameStore, A: Authenticator>(
        self,
        store: S,
        auth: A,
    ) -> Result<KabooServer<S, A>, KabooError> {
        let transport = WebSocketTransport::bind(&self.config.ws_addr)
            .await?
            .with_max_message_size(self.config.hub.max_message_size);
        let listener = TcpListener::bind(&self.config.rest_addr).await?;

        let (hub, inbox) = Hub::spawn(self.config.hub, JsonCodec);
        let registry = GameRegistry::new(store, hub.clone());
        if let Err(e) = registry.load_active_games().await {
            tracing::warn!(error = %e, "serving in degraded mode");
        }

        let state = Arc::new(ServerState {
            registry,
            hub,
            auth,
            codec: JsonCodec,
        });

        Ok(KabooServer {
            transport,
            listener,
            state,
            inbox,
        })
    }
}

impl Default for KabooServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Kaboo server, created by [`KabooServerBuilder::build`].
///
/// Call [`run()`](Self::run) to start serving.
pub struct KabooServer<S: GameStore, A: Authenticator> {
    transport: WebSocketTransport,
    listener: TcpListener,
    state: Arc<ServerState<S, A>>,
    inbox: Inbox,
}

impl<S: GameStore, A: Authenticator> KabooServer<S, A> {
    /// Returns the realtime listener's address.
    pub fn ws_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the REST listener's address.
    pub fn rest_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a handle to the server's hub.
    pub fn hub(&self) -> HubHandle<JsonCodec> {
        self.state.hub.clone()
    }

    /// `true` if loading active games at startup failed.
    pub fn is_degraded(&self) -> bool {
        self.state.registry.is_degraded()
    }

    /// Serves REST and realtime traffic until the REST server fails.
    pub async fn run(self) -> Result<(), KabooError> {
        let Self {
            mut transport,
            listener,
            state,
            inbox,
        } = self;

        tracing::info!(
            rest = ?listener.local_addr().ok(),
            ws = ?transport.local_addr().ok(),
            "Kaboo server running"
        );

        tokio::spawn(drain_inbox(inbox));
        let app = rest::router(Arc::clone(&state));

        tokio::select! {
            result = axum::serve(listener, app).into_future() => {
                result?;
                Ok(())
            }
            () = accept_loop(&mut transport, state) => Ok(()),
        }
    }
}

/// Accepts realtime connections and spawns a handshake task for each.
async fn accept_loop<S: GameStore, A: Authenticator>(
    transport: &mut WebSocketTransport,
    state: Arc<ServerState<S, A>>,
) {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(conn, state).await {
                        tracing::debug!(error = %e, "connection rejected");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

/// Consumes client commands. None are defined yet, so they are logged and
/// dropped.
async fn drain_inbox(mut inbox: Inbox) {
    while let Some(msg) = inbox.recv().await {
        tracing::trace!(
            user_id = %msg.user_id,
            conn_id = %msg.connection_id,
            bytes = msg.data.len(),
            "client command ignored"
        );
    }
}
