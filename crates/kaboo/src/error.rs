//! Unified error type for the Kaboo server.

use kaboo_hub::AuthError;
use kaboo_lobby::{LobbyError, StoreError};
use kaboo_protocol::ProtocolError;
use kaboo_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// `#[from]` on each variant lets `?` convert layer errors directly.
#[derive(Debug, thiserror::Error)]
pub enum KabooError {
    /// Sending, receiving, or accepting on a socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded, or broke the handshake.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The bearer token was missing or rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A registry operation failed.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A direct store lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Binding or serving a listener failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}
