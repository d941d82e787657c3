//! Error types for the hub layer.
//!
//! Connection faults never show up here: the hub handles them by dropping
//! the connection. These errors only describe a hub that is gone or a
//! token that didn't resolve.

/// Errors returned by [`HubHandle`](crate::HubHandle) queries.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub's coordination task has stopped.
    #[error("hub is not running")]
    Stopped,
}

/// Errors returned by an [`Authenticator`](crate::Authenticator).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("missing token")]
    MissingToken,

    /// The token was invalid, expired, or rejected by the provider.
    #[error("authentication failed: {0}")]
    InvalidToken(String),
}
