//! Authentication hook for resolving a bearer token to an identity.
//!
//! Token validation belongs to the auth provider (Auth0, a JWT verifier,
//! and so on). The server only defines the [`Authenticator`] trait and calls
//! it during the realtime handshake and on every REST request. The result
//! is an [`ExternalId`]; mapping it to an internal user is storage's job.

use std::future::Future;

use kaboo_protocol::ExternalId;

use crate::AuthError;

/// Validates a client's bearer token and returns its subject.
///
/// # Example
///
/// ```rust
/// use kaboo_hub::{AuthError, Authenticator};
/// use kaboo_protocol::ExternalId;
///
/// /// Accepts exactly one hard-coded token.
/// struct SingleToken;
///
/// impl Authenticator for SingleToken {
///     async fn authenticate(&self, token: &str) -> Result<ExternalId, AuthError> {
///         if token == "letmein" {
///             Ok(ExternalId::new("auth0|1"))
///         } else {
///             Err(AuthError::InvalidToken("unknown token".into()))
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the external subject.
    ///
    /// # Returns
    /// - `Ok(ExternalId)`: the token is valid
    /// - `Err(AuthError)`: the token is missing, invalid, or expired
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ExternalId, AuthError>> + Send;
}

/// Development authenticator: the token *is* the external id.
///
/// Never use this outside local development; any client can claim any
/// identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<ExternalId, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(ExternalId::new(token))
    }
}
