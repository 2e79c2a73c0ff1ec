//! Authentication hook for validating player identity.
//!
//! Meldcore does not implement authentication itself. The server is
//! handed an [`Authenticator`]; the handshake passes the client's
//! token through it and gets back a [`PlayerId`]. Production plugs in
//! a JWT or platform-account check; tests use a permissive stub.

use meldcore_protocol::PlayerId;

use crate::SessionError;

/// Turns a client-supplied token into a player identity, or rejects
/// the handshake.
///
/// # Example
///
/// ```rust
/// use meldcore_session::{Authenticator, SessionError};
/// use meldcore_protocol::PlayerId;
///
/// /// Recognizes tokens of the form `guest-<n>`. Development only.
/// struct GuestAuth;
///
/// impl Authenticator for GuestAuth {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<PlayerId, SessionError> {
///         let id = token
///             .strip_prefix("guest-")
///             .and_then(|n| n.parse().ok())
///             .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))?;
///         Ok(PlayerId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the token a client sent in its
    /// [`SystemMessage::Handshake`](meldcore_protocol::SystemMessage::Handshake).
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send;
}
