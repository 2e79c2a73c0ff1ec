//! Error types for the session layer.

/// Errors across a session's lifecycle: authentication, creation,
/// reconnection, expiration.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(meldcore_protocol::PlayerId),

    /// The reconnection token doesn't match anything the server issued.
    #[error("invalid reconnection token")]
    InvalidToken,

    /// The reconnection grace period has elapsed.
    #[error("session expired for player {0}")]
    SessionExpired(meldcore_protocol::PlayerId),

    /// A player can only have one live session at a time.
    #[error("player {0} already has an active session")]
    AlreadyConnected(meldcore_protocol::PlayerId),
}
