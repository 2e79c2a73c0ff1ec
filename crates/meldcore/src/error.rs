//! Unified error type for the Meldcore server.

use meldcore_protocol::ProtocolError;
use meldcore_room::RoomError;
use meldcore_session::SessionError;
use meldcore_transport::TransportError;

/// Any failure a server embedder can see, one layer per variant. The
/// `#[from]` impls let `?` lift sub-crate errors without ceremony.
#[derive(Debug, thiserror::Error)]
pub enum MeldError {
    /// Bind, accept, send, or recv went wrong on the wire.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded, decoded, or understood.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Authentication or reconnection failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room rejected a join, leave, or game action.
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_layer_error_lifts_into_meld_error() {
        let transport: MeldError = TransportError::Closed("gone".into()).into();
        assert!(matches!(transport, MeldError::Transport(_)));
        assert!(transport.to_string().contains("gone"));

        let protocol: MeldError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(protocol, MeldError::Protocol(_)));

        let session: MeldError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(session, MeldError::Session(_)));

        let room: MeldError = RoomError::NotFound(meldcore_protocol::RoomId(1)).into();
        assert!(matches!(room, MeldError::Room(_)));
    }

    #[test]
    fn test_transparent_display_passes_inner_message_through() {
        let err: MeldError = SessionError::InvalidToken.into();
        assert_eq!(err.to_string(), SessionError::InvalidToken.to_string());
    }
}
