//! Protocol-layer errors: anything that goes wrong between bytes and
//! typed messages.

/// Errors from encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or an
    /// unknown `type` tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Structurally valid but logically impossible, e.g. a handshake
    /// with version 0.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
