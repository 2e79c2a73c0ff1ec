//! Session types: the server's record of a connected player.

use std::time::Instant;

use meldcore_protocol::PlayerId;

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player has to reconnect before their
    /// session is expired for good. Set to 0 to disable reconnection.
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { reconnect_grace_secs: 60 }
    }
}

/// Lifecycle of a player's session:
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(deadline)──→ Expired
///       ↑                            │
///       └────────(reconnect)─────────┘
/// ```
///
/// A disconnected player keeps their seat until their deadline passes;
/// an expired session is dead and the player must authenticate again.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Player is actively connected.
    Connected,

    /// Player dropped their connection and may resume with their token
    /// until `deadline`.
    Disconnected { deadline: Instant },

    /// Deadline passed; the session is waiting for cleanup.
    Expired,
}

/// A single player's session on the server. Created when a player
/// authenticates; lives until the grace period after their last
/// disconnect runs out.
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,

    pub state: SessionState,

    /// Secret the client presents to re-attach after a connection
    /// drop, instead of authenticating again. 32 hex characters
    /// (128 bits).
    pub reconnect_token: String,
}
