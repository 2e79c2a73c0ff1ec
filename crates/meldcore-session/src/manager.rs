//! Session registry: one record per authenticated player.
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself — it is owned by a
//! single task (the server's connection handler) and shared through a
//! mutex at a higher level. Keeping it plain avoids hidden locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use meldcore_protocol::PlayerId;
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Registry of every player currently connected to the server, or
/// recently disconnected and still within their grace period.
pub struct SessionManager {
    /// One session per player, in any state.
    sessions: HashMap<PlayerId, Session>,

    /// Reconnection token → player, kept in sync with `sessions` so a
    /// reconnect never scans.
    by_token: HashMap<String, PlayerId>,

    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { sessions: HashMap::new(), by_token: HashMap::new(), config }
    }

    /// Creates a session for a freshly authenticated player, minting a
    /// reconnection token. A lingering disconnected or expired session
    /// for the same player is replaced; a live one is an error.
    pub fn create(&mut self, player_id: PlayerId) -> Result<&Session, SessionError> {
        match self.sessions.get(&player_id) {
            Some(live) if matches!(live.state, SessionState::Connected) => {
                return Err(SessionError::AlreadyConnected(player_id));
            }
            Some(stale) => {
                self.by_token.remove(&stale.reconnect_token);
            }
            None => {}
        }

        let token = mint_token();
        self.by_token.insert(token.clone(), player_id);
        let session = self.sessions.entry(player_id).or_insert(Session {
            player_id,
            state: SessionState::Connected,
            reconnect_token: String::new(),
        });
        session.state = SessionState::Connected;
        session.reconnect_token = token;

        tracing::info!(%player_id, "session created");
        Ok(session)
    }

    /// Marks a player as disconnected and stamps the deadline their
    /// reconnection token stays valid until.
    pub fn disconnect(&mut self, player_id: PlayerId) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.grace();
        match self.sessions.get_mut(&player_id) {
            Some(session) => {
                session.state = SessionState::Disconnected { deadline };
                tracing::info!(%player_id, "player disconnected, grace period started");
                Ok(())
            }
            None => Err(SessionError::NotFound(player_id)),
        }
    }

    /// Re-attaches a player by their reconnection token. Fails if the
    /// token is unknown or the deadline has already passed.
    pub fn reconnect(&mut self, token: &str) -> Result<&Session, SessionError> {
        let player_id = *self.by_token.get(token).ok_or(SessionError::InvalidToken)?;
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::InvalidToken)?;

        match session.state {
            SessionState::Disconnected { deadline } if Instant::now() < deadline => {
                session.state = SessionState::Connected;
                tracing::info!(%player_id, "player reconnected");
                Ok(session)
            }
            SessionState::Disconnected { .. } => {
                session.state = SessionState::Expired;
                Err(SessionError::SessionExpired(player_id))
            }
            SessionState::Connected => Err(SessionError::AlreadyConnected(player_id)),
            SessionState::Expired => Err(SessionError::SessionExpired(player_id)),
        }
    }

    /// Expires every disconnected session past its deadline. Returns
    /// the players that expired, so the caller can tell their rooms
    /// before [`cleanup_expired`](Self::cleanup_expired) deletes the
    /// data.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let now = Instant::now();
        let mut expired = Vec::new();
        for session in self.sessions.values_mut() {
            let SessionState::Disconnected { deadline } = session.state else { continue };
            if now >= deadline {
                session.state = SessionState::Expired;
                expired.push(session.player_id);
                tracing::info!(
                    player_id = %session.player_id,
                    "session expired (grace period elapsed)"
                );
            }
        }
        expired
    }

    /// Drops expired sessions and invalidates their tokens.
    pub fn cleanup_expired(&mut self) {
        let by_token = &mut self.by_token;
        self.sessions.retain(|_, session| {
            let dead = matches!(session.state, SessionState::Expired);
            if dead {
                by_token.remove(&session.reconnect_token);
            }
            !dead
        });
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Number of sessions in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.reconnect_grace_secs)
    }
}

/// 32 hex characters, 128 bits of entropy. Guessing a live token is
/// computationally infeasible.
fn mint_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
