//! # Meldcore
//!
//! Server-authoritative backend for real-time multiplayer Indian Rummy.
//!
//! Meldcore runs each table as an isolated actor with its own turn
//! clock, settles stakes through a pluggable wallet, and persists
//! table state so games survive a restart. Clients speak a JSON
//! protocol over WebSockets; identity comes from a pluggable
//! [`Authenticator`], and dropped connections can resume their seat
//! within a grace period.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meldcore::prelude::*;
//! use meldcore::{InMemoryStore, InMemoryWallet};
//!
//! /// Accepts any numeric token as a player ID. Development only.
//! struct DevAuth;
//!
//! impl Authenticator for DevAuth {
//!     async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
//!         let id: u64 = token
//!             .parse()
//!             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
//!         Ok(PlayerId(id))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MeldError> {
//!     let server = MeldServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build(DevAuth, Arc::new(InMemoryWallet::new()), Arc::new(InMemoryStore::new()))
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::MeldError;
pub use server::{MeldServer, MeldServerBuilder, PROTOCOL_VERSION};

// Re-export the sub-crates so embedders depend on `meldcore` alone.
pub use meldcore_cards::{Card, Rank, Suit};
pub use meldcore_protocol::{
    ClientEvent, DeckSide, Envelope, JoinRequest, Payload, PlayerId, PlayerStatus, PoolKind,
    Recipient, RoomId, ScoreEntry, SeatView, ServerEvent, SystemMessage, VariantConfig,
};
pub use meldcore_room::{
    InMemoryStore, InMemoryWallet, RoomError, RoomManager, SnapshotStore, TableConfig,
    WalletError, WalletService,
};
pub use meldcore_session::{Authenticator, SessionConfig, SessionError, SessionManager};

/// The common surface for building and talking to a server.
pub mod prelude {
    pub use crate::{
        Authenticator, Card, ClientEvent, DeckSide, Envelope, JoinRequest, MeldError, MeldServer,
        MeldServerBuilder, PROTOCOL_VERSION, Payload, PlayerId, PoolKind, RoomId, ServerEvent,
        SessionConfig, SessionError, SystemMessage, VariantConfig,
    };
}

/// Installs a global `tracing` subscriber that reads the `RUST_LOG`
/// environment variable. Call once at startup; a second call panics,
/// so embedders with their own subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
