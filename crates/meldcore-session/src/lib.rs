//! Player identity and connection lifecycle for Meldcore.
//!
//! Three concerns live here: the [`Authenticator`] hook that turns a
//! handshake token into a [`PlayerId`](meldcore_protocol::PlayerId),
//! the [`SessionManager`] registry of who is connected, and
//! token-based reconnection within a grace period so a dropped WiFi
//! link does not cost a player their seat. The room layer consults
//! sessions to decide who may hold a seat.

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod manager;
mod session;

pub use auth::Authenticator;
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
