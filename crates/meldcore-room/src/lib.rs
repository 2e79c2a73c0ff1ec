//! Room layer for Meldcore: tables, actors, and matchmaking.
//!
//! Each room runs as an isolated Tokio task (actor model) owning one
//! [`Table`] — a pure, serializable state machine for a game of Rummy.
//! The actor supplies the turn clock, the start countdown, wallet
//! access, and write-through snapshot persistence.
//!
//! # Key types
//!
//! - [`Table`] — one game as a synchronous state machine
//! - [`RoomManager`] — creates/destroys rooms, matchmaking, routing
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`WalletService`] / [`SnapshotStore`] — pluggable money and
//!   persistence backends
//! - [`TableConfig`] — per-table settings (variant, seats, timers)

#![allow(async_fn_in_trait)]

mod config;
mod deal;
mod error;
mod manager;
mod room;
mod score;
mod store;
mod table;
mod wallet;

pub use config::{
    DEADWOOD_CAP, FIRST_DROP_PENALTY, INVALID_DECLARATION_PENALTY, MAX_MISSED_TURNS, MAX_PLAYERS,
    MIDDLE_DROP_PENALTY, MIN_PLAYERS, PLATFORM_FEE, TableConfig, TableStatus,
};
pub use error::RoomError;
pub use manager::RoomManager;
pub use room::{PlayerSender, RoomHandle, RoomInfo};
pub use store::{InMemoryStore, SnapshotStore, StoreError};
pub use table::{Seat, Settlement, Table, TurnPhase};
pub use wallet::{InMemoryWallet, WalletError, WalletService};
