//! Wire protocol for Meldcore.
//!
//! Defines what clients and servers say to each other:
//!
//! - **Types** ([`Envelope`], [`ClientEvent`], [`ServerEvent`],
//!   [`SystemMessage`]) — the structures that travel on the wire.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how they become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer sits between transport (raw frames) and the game
//! crates. It knows nothing about connections, sessions, or rooms.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, DeckSide, Envelope, JoinRequest, Payload, PlayerId, PlayerStatus, PoolKind,
    Recipient, RoomId, ScoreEntry, SeatView, ServerEvent, SystemMessage, VariantConfig,
};
