//! Error types for the room layer.

use meldcore_cards::Card;
use meldcore_protocol::{PlayerId, RoomId};

use crate::{StoreError, WalletError};

/// Errors from room operations and rejected table actions.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// No seats left.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is already seated in a room.
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player is not seated in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// The player is not seated anywhere.
    #[error("player {0} is not in any room")]
    NotInAnyRoom(PlayerId),

    /// Action attempted by a player whose turn it is not.
    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),

    /// The turn is in the wrong phase for this action, e.g. a discard
    /// before drawing or a second draw.
    #[error("invalid turn phase: {0}")]
    InvalidPhase(String),

    /// A discard or declaration named a card the player does not hold.
    #[error("card {0} is not in hand")]
    CardNotInHand(Card),

    /// No card can be drawn from the requested pile.
    #[error("deck exhausted")]
    DeckExhausted,

    /// The room is in a lifecycle state that disallows the operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// A join request with out-of-range parameters, rejected before
    /// any room is touched.
    #[error("invalid join request: {0}")]
    InvalidRequest(String),

    /// The player cannot cover the entry fee.
    #[error("player {0} has insufficient balance")]
    InsufficientBalance(PlayerId),

    /// Persistence failed repeatedly; the room refuses further actions
    /// rather than risk diverging from its stored state.
    #[error("room {0} is frozen after a persistence failure")]
    Frozen(RoomId),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RoomError {
    /// HTTP-style code reported to clients in `Error` events.
    pub fn code(&self) -> u16 {
        match self {
            RoomError::NotFound(_) => 404,
            RoomError::RoomFull(_) | RoomError::AlreadyInRoom(..) => 409,
            RoomError::NotInRoom(..) | RoomError::NotInAnyRoom(_) => 403,
            RoomError::NotYourTurn(_)
            | RoomError::InvalidPhase(_)
            | RoomError::CardNotInHand(_)
            | RoomError::DeckExhausted
            | RoomError::InvalidState(_) => 400,
            RoomError::InvalidRequest(_) => 422,
            RoomError::InsufficientBalance(_) => 402,
            RoomError::Frozen(_) | RoomError::Unavailable(_) => 503,
            RoomError::Wallet(_) | RoomError::Store(_) => 500,
        }
    }
}
