//! Card and deck primitives for Meldcore.
//!
//! Everything the game layer needs to reason about physical cards:
//!
//! - [`Card`], [`Rank`], [`Suit`] — immutable value types compared by
//!   (rank, suit), never by identity.
//! - [`Deck`] — an ordered pile of cards with Fisher–Yates shuffling.
//! - [`HandValidator`] / [`MeldDetector`] — declaration checking and
//!   deadwood counting for 13-card Rummy hands.

mod card;
mod deck;
mod meld;

pub use card::{Card, Rank, Suit};
pub use deck::Deck;
pub use meld::{HandEvaluation, HandValidator, MeldDetector};

/// Cards dealt to each player at the start of a hand.
pub const HAND_SIZE: usize = 13;
