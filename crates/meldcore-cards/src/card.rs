//! The `Card` value type and its rank/suit components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Card rank. `Joker` is the printed joker, not the wild joker —
/// the wild joker is an ordinary card picked at deal time.
///
/// Serialized as the short face label (`"A"`, `"2"`..`"10"`, `"J"`,
/// `"Q"`, `"K"`, `"JOKER"`) so clients render it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "JOKER")]
    Joker,
}

impl Rank {
    /// All non-joker ranks, in run order.
    pub const STANDARD: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Position of the rank within a run, ace low (A=1 .. K=13).
    ///
    /// The ace also matches position 14 for Q-K-A runs; the meld
    /// detector handles that case explicitly. Returns 0 for jokers,
    /// which never occupy a run position of their own.
    pub fn run_position(self) -> u8 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
            Rank::Joker => 0,
        }
    }
}

/// Card suit. `Joker` is only ever paired with `Rank::Joker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
    #[serde(rename = "JOKER")]
    Joker,
}

impl Suit {
    /// The four standard suits.
    pub const STANDARD: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// Tie-break order for dealer selection: spades highest, then
    /// hearts, diamonds, clubs.
    pub fn dealer_weight(self) -> u8 {
        match self {
            Suit::Spades => 4,
            Suit::Hearts => 3,
            Suit::Diamonds => 2,
            Suit::Clubs => 1,
            Suit::Joker => 0,
        }
    }
}

/// A playing card. `Copy` value type; equality is (rank, suit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    /// The printed joker card.
    pub fn joker() -> Self {
        Self { rank: Rank::Joker, suit: Suit::Joker }
    }

    /// Whether this is a printed joker.
    pub fn is_joker(self) -> bool {
        self.rank == Rank::Joker
    }

    /// Numeric rank used only for dealer-selection comparisons
    /// (2..10 literal, J=11, Q=12, K=13, A=14). Not a scoring value.
    pub fn dealer_rank(self) -> u8 {
        match self.rank {
            Rank::Ace => 14,
            Rank::Joker => 0,
            other => other.run_position(),
        }
    }

    /// Point value for scoring: number cards count face value, face
    /// cards and aces count 10, printed jokers count 0.
    pub fn point_value(self) -> u32 {
        match self.rank {
            Rank::Joker => 0,
            Rank::Ace | Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
            other => other.run_position() as u32,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_joker() {
            return write!(f, "JOKER");
        }
        let rank = match self.rank {
            Rank::Ace => "A",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ten => "10",
            Rank::Joker => "JOKER",
            other => return write!(f, "{} of {:?}", other.run_position(), self.suit),
        };
        write!(f, "{} of {:?}", rank, self.suit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_equality_is_by_rank_and_suit() {
        let a = Card::new(Rank::Queen, Suit::Hearts);
        let b = Card::new(Rank::Queen, Suit::Hearts);
        let c = Card::new(Rank::Queen, Suit::Spades);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_dealer_rank_ace_is_highest() {
        assert_eq!(Card::new(Rank::Ace, Suit::Clubs).dealer_rank(), 14);
        assert_eq!(Card::new(Rank::King, Suit::Clubs).dealer_rank(), 13);
        assert_eq!(Card::new(Rank::Two, Suit::Clubs).dealer_rank(), 2);
        assert_eq!(Card::joker().dealer_rank(), 0);
    }

    #[test]
    fn test_point_values_follow_rummy_rules() {
        assert_eq!(Card::new(Rank::Ace, Suit::Hearts).point_value(), 10);
        assert_eq!(Card::new(Rank::King, Suit::Hearts).point_value(), 10);
        assert_eq!(Card::new(Rank::Ten, Suit::Hearts).point_value(), 10);
        assert_eq!(Card::new(Rank::Seven, Suit::Hearts).point_value(), 7);
        assert_eq!(Card::joker().point_value(), 0);
    }

    #[test]
    fn test_rank_serializes_as_face_label() {
        let json = serde_json::to_string(&Card::new(Rank::Ten, Suit::Hearts)).unwrap();
        assert_eq!(json, r#"{"rank":"10","suit":"hearts"}"#);

        let json = serde_json::to_string(&Card::joker()).unwrap();
        assert_eq!(json, r#"{"rank":"JOKER","suit":"JOKER"}"#);
    }

    #[test]
    fn test_card_round_trips_through_json() {
        for suit in Suit::STANDARD {
            for rank in Rank::STANDARD {
                let card = Card::new(rank, suit);
                let bytes = serde_json::to_vec(&card).unwrap();
                let back: Card = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(card, back);
            }
        }
    }
}
