//! The `Deck`: an ordered pile of cards.
//!
//! A single pack is 54 cards (52 standard + 2 printed jokers). Two-player
//! rooms play with one pack; larger rooms need two packs so that 13-card
//! hands remain dealable. The engine maintains the invariant that the
//! union of closed deck, open deck, player hands and the wild joker is
//! exactly the shuffled pack multiset at all times.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::card::{Card, Rank, Suit};

/// Number of cards in one pack (52 standard + 2 printed jokers).
pub const PACK_SIZE: usize = 54;

/// An ordered pile of cards. The top of the pile is the end of the
/// backing vector, so draws are O(1) pops.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// An empty pile.
    pub fn empty() -> Self {
        Self { cards: Vec::new() }
    }

    /// Builds `packs` full packs, unshuffled.
    pub fn standard(packs: usize) -> Self {
        let mut cards = Vec::with_capacity(packs * PACK_SIZE);
        for _ in 0..packs {
            for suit in Suit::STANDARD {
                for rank in Rank::STANDARD {
                    cards.push(Card::new(rank, suit));
                }
            }
            cards.push(Card::joker());
            cards.push(Card::joker());
        }
        Self { cards }
    }

    /// Builds and shuffles `packs` full packs.
    pub fn shuffled(packs: usize, rng: &mut impl Rng) -> Self {
        let mut deck = Self::standard(packs);
        deck.shuffle(rng);
        deck
    }

    /// Fisher–Yates shuffle of the whole pile.
    pub fn shuffle(&mut self, rng: &mut impl Rng) {
        self.cards.shuffle(rng);
    }

    /// Removes and returns the top card.
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Places a card on top.
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Returns the top card without removing it.
    pub fn peek(&self) -> Option<Card> {
        self.cards.last().copied()
    }

    /// Returns all cards, clearing the pile.
    pub fn take_all(&mut self) -> Vec<Card> {
        std::mem::take(&mut self.cards)
    }

    /// Adds cards to the pile (on top, in order).
    pub fn extend(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.cards.extend(cards);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Borrow of the backing cards, bottom first. Used by integrity
    /// checks and snapshots.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_single_pack_has_54_cards() {
        let deck = Deck::standard(1);
        assert_eq!(deck.len(), PACK_SIZE);
    }

    #[test]
    fn test_single_pack_card_multiplicities() {
        // 52 distinct standard cards once each, the printed joker twice.
        let deck = Deck::standard(1);
        let mut counts: HashMap<Card, usize> = HashMap::new();
        for card in deck.cards() {
            *counts.entry(*card).or_default() += 1;
        }
        assert_eq!(counts.len(), 53);
        assert_eq!(counts[&Card::joker()], 2);
        for (card, count) in &counts {
            if !card.is_joker() {
                assert_eq!(*count, 1, "duplicate {card}");
            }
        }
    }

    #[test]
    fn test_shuffle_preserves_multiset() {
        let mut rng = rand::rng();
        let reference = Deck::standard(2);
        let mut shuffled = Deck::standard(2);
        shuffled.shuffle(&mut rng);

        let mut a: Vec<Card> = reference.cards().to_vec();
        let mut b: Vec<Card> = shuffled.cards().to_vec();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_draw_removes_top_card() {
        let mut deck = Deck::standard(1);
        let top = deck.peek().unwrap();
        let drawn = deck.draw().unwrap();
        assert_eq!(top, drawn);
        assert_eq!(deck.len(), PACK_SIZE - 1);
    }

    #[test]
    fn test_draw_from_empty_returns_none() {
        let mut deck = Deck::empty();
        assert!(deck.draw().is_none());
    }
}
