//! Declaration checking and deadwood counting for 13-card hands.
//!
//! A hand is a valid declaration when every card sits in a meld, the
//! melds include at least two sequences, and at least one sequence is
//! pure (no jokers or wild-rank cards). Deadwood is the minimal point
//! total of unmelded cards over all partitions; without a pure sequence
//! the whole hand counts.

use std::fmt;

use crate::card::{Card, Rank, Suit};

/// Outcome of evaluating a hand against the wild joker in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandEvaluation {
    /// Whether the hand is a valid winning declaration.
    pub is_valid: bool,
    /// Uncapped point total of unmelded cards. Zero for valid hands.
    pub deadwood: u32,
}

/// Checks declarations and counts deadwood.
///
/// Object-safe so a room can carry house-rule variants behind a trait
/// object without the game loop caring which one is plugged in.
pub trait HandValidator: fmt::Debug + Send + Sync {
    /// Evaluates `hand` with `wild_joker` in force. Printed jokers and
    /// every card sharing the wild joker's rank act as wilds and score
    /// zero points.
    fn evaluate(&self, hand: &[Card], wild_joker: Card) -> HandEvaluation;
}

/// Default [`HandValidator`]: exhaustive backtracking over meld
/// partitions. Hands are 13 cards so the search space is small.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeldDetector;

impl MeldDetector {
    pub fn new() -> Self {
        Self
    }
}

impl HandValidator for MeldDetector {
    fn evaluate(&self, hand: &[Card], wild_joker: Card) -> HandEvaluation {
        let wild_rank = (!wild_joker.is_joker()).then_some(wild_joker.rank);

        let mut naturals = Vec::with_capacity(hand.len());
        let mut wilds = 0usize;
        let mut full_points = 0u32;
        for &card in hand {
            if card.is_joker() || Some(card.rank) == wild_rank {
                wilds += 1;
            } else {
                full_points += card.point_value();
                naturals.push(card);
            }
        }
        // Lowest run position first within each suit, so the head of
        // the slice is always the anchor of any meld it belongs to.
        naturals.sort_by_key(|c| (c.suit, c.rank.run_position()));

        let mut solver = Solver { min_deadwood: u32::MAX, valid: false };
        solver.search(&naturals, wilds, 0, 0, 0);

        let deadwood = if solver.valid { 0 } else { solver.min_deadwood.min(full_points) };
        HandEvaluation { is_valid: solver.valid, deadwood }
    }
}

enum CandidateKind {
    Set,
    Sequence,
}

/// One meld that could absorb the anchor card: the naturals it uses
/// (anchor included) and how many wilds it consumes.
struct Candidate {
    naturals: Vec<Card>,
    wilds: usize,
    kind: CandidateKind,
}

struct Solver {
    /// Minimal deadwood among partitions containing a pure sequence.
    min_deadwood: u32,
    valid: bool,
}

impl Solver {
    fn search(&mut self, remaining: &[Card], wilds: usize, deadwood: u32, seqs: u32, pure: u32) {
        if self.valid {
            return;
        }
        // A branch that already leaked points can neither validate nor
        // beat the best partition found so far.
        if deadwood > 0 && deadwood >= self.min_deadwood {
            return;
        }
        let Some(&anchor) = remaining.first() else {
            // Leftover wilds attach to any sequence, so they never
            // block a declaration and never count as deadwood.
            if pure >= 1 {
                self.min_deadwood = self.min_deadwood.min(deadwood);
                if deadwood == 0 && seqs >= 2 {
                    self.valid = true;
                }
            }
            return;
        };

        let mut candidates = sequence_candidates(anchor, remaining, wilds);
        candidates.extend(set_candidates(anchor, remaining, wilds));
        for cand in candidates {
            let mut next = remaining.to_vec();
            for natural in &cand.naturals {
                remove_first(&mut next, *natural);
            }
            let (seqs, pure) = match cand.kind {
                CandidateKind::Set => (seqs, pure),
                CandidateKind::Sequence if cand.wilds == 0 => (seqs + 1, pure + 1),
                CandidateKind::Sequence => (seqs + 1, pure),
            };
            self.search(&next, wilds - cand.wilds, deadwood, seqs, pure);
        }

        // Or leave the anchor unmelded.
        self.search(&remaining[1..], wilds, deadwood + anchor.point_value(), seqs, pure);
    }
}

fn remove_first(cards: &mut Vec<Card>, card: Card) {
    if let Some(idx) = cards.iter().position(|c| *c == card) {
        cards.remove(idx);
    }
}

fn natural_at(remaining: &[Card], suit: Suit, position: u8) -> Option<Card> {
    if !(1..=13).contains(&position) {
        return None;
    }
    let rank = Rank::STANDARD[position as usize - 1];
    let card = Card::new(rank, suit);
    remaining.contains(&card).then_some(card)
}

/// All sequences that could contain `anchor`. Lower positions in the
/// anchor's suit are never in `remaining` (the slice is sorted and the
/// anchor is its head), so below the anchor only wilds can sit; above
/// it we take naturals where present and wilds where not. Position 14
/// is the ace-high slot.
fn sequence_candidates(anchor: Card, remaining: &[Card], wilds: usize) -> Vec<Candidate> {
    let suit = anchor.suit;
    let p0 = anchor.rank.run_position();
    let mut out = Vec::new();

    for below in 0..=wilds.min(p0 as usize - 1) {
        let mut naturals = vec![anchor];
        let mut used_wilds = below;
        let mut len = below + 1;
        if len >= 3 {
            out.push(Candidate {
                naturals: naturals.clone(),
                wilds: used_wilds,
                kind: CandidateKind::Sequence,
            });
        }
        for pos in p0 + 1..=14 {
            if let Some(card) = natural_at(remaining, suit, pos) {
                naturals.push(card);
            } else if used_wilds < wilds {
                used_wilds += 1;
            } else {
                break;
            }
            len += 1;
            if len >= 3 {
                out.push(Candidate {
                    naturals: naturals.clone(),
                    wilds: used_wilds,
                    kind: CandidateKind::Sequence,
                });
            }
        }
    }

    // Ace-high runs descend from position 14 instead.
    if anchor.rank == Rank::Ace {
        let mut naturals = vec![anchor];
        let mut used_wilds = 0;
        let mut len = 1;
        for pos in (2..=13).rev() {
            if let Some(card) = natural_at(remaining, suit, pos) {
                naturals.push(card);
            } else if used_wilds < wilds {
                used_wilds += 1;
            } else {
                break;
            }
            len += 1;
            if len >= 3 {
                out.push(Candidate {
                    naturals: naturals.clone(),
                    wilds: used_wilds,
                    kind: CandidateKind::Sequence,
                });
            }
        }
    }

    out
}

/// All sets (3 or 4 cards, distinct suits) that could contain `anchor`.
fn set_candidates(anchor: Card, remaining: &[Card], wilds: usize) -> Vec<Candidate> {
    let mut others: Vec<Card> = Vec::new();
    for suit in Suit::STANDARD {
        if suit == anchor.suit {
            continue;
        }
        let card = Card::new(anchor.rank, suit);
        if remaining.contains(&card) {
            others.push(card);
        }
    }

    let mut out = Vec::new();
    for mask in 0u8..(1 << others.len()) {
        let mut naturals = vec![anchor];
        for (i, card) in others.iter().enumerate() {
            if mask & (1 << i) != 0 {
                naturals.push(*card);
            }
        }
        for used_wilds in 0..=wilds {
            let total = naturals.len() + used_wilds;
            if (3..=4).contains(&total) {
                out.push(Candidate {
                    naturals: naturals.clone(),
                    wilds: used_wilds,
                    kind: CandidateKind::Set,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    // A wild joker whose rank appears nowhere in the crafted hands.
    fn inert_wild() -> Card {
        c(Rank::Nine, Suit::Diamonds)
    }

    #[test]
    fn test_evaluate_two_pure_sequences_and_sets_is_valid() {
        let hand = [
            c(Rank::Ace, Suit::Spades),
            c(Rank::Two, Suit::Spades),
            c(Rank::Three, Suit::Spades),
            c(Rank::Four, Suit::Spades),
            c(Rank::Five, Suit::Hearts),
            c(Rank::Six, Suit::Hearts),
            c(Rank::Seven, Suit::Hearts),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Spades),
            c(Rank::King, Suit::Clubs),
            c(Rank::King, Suit::Diamonds),
            c(Rank::King, Suit::Hearts),
        ];
        let eval = MeldDetector.evaluate(&hand, inert_wild());
        assert!(eval.is_valid);
        assert_eq!(eval.deadwood, 0);
    }

    #[test]
    fn test_evaluate_joker_completes_second_sequence() {
        let hand = [
            c(Rank::Two, Suit::Spades),
            c(Rank::Three, Suit::Spades),
            c(Rank::Four, Suit::Spades),
            c(Rank::Five, Suit::Spades),
            c(Rank::Five, Suit::Hearts),
            c(Rank::Six, Suit::Hearts),
            Card::joker(),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Spades),
            c(Rank::King, Suit::Clubs),
            c(Rank::King, Suit::Diamonds),
            c(Rank::King, Suit::Hearts),
        ];
        let eval = MeldDetector.evaluate(&hand, inert_wild());
        assert!(eval.is_valid);
    }

    #[test]
    fn test_evaluate_wild_rank_card_acts_as_wild() {
        // Wild joker is the five of diamonds, so the five of clubs can
        // stand in for the queen of hearts.
        let wild = c(Rank::Five, Suit::Diamonds);
        let hand = [
            c(Rank::Two, Suit::Spades),
            c(Rank::Three, Suit::Spades),
            c(Rank::Four, Suit::Spades),
            c(Rank::Nine, Suit::Hearts),
            c(Rank::Ten, Suit::Hearts),
            c(Rank::Jack, Suit::Hearts),
            c(Rank::Five, Suit::Clubs),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Spades),
            c(Rank::King, Suit::Clubs),
            c(Rank::King, Suit::Diamonds),
            c(Rank::King, Suit::Hearts),
        ];
        let eval = MeldDetector.evaluate(&hand, wild);
        assert!(eval.is_valid);
    }

    #[test]
    fn test_evaluate_single_sequence_is_not_valid() {
        let hand = [
            c(Rank::Two, Suit::Spades),
            c(Rank::Three, Suit::Spades),
            c(Rank::Four, Suit::Spades),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Spades),
            c(Rank::King, Suit::Clubs),
            c(Rank::King, Suit::Diamonds),
            c(Rank::King, Suit::Hearts),
            c(Rank::Seven, Suit::Hearts),
            c(Rank::Nine, Suit::Clubs),
            c(Rank::Jack, Suit::Diamonds),
            c(Rank::Ace, Suit::Diamonds),
        ];
        let eval = MeldDetector.evaluate(&hand, c(Rank::Eight, Suit::Diamonds));
        assert!(!eval.is_valid);
        // Sequence and both sets meld; the four loose cards count.
        assert_eq!(eval.deadwood, 7 + 9 + 10 + 10);
    }

    #[test]
    fn test_evaluate_no_pure_sequence_counts_whole_hand() {
        let hand = [
            c(Rank::Ace, Suit::Spades),
            c(Rank::Three, Suit::Spades),
            c(Rank::Five, Suit::Spades),
            c(Rank::Seven, Suit::Spades),
            c(Rank::Ten, Suit::Spades),
            c(Rank::Queen, Suit::Spades),
            c(Rank::Ace, Suit::Hearts),
            c(Rank::Three, Suit::Hearts),
            c(Rank::Five, Suit::Hearts),
            c(Rank::Seven, Suit::Hearts),
            c(Rank::Ten, Suit::Hearts),
            c(Rank::Queen, Suit::Hearts),
            c(Rank::King, Suit::Diamonds),
        ];
        let eval = MeldDetector.evaluate(&hand, inert_wild());
        assert!(!eval.is_valid);
        assert_eq!(eval.deadwood, 100);
    }

    #[test]
    fn test_evaluate_ace_high_sequence_is_pure() {
        let hand = [
            c(Rank::Queen, Suit::Spades),
            c(Rank::King, Suit::Spades),
            c(Rank::Ace, Suit::Spades),
            c(Rank::Two, Suit::Hearts),
            c(Rank::Three, Suit::Hearts),
            c(Rank::Four, Suit::Hearts),
            c(Rank::Five, Suit::Hearts),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Hearts),
            c(Rank::Jack, Suit::Clubs),
            c(Rank::Jack, Suit::Diamonds),
            c(Rank::Jack, Suit::Hearts),
        ];
        let eval = MeldDetector.evaluate(&hand, inert_wild());
        assert!(eval.is_valid);
    }

    #[test]
    fn test_evaluate_deadwood_uses_longest_melds() {
        let hand = [
            c(Rank::Two, Suit::Spades),
            c(Rank::Three, Suit::Spades),
            c(Rank::Four, Suit::Spades),
            c(Rank::Five, Suit::Spades),
            c(Rank::Six, Suit::Spades),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Spades),
            c(Rank::Nine, Suit::Hearts),
            c(Rank::Jack, Suit::Hearts),
            c(Rank::King, Suit::Hearts),
            c(Rank::Ace, Suit::Diamonds),
            c(Rank::Seven, Suit::Clubs),
        ];
        let eval = MeldDetector.evaluate(&hand, c(Rank::Eight, Suit::Diamonds));
        assert!(!eval.is_valid);
        // Whole five-card run and the queen set meld.
        assert_eq!(eval.deadwood, 9 + 10 + 10 + 10 + 7);
    }

    #[test]
    fn test_evaluate_wilds_below_anchor_form_high_sequence() {
        // Two jokers wrap the king into a queen-king-ace run.
        let hand = [
            c(Rank::King, Suit::Spades),
            Card::joker(),
            Card::joker(),
            c(Rank::Two, Suit::Hearts),
            c(Rank::Three, Suit::Hearts),
            c(Rank::Four, Suit::Hearts),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Hearts),
            c(Rank::Jack, Suit::Clubs),
            c(Rank::Jack, Suit::Diamonds),
            c(Rank::Jack, Suit::Hearts),
            c(Rank::Jack, Suit::Spades),
        ];
        let eval = MeldDetector.evaluate(&hand, inert_wild());
        assert!(eval.is_valid);
    }
}
