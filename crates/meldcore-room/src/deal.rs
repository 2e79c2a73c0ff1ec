//! Round setup: dealer selection, shuffling, and dealing.

use rand::Rng;

use meldcore_cards::{Card, Deck, HAND_SIZE};
use meldcore_protocol::{PlayerId, PlayerStatus, Recipient, ServerEvent};

use crate::config::TableStatus;
use crate::table::{Events, Table, TurnPhase};

/// Starts a round on `table`: fresh shuffle, dealer (cut on the first
/// round, rotation afterwards), thirteen cards per seat, wild joker,
/// first open card, first turn (lowest cut, or the seat after the
/// dealer on later rounds). Players dropped in the previous round
/// rejoin; eliminated and departed seats stay out.
pub(crate) fn begin_round(table: &mut Table, rng: &mut impl Rng, cut_for_dealer: bool) -> Events {
    table.round += 1;
    for seat in &mut table.seats {
        seat.hand.clear();
        seat.drawn = None;
        seat.round_points = 0;
        seat.missed_turns = 0;
        seat.has_played = false;
        if seat.status == PlayerStatus::Dropped {
            seat.status = PlayerStatus::Active;
        }
    }

    let mut closed = Deck::shuffled(table.config.packs(), rng);
    let mut events = Vec::new();

    let first;
    if cut_for_dealer {
        let mut cuts: Vec<(usize, Card)> = Vec::new();
        for idx in table.active_indices() {
            // A pack always outnumbers the seats.
            let card = closed.draw().expect("cut from a full pack");
            cuts.push((idx, card));
        }
        table.dealer = pick_dealer(&cuts);
        first = pick_first_turn(&cuts);
        let draws: Vec<(PlayerId, Card)> = cuts
            .iter()
            .map(|&(idx, card)| (table.seats[idx].player_id, card))
            .collect();
        closed.extend(cuts.iter().map(|&(_, c)| c));
        closed.shuffle(rng);
        events.push((
            Recipient::All,
            ServerEvent::DealerAssigned {
                dealer: table.seats[table.dealer].player_id,
                first_player: table.seats[first].player_id,
                draws,
            },
        ));
    } else {
        table.dealer = table.next_active(table.dealer).unwrap_or(table.dealer);
        first = table.next_active(table.dealer).unwrap_or(table.dealer);
        events.push((
            Recipient::All,
            ServerEvent::DealerAssigned {
                dealer: table.seats[table.dealer].player_id,
                first_player: table.seats[first].player_id,
                draws: Vec::new(),
            },
        ));
    }

    // Deal one card at a time, starting left of the dealer.
    let order = deal_order(table);
    for _ in 0..HAND_SIZE {
        for &idx in &order {
            let card = closed.draw().expect("pack covers thirteen cards per seat");
            table.seats[idx].hand.push(card);
        }
    }
    for &idx in &order {
        let seat = &table.seats[idx];
        events.push((
            Recipient::Player(seat.player_id),
            ServerEvent::CardsDealt { hand: seat.hand.clone() },
        ));
    }

    // The wild joker is cut from the shuffled stock. Printed jokers
    // cannot be the wild; any skipped on the way stay in the stock.
    let mut skipped = Vec::new();
    let wild_joker = loop {
        let card = closed.draw().expect("stock contains non-joker cards");
        if card.is_joker() {
            skipped.push(card);
        } else {
            break card;
        }
    };
    closed.extend(skipped);
    table.wild_joker = Some(wild_joker);

    let open_card = closed.draw().expect("stock covers the first open card");
    table.open = Deck::empty();
    table.open.push(open_card);
    table.closed = closed;
    events.push((Recipient::All, ServerEvent::DeckSetup { wild_joker, open_card }));

    table.status = TableStatus::InProgress;
    table.phase = TurnPhase::AwaitingDraw;
    events.extend(table.start_turn_at(first));

    tracing::info!(
        room_id = %table.room_id,
        round = table.round,
        dealer = %table.seats[table.dealer].player_id,
        %wild_joker,
        "round dealt"
    );
    events
}

/// Active seats in dealing order, starting left of the dealer and
/// ending with the dealer.
fn deal_order(table: &Table) -> Vec<usize> {
    let n = table.seats.len();
    (1..=n)
        .map(|i| (table.dealer + i) % n)
        .filter(|&i| table.seats[i].status == PlayerStatus::Active)
        .collect()
}

/// Highest cut deals. Ranks compare ace-high; equal ranks fall back to
/// suit weight (spades down to clubs), then to seat order.
pub(crate) fn pick_dealer(cuts: &[(usize, Card)]) -> usize {
    let mut best = cuts[0];
    for &(idx, card) in &cuts[1..] {
        let key = (card.dealer_rank(), card.suit.dealer_weight());
        let best_key = (best.1.dealer_rank(), best.1.suit.dealer_weight());
        if key > best_key {
            best = (idx, card);
        }
    }
    best.0
}

/// Lowest cut opens the round, with the mirrored tie-break: lower suit
/// weight first, then seat order.
pub(crate) fn pick_first_turn(cuts: &[(usize, Card)]) -> usize {
    let mut best = cuts[0];
    for &(idx, card) in &cuts[1..] {
        let key = (card.dealer_rank(), card.suit.dealer_weight());
        let best_key = (best.1.dealer_rank(), best.1.suit.dealer_weight());
        if key < best_key {
            best = (idx, card);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use meldcore_cards::{Rank, Suit};

    use super::*;

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    #[test]
    fn test_pick_dealer_highest_rank_wins() {
        let cuts = [
            (0, c(Rank::Nine, Suit::Hearts)),
            (1, c(Rank::Ace, Suit::Clubs)),
            (2, c(Rank::King, Suit::Spades)),
        ];
        assert_eq!(pick_dealer(&cuts), 1);
    }

    #[test]
    fn test_pick_dealer_tie_broken_by_suit() {
        let cuts = [
            (0, c(Rank::Queen, Suit::Diamonds)),
            (1, c(Rank::Queen, Suit::Spades)),
            (2, c(Rank::Two, Suit::Hearts)),
        ];
        assert_eq!(pick_dealer(&cuts), 1);
    }

    #[test]
    fn test_pick_dealer_full_tie_keeps_earlier_seat() {
        // Two packs can cut identical cards.
        let cuts = [
            (0, c(Rank::Queen, Suit::Spades)),
            (1, c(Rank::Queen, Suit::Spades)),
        ];
        assert_eq!(pick_dealer(&cuts), 0);
    }

    #[test]
    fn test_pick_dealer_joker_never_deals() {
        let cuts = [(0, Card::joker()), (1, c(Rank::Two, Suit::Clubs))];
        assert_eq!(pick_dealer(&cuts), 1);
    }

    #[test]
    fn test_pick_first_turn_lowest_rank_opens() {
        let cuts = [
            (0, c(Rank::Nine, Suit::Hearts)),
            (1, c(Rank::Ace, Suit::Clubs)),
            (2, c(Rank::Two, Suit::Spades)),
        ];
        assert_eq!(pick_first_turn(&cuts), 2);
    }

    #[test]
    fn test_pick_first_turn_tie_broken_by_suit() {
        let cuts = [
            (0, c(Rank::Five, Suit::Spades)),
            (1, c(Rank::Five, Suit::Clubs)),
            (2, c(Rank::King, Suit::Hearts)),
        ];
        assert_eq!(pick_first_turn(&cuts), 1);
    }

    #[test]
    fn test_dealer_and_first_turn_differ_on_distinct_cuts() {
        let cuts = [
            (0, c(Rank::Three, Suit::Hearts)),
            (1, c(Rank::Jack, Suit::Hearts)),
            (2, c(Rank::Seven, Suit::Hearts)),
        ];
        assert_eq!(pick_dealer(&cuts), 1);
        assert_eq!(pick_first_turn(&cuts), 0);
    }
}
