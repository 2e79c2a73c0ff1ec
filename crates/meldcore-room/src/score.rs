//! Round settlement: scoring, eliminations, prizes, and continuation.

use rand::Rng;

use meldcore_cards::{Card, HandValidator};
use meldcore_protocol::{PlayerStatus, Recipient, ScoreEntry, ServerEvent, VariantConfig};

use crate::config::{DEADWOOD_CAP, PLATFORM_FEE, TableStatus};
use crate::table::{Events, Settlement, Table};
use crate::deal;

/// Settles the round just won by the seat at `winner`.
///
/// Charges every losing hand (capped deadwood for players still in,
/// recorded penalties for the rest), then applies the variant's rules:
/// Points ends the game and moves money immediately, Pool eliminates
/// seats over the threshold, Deals counts down its fixed rounds. Both
/// multi-round variants either crown a winner or deal the next round
/// in place.
pub(crate) fn settle_round(
    table: &mut Table,
    winner: usize,
    validator: &dyn HandValidator,
    rng: &mut impl Rng,
) -> Events {
    let wild = table.wild_joker.unwrap_or_else(Card::joker);

    for idx in table.active_indices() {
        if idx == winner {
            continue;
        }
        let evaluation = validator.evaluate(&table.seats[idx].hand, wild);
        let deadwood = evaluation.deadwood.min(DEADWOOD_CAP);
        // A charge recorded mid-round (invalid declaration) stands even
        // if the hand improved afterwards.
        table.seats[idx].round_points = deadwood.max(table.seats[idx].round_points);
    }
    table.seats[winner].round_points = 0;

    let mut scores = Vec::new();
    for seat in &mut table.seats {
        seat.total_score += seat.round_points;
        scores.push(ScoreEntry {
            player_id: seat.player_id,
            points: seat.round_points,
            total: seat.total_score,
        });
    }
    table.turn = None;

    let winner_id = table.seats[winner].player_id;
    tracing::info!(
        room_id = %table.room_id,
        round = table.round,
        winner = %winner_id,
        "round settled"
    );
    let mut events: Events =
        vec![(Recipient::All, ServerEvent::GameScoresUpdated { scores: scores.clone() })];

    match table.config.variant {
        VariantConfig::Points { per_point_value } => {
            let mut debits = Vec::new();
            let mut pot = 0.0;
            for seat in &table.seats {
                if seat.round_points > 0 {
                    let amount = seat.round_points as f64 * per_point_value;
                    pot += amount;
                    debits.push((seat.player_id, amount));
                }
            }
            let prize = pot * (1.0 - PLATFORM_FEE);
            table.settlement =
                Some(Settlement { debits, credits: vec![(winner_id, prize)] });
            table.status = TableStatus::Finished;
            events.push((
                Recipient::All,
                ServerEvent::GameOver { winner: Some(winner_id), scores, prize },
            ));
        }
        VariantConfig::Pool { kind, entry_fee } => {
            let threshold = kind.threshold();
            let mut eliminated = false;
            for seat in &mut table.seats {
                if matches!(seat.status, PlayerStatus::Active | PlayerStatus::Dropped)
                    && seat.total_score >= threshold
                {
                    seat.status = PlayerStatus::Eliminated;
                    eliminated = true;
                    tracing::info!(
                        room_id = %table.room_id,
                        player = %seat.player_id,
                        total = seat.total_score,
                        "player eliminated"
                    );
                }
            }
            if eliminated {
                events.push(table.roster_event());
            }
            let survivors = contenders(table);
            if let [last] = survivors[..] {
                events.extend(finish_game(table, last, entry_fee, scores));
            } else {
                events.extend(next_round(table, rng));
            }
        }
        VariantConfig::Deals { rounds, entry_fee } => {
            let survivors = contenders(table);
            if table.round >= rounds || survivors.len() <= 1 {
                // Lowest cumulative score takes the pot; ties keep the
                // earlier seat.
                let best = survivors
                    .iter()
                    .copied()
                    .min_by_key(|&i| table.seats[i].total_score)
                    .unwrap_or(winner);
                events.extend(finish_game(table, best, entry_fee, scores));
            } else {
                events.extend(next_round(table, rng));
            }
        }
    }
    events
}

/// Seats still contending the game: anyone not eliminated or departed.
fn contenders(table: &Table) -> Vec<usize> {
    (0..table.seats.len())
        .filter(|&i| {
            matches!(
                table.seats[i].status,
                PlayerStatus::Active | PlayerStatus::Dropped
            )
        })
        .collect()
}

fn finish_game(table: &mut Table, winner: usize, entry_fee: f64, scores: Vec<ScoreEntry>) -> Events {
    let winner_id = table.seats[winner].player_id;
    // Everyone seated paid in, including seats that later left.
    let pot = entry_fee * table.seats.len() as f64;
    let prize = pot * (1.0 - PLATFORM_FEE);
    table.settlement = Some(Settlement { debits: Vec::new(), credits: vec![(winner_id, prize)] });
    table.status = TableStatus::Finished;
    tracing::info!(room_id = %table.room_id, winner = %winner_id, prize, "game over");
    vec![(
        Recipient::All,
        ServerEvent::GameOver { winner: Some(winner_id), scores, prize },
    )]
}

fn next_round(table: &mut Table, rng: &mut impl Rng) -> Events {
    let mut events: Events =
        vec![(Recipient::All, ServerEvent::NextRound { round: table.round + 1 })];
    events.extend(deal::begin_round(table, rng, false));
    events
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use meldcore_cards::{MeldDetector, Rank, Suit};
    use meldcore_protocol::{PlayerId, PoolKind, RoomId};

    use crate::config::TableConfig;
    use super::*;

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    fn running_table(variant: VariantConfig, players: usize) -> (Table, StdRng) {
        let mut table = Table::new(RoomId(1), TableConfig::new(variant, players));
        for i in 0..players {
            table.add_player(PlayerId(i as u64), format!("p{i}")).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(11);
        table.begin_game(&mut rng).unwrap();
        (table, rng)
    }

    /// Thirteen cards with 35 points of deadwood: a six-card pure run
    /// and a queen set meld, four loose cards count 7 + 9 + 9 + 10.
    fn hand_with_35_deadwood() -> Vec<Card> {
        vec![
            c(Rank::Two, Suit::Spades),
            c(Rank::Three, Suit::Spades),
            c(Rank::Four, Suit::Spades),
            c(Rank::Five, Suit::Spades),
            c(Rank::Six, Suit::Spades),
            c(Rank::Seven, Suit::Spades),
            c(Rank::Queen, Suit::Clubs),
            c(Rank::Queen, Suit::Diamonds),
            c(Rank::Queen, Suit::Hearts),
            c(Rank::Seven, Suit::Hearts),
            c(Rank::Nine, Suit::Clubs),
            c(Rank::Nine, Suit::Diamonds),
            c(Rank::King, Suit::Diamonds),
        ]
    }

    /// No melds at all, over the cap: the whole hand counts, 80 max.
    fn hand_over_the_cap() -> Vec<Card> {
        vec![
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
        ]
    }

    #[test]
    fn test_points_settlement_pays_winner_minus_fee() {
        let (mut table, mut rng) =
            running_table(VariantConfig::Points { per_point_value: 1.0 }, 2);
        let winner = 0;
        table.seats[1].hand = hand_with_35_deadwood();
        // Keep the wild away from the crafted hand's ranks.
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));

        let events = settle_round(&mut table, winner, &MeldDetector, &mut rng);

        assert_eq!(table.seats[1].round_points, 35);
        assert_eq!(table.status(), TableStatus::Finished);
        let settlement = table.take_settlement().unwrap();
        assert_eq!(settlement.debits, vec![(PlayerId(1), 35.0)]);
        assert_eq!(settlement.credits, vec![(PlayerId(0), 31.5)]);
        assert!(events.iter().any(|(_, e)| matches!(
            e,
            ServerEvent::GameOver { winner: Some(w), prize, .. }
                if *w == PlayerId(0) && *prize == 31.5
        )));
    }

    #[test]
    fn test_recorded_penalty_survives_settlement() {
        let (mut table, mut rng) =
            running_table(VariantConfig::Points { per_point_value: 1.0 }, 2);
        table.seats[1].hand = hand_with_35_deadwood();
        // An earlier invalid declaration locked in the full charge.
        table.seats[1].round_points = 80;
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));

        settle_round(&mut table, 0, &MeldDetector, &mut rng);

        assert_eq!(table.seats[1].round_points, 80);
        assert_eq!(table.seats[1].total_score, 80);
    }

    #[test]
    fn test_losing_hand_is_capped_at_eighty() {
        let (mut table, mut rng) =
            running_table(VariantConfig::Points { per_point_value: 1.0 }, 2);
        table.seats[1].hand = hand_over_the_cap();
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));

        settle_round(&mut table, 0, &MeldDetector, &mut rng);
        assert_eq!(table.seats[1].round_points, DEADWOOD_CAP);
    }

    #[test]
    fn test_pool_settlement_eliminates_over_threshold_and_continues() {
        let variant = VariantConfig::Pool { kind: PoolKind::Pool101, entry_fee: 10.0 };
        let (mut table, mut rng) = running_table(variant, 3);
        table.seats[1].hand = hand_over_the_cap();
        table.seats[1].total_score = 60; // 60 + 80 crosses 101
        table.seats[2].hand = hand_with_35_deadwood();
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));

        let events = settle_round(&mut table, 0, &MeldDetector, &mut rng);

        assert_eq!(table.seats[1].status, PlayerStatus::Eliminated);
        assert_eq!(table.seats[2].total_score, 35);
        // Two contenders left, so a fresh round is dealt.
        assert!(events.iter().any(|(_, e)| matches!(e, ServerEvent::NextRound { round: 2 })));
        assert_eq!(table.status(), TableStatus::InProgress);
        assert_eq!(table.round(), 2);
        assert!(table.take_settlement().is_none());
    }

    #[test]
    fn test_pool_last_contender_takes_prize() {
        let variant = VariantConfig::Pool { kind: PoolKind::Pool101, entry_fee: 10.0 };
        let (mut table, mut rng) = running_table(variant, 2);
        table.seats[1].hand = hand_over_the_cap();
        table.seats[1].total_score = 30;
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));

        let events = settle_round(&mut table, 0, &MeldDetector, &mut rng);

        assert_eq!(table.status(), TableStatus::Finished);
        let settlement = table.take_settlement().unwrap();
        // Pot of 20 minus the 10% fee.
        assert_eq!(settlement.credits, vec![(PlayerId(0), 18.0)]);
        assert!(events
            .iter()
            .any(|(_, e)| matches!(e, ServerEvent::GameOver { winner: Some(w), .. } if *w == PlayerId(0))));
    }

    #[test]
    fn test_deals_runs_fixed_rounds_then_lowest_total_wins() {
        let variant = VariantConfig::Deals { rounds: 2, entry_fee: 5.0 };
        let (mut table, mut rng) = running_table(variant, 2);
        table.seats[1].hand = hand_with_35_deadwood();
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));

        let events = settle_round(&mut table, 0, &MeldDetector, &mut rng);
        assert!(events.iter().any(|(_, e)| matches!(e, ServerEvent::NextRound { round: 2 })));
        assert_eq!(table.round(), 2);

        // Round two: the other seat wins but carries the higher total.
        table.seats[0].hand = hand_over_the_cap();
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));
        let events = settle_round(&mut table, 1, &MeldDetector, &mut rng);

        // Totals: seat 0 has 80, seat 1 has 35 — seat 1 wins the pot.
        assert!(events
            .iter()
            .any(|(_, e)| matches!(e, ServerEvent::GameOver { winner: Some(w), .. } if *w == PlayerId(1))));
        let settlement = table.take_settlement().unwrap();
        assert_eq!(settlement.credits, vec![(PlayerId(1), 9.0)]);
    }

    #[test]
    fn test_deals_dealer_rotates_between_rounds() {
        let variant = VariantConfig::Deals { rounds: 3, entry_fee: 5.0 };
        let (mut table, mut rng) = running_table(variant, 3);
        let first_dealer = table.dealer;
        table.wild_joker = Some(c(Rank::Eight, Suit::Diamonds));

        settle_round(&mut table, 0, &MeldDetector, &mut rng);
        assert_ne!(table.dealer, first_dealer);
        assert_eq!(table.dealer, table.next_active(first_dealer).unwrap());
    }
}
