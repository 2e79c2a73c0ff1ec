//! The `Table`: one game of Rummy as a pure state machine.
//!
//! The table owns seats, decks, and the turn; it knows nothing about
//! tasks, sockets, or time. Every operation validates, mutates, and
//! returns the events to fan out, so the whole game is testable
//! synchronously. The room actor wraps a table and supplies the
//! clock, wallet, and persistence around it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use meldcore_cards::{Card, Deck, HandValidator};
use meldcore_protocol::{
    DeckSide, PlayerId, PlayerStatus, Recipient, RoomId, SeatView, ServerEvent,
};

use crate::config::{
    FIRST_DROP_PENALTY, INVALID_DECLARATION_PENALTY, MAX_MISSED_TURNS, MIDDLE_DROP_PENALTY,
    TableConfig, TableStatus,
};
use crate::{RoomError, deal, score};

/// Events produced by a table operation, each with its delivery target.
pub type Events = Vec<(Recipient, ServerEvent)>;

/// Money movements owed after a round. The actor applies these through
/// the wallet; the table only computes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settlement {
    pub debits: Vec<(PlayerId, f64)>,
    pub credits: Vec<(PlayerId, f64)>,
}

/// Where the current player is within their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    AwaitingDraw,
    AwaitingDiscard,
}

/// One seat at the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub player_id: PlayerId,
    pub name: String,
    pub hand: Vec<Card>,
    pub status: PlayerStatus,
    pub connected: bool,
    /// Turns lost to the clock this round. Three misses total drop the
    /// player, whether or not they played in between.
    pub missed_turns: u32,
    /// Points charged this round. Fixed at drop/invalid-declaration
    /// time, otherwise computed from deadwood at settlement.
    pub round_points: u32,
    /// Cumulative score across rounds.
    pub total_score: u32,
    /// Card drawn this turn; auto-discarded if the clock runs out.
    pub drawn: Option<Card>,
    /// Whether the player has drawn at least once this game. Decides
    /// the drop penalty tier.
    pub has_played: bool,
}

impl Seat {
    fn new(player_id: PlayerId, name: String) -> Self {
        Self {
            player_id,
            name,
            hand: Vec::new(),
            status: PlayerStatus::Active,
            connected: true,
            missed_turns: 0,
            round_points: 0,
            total_score: 0,
            drawn: None,
            has_played: false,
        }
    }

    fn view(&self) -> SeatView {
        SeatView {
            player_id: self.player_id,
            name: self.name.clone(),
            status: self.status,
            connected: self.connected,
            total_score: self.total_score,
        }
    }
}

/// A table of Rummy. Serializable in full, so a snapshot is just the
/// table itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub(crate) room_id: RoomId,
    pub(crate) config: TableConfig,
    pub(crate) status: TableStatus,
    pub(crate) seats: Vec<Seat>,
    pub(crate) dealer: usize,
    pub(crate) turn: Option<usize>,
    pub(crate) phase: TurnPhase,
    pub(crate) closed: Deck,
    pub(crate) open: Deck,
    pub(crate) wild_joker: Option<Card>,
    pub(crate) round: u32,
    /// Pending money movements, consumed by the actor right after the
    /// operation that produced them. Never persisted.
    #[serde(skip)]
    pub(crate) settlement: Option<Settlement>,
}

impl Table {
    pub fn new(room_id: RoomId, config: TableConfig) -> Self {
        Self {
            room_id,
            config: config.validated(),
            status: TableStatus::Waiting,
            seats: Vec::new(),
            dealer: 0,
            turn: None,
            phase: TurnPhase::AwaitingDraw,
            closed: Deck::empty(),
            open: Deck::empty(),
            wild_joker: None,
            round: 0,
            settlement: None,
        }
    }

    // -- accessors ---------------------------------------------------------

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn status(&self) -> TableStatus {
        self.status
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.seats.iter().map(|s| s.player_id).collect()
    }

    /// Whose turn it is, if a round is running.
    pub fn current_turn(&self) -> Option<PlayerId> {
        self.turn.map(|idx| self.seats[idx].player_id)
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.config.player_limit
    }

    /// Takes the money movements pending from the last operation.
    pub fn take_settlement(&mut self) -> Option<Settlement> {
        self.settlement.take()
    }

    /// Marks the table frozen after a persistence failure.
    pub fn freeze(&mut self) {
        self.status = TableStatus::Frozen;
    }

    pub(crate) fn seat_index(&self, player: PlayerId) -> Result<usize, RoomError> {
        self.seats
            .iter()
            .position(|s| s.player_id == player)
            .ok_or(RoomError::NotInRoom(player, self.room_id))
    }

    pub(crate) fn active_indices(&self) -> Vec<usize> {
        (0..self.seats.len())
            .filter(|&i| self.seats[i].status == PlayerStatus::Active)
            .collect()
    }

    /// Next active seat clockwise from `from`.
    pub(crate) fn next_active(&self, from: usize) -> Option<usize> {
        let n = self.seats.len();
        (1..=n).map(|i| (from + i) % n).find(|&i| self.seats[i].status == PlayerStatus::Active)
    }

    pub(crate) fn roster_event(&self) -> (Recipient, ServerEvent) {
        let players = self.seats.iter().map(Seat::view).collect();
        (Recipient::All, ServerEvent::PlayersUpdate { players })
    }

    fn require_in_progress(&self) -> Result<(), RoomError> {
        if self.status == TableStatus::Frozen {
            return Err(RoomError::Frozen(self.room_id));
        }
        if self.status != TableStatus::InProgress {
            return Err(RoomError::InvalidState(format!(
                "no game in progress (status {})",
                self.status
            )));
        }
        Ok(())
    }

    fn require_turn(&self, player: PlayerId) -> Result<usize, RoomError> {
        let idx = self.seat_index(player)?;
        if self.turn != Some(idx) {
            return Err(RoomError::NotYourTurn(player));
        }
        Ok(idx)
    }

    // -- seating -----------------------------------------------------------

    /// Seats a player. When the table fills, the start countdown is
    /// announced and the actor arms its countdown timer.
    pub fn add_player(&mut self, player: PlayerId, name: String) -> Result<Events, RoomError> {
        if self.status == TableStatus::Frozen {
            return Err(RoomError::Frozen(self.room_id));
        }
        if !self.status.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "cannot join a table in status {}",
                self.status
            )));
        }
        if self.seats.iter().any(|s| s.player_id == player) {
            return Err(RoomError::AlreadyInRoom(player, self.room_id));
        }
        if self.is_full() {
            return Err(RoomError::RoomFull(self.room_id));
        }

        self.seats.push(Seat::new(player, name));
        let mut events = vec![self.roster_event()];
        if self.is_full() {
            self.status = TableStatus::Starting;
            events.push((
                Recipient::All,
                ServerEvent::GameCountdown { seconds: self.config.countdown_secs },
            ));
        }
        Ok(events)
    }

    /// Removes a player. Before the game starts this frees the seat;
    /// mid-game it is a drop followed by leaving the table.
    pub fn remove_player(
        &mut self,
        player: PlayerId,
        validator: &dyn HandValidator,
        rng: &mut impl Rng,
    ) -> Result<Events, RoomError> {
        let idx = self.seat_index(player)?;
        match self.status {
            TableStatus::Waiting | TableStatus::Starting => {
                self.seats.remove(idx);
                let mut events = Vec::new();
                if self.status == TableStatus::Starting {
                    // A leaver aborts the countdown.
                    self.status = TableStatus::Waiting;
                }
                events.push(self.roster_event());
                Ok(events)
            }
            TableStatus::InProgress => {
                let mut events = Vec::new();
                if self.seats[idx].status == PlayerStatus::Active {
                    events.extend(self.drop_seat(idx, validator, rng));
                }
                self.seats[idx].status = PlayerStatus::Left;
                self.seats[idx].connected = false;
                events.push(self.roster_event());
                Ok(events)
            }
            _ => {
                self.seats[idx].status = PlayerStatus::Left;
                self.seats[idx].connected = false;
                Ok(vec![self.roster_event()])
            }
        }
    }

    // -- game flow ---------------------------------------------------------

    /// Deals the first round. Called by the actor when the start
    /// countdown elapses.
    pub fn begin_game(&mut self, rng: &mut impl Rng) -> Result<Events, RoomError> {
        if self.status != TableStatus::Starting {
            return Err(RoomError::InvalidState(format!(
                "cannot start from status {}",
                self.status
            )));
        }
        Ok(deal::begin_round(self, rng, true))
    }

    /// Draws a card for `player` from the requested pile.
    pub fn draw(
        &mut self,
        player: PlayerId,
        side: DeckSide,
        rng: &mut impl Rng,
    ) -> Result<Events, RoomError> {
        self.require_in_progress()?;
        let idx = self.require_turn(player)?;
        if self.phase != TurnPhase::AwaitingDraw {
            return Err(RoomError::InvalidPhase("already drew this turn".into()));
        }

        let card = match side {
            // Any showing card may be taken, including the one seeded
            // at the deal. The pile refills on the next discard.
            DeckSide::Open => self.open.draw().ok_or(RoomError::DeckExhausted)?,
            DeckSide::Closed => {
                if self.closed.is_empty() {
                    // Reshuffle the open pile under its top card. With
                    // at most one open card there is nothing left to
                    // play with and the round is void.
                    if self.open.len() <= 1 {
                        return Ok(self.void_round());
                    }
                    let top = self.open.draw().ok_or(RoomError::DeckExhausted)?;
                    let rest = self.open.take_all();
                    self.open.push(top);
                    self.closed.extend(rest);
                    self.closed.shuffle(rng);
                    tracing::debug!(
                        room_id = %self.room_id,
                        cards = self.closed.len(),
                        "open deck reshuffled into closed"
                    );
                }
                self.closed.draw().ok_or(RoomError::DeckExhausted)?
            }
        };

        let seat = &mut self.seats[idx];
        seat.hand.push(card);
        seat.drawn = Some(card);
        seat.has_played = true;
        self.phase = TurnPhase::AwaitingDiscard;

        let closed_remaining = self.closed.len();
        Ok(vec![
            (
                Recipient::Player(player),
                ServerEvent::CardDrawn { player, side, card: Some(card), closed_remaining },
            ),
            (
                Recipient::AllExcept(player),
                ServerEvent::CardDrawn { player, side, card: None, closed_remaining },
            ),
        ])
    }

    /// Discards `card`, ending the player's turn.
    pub fn discard(&mut self, player: PlayerId, card: Card) -> Result<Events, RoomError> {
        self.require_in_progress()?;
        let idx = self.require_turn(player)?;
        if self.phase != TurnPhase::AwaitingDiscard {
            return Err(RoomError::InvalidPhase("draw before discarding".into()));
        }

        let seat = &mut self.seats[idx];
        let pos = seat
            .hand
            .iter()
            .position(|c| *c == card)
            .ok_or(RoomError::CardNotInHand(card))?;
        seat.hand.remove(pos);
        seat.drawn = None;
        self.open.push(card);

        let mut events = vec![(Recipient::All, ServerEvent::CardDiscarded { player, card })];
        events.extend(self.advance_turn());
        Ok(events)
    }

    /// Declares a winning hand, discarding `discard` first.
    ///
    /// A valid declaration settles the round. An invalid one charges
    /// the full declaration penalty and passes the turn; the declarer
    /// stays in the round and keeps playing.
    pub fn declare(
        &mut self,
        player: PlayerId,
        discard: Card,
        validator: &dyn HandValidator,
        rng: &mut impl Rng,
    ) -> Result<Events, RoomError> {
        self.require_in_progress()?;
        let idx = self.require_turn(player)?;
        if self.phase != TurnPhase::AwaitingDiscard {
            return Err(RoomError::InvalidPhase("draw before declaring".into()));
        }
        let wild = self
            .wild_joker
            .ok_or_else(|| RoomError::InvalidState("no wild joker in play".into()))?;

        let seat = &mut self.seats[idx];
        let pos = seat
            .hand
            .iter()
            .position(|c| *c == discard)
            .ok_or(RoomError::CardNotInHand(discard))?;
        seat.hand.remove(pos);

        let evaluation = validator.evaluate(&seat.hand, wild);
        seat.drawn = None;
        self.open.push(discard);

        if evaluation.is_valid {
            let mut events = vec![(Recipient::All, ServerEvent::PlayerDeclared { player })];
            events.extend(score::settle_round(self, idx, validator, rng));
            return Ok(events);
        }

        // The discard stands and the charge is locked in, but the seat
        // plays on; settlement will not undercut a recorded penalty.
        let seat = &mut self.seats[idx];
        seat.round_points = seat.round_points.max(INVALID_DECLARATION_PENALTY);
        tracing::info!(
            room_id = %self.room_id,
            %player,
            deadwood = evaluation.deadwood,
            "invalid declaration"
        );
        let mut events = vec![(
            Recipient::All,
            ServerEvent::InvalidDeclaration { player, penalty: INVALID_DECLARATION_PENALTY },
        )];
        events.extend(self.advance_turn());
        Ok(events)
    }

    /// Drops `player` out of the current game for the fixed penalty.
    /// Only the turn holder may drop; anyone else waits for their turn
    /// or leaves the room outright.
    pub fn drop_game(
        &mut self,
        player: PlayerId,
        validator: &dyn HandValidator,
        rng: &mut impl Rng,
    ) -> Result<Events, RoomError> {
        self.require_in_progress()?;
        let idx = self.require_turn(player)?;
        Ok(self.drop_seat(idx, validator, rng))
    }

    fn drop_seat(
        &mut self,
        idx: usize,
        validator: &dyn HandValidator,
        rng: &mut impl Rng,
    ) -> Events {
        let penalty = if self.seats[idx].has_played {
            MIDDLE_DROP_PENALTY
        } else {
            FIRST_DROP_PENALTY
        };
        let player = self.seats[idx].player_id;
        tracing::info!(room_id = %self.room_id, %player, penalty, "player dropped");
        let mut events =
            vec![(Recipient::All, ServerEvent::PlayerDropped { player, penalty })];
        events.extend(self.eliminate_seat(idx, penalty, validator, rng));
        events
    }

    /// Puts a seat out of the current round with a fixed charge, then
    /// either settles (one player left) or carries play forward.
    fn eliminate_seat(
        &mut self,
        idx: usize,
        penalty: u32,
        validator: &dyn HandValidator,
        rng: &mut impl Rng,
    ) -> Events {
        self.seats[idx].status = PlayerStatus::Dropped;
        self.seats[idx].round_points = penalty;
        self.seats[idx].drawn = None;

        let mut events = vec![self.roster_event()];
        let active = self.active_indices();
        if let [winner] = active[..] {
            events.extend(score::settle_round(self, winner, validator, rng));
            return events;
        }
        if self.turn == Some(idx) {
            self.phase = TurnPhase::AwaitingDraw;
            events.extend(self.advance_turn_from(idx));
        }
        events
    }

    /// Final clock expiry for `player`: auto-discard if they drew,
    /// count the missed turn, and drop them at the limit.
    pub fn timeout(
        &mut self,
        player: PlayerId,
        validator: &dyn HandValidator,
        rng: &mut impl Rng,
    ) -> Result<Events, RoomError> {
        self.require_in_progress()?;
        let idx = self.require_turn(player)?;

        let mut events = Vec::new();
        let seat = &mut self.seats[idx];
        seat.missed_turns += 1;
        let missed = seat.missed_turns;

        // A drawn card goes straight to the open pile so the hand is
        // back to thirteen before the turn passes.
        if self.phase == TurnPhase::AwaitingDiscard {
            if let Some(card) = seat.drawn.take() {
                if let Some(pos) = seat.hand.iter().position(|c| *c == card) {
                    seat.hand.remove(pos);
                    self.open.push(card);
                    events.push((Recipient::All, ServerEvent::CardDiscarded { player, card }));
                }
            }
        }
        events.push((Recipient::All, ServerEvent::TurnSkipped { player, missed_turns: missed }));
        tracing::info!(room_id = %self.room_id, %player, missed, "turn skipped");

        if missed >= MAX_MISSED_TURNS {
            events.extend(self.drop_seat(idx, validator, rng));
        } else {
            events.extend(self.advance_turn());
        }
        Ok(events)
    }

    // -- connection state --------------------------------------------------

    pub fn mark_disconnected(&mut self, player: PlayerId) -> Result<Events, RoomError> {
        let idx = self.seat_index(player)?;
        self.seats[idx].connected = false;
        Ok(vec![self.roster_event()])
    }

    pub fn mark_reconnected(&mut self, player: PlayerId) -> Result<Events, RoomError> {
        let idx = self.seat_index(player)?;
        self.seats[idx].connected = true;
        Ok(vec![self.roster_event()])
    }

    /// Full private view for a (re)connecting player.
    pub fn snapshot_for(&self, player: PlayerId) -> Result<ServerEvent, RoomError> {
        let idx = self.seat_index(player)?;
        Ok(ServerEvent::RoomSnapshot {
            room_id: self.room_id,
            players: self.seats.iter().map(Seat::view).collect(),
            hand: self.seats[idx].hand.clone(),
            wild_joker: self.wild_joker,
            open_card: self.open.peek(),
            current_turn: self.current_turn(),
            round: self.round,
        })
    }

    // -- internals ---------------------------------------------------------

    fn advance_turn(&mut self) -> Events {
        match self.turn {
            Some(current) => self.advance_turn_from(current),
            None => Vec::new(),
        }
    }

    /// Hands the turn to a specific active seat. Used by the deal to
    /// start the round with the lowest cut.
    pub(crate) fn start_turn_at(&mut self, idx: usize) -> Events {
        self.turn = Some(idx);
        self.phase = TurnPhase::AwaitingDraw;
        self.seats[idx].drawn = None;
        let player = self.seats[idx].player_id;
        vec![(
            Recipient::All,
            ServerEvent::TurnChanged { player, seconds: self.config.turn_secs },
        )]
    }

    pub(crate) fn advance_turn_from(&mut self, from: usize) -> Events {
        let Some(next) = self.next_active(from) else {
            return Vec::new();
        };
        self.turn = Some(next);
        self.phase = TurnPhase::AwaitingDraw;
        self.seats[next].drawn = None;
        let player = self.seats[next].player_id;
        vec![(
            Recipient::All,
            ServerEvent::TurnChanged { player, seconds: self.config.turn_secs },
        )]
    }

    /// Ends the round with no winner: both piles are spent. Entry fees
    /// are refunded and the game ends.
    fn void_round(&mut self) -> Events {
        tracing::warn!(room_id = %self.room_id, "decks exhausted, round is void");
        let fee = self.config.variant.entry_fee();
        let credits = if fee > 0.0 {
            self.seats.iter().map(|s| (s.player_id, fee)).collect()
        } else {
            Vec::new()
        };
        self.settlement = Some(Settlement { debits: Vec::new(), credits });
        self.status = TableStatus::Finished;
        self.turn = None;
        vec![(Recipient::All, ServerEvent::GameDraw)]
    }
}
