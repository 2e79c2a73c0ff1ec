//! Wire types shared by client and server.
//!
//! Everything here serializes to JSON with explicit `type` tags so a
//! browser client can dispatch on a single string field. The shapes are
//! part of the public protocol; the tests pin them down.

use std::fmt;

use serde::{Deserialize, Serialize};

use meldcore_cards::Card;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Unique player identifier, assigned by the server at handshake.
///
/// Serializes as a bare number via `#[serde(transparent)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Unique room identifier. One room is one table of Rummy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient — who should receive a message?
// ---------------------------------------------------------------------------

/// Delivery target for one outgoing event. Room logic returns
/// `(Recipient, ServerEvent)` pairs; the fan-out layer resolves them
/// to sockets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every seated player.
    All,
    /// One specific player.
    Player(PlayerId),
    /// Everyone except the specified player. Used when the sender
    /// already knows the content (e.g. the card they drew).
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Game variants
// ---------------------------------------------------------------------------

/// Pool variant flavor: the cumulative score at which a player is
/// eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    #[serde(rename = "101")]
    Pool101,
    #[serde(rename = "201")]
    Pool201,
}

impl PoolKind {
    /// Elimination threshold: reaching this score knocks a player out.
    pub fn threshold(self) -> u32 {
        match self {
            PoolKind::Pool101 => 101,
            PoolKind::Pool201 => 201,
        }
    }
}

/// The three table formats, with their stake parameters.
///
/// Tables only match players whose requested variant is identical,
/// so `VariantConfig` doubles as the matchmaking key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VariantConfig {
    /// Single hand; losers pay `per_point_value` per point of deadwood
    /// to the winner. No entry fee is collected up front.
    Points { per_point_value: f64 },
    /// Repeated hands; players are eliminated at the pool threshold
    /// and the last player standing takes the prize pool.
    Pool { kind: PoolKind, entry_fee: f64 },
    /// A fixed number of hands; lowest cumulative score wins the pot.
    Deals { rounds: u32, entry_fee: f64 },
}

impl VariantConfig {
    /// Amount debited from each player when the game starts. Zero for
    /// Points, which settles purely at scoring time.
    pub fn entry_fee(&self) -> f64 {
        match self {
            VariantConfig::Points { .. } => 0.0,
            VariantConfig::Pool { entry_fee, .. } | VariantConfig::Deals { entry_fee, .. } => {
                *entry_fee
            }
        }
    }
}

/// What a client asks for when joining: the table format and how many
/// seats the table should have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Display name shown to other players.
    pub name: String,
    pub variant: VariantConfig,
    /// Seats at the table, 2 to 6.
    pub player_limit: usize,
}

// ---------------------------------------------------------------------------
// Table views
// ---------------------------------------------------------------------------

/// Which pile a player draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckSide {
    /// The face-down stock.
    Closed,
    /// The face-up discard pile.
    Open,
}

/// A player's standing at the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Active,
    Dropped,
    Eliminated,
    Left,
}

/// Public view of one seat, broadcast whenever the roster changes.
/// Never contains hand cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub player_id: PlayerId,
    pub name: String,
    pub status: PlayerStatus,
    pub connected: bool,
    /// Cumulative score across rounds (Pool and Deals).
    pub total_score: u32,
}

/// One row of a scoring announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    /// Points charged this round (0 for the winner).
    pub points: u32,
    /// Cumulative total after this round.
    pub total: u32,
}

// ---------------------------------------------------------------------------
// Game events
// ---------------------------------------------------------------------------

/// Actions a client can take. Internally tagged so the JSON carries a
/// single `type` discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Join a table matching the request, creating one if needed.
    JoinRoom { request: JoinRequest },
    /// Draw from the closed or open deck. Only valid on your turn,
    /// before you have drawn.
    DrawCard { side: DeckSide },
    /// Discard a card from hand, ending your turn.
    DiscardCard { card: Card },
    /// Declare a winning hand, discarding `discard` first.
    DeclareHand { discard: Card },
    /// Drop out of the current game for a fixed penalty.
    DropGame,
    /// Leave the table entirely.
    LeaveRoom,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// You are seated. `reconnect_token` re-attaches this seat after a
    /// disconnect, within the grace window.
    RoomJoined {
        room_id: RoomId,
        player_id: PlayerId,
        reconnect_token: String,
    },
    /// Roster change: someone joined, left, dropped, or reconnected.
    PlayersUpdate { players: Vec<SeatView> },
    /// The table is full; the game starts in `seconds`.
    GameCountdown { seconds: u32 },
    /// Dealer selection result. `first_player` opens the round; `draws`
    /// shows the card each player cut (empty on dealer rotation).
    DealerAssigned {
        dealer: PlayerId,
        first_player: PlayerId,
        draws: Vec<(PlayerId, Card)>,
    },
    /// Your 13 cards. Sent individually; other players get their own.
    CardsDealt { hand: Vec<Card> },
    /// The wild joker and the first open card for this round.
    DeckSetup { wild_joker: Card, open_card: Card },
    /// It is now `player`'s turn, with `seconds` on the clock.
    TurnChanged { player: PlayerId, seconds: u32 },
    /// `player` drew a card. `card` is populated only in the copy sent
    /// to the drawer; everyone else sees which pile shrank.
    CardDrawn {
        player: PlayerId,
        side: DeckSide,
        card: Option<Card>,
        closed_remaining: usize,
    },
    /// `player` discarded `card` onto the open deck.
    CardDiscarded { player: PlayerId, card: Card },
    /// The clock granted extra time; `seconds` remain.
    TurnWarning { player: PlayerId, seconds: u32 },
    /// `player` ran out the clock. At three missed turns they are
    /// dropped automatically.
    TurnSkipped { player: PlayerId, missed_turns: u32 },
    /// `player` declared; the hand is being checked.
    PlayerDeclared { player: PlayerId },
    /// The declaration was invalid; `player` is charged `penalty`
    /// points and play continues.
    InvalidDeclaration { player: PlayerId, penalty: u32 },
    /// Round scores, one entry per seated player.
    GameScoresUpdated { scores: Vec<ScoreEntry> },
    /// `player` dropped (voluntarily or by timeout) for `penalty`.
    PlayerDropped { player: PlayerId, penalty: u32 },
    /// The round cannot continue (e.g. decks exhausted); entry fees
    /// are refunded.
    GameDraw,
    /// A multi-round game continues with round `round`.
    NextRound { round: u32 },
    /// Final result. `prize` is what `winner` was credited, if anyone
    /// won.
    GameOver {
        winner: Option<PlayerId>,
        scores: Vec<ScoreEntry>,
        prize: f64,
    },
    /// Full table state for a reconnecting player.
    RoomSnapshot {
        room_id: RoomId,
        players: Vec<SeatView>,
        hand: Vec<Card>,
        wild_joker: Option<Card>,
        open_card: Option<Card>,
        current_turn: Option<PlayerId>,
        round: u32,
    },
    /// An action was rejected. `code` follows HTTP conventions.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// SystemMessage — connection-level plumbing
// ---------------------------------------------------------------------------

/// Connection lifecycle messages, independent of any table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server. `token` resumes a previous session.
    Handshake { version: u32, token: Option<String> },
    /// Server → Client. Assigns identity and a clock reference.
    HandshakeAck { player_id: PlayerId, server_time: u64 },
    /// Either direction, with a reason for the log.
    Disconnect { reason: String },
    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },
    /// Server → Client echo; both timestamps let the client estimate
    /// round-trip time and clock offset.
    HeartbeatAck { client_time: u64, server_time: u64 },
    /// Server → Client: a connection-level failure.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// Message content, adjacently tagged:
/// `{ "type": "Action", "data": { "type": "DrawCard", ... } }`.
///
/// The outer tag lets the connection handler route without inspecting
/// game-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Connection plumbing.
    System(SystemMessage),
    /// Client → Server game action.
    Action(ClientEvent),
    /// Server → Client game event.
    Event(ServerEvent),
}

/// Top-level wire frame. Every WebSocket text message is one Envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number, for spotting gaps in logs.
    pub seq: u64,
    /// Milliseconds since the server started.
    pub timestamp: u64,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    //! The JSON shapes below are protocol commitments; a client SDK
    //! parses against them.

    use meldcore_cards::{Rank, Suit};

    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_room_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&RoomId(99)).unwrap();
        assert_eq!(json, "99");
    }

    #[test]
    fn test_pool_kind_serializes_as_threshold_label() {
        let json = serde_json::to_string(&PoolKind::Pool101).unwrap();
        assert_eq!(json, "\"101\"");
        assert_eq!(PoolKind::Pool201.threshold(), 201);
    }

    #[test]
    fn test_variant_config_points_json_format() {
        let variant = VariantConfig::Points { per_point_value: 0.5 };
        let json: serde_json::Value = serde_json::to_value(&variant).unwrap();
        assert_eq!(json["mode"], "points");
        assert_eq!(json["per_point_value"], 0.5);
    }

    #[test]
    fn test_variant_config_pool_json_format() {
        let variant = VariantConfig::Pool { kind: PoolKind::Pool201, entry_fee: 25.0 };
        let json: serde_json::Value = serde_json::to_value(&variant).unwrap();
        assert_eq!(json["mode"], "pool");
        assert_eq!(json["kind"], "201");
        assert_eq!(json["entry_fee"], 25.0);
    }

    #[test]
    fn test_variant_entry_fee_is_zero_for_points() {
        assert_eq!(VariantConfig::Points { per_point_value: 1.0 }.entry_fee(), 0.0);
        assert_eq!(
            VariantConfig::Deals { rounds: 2, entry_fee: 10.0 }.entry_fee(),
            10.0
        );
    }

    #[test]
    fn test_client_event_draw_card_json_format() {
        let event = ClientEvent::DrawCard { side: DeckSide::Closed };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DrawCard");
        assert_eq!(json["side"], "closed");
    }

    #[test]
    fn test_client_event_discard_card_round_trip() {
        let event = ClientEvent::DiscardCard { card: Card::new(Rank::Queen, Suit::Hearts) };
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ClientEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_client_event_join_room_round_trip() {
        let event = ClientEvent::JoinRoom {
            request: JoinRequest {
                name: "asha".into(),
                variant: VariantConfig::Pool { kind: PoolKind::Pool101, entry_fee: 10.0 },
                player_limit: 4,
            },
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ClientEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_server_event_card_drawn_hides_card_from_table() {
        // The broadcast copy carries card: null.
        let event = ServerEvent::CardDrawn {
            player: PlayerId(1),
            side: DeckSide::Closed,
            card: None,
            closed_remaining: 30,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CardDrawn");
        assert!(json["card"].is_null());
        assert_eq!(json["closed_remaining"], 30);
    }

    #[test]
    fn test_server_event_turn_changed_json_format() {
        let event = ServerEvent::TurnChanged { player: PlayerId(3), seconds: 30 };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TurnChanged");
        assert_eq!(json["player"], 3);
        assert_eq!(json["seconds"], 30);
    }

    #[test]
    fn test_server_event_game_over_round_trip() {
        let event = ServerEvent::GameOver {
            winner: Some(PlayerId(2)),
            scores: vec![
                ScoreEntry { player_id: PlayerId(1), points: 46, total: 46 },
                ScoreEntry { player_id: PlayerId(2), points: 0, total: 0 },
            ],
            prize: 18.0,
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_system_message_handshake_json_format() {
        let msg = SystemMessage::Handshake { version: 1, token: None };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Handshake");
        assert!(json["token"].is_null());
    }

    #[test]
    fn test_system_message_heartbeat_round_trip() {
        let msg = SystemMessage::Heartbeat { client_time: 5000 };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: SystemMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_payload_action_json_format() {
        let payload = Payload::Action(ClientEvent::DropGame);
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Action");
        assert_eq!(json["data"]["type"], "DropGame");
    }

    #[test]
    fn test_payload_event_json_format() {
        let payload = Payload::Event(ServerEvent::GameCountdown { seconds: 5 });
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Event");
        assert_eq!(json["data"]["type"], "GameCountdown");
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope {
            seq: 42,
            timestamp: 15000,
            payload: Payload::System(SystemMessage::Heartbeat { client_time: 15000 }),
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope, decoded);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let result: Result<Envelope, _> = serde_json::from_slice(b"not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_action_type_returns_error() {
        let unknown = r#"{"type": "TeleportCards", "count": 9}"#;
        let result: Result<ClientEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
