//! Table configuration, lifecycle states, and house rules.

use serde::{Deserialize, Serialize};

use meldcore_protocol::VariantConfig;

// ---------------------------------------------------------------------------
// House rules
// ---------------------------------------------------------------------------

/// Missed turns before a player is dropped automatically.
pub const MAX_MISSED_TURNS: u32 = 3;

/// Penalty for dropping before playing a single turn.
pub const FIRST_DROP_PENALTY: u32 = 20;

/// Penalty for dropping after having played.
pub const MIDDLE_DROP_PENALTY: u32 = 40;

/// Penalty for an invalid declaration.
pub const INVALID_DECLARATION_PENALTY: u32 = 80;

/// Maximum points a losing hand can be charged in one round.
pub const DEADWOOD_CAP: u32 = 80;

/// Fraction of the pot withheld by the platform.
pub const PLATFORM_FEE: f64 = 0.10;

/// Smallest and largest tables.
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

// ---------------------------------------------------------------------------
// TableConfig
// ---------------------------------------------------------------------------

/// Per-table settings, fixed at creation from the first join request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub variant: VariantConfig,
    /// Seats at the table, 2 to 6.
    pub player_limit: usize,
    /// Countdown between the table filling and cards being dealt.
    pub countdown_secs: u32,
    /// Seconds per turn. The extra-time grant is the same length.
    pub turn_secs: u32,
}

impl TableConfig {
    pub fn new(variant: VariantConfig, player_limit: usize) -> Self {
        Self {
            variant,
            player_limit,
            countdown_secs: 5,
            turn_secs: 30,
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        self.player_limit = self.player_limit.clamp(MIN_PLAYERS, MAX_PLAYERS);
        self
    }

    /// Packs of cards on the table. Two-player tables use one pack;
    /// anything larger needs two so thirteen-card hands stay dealable.
    pub fn packs(&self) -> usize {
        if self.player_limit <= 2 { 1 } else { 2 }
    }
}

// ---------------------------------------------------------------------------
// TableStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a table. Transitions are strictly ordered, except that
/// any state can enter `Frozen` when persistence fails:
///
/// ```text
/// Waiting → Starting → InProgress → Finished
///          \_______ Frozen ________/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    /// Seats open, waiting for the table to fill.
    Waiting,
    /// Table is full; the start countdown is running.
    Starting,
    /// Cards are dealt and turns are running.
    InProgress,
    /// The game ended; final state is visible, actions rejected.
    Finished,
    /// Persistence failed; the table rejects actions until recovered.
    Frozen,
}

impl TableStatus {
    /// Whether new players may take a seat.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Whether a game is underway.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::InProgress)
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Starting => write!(f, "Starting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
            Self::Frozen => write!(f, "Frozen"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_status_is_joinable() {
        assert!(TableStatus::Waiting.is_joinable());
        assert!(!TableStatus::Starting.is_joinable());
        assert!(!TableStatus::InProgress.is_joinable());
        assert!(!TableStatus::Frozen.is_joinable());
    }

    #[test]
    fn test_table_status_is_active() {
        assert!(TableStatus::Starting.is_active());
        assert!(TableStatus::InProgress.is_active());
        assert!(!TableStatus::Waiting.is_active());
        assert!(!TableStatus::Finished.is_active());
    }

    #[test]
    fn test_config_validated_clamps_player_limit() {
        let variant = VariantConfig::Points { per_point_value: 1.0 };
        assert_eq!(TableConfig::new(variant, 1).validated().player_limit, 2);
        assert_eq!(TableConfig::new(variant, 9).validated().player_limit, 6);
    }

    #[test]
    fn test_pack_count_by_table_size() {
        let variant = VariantConfig::Points { per_point_value: 1.0 };
        assert_eq!(TableConfig::new(variant, 2).packs(), 1);
        assert_eq!(TableConfig::new(variant, 3).packs(), 2);
        assert_eq!(TableConfig::new(variant, 6).packs(), 2);
    }
}
