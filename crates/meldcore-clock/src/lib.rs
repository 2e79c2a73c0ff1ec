//! Per-turn deadline clock for Meldcore.
//!
//! Each room actor owns one [`TurnClock`]. Arming it starts the turn
//! countdown; when the deadline passes, [`TurnClock::expired`] resolves
//! with the holder whose time ran out. A turn gets one extra-time grant
//! before it is forfeited, so a full escalation is:
//!
//! 1. `arm(player)` — initial countdown starts.
//! 2. `expired()` resolves with [`TurnPhase::Initial`] — the actor
//!    warns the player and calls `extend(player)`.
//! 3. `expired()` resolves with [`TurnPhase::Extra`] — the actor skips
//!    the turn.
//!
//! # Integration
//!
//! The clock sits inside a room actor's `tokio::select!` loop. While
//! disarmed (nobody's turn, e.g. between rounds) `expired` pends
//! forever, so the select keeps servicing commands:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         expiry = clock.expired() => { /* warn, extend, or skip */ }
//!     }
//! }
//! ```
//!
//! The clock is generic over the holder token so it carries no
//! dependency on any game crate.

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Countdown lengths for a turn.
#[derive(Debug, Clone, Copy)]
pub struct ClockConfig {
    /// Seconds for the initial countdown.
    pub turn_secs: u64,
    /// Seconds granted by the one extra-time extension.
    pub extra_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { turn_secs: 30, extra_secs: 30 }
    }
}

impl ClockConfig {
    /// Clamp out-of-range values so the config is safe to use. Called
    /// automatically by [`TurnClock::new`]. A zero countdown would make
    /// turns unplayable, so both durations are floored at one second.
    pub fn validated(mut self) -> Self {
        if self.turn_secs == 0 {
            warn!("turn_secs of 0 is unplayable — clamping to 1");
            self.turn_secs = 1;
        }
        if self.extra_secs == 0 {
            warn!("extra_secs of 0 is unplayable — clamping to 1");
            self.extra_secs = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

/// Which countdown just ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// The initial countdown; the holder is owed a warning and one
    /// extension.
    Initial,
    /// The extension; the turn is forfeit.
    Extra,
}

/// Returned by [`TurnClock::expired`] when a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry<T> {
    /// Whose turn timed out.
    pub holder: T,
    pub phase: TurnPhase,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters for one clock's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockMetrics {
    /// Turns armed (initial countdowns started).
    pub turns_armed: u64,
    /// Extra-time grants.
    pub extensions: u64,
    /// Deadlines that actually fired (either phase).
    pub expiries: u64,
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

struct Armed<T> {
    holder: T,
    phase: TurnPhase,
    deadline: TokioInstant,
}

/// Single-deadline turn clock. One per room actor; rooms never share
/// clocks, so there is no global timer registry to clean up.
pub struct TurnClock<T> {
    config: ClockConfig,
    armed: Option<Armed<T>>,
    metrics: ClockMetrics,
}

impl<T: Copy + Eq + fmt::Debug + Send> TurnClock<T> {
    pub fn new(config: ClockConfig) -> Self {
        Self { config: config.validated(), armed: None, metrics: ClockMetrics::default() }
    }

    /// Starts the initial countdown for `holder`, replacing any
    /// previous deadline.
    pub fn arm(&mut self, holder: T) {
        debug!(?holder, secs = self.config.turn_secs, "turn clock armed");
        self.armed = Some(Armed {
            holder,
            phase: TurnPhase::Initial,
            deadline: TokioInstant::now() + Duration::from_secs(self.config.turn_secs),
        });
        self.metrics.turns_armed += 1;
    }

    /// Grants the extra-time countdown to `holder` after an
    /// [`TurnPhase::Initial`] expiry.
    pub fn extend(&mut self, holder: T) {
        debug!(?holder, secs = self.config.extra_secs, "turn clock extended");
        self.armed = Some(Armed {
            holder,
            phase: TurnPhase::Extra,
            deadline: TokioInstant::now() + Duration::from_secs(self.config.extra_secs),
        });
        self.metrics.extensions += 1;
    }

    /// Disarms the clock. Called when the holder acts in time or the
    /// round ends. Idempotent.
    pub fn cancel(&mut self) {
        if self.armed.take().is_some() {
            debug!("turn clock cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Current holder, if a countdown is running.
    pub fn holder(&self) -> Option<T> {
        self.armed.as_ref().map(|a| a.holder)
    }

    /// Phase of the running countdown, if any.
    pub fn phase(&self) -> Option<TurnPhase> {
        self.armed.as_ref().map(|a| a.phase)
    }

    /// Seconds the initial countdown runs for. What clients are told
    /// when a turn starts.
    pub fn turn_secs(&self) -> u64 {
        self.config.turn_secs
    }

    /// Seconds the extension runs for.
    pub fn extra_secs(&self) -> u64 {
        self.config.extra_secs
    }

    pub fn metrics(&self) -> &ClockMetrics {
        &self.metrics
    }

    /// Waits for the current deadline. Disarms the clock and returns
    /// the [`Expiry`] when it fires.
    ///
    /// While disarmed this future pends forever — `tokio::select!`
    /// keeps servicing its other branches.
    pub async fn expired(&mut self) -> Expiry<T> {
        let Some(armed) = &self.armed else {
            std::future::pending::<()>().await;
            unreachable!()
        };
        time::sleep_until(armed.deadline).await;

        // Deadline passed; the countdown is consumed either way.
        let armed = self
            .armed
            .take()
            .unwrap_or_else(|| unreachable!("armed state checked above"));
        self.metrics.expiries += 1;
        debug!(holder = ?armed.holder, phase = ?armed.phase, "turn clock expired");
        Expiry { holder: armed.holder, phase: armed.phase }
    }
}
