//! Integration tests for the turn clock.
//!
//! Uses `tokio::time::pause()` (via `start_paused`) so deadlines
//! resolve deterministically without real waiting.

use std::time::Duration;

use meldcore_clock::{ClockConfig, Expiry, TurnClock, TurnPhase};

/// Stand-in holder token; the real engine arms with player ids.
type Seat = u32;

fn short_config() -> ClockConfig {
    ClockConfig { turn_secs: 30, extra_secs: 30 }
}

// =========================================================================
// Config
// =========================================================================

#[test]
fn test_default_config_is_thirty_seconds() {
    let cfg = ClockConfig::default();
    assert_eq!(cfg.turn_secs, 30);
    assert_eq!(cfg.extra_secs, 30);
}

#[test]
fn test_validated_clamps_zero_durations() {
    let cfg = ClockConfig { turn_secs: 0, extra_secs: 0 }.validated();
    assert_eq!(cfg.turn_secs, 1);
    assert_eq!(cfg.extra_secs, 1);
}

// =========================================================================
// Arming and state
// =========================================================================

#[test]
fn test_clock_initial_state_is_disarmed() {
    let clock: TurnClock<Seat> = TurnClock::new(short_config());
    assert!(!clock.is_armed());
    assert_eq!(clock.holder(), None);
    assert_eq!(clock.phase(), None);
}

#[test]
fn test_arm_sets_holder_and_initial_phase() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    clock.arm(7);
    assert!(clock.is_armed());
    assert_eq!(clock.holder(), Some(7));
    assert_eq!(clock.phase(), Some(TurnPhase::Initial));
}

#[test]
fn test_cancel_disarms_and_is_idempotent() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    clock.arm(7);
    clock.cancel();
    clock.cancel();
    assert!(!clock.is_armed());
}

#[test]
fn test_rearm_replaces_previous_holder() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    clock.arm(1);
    clock.arm(2);
    assert_eq!(clock.holder(), Some(2));
    assert_eq!(clock.metrics().turns_armed, 2);
}

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expired_fires_at_deadline_with_holder() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    clock.arm(3);

    let expiry = clock.expired().await;
    assert_eq!(expiry, Expiry { holder: 3, phase: TurnPhase::Initial });
    assert!(!clock.is_armed(), "expiry consumes the countdown");
    assert_eq!(clock.metrics().expiries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_does_not_fire_early() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    clock.arm(3);

    let result = tokio::time::timeout(Duration::from_secs(29), clock.expired()).await;
    assert!(result.is_err(), "deadline is 30s; nothing should fire at 29s");
    assert!(clock.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_clock_pends_forever() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());

    let result = tokio::time::timeout(Duration::from_secs(300), clock.expired()).await;
    assert!(result.is_err(), "disarmed clock should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_extend_grants_extra_phase() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    clock.arm(5);

    let first = clock.expired().await;
    assert_eq!(first.phase, TurnPhase::Initial);

    clock.extend(5);
    assert_eq!(clock.phase(), Some(TurnPhase::Extra));

    let second = clock.expired().await;
    assert_eq!(second, Expiry { holder: 5, phase: TurnPhase::Extra });
    assert_eq!(clock.metrics().extensions, 1);
    assert_eq!(clock.metrics().expiries, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_deadline_prevents_expiry() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    clock.arm(9);
    clock.cancel();

    let result = tokio::time::timeout(Duration::from_secs(120), clock.expired()).await;
    assert!(result.is_err());
    assert_eq!(clock.metrics().expiries, 0);
}

// =========================================================================
// Integration: select! loop pattern (mirrors real room usage)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_escalation() {
    let mut clock: TurnClock<Seat> = TurnClock::new(short_config());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(4);

    clock.arm(1);

    // The holder acts just after the warning would have been due for a
    // later turn; here they never act, so the clock escalates.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(120)).await;
        tx.send("stop").await.ok();
    });

    let mut warnings = 0;
    let mut skips = 0;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            expiry = clock.expired() => match expiry.phase {
                TurnPhase::Initial => {
                    warnings += 1;
                    clock.extend(expiry.holder);
                }
                TurnPhase::Extra => {
                    skips += 1;
                    // Next player's turn.
                    clock.arm(expiry.holder + 1);
                }
            }
        }
    }

    assert!(warnings >= 1);
    assert!(skips >= 1);
}
