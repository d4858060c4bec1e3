//! Integration tests for the match tick scheduler.
//!
//! Uses paused Tokio time, so `sleep_until` resolves as soon as the runtime
//! auto-advances the clock.

use std::time::Duration;

use holdfast_tick::{Delay, TickConfig, TickScheduler};

fn config_20hz() -> TickConfig {
    TickConfig {
        initial_jitter_us: 0,
        ..TickConfig::with_rate(20)
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_ticks_at_30hz() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 30);
    assert_eq!(cfg.tick_duration(), Some(Duration::from_secs_f64(1.0 / 30.0)));
}

#[test]
fn test_zero_rate_disables_ticking() {
    assert_eq!(TickConfig::with_rate(0).tick_duration(), None);
    assert!(TickScheduler::with_rate(0).is_disabled());
}

#[test]
fn test_validated_clamps_rate_and_threshold() {
    let cfg = TickConfig {
        tick_rate_hz: 1_000,
        budget_warn_threshold: 3.0,
        initial_jitter_us: 0,
    }
    .validated();
    assert_eq!(cfg.tick_rate_hz, TickConfig::MAX_TICK_RATE_HZ);
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::new(config_20hz());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.tick_rate_hz(), 20);
    assert!(!s.is_disabled());
    assert_eq!(s.tick_duration(), Some(Duration::from_millis(50)));
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticks_are_numbered_and_fixed_length() {
    let mut s = TickScheduler::new(config_20hz());

    for expected in 1..=4 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.dt, Duration::from_millis(50));
        assert_eq!(info.ticks_skipped, 0);
        s.record_tick_end();
    }
    assert_eq!(s.tick_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_scheduler_never_fires() {
    let mut s = TickScheduler::with_rate(0);
    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;
    assert!(result.is_err(), "disabled scheduler should pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_tick_is_noop() {
    let mut s = TickScheduler::new(config_20hz());
    s.record_tick_end();
    assert_eq!(s.tick_count(), 0);
}

// =========================================================================
// Driving simulated timers from real ticks
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_delay_driven_by_scheduler() {
    let mut s = TickScheduler::new(config_20hz());
    let mut delay = Delay::new(Duration::from_millis(200));

    let mut ticks = 0;
    loop {
        let info = s.wait_for_tick().await;
        ticks += 1;
        if delay.advance(info.dt) {
            break;
        }
    }
    assert_eq!(ticks, 4);
}

#[tokio::test(start_paused = true)]
async fn test_select_loop_with_mailbox() {
    let mut s = TickScheduler::new(config_20hz());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(4);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("shutdown").await.ok();
    });

    let mut ticks_fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "shutdown");
                break;
            }
            info = s.wait_for_tick() => {
                ticks_fired += 1;
                assert_eq!(info.tick, ticks_fired);
                s.record_tick_end();
            }
        }
    }

    assert!(ticks_fired >= 3, "expected at least 3 ticks, got {ticks_fired}");
}
