//! Fixed-timestep scheduler driving a match actor.
//!
//! A match that falls behind never replays missed ticks: the scheduler logs
//! the overrun and reschedules from "now". Waves, revives and countdowns are
//! all measured in simulated time (`dt` per tick), so a late tick delays the
//! match instead of bursting it forward.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. 0 disables the tick loop entirely.
    pub tick_rate_hz: u32,
    /// Fraction (0.0–1.0) of the tick budget after which a tick logs a warning.
    pub budget_warn_threshold: f64,
    /// Upper bound for random delay (µs) added before the first tick, so
    /// matches created together do not tick in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            budget_warn_threshold: 0.80,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick rate above maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick, or `None` when ticking is disabled.
    pub fn tick_duration(&self) -> Option<Duration> {
        match self.tick_rate_hz {
            0 => None,
            hz => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Simulated time to advance by. Always the fixed tick length.
    pub dt: Duration,
    /// Whole ticks that were skipped because this one fired late.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    next_tick: Option<TokioInstant>,
    tick_start: Option<Instant>,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let jitter = match config.initial_jitter_us {
                0 => Duration::ZERO,
                max => Duration::from_micros(rand::rng().random_range(0..max)),
            };
            TokioInstant::now() + d + jitter
        });

        debug!(
            rate_hz = config.tick_rate_hz,
            budget_ms = ?tick_duration.map(|d| d.as_secs_f64() * 1000.0),
            "match tick scheduler created"
        );

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
            tick_start: None,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits for the next tick.
    ///
    /// Pends forever when ticking is disabled, which lets it sit in a
    /// `tokio::select!` next to the command mailbox.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, dt) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dt)) => (next, dt),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let ticks_skipped = (late_by.as_nanos() / dt.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "match tick overrun, skipping ahead"
            );
        }
        self.next_tick = Some(now + dt);

        trace!(tick = self.tick_count, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt,
            ticks_skipped,
        }
    }

    /// Marks the end of the current tick's simulation work and warns when it
    /// ate too much of the budget.
    pub fn record_tick_end(&mut self) {
        let (Some(start), Some(budget)) = (self.tick_start.take(), self.tick_duration) else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / budget.as_secs_f64();
        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                "match tick close to budget"
            );
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.tick_duration.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_duration
    }
}
