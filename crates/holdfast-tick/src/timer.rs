//! Simulation-time suspension primitives.
//!
//! A match routine is a state machine ticked with a fixed `dt`. Where a
//! coroutine would say "wait 5 seconds", the routine holds a [`Delay`] and
//! checks it every tick; where it would say "every second, announce", it
//! holds a [`Pulse`]. Cancellation is a [`CancelToken`] checked at every
//! suspension point.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// One-shot countdown in simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    remaining: Duration,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Self {
            remaining: duration,
        }
    }

    /// Builds a delay from seconds. Negative and NaN values become zero.
    pub fn from_secs_f32(secs: f32) -> Self {
        Self::new(Duration::try_from_secs_f32(secs.max(0.0)).unwrap_or(Duration::ZERO))
    }

    /// Advances by `dt` and returns `true` once the delay has run out.
    ///
    /// Keeps returning `true` after that; callers move on to the next step.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.remaining = self.remaining.saturating_sub(dt);
        self.remaining.is_zero()
    }

    pub fn is_elapsed(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }
}

// ---------------------------------------------------------------------------
// Pulse
// ---------------------------------------------------------------------------

/// Fires on the first poll and then once per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    period: Duration,
    until_next: Duration,
}

impl Pulse {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            until_next: Duration::ZERO,
        }
    }

    pub fn poll(&mut self, dt: Duration) -> bool {
        if self.until_next > dt {
            self.until_next -= dt;
            false
        } else {
            self.until_next = self.period;
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared cancellation flag.
///
/// Cloning shares the flag. Cancelling is idempotent and safe on a token
/// whose routine already finished.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Hands out numbered generations, one live at a time.
///
/// Issuing a new generation cancels the previous one, so a routine that
/// checks its token at every suspension point stops before the new one
/// makes its first move.
#[derive(Debug, Default)]
pub struct GenerationIssuer {
    current: u64,
    token: Option<CancelToken>,
}

impl GenerationIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> (u64, CancelToken) {
        self.cancel_current();
        self.current += 1;
        let token = CancelToken::new();
        self.token = Some(token.clone());
        debug!(generation = self.current, "generation issued");
        (self.current, token)
    }

    /// Cancels the live generation, if any.
    pub fn cancel_current(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
            debug!(generation = self.current, "generation cancelled");
        }
    }

    /// Number of the most recently issued generation (0 before the first).
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Returns `true` if `generation` is the live one.
    pub fn is_live(&self, generation: u64) -> bool {
        generation == self.current && self.token.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}
