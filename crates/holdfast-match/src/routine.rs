//! Resumable state of the match's timed routines.
//!
//! Each routine is a small state machine the orchestrator advances once per
//! tick. A step that would "wait" holds a [`Delay`]; a step that would
//! "wait until" re-checks its condition on the next tick.

use holdfast_tick::{CancelToken, Delay, Pulse};

/// Lobby: gather participants, then count down to the first wave.
#[derive(Debug)]
pub(crate) enum Lobby {
    AwaitQuota { status: Pulse },
    QuotaMet { pause: Delay },
    Countdown { remaining: u32, second: Delay },
}

/// One wave-loop generation. Dropped as soon as its token is cancelled.
#[derive(Debug)]
pub(crate) struct WaveLoop {
    pub(crate) generation: u64,
    pub(crate) token: CancelToken,
    /// Zero-based index into the wave list.
    pub(crate) wave: usize,
    pub(crate) step: WaveStep,
}

#[derive(Debug)]
pub(crate) enum WaveStep {
    Begin,
    Countdown { remaining: u32, second: Delay },
    Spawning { issued: u32, gate: SpawnGate },
    AwaitingClear,
    Reward { pause: Delay },
}

/// Spawning sub-state: one enemy in flight at a time.
#[derive(Debug)]
pub(crate) enum SpawnGate {
    Issue,
    AwaitReady,
    Interval(Delay),
}

/// Restart: announce, let clients settle, reset, count down, go.
#[derive(Debug)]
pub(crate) enum Restart {
    Settle { pause: Delay },
    Warmup { pause: Delay },
}
