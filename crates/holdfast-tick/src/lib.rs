//! Time for Holdfast matches.
//!
//! Two halves:
//!
//! - [`TickScheduler`] — wall-clock fixed-timestep driver that wakes the
//!   match actor once per tick.
//! - [`Delay`], [`Pulse`], [`CancelToken`], [`GenerationIssuer`] —
//!   simulation-time building blocks for cooperative routines. A routine
//!   advances only when the match ticks it with the fixed `dt`, so the whole
//!   simulation stays deterministic and testable without a runtime.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = mailbox.recv() => { /* apply command */ }
//!         tick = scheduler.wait_for_tick() => {
//!             game.tick(tick.dt);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod scheduler;
mod timer;

pub use scheduler::{TickConfig, TickInfo, TickScheduler};
pub use timer::{CancelToken, Delay, GenerationIssuer, Pulse};
