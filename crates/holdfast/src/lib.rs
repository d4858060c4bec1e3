//! # Holdfast
//!
//! Server-authoritative core for co-op wave survival matches.
//!
//! A [`Match`] gathers players, counts down, then throws timed waves of
//! pooled enemies at them. Clearing every wave wins and raises the
//! difficulty; losing every player resets it. Either way the match waits
//! for a restart.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use holdfast::prelude::*;
//!
//! # async fn run() -> Result<(), HoldfastError> {
//! holdfast::init_tracing("info");
//!
//! let handle = spawn_match(next_match_id(), MatchConfig::default(), DEFAULT_CHANNEL_SIZE);
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! handle.join(PlayerId(1), tx).await?;
//! while let Some(outbound) = rx.recv().await {
//!     // render snapshots and events
//! #   let _ = outbound;
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod telemetry;

pub use error::HoldfastError;
pub use telemetry::init_tracing;

pub use holdfast_match as sim;
pub use holdfast_pool as pool;
pub use holdfast_protocol as protocol;
pub use holdfast_tick as tick;

pub mod prelude {
    pub use crate::HoldfastError;

    pub use holdfast_match::{
        next_match_id, spawn_match, DamageOutcome, EnemyTemplate, IntentError, Match,
        MatchConfig, MatchError, MatchHandle, MatchOutbound, ProjectileTemplate, RestartPolicy,
        ScoreLedger, WaveConfig, WaveDefinition, DEFAULT_CHANNEL_SIZE,
    };
    pub use holdfast_pool::{Poolable, PooledActorRegistry};
    pub use holdfast_protocol::{
        ActorId, ClientIntent, MatchId, MatchPhase, MatchSnapshot, PlayerId, ServerEvent, Vec2,
    };
}
