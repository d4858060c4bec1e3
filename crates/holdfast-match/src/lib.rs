//! The authoritative simulation core of a Holdfast match.
//!
//! A match gathers its participants, counts down, then runs timed waves of
//! enemies until every wave is cleared (victory) or every player is downed
//! (defeat), and restarts at a new difficulty on request.
//!
//! # Key types
//!
//! - [`Match`] — the match state machine; single writer of all match state
//! - [`WaveSpawnCoordinator`] — issues enemies one at a time, gated by the
//!   ready handshake
//! - [`Vitality`] — per-actor health, downed and revive state
//! - [`EventBus`] — typed publish/subscribe for [`ServerEvent`]s
//! - [`MatchConfig`] — timings, waves, content templates
//! - [`spawn_match`] / [`MatchHandle`] — run a match in its own Tokio task
//!
//! [`ServerEvent`]: holdfast_protocol::ServerEvent

mod actors;
mod bus;
mod config;
mod error;
mod host;
mod intent;
mod orchestrator;
mod routine;
mod spawner;
mod vitality;

pub use actors::{Enemy, Flight, HitEffect, PlayerAvatar, Projectile};
pub use bus::{EventBus, SubscriptionId};
pub use config::{
    EffectTemplate, EnemyTemplate, MatchConfig, PlayerTemplate, ProjectileTemplate, RestartPolicy,
    ReviveConfig, SpawnCosmetics, WaveConfig, WaveDefinition,
};
pub use error::{ConfigError, IntentError, MatchError, SpawnError};
pub use host::{
    next_match_id, spawn_match, MatchHandle, MatchOutbound, ParticipantSender,
    DEFAULT_CHANNEL_SIZE,
};
pub use orchestrator::{Match, Role, ScoreLedger};
pub use spawner::WaveSpawnCoordinator;
pub use vitality::{DamageOutcome, RevivePoll, VitalState, Vitality};
