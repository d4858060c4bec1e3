//! Error types for the match layer.

use holdfast_pool::PoolError;
use holdfast_protocol::{ActorId, MatchId, MatchPhase, PlayerId};

/// A configuration document could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid match config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why the spawn coordinator could not issue an enemy.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("no enemy prefab configured")]
    NoEnemyPrefab,

    #[error("no spawn points configured")]
    NoSpawnPoints,

    /// The previous enemy has not confirmed readiness yet.
    #[error("still waiting for enemy {0} to become ready")]
    AwaitingReady(ActorId),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Why a participant's intent was rejected.
///
/// Rejections are reported back to the caller and logged at debug level;
/// they never change match state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntentError {
    #[error("player {0} is not in the match")]
    NotParticipant(PlayerId),

    /// Downed players cannot move, attack, or revive.
    #[error("player {0} is downed")]
    SenderDowned(PlayerId),

    #[error("actor {0} is not a live enemy")]
    UnknownTarget(ActorId),

    /// No projectile is configured, so there is nothing to attack with.
    #[error("attacks are unavailable in this match")]
    Unarmed,

    #[error("player {0} is not downed")]
    TargetNotDowned(PlayerId),

    #[error("a player cannot revive themselves")]
    SelfRevive,

    #[error("revive is disabled in this match")]
    ReviveDisabled,

    /// The reviver is further than the revive radius from the target.
    #[error("player {0} is out of revive range")]
    OutOfRange(PlayerId),

    #[error("player {0} is already being revived")]
    ReviveInProgress(PlayerId),

    #[error("restart is not available in phase {0}")]
    RestartUnavailable(MatchPhase),
}

/// Errors from the match host.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("match {0} is full")]
    MatchFull(MatchId),

    #[error("player {0} already in match {1}")]
    AlreadyJoined(PlayerId, MatchId),

    #[error("player {0} not in match {1}")]
    NotJoined(PlayerId, MatchId),

    /// The match task is gone or its mailbox is closed.
    #[error("match {0} is unavailable")]
    Unavailable(MatchId),

    #[error(transparent)]
    Intent(#[from] IntentError),
}
