//! Unified error type for Holdfast.

use holdfast_match::{ConfigError, IntentError, MatchError, SpawnError};
use holdfast_pool::PoolError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum HoldfastError {
    /// A match config failed to parse.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An actor pool refused a request (unknown prefab, empty key).
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// An intent was rejected by the match.
    #[error(transparent)]
    Intent(#[from] IntentError),

    /// A match host error (full, not joined, unavailable).
    #[error(transparent)]
    Match(#[from] MatchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_protocol::{MatchId, PlayerId, PrefabKey};

    #[test]
    fn test_from_config_error() {
        let err = holdfast_match::MatchConfig::from_json("{ not json").unwrap_err();
        let holdfast_err: HoldfastError = err.into();
        assert!(matches!(holdfast_err, HoldfastError::Config(_)));
    }

    #[test]
    fn test_from_pool_error() {
        let err = PoolError::Unregistered(PrefabKey::new("ghost"));
        let holdfast_err: HoldfastError = err.into();
        assert!(matches!(holdfast_err, HoldfastError::Pool(_)));
        assert!(holdfast_err.to_string().contains("ghost"));
    }

    #[test]
    fn test_from_spawn_error() {
        let holdfast_err: HoldfastError = SpawnError::NoSpawnPoints.into();
        assert!(matches!(holdfast_err, HoldfastError::Spawn(_)));
    }

    #[test]
    fn test_from_intent_error() {
        let holdfast_err: HoldfastError = IntentError::SelfRevive.into();
        assert!(matches!(holdfast_err, HoldfastError::Intent(_)));
    }

    #[test]
    fn test_from_match_error() {
        let err = MatchError::NotJoined(PlayerId(3), MatchId(1));
        let holdfast_err: HoldfastError = err.into();
        assert!(matches!(holdfast_err, HoldfastError::Match(_)));
        assert!(holdfast_err.to_string().contains("P-3"));
    }
}
