//! Error types for the pool layer.

use holdfast_protocol::PrefabKey;

/// Why an acquire could not produce an instance.
///
/// An exhausted free queue is not an error; the pool allocates a fresh
/// instance instead.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The prefab key was empty.
    #[error("empty prefab key")]
    EmptyPrefabKey,

    /// No template was registered under this key.
    #[error("prefab {0} is not registered")]
    Unregistered(PrefabKey),
}
