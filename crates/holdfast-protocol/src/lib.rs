//! Shared vocabulary for Holdfast.
//!
//! This crate defines the types that cross the boundary between the
//! authoritative match and everything around it:
//!
//! - **Identity** ([`PlayerId`], [`ActorId`], [`MatchId`], [`PrefabKey`]) —
//!   newtypes so a player can never be passed where an actor is expected.
//! - **Intents** ([`ClientIntent`]) — the only thing a remote participant
//!   may submit. The match validates every intent before applying it.
//! - **Events** ([`ServerEvent`]) — fire-and-forget notifications for the
//!   presentation layer and replication to observers.
//! - **Snapshots** ([`MatchSnapshot`]) — read-only copies of match state.
//!
//! Everything here derives serde traits so a transport layer can put it on
//! the wire in whatever format it likes. No codec lives here.
//!
//! ```text
//! Transport (bytes) → Protocol (intents/events) → Match (authoritative state)
//! ```

mod messages;
mod types;

pub use messages::{ClientIntent, MatchSnapshot, PlayerView, ServerEvent};
pub use types::{
    ActorId, ActorKind, MatchId, MatchPhase, PlayerId, PrefabKey, Transform, Vec2,
};
