//! Messages exchanged between participants and the authoritative match.
//!
//! Participants never mutate match state. They submit a [`ClientIntent`];
//! the match validates it and, if accepted, applies it and publishes the
//! resulting [`ServerEvent`]s.

use serde::{Deserialize, Serialize};

use crate::{ActorId, MatchPhase, PlayerId, PrefabKey, Vec2};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Something a participant asks the match to do.
///
/// Internally tagged: `{ "type": "Attack", "target": 12 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientIntent {
    /// Report the participant's avatar position. Ignored while downed.
    Move { position: Vec2 },

    /// Hit an enemy with the participant's weapon. Damage comes from the
    /// player template, never from the client.
    Attack { target: ActorId },

    /// Start reviving a downed teammate. The reviver must stay within the
    /// revive radius for the whole revive duration.
    Interact { target: PlayerId },

    /// Stop any revive this participant is performing.
    CancelInteract,

    /// Ask for a new match after victory or defeat.
    RequestRestart,
}

// ---------------------------------------------------------------------------
// Server → clients
// ---------------------------------------------------------------------------

/// A notification published by the match.
///
/// The presentation layer turns these into text, popups and sounds; a
/// missing listener is never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Free-form status line ("waiting for players (1/2)", countdowns, ...).
    StatusMessage { text: String },

    /// The match moved to a new phase.
    PhaseChanged { phase: MatchPhase },

    /// A wave began (1-based wave number).
    WaveStarted { wave: u32 },

    /// Every enemy of the wave was eliminated.
    WaveCompleted { wave: u32 },

    /// Enemies left in the current wave.
    EnemyCount { remaining: u32 },

    /// All players are down.
    GameOver,

    /// All waves were cleared.
    GameWin,

    /// Offer the restart button. `difficulty` is the level just played; a
    /// victory raises it by one on restart, a defeat resets it to 1.
    RestartPopup { is_victory: bool, difficulty: u32 },

    /// A restart was accepted; close the popup.
    HideRestartPopup,

    /// A pooled actor became live at `position`.
    ActorSpawned {
        actor: ActorId,
        prefab: PrefabKey,
        position: Vec2,
    },

    /// A pooled actor went back to its pool (or was discarded).
    ActorDespawned { actor: ActorId },

    /// An enemy took damage (hit feedback).
    EnemyDamaged { actor: ActorId, hp: u32 },

    /// A player took damage.
    PlayerDamaged { player: PlayerId, hp: u32 },

    PlayerDowned { player: PlayerId },

    PlayerRevived { player: PlayerId },

    ReviveStarted { target: PlayerId, reviver: PlayerId },

    /// Revive progress on `target` was lost.
    ReviveInterrupted { target: PlayerId },

    ScoreChanged { player: PlayerId, score: u32 },
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Read-only view of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub player: PlayerId,
    pub hp: u32,
    pub max_hp: u32,
    pub downed: bool,
    pub position: Vec2,
    pub score: u32,
}

/// Read-only copy of match state, sent to participants on join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub phase: MatchPhase,
    /// Zero-based index of the current (or next) wave.
    pub wave_index: u32,
    pub difficulty_level: u32,
    pub killed_in_wave: u32,
    pub total_in_wave: u32,
    pub enemies_alive: u32,
    pub players: Vec<PlayerView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_json_is_internally_tagged() {
        let intent = ClientIntent::Attack {
            target: ActorId(12),
        };
        let json: serde_json::Value = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["type"], "Attack");
        assert_eq!(json["target"], 12);
    }

    #[test]
    fn test_intent_decodes_from_client_json() {
        let intent: ClientIntent =
            serde_json::from_str(r#"{"type":"Interact","target":3}"#).unwrap();
        assert_eq!(
            intent,
            ClientIntent::Interact {
                target: PlayerId(3)
            }
        );

        let intent: ClientIntent =
            serde_json::from_str(r#"{"type":"RequestRestart"}"#).unwrap();
        assert_eq!(intent, ClientIntent::RequestRestart);
    }

    #[test]
    fn test_restart_popup_json_shape() {
        let event = ServerEvent::RestartPopup {
            is_victory: true,
            difficulty: 2,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RestartPopup");
        assert_eq!(json["is_victory"], true);
        assert_eq!(json["difficulty"], 2);
    }

    #[test]
    fn test_unknown_intent_is_rejected() {
        let result: Result<ClientIntent, _> =
            serde_json::from_str(r#"{"type":"Teleport","x":1}"#);
        assert!(result.is_err());
    }
}
