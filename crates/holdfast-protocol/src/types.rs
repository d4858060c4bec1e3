//! Identity and geometry types shared by every Holdfast crate.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::ops::{Add, Mul, Sub};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A connected participant.
///
/// Serialized as a plain number (`#[serde(transparent)]`), so `PlayerId(42)`
/// is `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A pooled, networked actor instance (enemy, hit effect, ...).
///
/// Ids are issued by the pool and stay with the instance for its whole
/// life, across every acquire/release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// One match (one authoritative simulation instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// Names an actor template ("prefab") in the content catalog.
///
/// An empty key is never valid; the pool rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefabKey(pub String);

impl PrefabKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PrefabKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrefabKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point on the 2D play field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Angle of this vector in radians, as stored in [`Transform::rotation`].
    pub fn heading(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Unit vector pointing along `rotation` radians.
    pub fn from_heading(rotation: f32) -> Self {
        Self::new(rotation.cos(), rotation.sin())
    }

    /// Distance to the closest point of the segment `from`..`to`.
    pub fn distance_to_segment(self, from: Self, to: Self) -> f32 {
        let path = to - from;
        let length_sq = path.dot(path);
        if length_sq <= f32::EPSILON {
            return self.distance(from);
        }
        let t = ((self - from).dot(path) / length_sq).clamp(0.0, 1.0);
        self.distance(from + path * t)
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Position plus facing (radians). What the pool stamps onto an instance
/// when it is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
}

impl Transform {
    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            rotation: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Actor kind
// ---------------------------------------------------------------------------

/// What an actor is, fixed when it is created.
///
/// Players go down and can be revived; enemies are removed when their
/// health reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Player,
    Enemy,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "Player"),
            Self::Enemy => write!(f, "Enemy"),
        }
    }
}

// ---------------------------------------------------------------------------
// Match phase
// ---------------------------------------------------------------------------

/// The match-level state machine, replicated to observers.
///
/// ```text
/// WaitingForPlayers → Countdown → { WaveCountdown → Spawning → AwaitingClear → Reward }*
///                                   → Victory | Defeat → RestartPending → Countdown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchPhase {
    WaitingForPlayers,
    Countdown,
    WaveCountdown,
    Spawning,
    AwaitingClear,
    Reward,
    Victory,
    Defeat,
    RestartPending,
}

impl MatchPhase {
    /// Returns `true` while a wave-loop generation is running.
    pub fn is_wave_active(&self) -> bool {
        matches!(
            self,
            Self::WaveCountdown | Self::Spawning | Self::AwaitingClear | Self::Reward
        )
    }

    /// Returns `true` once the match has been decided and awaits a restart.
    pub fn is_over(&self) -> bool {
        matches!(self, Self::Victory | Self::Defeat | Self::RestartPending)
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitingForPlayers => "WaitingForPlayers",
            Self::Countdown => "Countdown",
            Self::WaveCountdown => "WaveCountdown",
            Self::Spawning => "Spawning",
            Self::AwaitingClear => "AwaitingClear",
            Self::Reward => "Reward",
            Self::Victory => "Victory",
            Self::Defeat => "Defeat",
            Self::RestartPending => "RestartPending",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_values() {
        assert_eq!(serde_json::to_string(&PlayerId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&ActorId(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&PrefabKey::new("grunt")).unwrap(),
            "\"grunt\""
        );
    }

    #[test]
    fn test_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
        assert_eq!(ActorId(3).to_string(), "A-3");
        assert_eq!(MatchId(1).to_string(), "M-1");
    }

    #[test]
    fn test_prefab_key_empty() {
        assert!(PrefabKey::new("").is_empty());
        assert!(!PrefabKey::from("grunt").is_empty());
    }

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f32::EPSILON);
        assert_eq!(b.distance(b), 0.0);
    }

    #[test]
    fn test_vec2_segment_distance() {
        let from = Vec2::ZERO;
        let to = Vec2::new(10.0, 0.0);
        assert!((Vec2::new(5.0, 2.0).distance_to_segment(from, to) - 2.0).abs() < 1e-5);
        assert!((Vec2::new(13.0, 4.0).distance_to_segment(from, to) - 5.0).abs() < 1e-5);
        assert!((Vec2::new(0.0, 1.0).distance_to_segment(from, from) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_vec2_heading_round_trips_direction() {
        let heading = Vec2::new(0.0, 2.0).heading();
        let unit = Vec2::from_heading(heading);
        assert!(unit.distance(Vec2::new(0.0, 1.0)) < 1e-5);
        assert_eq!(Vec2::ZERO.heading(), 0.0);
    }

    #[test]
    fn test_match_phase_groups() {
        assert!(MatchPhase::Spawning.is_wave_active());
        assert!(MatchPhase::Reward.is_wave_active());
        assert!(!MatchPhase::Countdown.is_wave_active());
        assert!(MatchPhase::RestartPending.is_over());
        assert!(!MatchPhase::AwaitingClear.is_over());
    }
}
