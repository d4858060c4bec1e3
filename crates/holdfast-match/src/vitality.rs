//! Per-actor health, downed and revive state.
//!
//! ```text
//! Alive ──damage to 0──→ Downed  (player) ──revive──→ Alive
//!       └─────────────→ Removed (enemy, final until reset)
//! ```
//!
//! Every transition is idempotent: damage against a downed or removed actor
//! does nothing, so two hits crossing zero in the same tick produce exactly
//! one `Downed`/`Removed` outcome.

use std::time::Duration;

use holdfast_protocol::{ActorKind, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalState {
    Alive,
    /// Player at 0 hp, waiting for a revive.
    Downed,
    /// Enemy at 0 hp.
    Removed,
}

/// What a call to [`Vitality::apply_damage`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Nothing changed (already down, or zero damage).
    Ignored,
    /// Health dropped but is still above zero.
    Damaged { hp: u32 },
    /// A player just went down.
    Downed,
    /// An enemy just died.
    Removed,
}

impl DamageOutcome {
    /// Returns `true` if this hit changed the actor's health or state.
    pub fn landed(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Result of advancing a revive by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevivePoll {
    /// No revive in progress.
    Idle,
    Progress,
    /// The revive was broken off; all progress is lost.
    Interrupted,
    /// The actor is back on its feet.
    Completed,
}

#[derive(Debug, Clone, Copy)]
struct ReviveAttempt {
    reviver: PlayerId,
    elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct Vitality {
    kind: ActorKind,
    hp: u32,
    max_hp: u32,
    state: VitalState,
    revive: Option<ReviveAttempt>,
}

impl Vitality {
    /// A full-health actor. `max_hp` is at least 1.
    pub fn new(kind: ActorKind, max_hp: u32) -> Self {
        let max_hp = max_hp.max(1);
        Self {
            kind,
            hp: max_hp,
            max_hp,
            state: VitalState::Alive,
            revive: None,
        }
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn state(&self) -> VitalState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == VitalState::Alive
    }

    pub fn is_downed(&self) -> bool {
        self.state == VitalState::Downed
    }

    // -----------------------------------------------------------------------
    // Damage
    // -----------------------------------------------------------------------

    /// Subtracts `amount`, saturating at zero.
    ///
    /// Reaching zero downs a player or removes an enemy. Health that is
    /// already zero while still alive (lowered by [`heal`](Self::heal))
    /// forces the transition on the next hit.
    pub fn apply_damage(&mut self, amount: u32) -> DamageOutcome {
        if self.state != VitalState::Alive {
            return DamageOutcome::Ignored;
        }
        if self.hp == 0 {
            return self.fall();
        }
        if amount == 0 {
            return DamageOutcome::Ignored;
        }

        self.hp = self.hp.saturating_sub(amount);
        if self.hp == 0 {
            self.fall()
        } else {
            DamageOutcome::Damaged { hp: self.hp }
        }
    }

    fn fall(&mut self) -> DamageOutcome {
        self.hp = 0;
        self.revive = None;
        match self.kind {
            ActorKind::Player => {
                self.state = VitalState::Downed;
                DamageOutcome::Downed
            }
            ActorKind::Enemy => {
                self.state = VitalState::Removed;
                DamageOutcome::Removed
            }
        }
    }

    // -----------------------------------------------------------------------
    // Revive
    // -----------------------------------------------------------------------

    /// Starts a timed revive by `reviver`, from zero progress.
    ///
    /// Returns `false` if this actor is not a downed player or someone is
    /// already reviving it.
    pub fn begin_revive(&mut self, reviver: PlayerId) -> bool {
        if self.state != VitalState::Downed || self.revive.is_some() {
            return false;
        }
        self.revive = Some(ReviveAttempt {
            reviver,
            elapsed: Duration::ZERO,
        });
        true
    }

    /// Drops any revive in progress. Returns `true` if there was one.
    pub fn cancel_revive(&mut self) -> bool {
        self.revive.take().is_some()
    }

    pub fn reviver(&self) -> Option<PlayerId> {
        self.revive.map(|attempt| attempt.reviver)
    }

    pub fn revive_progress(&self) -> Option<Duration> {
        self.revive.map(|attempt| attempt.elapsed)
    }

    /// Advances a revive by `dt`.
    ///
    /// `reviver_distance` is `None` when the reviver is gone or no longer
    /// able to act. Leaving `radius`, or the actor leaving the downed state,
    /// interrupts the revive and discards its progress.
    pub fn poll_revive(
        &mut self,
        dt: Duration,
        reviver_distance: Option<f32>,
        radius: f32,
        duration: Duration,
    ) -> RevivePoll {
        let Some(attempt) = self.revive.as_mut() else {
            return RevivePoll::Idle;
        };

        let in_range = reviver_distance.is_some_and(|d| d <= radius);
        if self.state != VitalState::Downed || !in_range {
            self.revive = None;
            return RevivePoll::Interrupted;
        }

        attempt.elapsed += dt;
        if attempt.elapsed >= duration {
            self.revive();
            RevivePoll::Completed
        } else {
            RevivePoll::Progress
        }
    }

    /// Brings a downed player back at full health.
    pub fn revive(&mut self) -> bool {
        if self.state != VitalState::Downed {
            return false;
        }
        self.hp = self.max_hp;
        self.state = VitalState::Alive;
        self.revive = None;
        true
    }

    // -----------------------------------------------------------------------
    // Administrative
    // -----------------------------------------------------------------------

    /// Adjusts health of a living actor by `amount` (negative lowers it),
    /// clamped to `[0, max_hp]`. Never downs or removes anyone.
    pub fn heal(&mut self, amount: i64) -> u32 {
        if self.state == VitalState::Alive {
            let hp = (i64::from(self.hp) + amount).clamp(0, i64::from(self.max_hp));
            self.hp = hp as u32;
        }
        self.hp
    }

    /// Full health and alive, whatever the previous state.
    pub fn reset_state(&mut self) {
        self.hp = self.max_hp;
        self.state = VitalState::Alive;
        self.revive = None;
    }

    /// Changes the health cap and resets to it.
    pub fn rescale(&mut self, max_hp: u32) {
        self.max_hp = max_hp.max(1);
        self.reset_state();
    }
}
