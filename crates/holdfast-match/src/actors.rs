//! The actors a match simulates: player avatars, pooled enemies, pooled
//! projectiles, and pooled hit effects.

use std::time::Duration;

use holdfast_pool::Poolable;
use holdfast_protocol::{ActorKind, PlayerId, PlayerView, Transform, Vec2};
use holdfast_tick::Delay;

use crate::config::{secs, EffectTemplate, EnemyTemplate, ProjectileTemplate};
use crate::vitality::{DamageOutcome, Vitality};

// ---------------------------------------------------------------------------
// Player avatar
// ---------------------------------------------------------------------------

/// A participant's avatar. Lives as long as the participant is connected.
#[derive(Debug, Clone)]
pub struct PlayerAvatar {
    pub(crate) vitality: Vitality,
    pub(crate) position: Vec2,
    pub(crate) score: u32,
}

impl PlayerAvatar {
    pub fn new(max_hp: u32, position: Vec2) -> Self {
        Self {
            vitality: Vitality::new(ActorKind::Player, max_hp),
            position,
            score: 0,
        }
    }

    pub fn vitality(&self) -> &Vitality {
        &self.vitality
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn view(&self, player: PlayerId) -> PlayerView {
        PlayerView {
            player,
            hp: self.vitality.hp(),
            max_hp: self.vitality.max_hp(),
            downed: self.vitality.is_downed(),
            position: self.position,
            score: self.score,
        }
    }
}

// ---------------------------------------------------------------------------
// Enemy
// ---------------------------------------------------------------------------

/// A pooled hostile actor.
///
/// Freshly acquired enemies are not ready: they ignore damage and cannot
/// attack until the ready handshake completes.
#[derive(Debug)]
pub struct Enemy {
    vitality: Vitality,
    contact_damage: u32,
    attack_cooldown: Duration,
    score_value: u32,
    ready: bool,
    last_attacker: Option<PlayerId>,
    next_attack_at: Duration,
    position: Vec2,
}

impl Poolable for Enemy {
    type Template = EnemyTemplate;

    fn instantiate(template: &EnemyTemplate) -> Self {
        Self {
            vitality: Vitality::new(ActorKind::Enemy, template.max_hp),
            contact_damage: template.contact_damage,
            attack_cooldown: secs(template.attack_cooldown_secs),
            score_value: template.score_value,
            ready: false,
            last_attacker: None,
            next_attack_at: Duration::ZERO,
            position: Vec2::ZERO,
        }
    }

    fn on_acquired(&mut self, transform: Transform) {
        self.position = transform.position;
        self.ready = false;
        self.last_attacker = None;
        self.next_attack_at = Duration::ZERO;
        self.vitality.reset_state();
    }

    fn on_released(&mut self) {
        self.ready = false;
    }
}

impl Enemy {
    /// Sets full health for this life, see [`EnemyTemplate::max_hp_at`].
    pub fn prepare(&mut self, max_hp: u32) {
        self.vitality.rescale(max_hp);
    }

    /// Completes the ready handshake. Returns `false` if already ready.
    pub fn mark_ready(&mut self) -> bool {
        !std::mem::replace(&mut self.ready, true)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn vitality(&self) -> &Vitality {
        &self.vitality
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn last_attacker(&self) -> Option<PlayerId> {
        self.last_attacker
    }

    pub fn score_value(&self) -> u32 {
        self.score_value
    }

    /// Applies a player's hit. Ignored before the ready handshake.
    pub fn take_hit(&mut self, attacker: PlayerId, amount: u32) -> DamageOutcome {
        if !self.ready {
            return DamageOutcome::Ignored;
        }
        let outcome = self.vitality.apply_damage(amount);
        if outcome.landed() {
            self.last_attacker = Some(attacker);
        }
        outcome
    }

    /// Contact damage to deal at simulated time `now`, if the cooldown
    /// allows an attack.
    pub fn try_contact(&mut self, now: Duration) -> Option<u32> {
        if !self.ready || !self.vitality.is_alive() || now < self.next_attack_at {
            return None;
        }
        self.next_attack_at = now + self.attack_cooldown;
        Some(self.contact_damage)
    }
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

/// A pooled shot. Its heading comes from the acquire transform's rotation;
/// owner and damage are stamped by [`launch`](Self::launch).
#[derive(Debug)]
pub struct Projectile {
    speed: f32,
    lifetime: Duration,
    remaining: Delay,
    position: Vec2,
    direction: Vec2,
    damage: u32,
    owner: Option<PlayerId>,
}

/// One tick of a projectile's flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flight {
    pub from: Vec2,
    pub to: Vec2,
    /// The lifetime ran out during this tick.
    pub expired: bool,
}

impl Poolable for Projectile {
    type Template = ProjectileTemplate;

    fn instantiate(template: &ProjectileTemplate) -> Self {
        let lifetime = secs(template.lifetime_secs);
        Self {
            speed: template.speed,
            lifetime,
            remaining: Delay::new(lifetime),
            position: Vec2::ZERO,
            direction: Vec2::ZERO,
            damage: 0,
            owner: None,
        }
    }

    fn on_acquired(&mut self, transform: Transform) {
        self.position = transform.position;
        self.direction = Vec2::from_heading(transform.rotation);
        self.remaining = Delay::new(self.lifetime);
        self.damage = 0;
        self.owner = None;
    }

    fn on_released(&mut self) {
        self.owner = None;
    }
}

impl Projectile {
    pub fn launch(&mut self, owner: PlayerId, damage: u32) {
        self.owner = Some(owner);
        self.damage = damage;
    }

    pub fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    pub fn damage(&self) -> u32 {
        self.damage
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Moves the projectile along its heading for `dt`.
    pub fn advance(&mut self, dt: Duration) -> Flight {
        let from = self.position;
        self.position = from + self.direction * (self.speed * dt.as_secs_f32());
        Flight {
            from,
            to: self.position,
            expired: self.remaining.advance(dt),
        }
    }
}

// ---------------------------------------------------------------------------
// Hit effect
// ---------------------------------------------------------------------------

/// A pooled cosmetic that returns to its pool once its lifetime runs out.
#[derive(Debug)]
pub struct HitEffect {
    lifetime: Duration,
    remaining: Delay,
}

impl Poolable for HitEffect {
    type Template = EffectTemplate;

    fn instantiate(template: &EffectTemplate) -> Self {
        let lifetime = secs(template.lifetime_secs);
        Self {
            lifetime,
            remaining: Delay::new(lifetime),
        }
    }

    fn on_acquired(&mut self, _transform: Transform) {
        self.remaining = Delay::new(self.lifetime);
    }
}

impl HitEffect {
    /// Advances the lifetime. Returns `true` once it has run out.
    pub fn expire(&mut self, dt: Duration) -> bool {
        self.remaining.advance(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_enemy() -> Enemy {
        let mut enemy = Enemy::instantiate(&EnemyTemplate::default());
        enemy.on_acquired(Transform::at(Vec2::new(1.0, 1.0)));
        enemy.mark_ready();
        enemy
    }

    #[test]
    fn test_enemy_ignores_damage_until_ready() {
        let mut enemy = Enemy::instantiate(&EnemyTemplate::default());
        enemy.on_acquired(Transform::default());
        assert_eq!(enemy.take_hit(PlayerId(1), 1), DamageOutcome::Ignored);
        assert_eq!(enemy.last_attacker(), None);

        assert!(enemy.mark_ready());
        assert!(!enemy.mark_ready());
        assert_eq!(enemy.take_hit(PlayerId(1), 1), DamageOutcome::Damaged { hp: 4 });
        assert_eq!(enemy.last_attacker(), Some(PlayerId(1)));
    }

    #[test]
    fn test_last_attacker_is_the_killer() {
        let mut enemy = ready_enemy();
        enemy.take_hit(PlayerId(1), 4);
        assert_eq!(enemy.take_hit(PlayerId(2), 1), DamageOutcome::Removed);
        assert_eq!(enemy.last_attacker(), Some(PlayerId(2)));
        assert_eq!(enemy.take_hit(PlayerId(1), 1), DamageOutcome::Ignored);
        assert_eq!(enemy.last_attacker(), Some(PlayerId(2)));
    }

    #[test]
    fn test_prepare_rescales_health() {
        let template = EnemyTemplate::default();
        let mut enemy = ready_enemy();
        enemy.prepare(template.max_hp_at(3));
        assert_eq!(enemy.vitality().max_hp(), 7);
        assert_eq!(enemy.vitality().hp(), 7);
        enemy.prepare(template.max_hp_at(1));
        assert_eq!(enemy.vitality().max_hp(), 5);
    }

    #[test]
    fn test_contact_respects_cooldown() {
        let mut enemy = ready_enemy();
        assert_eq!(enemy.try_contact(Duration::from_millis(0)), Some(1));
        assert_eq!(enemy.try_contact(Duration::from_millis(500)), None);
        assert_eq!(enemy.try_contact(Duration::from_millis(1000)), Some(1));
    }

    #[test]
    fn test_reacquire_clears_previous_life() {
        let mut enemy = ready_enemy();
        enemy.take_hit(PlayerId(1), 10);
        enemy.on_released();
        enemy.on_acquired(Transform::default());
        assert!(!enemy.is_ready());
        assert!(enemy.vitality().is_alive());
        assert_eq!(enemy.last_attacker(), None);
    }

    fn fired_east() -> Projectile {
        let mut projectile = Projectile::instantiate(&ProjectileTemplate::default());
        projectile.on_acquired(Transform {
            position: Vec2::new(1.0, 2.0),
            rotation: Vec2::new(1.0, 0.0).heading(),
        });
        projectile.launch(PlayerId(3), 2);
        projectile
    }

    #[test]
    fn test_projectile_flies_along_heading() {
        let mut projectile = fired_east();
        let flight = projectile.advance(Duration::from_millis(500));

        assert_eq!(flight.from, Vec2::new(1.0, 2.0));
        assert!(flight.to.distance(Vec2::new(6.0, 2.0)) < 1e-4);
        assert!(!flight.expired);
        assert_eq!(projectile.owner(), Some(PlayerId(3)));
        assert_eq!(projectile.damage(), 2);
    }

    #[test]
    fn test_projectile_expires_and_resets_on_reuse() {
        let mut projectile = fired_east();
        assert!(!projectile.advance(Duration::from_millis(1_500)).expired);
        assert!(projectile.advance(Duration::from_millis(500)).expired);

        projectile.on_released();
        assert_eq!(projectile.owner(), None);
        projectile.on_acquired(Transform::at(Vec2::ZERO));
        assert_eq!(projectile.position(), Vec2::ZERO);
        assert_eq!(projectile.damage(), 0);
        assert!(!projectile.advance(Duration::from_millis(1_500)).expired, "lifetime restarts");
    }

    #[test]
    fn test_hit_effect_expires_after_lifetime() {
        let mut effect = HitEffect::instantiate(&EffectTemplate::default());
        effect.on_acquired(Transform::default());
        assert!(!effect.expire(Duration::from_millis(600)));
        assert!(effect.expire(Duration::from_millis(400)));

        effect.on_acquired(Transform::default());
        assert!(!effect.expire(Duration::from_millis(600)), "lifetime restarts");
    }
}
