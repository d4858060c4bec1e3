//! Match configuration and content templates.

use std::time::Duration;

use holdfast_protocol::{PrefabKey, Vec2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ConfigError;

// ---------------------------------------------------------------------------
// Waves
// ---------------------------------------------------------------------------

/// One wave: how many enemies, and how far apart they are issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveDefinition {
    pub enemy_count: u32,
    pub spawn_interval_secs: f32,
}

impl WaveDefinition {
    pub const MIN_SPAWN_INTERVAL_SECS: f32 = 0.1;

    pub fn new(enemy_count: u32, spawn_interval_secs: f32) -> Self {
        Self {
            enemy_count,
            spawn_interval_secs,
        }
    }

    pub fn spawn_interval(&self) -> Duration {
        secs(self.spawn_interval_secs)
    }

    fn validated(mut self, wave: usize) -> Self {
        if self.enemy_count == 0 {
            warn!(wave, "wave has no enemies, using 1");
            self.enemy_count = 1;
        }
        if !(self.spawn_interval_secs >= Self::MIN_SPAWN_INTERVAL_SECS) {
            warn!(
                wave,
                interval = self.spawn_interval_secs,
                min = Self::MIN_SPAWN_INTERVAL_SECS,
                "spawn interval below minimum, clamping"
            );
            self.spawn_interval_secs = Self::MIN_SPAWN_INTERVAL_SECS;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    /// Pause after a wave is cleared, before the next wave's countdown.
    pub time_between_waves_secs: f32,
    pub waves: Vec<WaveDefinition>,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            time_between_waves_secs: 3.0,
            waves: vec![
                WaveDefinition::new(3, 1.0),
                WaveDefinition::new(5, 0.8),
                WaveDefinition::new(8, 0.5),
            ],
        }
    }
}

impl WaveConfig {
    pub fn time_between_waves(&self) -> Duration {
        secs(self.time_between_waves_secs)
    }
}

// ---------------------------------------------------------------------------
// Content templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyTemplate {
    pub key: PrefabKey,
    /// Health at difficulty 1. Each level above adds one.
    pub max_hp: u32,
    pub contact_damage: u32,
    pub attack_cooldown_secs: f32,
    /// Credited to the player who lands the killing blow.
    pub score_value: u32,
    pub speed: f32,
    /// Instances prewarmed when the match is created.
    pub pool_size: usize,
}

impl Default for EnemyTemplate {
    fn default() -> Self {
        Self {
            key: PrefabKey::new("enemy"),
            max_hp: 5,
            contact_damage: 1,
            attack_cooldown_secs: 1.0,
            score_value: 10,
            speed: 3.0,
            pool_size: 16,
        }
    }
}

impl EnemyTemplate {
    /// Health for an enemy spawned at `difficulty` (1-based).
    pub fn max_hp_at(&self, difficulty: u32) -> u32 {
        self.max_hp.saturating_add(difficulty.saturating_sub(1))
    }
}

/// A short-lived cosmetic actor, released automatically after `lifetime_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTemplate {
    pub key: PrefabKey,
    pub lifetime_secs: f32,
    pub pool_size: usize,
}

impl Default for EffectTemplate {
    fn default() -> Self {
        Self {
            key: PrefabKey::new("hit_effect"),
            lifetime_secs: 1.0,
            pool_size: 16,
        }
    }
}

/// The shot a player's attack fires. Flies straight, damages the first
/// enemy it touches, and returns to its pool on a hit or when
/// `lifetime_secs` runs out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileTemplate {
    pub key: PrefabKey,
    /// Units per second.
    pub speed: f32,
    pub lifetime_secs: f32,
    /// How close the flight path must pass to an enemy to hit it.
    pub hit_radius: f32,
    pub pool_size: usize,
}

impl Default for ProjectileTemplate {
    fn default() -> Self {
        Self {
            key: PrefabKey::new("projectile"),
            speed: 10.0,
            lifetime_secs: 2.0,
            hit_radius: 0.5,
            pool_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTemplate {
    pub max_hp: u32,
    /// Damage carried by each projectile. Never taken from the client.
    pub damage: u32,
    pub speed: f32,
}

impl Default for PlayerTemplate {
    fn default() -> Self {
        Self {
            max_hp: 5,
            damage: 1,
            speed: 5.0,
        }
    }
}

/// Cosmetic spawn parameters the presentation layer reads from the match.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnCosmetics {
    pub hit_effect: Option<EffectTemplate>,
}

// ---------------------------------------------------------------------------
// Revive and restart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviveConfig {
    pub enabled: bool,
    /// Maximum reviver distance. Leaving it cancels all progress.
    pub radius: f32,
    pub duration_secs: f32,
}

impl Default for ReviveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 1.5,
            duration_secs: 3.0,
        }
    }
}

impl ReviveConfig {
    pub fn duration(&self) -> Duration {
        secs(self.duration_secs)
    }
}

/// How a decided match gets back to wave 1.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum RestartPolicy {
    /// Wait for a participant's `RequestRestart`.
    #[default]
    Manual,
    /// Restart on its own after `delay_secs`.
    Automatic { delay_secs: f32 },
}

// ---------------------------------------------------------------------------
// MatchConfig
// ---------------------------------------------------------------------------

/// Everything a match needs to know before it starts.
///
/// Missing JSON fields fall back to [`Default`]. Run [`validated`] before
/// use; [`MatchConfig::from_json`] does it for you.
///
/// [`validated`]: MatchConfig::validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Participants needed before the start countdown begins.
    pub required_players: usize,
    pub max_players: usize,
    pub tick_rate_hz: u32,

    /// How often the lobby repeats its "waiting for players" status.
    pub status_interval_secs: f32,
    /// Pause between "all players connected" and the start countdown.
    pub quota_met_pause_secs: f32,
    pub start_countdown_secs: u32,
    pub wave_countdown_secs: u32,
    /// Pause between "restarting" and the reset.
    pub restart_settle_secs: f32,
    /// Countdown after the reset, before wave 1 begins again.
    pub restart_delay_secs: f32,

    pub waves: Option<WaveConfig>,
    pub enemy: Option<EnemyTemplate>,
    /// Without one, attacks are rejected.
    pub projectile: Option<ProjectileTemplate>,
    pub player: PlayerTemplate,
    pub cosmetics: SpawnCosmetics,

    /// Cycled round-robin by the spawn coordinator.
    pub spawn_points: Vec<Vec2>,
    /// Where players are put back on restart.
    pub player_spawn: Vec2,

    pub revive: ReviveConfig,
    pub restart: RestartPolicy,
    /// Spawned enemies confirm readiness on the tick after they are
    /// acquired, without waiting for an external `EnemyReady`.
    pub auto_ready: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            required_players: 2,
            max_players: 4,
            tick_rate_hz: 30,
            status_interval_secs: 1.0,
            quota_met_pause_secs: 1.0,
            start_countdown_secs: 10,
            wave_countdown_secs: 5,
            restart_settle_secs: 1.0,
            restart_delay_secs: 2.0,
            waves: Some(WaveConfig::default()),
            enemy: Some(EnemyTemplate::default()),
            projectile: Some(ProjectileTemplate::default()),
            player: PlayerTemplate::default(),
            cosmetics: SpawnCosmetics {
                hit_effect: Some(EffectTemplate::default()),
            },
            spawn_points: vec![
                Vec2::new(-10.0, -10.0),
                Vec2::new(10.0, -10.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(-10.0, 10.0),
            ],
            player_spawn: Vec2::ZERO,
            revive: ReviveConfig::default(),
            restart: RestartPolicy::Manual,
            auto_ready: true,
        }
    }
}

impl MatchConfig {
    /// The simpler ruleset: nobody can be revived, and a decided match
    /// restarts by itself after `restart_delay_secs`.
    pub fn reduced(restart_delay_secs: f32) -> Self {
        Self {
            revive: ReviveConfig {
                enabled: false,
                ..ReviveConfig::default()
            },
            restart: RestartPolicy::Automatic {
                delay_secs: restart_delay_secs,
            },
            ..Self::default()
        }
    }

    /// Parses a JSON document and validates it.
    ///
    /// # Errors
    /// [`ConfigError::Parse`] if the document is not valid JSON for this
    /// shape.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    /// Clamps out-of-range values, logging each fix.
    pub fn validated(mut self) -> Self {
        if self.required_players == 0 {
            warn!("required_players is 0, using 1");
            self.required_players = 1;
        }
        if self.max_players < self.required_players {
            warn!(
                max = self.max_players,
                required = self.required_players,
                "max_players below required_players, raising"
            );
            self.max_players = self.required_players;
        }
        if self.tick_rate_hz == 0 {
            warn!("tick_rate_hz is 0, a hosted match would never advance; using 1");
            self.tick_rate_hz = 1;
        }
        if let Some(waves) = self.waves.take() {
            self.waves = Some(WaveConfig {
                time_between_waves_secs: non_negative(
                    waves.time_between_waves_secs,
                    "time_between_waves_secs",
                ),
                waves: waves
                    .waves
                    .into_iter()
                    .enumerate()
                    .map(|(i, wave)| wave.validated(i + 1))
                    .collect(),
            });
        }
        if let Some(enemy) = self.enemy.as_mut() {
            if enemy.max_hp == 0 {
                warn!(prefab = %enemy.key, "enemy max_hp is 0, using 1");
                enemy.max_hp = 1;
            }
            enemy.attack_cooldown_secs =
                non_negative(enemy.attack_cooldown_secs, "attack_cooldown_secs");
        }
        if let Some(projectile) = self.projectile.as_mut() {
            projectile.speed = non_negative(projectile.speed, "projectile speed");
            projectile.hit_radius = non_negative(projectile.hit_radius, "projectile hit_radius");
            projectile.lifetime_secs =
                non_negative(projectile.lifetime_secs, "projectile lifetime_secs");
        }
        if self.player.max_hp == 0 {
            warn!("player max_hp is 0, using 1");
            self.player.max_hp = 1;
        }
        if let RestartPolicy::Automatic { delay_secs } = self.restart {
            self.restart = RestartPolicy::Automatic {
                delay_secs: non_negative(delay_secs, "restart delay_secs"),
            };
        }
        self.revive.radius = non_negative(self.revive.radius, "revive radius");
        self.revive.duration_secs = non_negative(self.revive.duration_secs, "revive duration_secs");
        self
    }

    pub fn status_interval(&self) -> Duration {
        secs(self.status_interval_secs)
    }

    pub fn quota_met_pause(&self) -> Duration {
        secs(self.quota_met_pause_secs)
    }

    pub fn restart_settle(&self) -> Duration {
        secs(self.restart_settle_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        secs(self.restart_delay_secs)
    }
}

fn non_negative(value: f32, field: &'static str) -> f32 {
    if value >= 0.0 {
        value
    } else {
        warn!(field, value, "negative duration, using 0");
        0.0
    }
}

/// Seconds to a `Duration`. Negative and NaN values become zero.
pub(crate) fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::ZERO)
}
