//! The authoritative match: lobby, wave loop, victory, defeat, restart.
//!
//! [`Match`] is a plain state machine advanced by [`Match::tick`] with a
//! fixed `dt`. It owns every actor in the match and is the only writer of
//! their state. The host task feeds it commands and ticks; tests drive it
//! directly.
//!
//! ```text
//! WaitingForPlayers → Countdown → { WaveCountdown → Spawning → AwaitingClear → Reward }*
//!                                   → Victory | Defeat → RestartPending → Countdown → ...
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use holdfast_pool::{PooledActorRegistry, Replication};
use holdfast_protocol::{ActorId, MatchId, MatchPhase, MatchSnapshot, PlayerId, ServerEvent, Transform, Vec2};
use holdfast_tick::{Delay, GenerationIssuer, Pulse};
use tracing::{debug, info, trace, warn};

use crate::actors::{Enemy, HitEffect, PlayerAvatar, Projectile};
use crate::bus::EventBus;
use crate::config::{MatchConfig, RestartPolicy, SpawnCosmetics};
use crate::routine::{Lobby, Restart, SpawnGate, WaveLoop, WaveStep};
use crate::spawner::WaveSpawnCoordinator;
use crate::vitality::{DamageOutcome, RevivePoll};
use crate::{IntentError, MatchError, SpawnError};

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Whether this process owns the canonical match state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    /// A read-only replica. Every mutating call is ignored.
    Observer,
}

/// Receives score changes, e.g. to persist a leaderboard. Optional.
pub trait ScoreLedger: Send {
    fn record(&mut self, player: PlayerId, points: u32, total: u32);
}

pub struct Match {
    pub(crate) id: MatchId,
    pub(crate) role: Role,
    pub(crate) config: MatchConfig,

    pub(crate) phase: MatchPhase,
    pub(crate) wave_index: u32,
    pub(crate) difficulty_level: u32,
    pub(crate) killed_in_wave: u32,
    pub(crate) total_in_wave: u32,
    pub(crate) is_game_over: bool,
    pub(crate) was_victory: bool,
    pub(crate) match_started: bool,
    pub(crate) waiting_for_restart: bool,
    /// Simulated time since creation.
    pub(crate) clock: Duration,

    pub(crate) players: BTreeMap<PlayerId, PlayerAvatar>,
    pub(crate) enemies: PooledActorRegistry<Enemy>,
    pub(crate) projectiles: PooledActorRegistry<Projectile>,
    /// In flight, in firing order.
    pub(crate) live_projectiles: Vec<ActorId>,
    pub(crate) effects: PooledActorRegistry<HitEffect>,
    pub(crate) live_effects: Vec<ActorId>,
    pub(crate) spawner: WaveSpawnCoordinator,
    /// Spawned this tick; confirmed ready on the next one (`auto_ready`).
    pub(crate) pending_ready: Vec<ActorId>,

    pub(crate) lobby: Option<Lobby>,
    pub(crate) wave_loop: Option<WaveLoop>,
    pub(crate) restart: Option<Restart>,
    pub(crate) auto_restart: Option<Delay>,
    pub(crate) generations: GenerationIssuer,

    pub(crate) bus: EventBus<ServerEvent>,
    pub(crate) ledger: Option<Box<dyn ScoreLedger>>,
}

impl Match {
    /// An authoritative match. Call [`start`](Self::start) to open the lobby.
    pub fn new(id: MatchId, config: MatchConfig) -> Self {
        Self::with_role(id, config, Role::Authority)
    }

    pub fn observer(id: MatchId, config: MatchConfig) -> Self {
        Self::with_role(id, config, Role::Observer)
    }

    fn with_role(id: MatchId, config: MatchConfig, role: Role) -> Self {
        let config = config.validated();

        let mut enemies = PooledActorRegistry::new();
        if let Some(enemy) = &config.enemy {
            enemies.register(enemy.key.clone(), enemy.clone(), enemy.pool_size);
        }
        let mut projectiles = PooledActorRegistry::new();
        if let Some(projectile) = &config.projectile {
            projectiles.register(projectile.key.clone(), projectile.clone(), projectile.pool_size);
        }
        let mut effects = PooledActorRegistry::new();
        if let Some(effect) = &config.cosmetics.hit_effect {
            effects.register(effect.key.clone(), effect.clone(), effect.pool_size);
        }
        let spawner = WaveSpawnCoordinator::new(
            config.enemy.as_ref().map(|enemy| enemy.key.clone()),
            config.spawn_points.clone(),
        );

        debug!(match_id = %id, ?role, "match created");

        Self {
            id,
            role,
            config,
            phase: MatchPhase::WaitingForPlayers,
            wave_index: 0,
            difficulty_level: 1,
            killed_in_wave: 0,
            total_in_wave: 0,
            is_game_over: false,
            was_victory: false,
            match_started: false,
            waiting_for_restart: false,
            clock: Duration::ZERO,
            players: BTreeMap::new(),
            enemies,
            projectiles,
            live_projectiles: Vec::new(),
            effects,
            live_effects: Vec::new(),
            spawner,
            pending_ready: Vec::new(),
            lobby: None,
            wave_loop: None,
            restart: None,
            auto_restart: None,
            generations: GenerationIssuer::new(),
            bus: EventBus::new(),
            ledger: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn wave_index(&self) -> u32 {
        self.wave_index
    }

    pub fn difficulty_level(&self) -> u32 {
        self.difficulty_level
    }

    pub fn killed_in_wave(&self) -> u32 {
        self.killed_in_wave
    }

    pub fn total_in_wave(&self) -> u32 {
        self.total_in_wave
    }

    pub fn is_game_over(&self) -> bool {
        self.is_game_over
    }

    pub fn is_match_started(&self) -> bool {
        self.match_started
    }

    /// Number of the live wave-loop generation (0 before the first wave).
    pub fn generation(&self) -> u64 {
        self.generations.current()
    }

    pub fn participant_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerAvatar> {
        self.players.get(&id)
    }

    pub fn enemy(&self, id: ActorId) -> Option<&Enemy> {
        self.enemies.get(id)
    }

    /// Enemies of the current wave still tracked as alive, in spawn order.
    pub fn alive_enemies(&self) -> &[ActorId] {
        self.spawner.alive()
    }

    pub fn spawner(&self) -> &WaveSpawnCoordinator {
        &self.spawner
    }

    pub fn projectile(&self, id: ActorId) -> Option<&Projectile> {
        self.projectiles.get(id)
    }

    pub fn live_projectile_count(&self) -> usize {
        self.live_projectiles.len()
    }

    pub fn live_effect_count(&self) -> usize {
        self.live_effects.len()
    }

    /// Cosmetic spawn parameters (hit effect template) for presentation.
    pub fn spawn_cosmetics(&self) -> &SpawnCosmetics {
        &self.config.cosmetics
    }

    pub fn bus_mut(&mut self) -> &mut EventBus<ServerEvent> {
        &mut self.bus
    }

    pub fn set_score_ledger(&mut self, ledger: Box<dyn ScoreLedger>) {
        self.ledger = Some(ledger);
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            phase: self.phase,
            wave_index: self.wave_index,
            difficulty_level: self.difficulty_level,
            killed_in_wave: self.killed_in_wave,
            total_in_wave: self.total_in_wave,
            enemies_alive: self.spawner.alive_count() as u32,
            players: self
                .players
                .iter()
                .map(|(id, avatar)| avatar.view(*id))
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Participants
    // -----------------------------------------------------------------------

    /// Adds a participant's avatar at the player spawn point.
    ///
    /// An observer ignores the call.
    ///
    /// # Errors
    /// [`MatchError::MatchFull`] or [`MatchError::AlreadyJoined`].
    pub fn add_participant(&mut self, player: PlayerId) -> Result<(), MatchError> {
        if !self.is_authority() {
            trace!(match_id = %self.id, %player, "observer ignored join");
            return Ok(());
        }
        if self.players.contains_key(&player) {
            return Err(MatchError::AlreadyJoined(player, self.id));
        }
        if self.players.len() >= self.config.max_players {
            return Err(MatchError::MatchFull(self.id));
        }

        self.players.insert(
            player,
            PlayerAvatar::new(self.config.player.max_hp, self.config.player_spawn),
        );
        info!(
            match_id = %self.id,
            %player,
            players = self.players.len(),
            "participant joined"
        );
        Ok(())
    }

    /// Removes a participant. If only downed players remain, the match is
    /// lost.
    ///
    /// # Errors
    /// [`MatchError::NotJoined`]. Never on an observer, which ignores the
    /// call.
    pub fn remove_participant(&mut self, player: PlayerId) -> Result<(), MatchError> {
        if !self.is_authority() {
            trace!(match_id = %self.id, %player, "observer ignored leave");
            return Ok(());
        }
        if self.players.remove(&player).is_none() {
            return Err(MatchError::NotJoined(player, self.id));
        }
        info!(
            match_id = %self.id,
            %player,
            players = self.players.len(),
            "participant left"
        );
        self.check_defeat();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Opens the lobby. Does nothing if it is already open or the match has
    /// started.
    pub fn start(&mut self) {
        if !self.is_authority() || self.lobby.is_some() || self.match_started {
            return;
        }
        self.lobby = Some(Lobby::AwaitQuota {
            status: Pulse::new(self.config.status_interval()),
        });
        info!(
            match_id = %self.id,
            required = self.config.required_players,
            "lobby open"
        );
    }

    /// Advances every routine by `dt` of simulated time.
    pub fn tick(&mut self, dt: Duration) {
        if !self.is_authority() {
            return;
        }
        self.clock += dt;
        trace!(match_id = %self.id, clock_ms = self.clock.as_millis() as u64, "match tick");

        self.confirm_pending_ready();
        self.step_projectiles(dt);
        self.step_lobby(dt);
        self.step_wave_loop(dt);
        self.step_restart(dt);
        self.step_auto_restart(dt);
        self.step_revives(dt);
        self.expire_effects(dt);
        self.flush_replication();
    }

    fn step_lobby(&mut self, dt: Duration) {
        let Some(lobby) = self.lobby.take() else {
            return;
        };

        self.lobby = match lobby {
            Lobby::AwaitQuota { mut status } => {
                let count = self.players.len();
                let required = self.config.required_players;
                if count >= required {
                    self.status(format!("All {required} players connected!"));
                    Some(Lobby::QuotaMet {
                        pause: Delay::new(self.config.quota_met_pause()),
                    })
                } else {
                    if status.poll(dt) {
                        self.status(format!("Waiting for players... ({count}/{required})"));
                    }
                    Some(Lobby::AwaitQuota { status })
                }
            }
            Lobby::QuotaMet { mut pause } => {
                if pause.advance(dt) {
                    self.set_phase(MatchPhase::Countdown);
                    self.count_down_to_start(self.config.start_countdown_secs)
                } else {
                    Some(Lobby::QuotaMet { pause })
                }
            }
            Lobby::Countdown {
                remaining,
                mut second,
            } => {
                if second.advance(dt) {
                    self.count_down_to_start(remaining - 1)
                } else {
                    Some(Lobby::Countdown { remaining, second })
                }
            }
        };
    }

    fn count_down_to_start(&mut self, remaining: u32) -> Option<Lobby> {
        if remaining > 0 {
            self.status(format!("Game starts in {remaining}"));
            return Some(Lobby::Countdown {
                remaining,
                second: Delay::new(ONE_SECOND),
            });
        }
        self.status("Game start!");
        self.match_started = true;
        info!(match_id = %self.id, players = self.players.len(), "match started");
        self.start_wave_loop();
        None
    }

    // -----------------------------------------------------------------------
    // Wave loop
    // -----------------------------------------------------------------------

    /// Issues a new generation, cancelling any previous one, and starts at
    /// wave 1. Aborts with a warning if there are no waves to play.
    fn start_wave_loop(&mut self) {
        let has_waves = self
            .config
            .waves
            .as_ref()
            .is_some_and(|waves| !waves.waves.is_empty());
        if !has_waves {
            self.generations.cancel_current();
            self.wave_loop = None;
            warn!(match_id = %self.id, "no wave configuration, wave loop not started");
            return;
        }

        let (generation, token) = self.generations.issue();
        self.wave_index = 0;
        self.wave_loop = Some(WaveLoop {
            generation,
            token,
            wave: 0,
            step: WaveStep::Begin,
        });
        info!(match_id = %self.id, generation, "wave loop started");
    }

    fn step_wave_loop(&mut self, dt: Duration) {
        let Some(mut wave_loop) = self.wave_loop.take() else {
            return;
        };
        if wave_loop.token.is_cancelled() || !self.generations.is_live(wave_loop.generation) {
            debug!(
                match_id = %self.id,
                generation = wave_loop.generation,
                "stale wave loop dropped"
            );
            return;
        }

        let keep = self.advance_wave_loop(&mut wave_loop, dt);
        if keep && !wave_loop.token.is_cancelled() && self.wave_loop.is_none() {
            self.wave_loop = Some(wave_loop);
        }
    }

    /// Runs one tick of the wave loop. Returns `false` once the generation
    /// is finished.
    fn advance_wave_loop(&mut self, wave_loop: &mut WaveLoop, dt: Duration) -> bool {
        let Some(waves) = self.config.waves.as_ref() else {
            warn!(match_id = %self.id, "wave configuration missing, wave loop aborted");
            return false;
        };
        let wave_count = waves.waves.len();
        let between_waves = waves.time_between_waves();
        let Some(wave) = waves.waves.get(wave_loop.wave).cloned() else {
            warn!(
                match_id = %self.id,
                wave = wave_loop.wave + 1,
                "wave definition missing, wave loop aborted"
            );
            return false;
        };
        let number = wave_loop.wave as u32 + 1;

        match &mut wave_loop.step {
            WaveStep::Begin => {
                if self.is_game_over {
                    return false;
                }
                self.wave_index = wave_loop.wave as u32;
                self.total_in_wave = wave.enemy_count;
                self.killed_in_wave = 0;
                self.set_phase(MatchPhase::WaveCountdown);
                wave_loop.step = self.count_down_to_wave(number, self.config.wave_countdown_secs);
            }
            WaveStep::Countdown { remaining, second } => {
                if second.advance(dt) {
                    let remaining = *remaining - 1;
                    wave_loop.step = self.count_down_to_wave(number, remaining);
                }
            }
            WaveStep::Spawning { issued, gate } => {
                if self.is_game_over {
                    return false;
                }
                self.sweep_stale_enemies();

                match gate {
                    SpawnGate::Issue if *issued >= wave.enemy_count => {
                        self.set_phase(MatchPhase::AwaitingClear);
                        wave_loop.step = WaveStep::AwaitingClear;
                    }
                    SpawnGate::Issue => {
                        match self.spawner.spawn_enemy(&mut self.enemies, self.difficulty_level) {
                            Ok(actor) => {
                                *issued += 1;
                                if self.config.auto_ready {
                                    self.pending_ready.push(actor);
                                }
                                self.flush_replication();
                                *gate = SpawnGate::AwaitReady;
                            }
                            Err(error) => {
                                let unconfigured = matches!(
                                    error,
                                    SpawnError::NoEnemyPrefab | SpawnError::NoSpawnPoints
                                );
                                if unconfigured || *issued == 0 {
                                    // A wave nobody can fight must not count as cleared.
                                    warn!(
                                        match_id = %self.id,
                                        wave = number,
                                        %error,
                                        "enemy spawning unavailable, wave loop aborted"
                                    );
                                    self.generations.cancel_current();
                                    return false;
                                }
                                warn!(
                                    match_id = %self.id,
                                    wave = number,
                                    issued = *issued,
                                    %error,
                                    "enemy spawn failed, ending spawn segment"
                                );
                                self.total_in_wave = *issued;
                                self.killed_in_wave = self.killed_in_wave.min(self.total_in_wave);
                                self.emit(ServerEvent::EnemyCount {
                                    remaining: self.total_in_wave - self.killed_in_wave,
                                });
                                self.set_phase(MatchPhase::AwaitingClear);
                                wave_loop.step = WaveStep::AwaitingClear;
                            }
                        }
                    }
                    SpawnGate::AwaitReady => {
                        if !self.spawner.is_waiting_for_ready() {
                            *gate = SpawnGate::Interval(Delay::new(wave.spawn_interval()));
                        }
                    }
                    SpawnGate::Interval(delay) => {
                        if delay.advance(dt) {
                            *gate = SpawnGate::Issue;
                        }
                    }
                }
            }
            WaveStep::AwaitingClear => {
                self.sweep_stale_enemies();
                if self.killed_in_wave >= self.total_in_wave {
                    self.complete_wave(number);
                    wave_loop.step = WaveStep::Reward {
                        pause: Delay::new(between_waves),
                    };
                }
            }
            WaveStep::Reward { pause } => {
                if pause.advance(dt) {
                    wave_loop.wave += 1;
                    if wave_loop.wave >= wave_count {
                        if !self.is_game_over {
                            self.handle_victory();
                        }
                        return false;
                    }
                    wave_loop.step = WaveStep::Begin;
                }
            }
        }
        true
    }

    fn count_down_to_wave(&mut self, number: u32, remaining: u32) -> WaveStep {
        if remaining > 0 {
            self.status(format!("Wave {number} starts in {remaining}"));
            return WaveStep::Countdown {
                remaining,
                second: Delay::new(ONE_SECOND),
            };
        }

        self.status(format!("Wave {number} started!"));
        self.emit(ServerEvent::WaveStarted { wave: number });
        self.emit(ServerEvent::EnemyCount {
            remaining: self.total_in_wave,
        });
        info!(
            match_id = %self.id,
            wave = number,
            enemies = self.total_in_wave,
            difficulty = self.difficulty_level,
            "wave started"
        );
        self.set_phase(MatchPhase::Spawning);
        WaveStep::Spawning {
            issued: 0,
            gate: SpawnGate::Issue,
        }
    }

    fn complete_wave(&mut self, number: u32) {
        self.revive_all_downed();
        self.emit(ServerEvent::EnemyCount { remaining: 0 });
        self.status(format!("Wave {number} cleared!"));
        self.emit(ServerEvent::WaveCompleted { wave: number });
        info!(match_id = %self.id, wave = number, "wave cleared");
        self.set_phase(MatchPhase::Reward);
    }

    /// Counts enemies lost without a death notification as eliminated, so
    /// the wave can still clear.
    fn sweep_stale_enemies(&mut self) {
        let stale = self.spawner.cleanup_dead_enemies(&self.enemies);
        for actor in stale {
            // Drops the pool's tombstone for an externally destroyed enemy.
            self.enemies.release(actor);
            warn!(match_id = %self.id, %actor, "stale enemy counted as eliminated");
            self.record_kill();
        }
        self.flush_replication();
    }

    /// Revives every downed player, but only while someone is still up.
    fn revive_all_downed(&mut self) {
        if !self.players.values().any(|p| p.vitality.is_alive()) {
            return;
        }
        let revived: Vec<PlayerId> = self
            .players
            .iter_mut()
            .filter_map(|(id, avatar)| avatar.vitality.revive().then_some(*id))
            .collect();
        for player in revived {
            info!(match_id = %self.id, %player, "player revived by wave clear");
            self.emit(ServerEvent::PlayerRevived { player });
        }
    }

    // -----------------------------------------------------------------------
    // Enemies
    // -----------------------------------------------------------------------

    fn confirm_pending_ready(&mut self) {
        for actor in std::mem::take(&mut self.pending_ready) {
            self.on_enemy_ready(actor);
        }
    }

    /// Ready handshake from a spawned enemy. Unblocks the next spawn if it
    /// was the enemy the coordinator was waiting for.
    pub fn on_enemy_ready(&mut self, actor: ActorId) -> bool {
        if !self.is_authority() {
            return false;
        }
        let Some(enemy) = self.enemies.get_mut(actor) else {
            return false;
        };
        enemy.mark_ready();
        let released = self.spawner.on_enemy_ready(actor);
        debug!(match_id = %self.id, %actor, released, "enemy ready");
        released
    }

    /// Records an enemy death: untracks it, returns it to the pool, and
    /// counts the kill. Returns `false` if the death was already recorded.
    pub fn register_enemy_death(&mut self, actor: ActorId) -> bool {
        if !self.is_authority() || !self.spawner.register_death(actor) {
            return false;
        }
        self.enemies.release(actor);
        self.flush_replication();
        self.record_kill();
        true
    }

    fn record_kill(&mut self) {
        self.killed_in_wave = (self.killed_in_wave + 1).min(self.total_in_wave);
        let remaining = self.total_in_wave - self.killed_in_wave;
        debug!(
            match_id = %self.id,
            killed = self.killed_in_wave,
            total = self.total_in_wave,
            "enemy eliminated"
        );
        self.emit(ServerEvent::EnemyCount { remaining });
    }

    /// Applies a player's hit on an enemy.
    ///
    /// Hits before the enemy's ready handshake are ignored. A kill credits
    /// the enemy's score to whoever landed the last hit.
    pub fn damage_enemy(&mut self, attacker: PlayerId, target: ActorId, amount: u32) -> DamageOutcome {
        if !self.is_authority() {
            return DamageOutcome::Ignored;
        }
        let Some(enemy) = self.enemies.get_mut(target) else {
            return DamageOutcome::Ignored;
        };
        let outcome = enemy.take_hit(attacker, amount);
        let position = enemy.position();
        let killer = enemy.last_attacker();
        let score_value = enemy.score_value();

        match outcome {
            DamageOutcome::Damaged { hp } => {
                self.emit(ServerEvent::EnemyDamaged { actor: target, hp });
                self.spawn_hit_effect(position);
            }
            DamageOutcome::Removed => {
                self.emit(ServerEvent::EnemyDamaged { actor: target, hp: 0 });
                self.spawn_hit_effect(position);
                debug!(match_id = %self.id, actor = %target, killer = ?killer, "enemy killed");
                if let Some(killer) = killer {
                    self.credit_score(killer, score_value);
                }
                if !self.register_enemy_death(target) {
                    // Not part of the current wave (e.g. left over from a
                    // decided match); still return it to the pool.
                    self.enemies.release(target);
                    self.flush_replication();
                }
            }
            DamageOutcome::Ignored | DamageOutcome::Downed => {}
        }
        outcome
    }

    /// An enemy touching a player. Deals contact damage if the enemy is
    /// ready and off cooldown.
    pub fn enemy_contact(&mut self, actor: ActorId, player: PlayerId) -> DamageOutcome {
        if !self.is_authority() {
            return DamageOutcome::Ignored;
        }
        if !self.players.get(&player).is_some_and(|p| p.vitality.is_alive()) {
            return DamageOutcome::Ignored;
        }
        let now = self.clock;
        let Some(damage) = self.enemies.get_mut(actor).and_then(|enemy| enemy.try_contact(now)) else {
            return DamageOutcome::Ignored;
        };
        self.damage_player(player, damage)
    }

    /// Marks an actor as lost outside the match's control (e.g. its owner
    /// disconnected). The next cleanup sweep accounts for it.
    pub fn destroy_actor_externally(&mut self, actor: ActorId) -> bool {
        if !self.is_authority() {
            return false;
        }
        let destroyed = self.enemies.destroy(actor)
            || self.projectiles.destroy(actor)
            || self.effects.destroy(actor);
        self.flush_replication();
        destroyed
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Applies damage to a player. Going down interrupts any revive the
    /// player was performing and runs the defeat check.
    pub fn damage_player(&mut self, player: PlayerId, amount: u32) -> DamageOutcome {
        if !self.is_authority() {
            return DamageOutcome::Ignored;
        }
        let Some(avatar) = self.players.get_mut(&player) else {
            return DamageOutcome::Ignored;
        };
        let outcome = avatar.vitality.apply_damage(amount);

        match outcome {
            DamageOutcome::Damaged { hp } => {
                self.emit(ServerEvent::PlayerDamaged { player, hp });
            }
            DamageOutcome::Downed => {
                info!(match_id = %self.id, %player, "player downed");
                self.emit(ServerEvent::PlayerDamaged { player, hp: 0 });
                self.emit(ServerEvent::PlayerDowned { player });
                self.cancel_revives_by(player);
                self.check_defeat();
            }
            DamageOutcome::Ignored | DamageOutcome::Removed => {}
        }
        outcome
    }

    /// Interrupts every revive `reviver` is performing.
    pub(crate) fn cancel_revives_by(&mut self, reviver: PlayerId) {
        let interrupted: Vec<PlayerId> = self
            .players
            .iter_mut()
            .filter(|(_, avatar)| avatar.vitality.reviver() == Some(reviver))
            .filter_map(|(id, avatar)| avatar.vitality.cancel_revive().then_some(*id))
            .collect();
        for target in interrupted {
            debug!(match_id = %self.id, %target, %reviver, "revive cancelled");
            self.emit(ServerEvent::ReviveInterrupted { target });
        }
    }

    fn step_revives(&mut self, dt: Duration) {
        let radius = self.config.revive.radius;
        let duration = self.config.revive.duration();

        let attempts: Vec<(PlayerId, Option<f32>)> = self
            .players
            .iter()
            .filter_map(|(id, avatar)| {
                let reviver = avatar.vitality.reviver()?;
                let distance = self
                    .players
                    .get(&reviver)
                    .filter(|r| r.vitality.is_alive())
                    .map(|r| r.position.distance(avatar.position));
                Some((*id, distance))
            })
            .collect();

        for (target, distance) in attempts {
            let Some(avatar) = self.players.get_mut(&target) else {
                continue;
            };
            match avatar.vitality.poll_revive(dt, distance, radius, duration) {
                RevivePoll::Completed => {
                    info!(match_id = %self.id, player = %target, "player revived");
                    self.emit(ServerEvent::PlayerRevived { player: target });
                }
                RevivePoll::Interrupted => {
                    debug!(match_id = %self.id, %target, "revive interrupted");
                    self.emit(ServerEvent::ReviveInterrupted { target });
                }
                RevivePoll::Idle | RevivePoll::Progress => {}
            }
        }
    }

    fn credit_score(&mut self, player: PlayerId, points: u32) {
        let Some(avatar) = self.players.get_mut(&player) else {
            return;
        };
        avatar.score = avatar.score.saturating_add(points);
        let score = avatar.score;
        self.emit(ServerEvent::ScoreChanged { player, score });
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.record(player, points, score);
        }
    }

    // -----------------------------------------------------------------------
    // Victory, defeat, restart
    // -----------------------------------------------------------------------

    /// Declares defeat if the match has started, is not already decided,
    /// and no player is up. Returns `true` if this call declared it.
    pub fn check_defeat(&mut self) -> bool {
        if !self.is_authority() || self.is_game_over || !self.match_started {
            return false;
        }
        if self.players.values().any(|p| p.vitality.is_alive()) {
            return false;
        }

        self.is_game_over = true;
        self.was_victory = false;
        self.waiting_for_restart = true;
        self.generations.cancel_current();
        self.wave_loop = None;

        info!(
            match_id = %self.id,
            wave = self.wave_index + 1,
            difficulty = self.difficulty_level,
            "defeat"
        );
        self.set_phase(MatchPhase::Defeat);
        self.status("Defeat! Back to wave 1. Press restart.");
        self.emit(ServerEvent::GameOver);
        self.emit(ServerEvent::RestartPopup {
            is_victory: false,
            difficulty: self.difficulty_level,
        });
        self.enter_restart_pending();
        true
    }

    fn handle_victory(&mut self) {
        self.is_game_over = true;
        self.was_victory = true;
        self.waiting_for_restart = true;
        self.generations.cancel_current();
        self.wave_loop = None;

        let next = self.difficulty_level + 1;
        info!(match_id = %self.id, difficulty = self.difficulty_level, next, "victory");
        self.set_phase(MatchPhase::Victory);
        self.status(format!(
            "Victory! All waves cleared. Difficulty rises to {next}. Press restart."
        ));
        self.emit(ServerEvent::GameWin);
        self.emit(ServerEvent::RestartPopup {
            is_victory: true,
            difficulty: self.difficulty_level,
        });
        self.enter_restart_pending();
    }

    fn enter_restart_pending(&mut self) {
        self.set_phase(MatchPhase::RestartPending);
        if let RestartPolicy::Automatic { delay_secs } = self.config.restart {
            self.auto_restart = Some(Delay::from_secs_f32(delay_secs));
        }
    }

    /// Starts a restart. Only valid while the match awaits one; a second
    /// request for the same restart is rejected. An observer ignores it.
    ///
    /// # Errors
    /// [`IntentError::RestartUnavailable`] outside `RestartPending`.
    pub fn request_restart(&mut self) -> Result<(), IntentError> {
        if !self.is_authority() {
            trace!(match_id = %self.id, "observer ignored restart request");
            return Ok(());
        }
        if self.phase != MatchPhase::RestartPending || !self.waiting_for_restart {
            return Err(IntentError::RestartUnavailable(self.phase));
        }

        self.waiting_for_restart = false;
        self.auto_restart = None;
        self.generations.cancel_current();
        self.wave_loop = None;

        info!(match_id = %self.id, victory = self.was_victory, "restart requested");
        self.status("Restarting...");
        self.emit(ServerEvent::HideRestartPopup);
        self.restart = Some(Restart::Settle {
            pause: Delay::new(self.config.restart_settle()),
        });
        Ok(())
    }

    fn step_restart(&mut self, dt: Duration) {
        let Some(restart) = self.restart.take() else {
            return;
        };
        self.restart = match restart {
            Restart::Settle { mut pause } => {
                if pause.advance(dt) {
                    self.reset_match();
                    self.status(format!("Difficulty {} - game start!", self.difficulty_level));
                    self.set_phase(MatchPhase::Countdown);
                    Some(Restart::Warmup {
                        pause: Delay::new(self.config.restart_delay()),
                    })
                } else {
                    Some(Restart::Settle { pause })
                }
            }
            Restart::Warmup { mut pause } => {
                if pause.advance(dt) {
                    self.start_wave_loop();
                    None
                } else {
                    Some(Restart::Warmup { pause })
                }
            }
        };
    }

    fn step_auto_restart(&mut self, dt: Duration) {
        let Some(delay) = self.auto_restart.as_mut() else {
            return;
        };
        if delay.advance(dt) {
            self.auto_restart = None;
            if let Err(error) = self.request_restart() {
                warn!(match_id = %self.id, %error, "automatic restart skipped");
            }
        }
    }

    /// Despawns every enemy, resets every player, rewinds the wave counters,
    /// and applies the difficulty change earned by the last match.
    fn reset_match(&mut self) {
        let despawned = self.spawner.despawn_all(&mut self.enemies);
        self.spawner.reset_spawn_state();
        self.pending_ready.clear();
        for actor in self.live_projectiles.drain(..) {
            self.projectiles.release(actor);
        }

        let spawn = self.config.player_spawn;
        for avatar in self.players.values_mut() {
            avatar.vitality.reset_state();
            avatar.position = spawn;
        }

        self.wave_index = 0;
        self.total_in_wave = 0;
        self.killed_in_wave = 0;
        self.difficulty_level = if self.was_victory {
            self.difficulty_level + 1
        } else {
            1
        };
        self.is_game_over = false;
        self.was_victory = false;
        self.flush_replication();

        info!(
            match_id = %self.id,
            despawned,
            difficulty = self.difficulty_level,
            "match reset"
        );
    }

    // -----------------------------------------------------------------------
    // Projectiles
    // -----------------------------------------------------------------------

    /// Fires a projectile from `origin` towards `aim`, owned by `owner` and
    /// carrying the player template's damage.
    pub(crate) fn fire_projectile(
        &mut self,
        owner: PlayerId,
        origin: Vec2,
        aim: Vec2,
    ) -> Result<ActorId, IntentError> {
        let Some(template) = &self.config.projectile else {
            return Err(IntentError::Unarmed);
        };
        let transform = Transform {
            position: origin,
            rotation: (aim - origin).heading(),
        };
        let actor = match self.projectiles.acquire(&template.key, transform) {
            Ok(actor) => actor,
            Err(error) => {
                warn!(match_id = %self.id, %owner, %error, "projectile unavailable");
                return Err(IntentError::Unarmed);
            }
        };
        if let Some(projectile) = self.projectiles.get_mut(actor) {
            projectile.launch(owner, self.config.player.damage);
        }
        self.live_projectiles.push(actor);
        debug!(match_id = %self.id, %owner, %actor, "projectile fired");
        self.flush_replication();
        Ok(actor)
    }

    /// Moves every projectile in flight. A projectile whose path touches a
    /// tracked enemy hits the one nearest its start and returns to the
    /// pool; one that misses until its lifetime runs out is released too.
    fn step_projectiles(&mut self, dt: Duration) {
        if self.live_projectiles.is_empty() {
            return;
        }
        let radius = self
            .config
            .projectile
            .as_ref()
            .map_or(0.0, |template| template.hit_radius);

        let mut in_flight = Vec::with_capacity(self.live_projectiles.len());
        for actor in std::mem::take(&mut self.live_projectiles) {
            let Some(projectile) = self.projectiles.get_mut(actor) else {
                // Destroyed externally; drop the tombstone.
                self.projectiles.release(actor);
                continue;
            };
            let flight = projectile.advance(dt);
            let owner = projectile.owner();
            let damage = projectile.damage();

            match self.enemy_on_path(flight.from, flight.to, radius) {
                Some(target) => {
                    self.projectiles.release(actor);
                    trace!(match_id = %self.id, projectile = %actor, %target, "projectile hit");
                    if let Some(owner) = owner {
                        self.damage_enemy(owner, target, damage);
                    }
                }
                None if flight.expired => {
                    self.projectiles.release(actor);
                    trace!(match_id = %self.id, projectile = %actor, "projectile expired");
                }
                None => in_flight.push(actor),
            }
        }
        self.live_projectiles.extend(in_flight);
        self.flush_replication();
    }

    /// The tracked enemy within `radius` of the segment `from`..`to` that
    /// lies closest to `from`.
    fn enemy_on_path(&self, from: Vec2, to: Vec2, radius: f32) -> Option<ActorId> {
        self.spawner
            .alive()
            .iter()
            .filter_map(|id| Some((*id, self.enemies.get(*id)?.position())))
            .filter(|(_, position)| position.distance_to_segment(from, to) <= radius)
            .min_by(|(_, a), (_, b)| a.distance(from).total_cmp(&b.distance(from)))
            .map(|(id, _)| id)
    }

    // -----------------------------------------------------------------------
    // Hit effects
    // -----------------------------------------------------------------------

    fn spawn_hit_effect(&mut self, position: Vec2) {
        let Some(effect) = &self.config.cosmetics.hit_effect else {
            return;
        };
        match self.effects.acquire(&effect.key, Transform::at(position)) {
            Ok(actor) => self.live_effects.push(actor),
            Err(error) => debug!(match_id = %self.id, %error, "hit effect skipped"),
        }
        self.flush_replication();
    }

    fn expire_effects(&mut self, dt: Duration) {
        if self.live_effects.is_empty() {
            return;
        }
        let effects = &mut self.effects;
        let mut expired = Vec::new();
        self.live_effects.retain(|actor| {
            let done = effects.get_mut(*actor).is_none_or(|effect| effect.expire(dt));
            if done {
                expired.push(*actor);
            }
            !done
        });
        for actor in expired {
            self.effects.release(actor);
        }
        self.flush_replication();
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub(crate) fn emit(&mut self, event: ServerEvent) {
        self.bus.publish(&event);
    }

    fn status(&mut self, text: impl Into<String>) {
        self.emit(ServerEvent::StatusMessage { text: text.into() });
    }

    fn set_phase(&mut self, phase: MatchPhase) {
        if self.phase == phase {
            return;
        }
        info!(match_id = %self.id, from = %self.phase, to = %phase, "phase changed");
        self.phase = phase;
        self.emit(ServerEvent::PhaseChanged { phase });
    }

    /// Forwards pool publication changes to observers.
    fn flush_replication(&mut self) {
        let mut changes = self.enemies.drain_replication();
        changes.extend(self.projectiles.drain_replication());
        changes.extend(self.effects.drain_replication());
        for change in changes {
            let event = match change {
                Replication::Published {
                    actor,
                    prefab,
                    transform,
                } => ServerEvent::ActorSpawned {
                    actor,
                    prefab,
                    position: transform.position,
                },
                Replication::Unpublished { actor } => ServerEvent::ActorDespawned { actor },
            };
            self.emit(event);
        }
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("wave_index", &self.wave_index)
            .field("difficulty_level", &self.difficulty_level)
            .field("players", &self.players.len())
            .field("enemies_alive", &self.spawner.alive_count())
            .finish()
    }
}
