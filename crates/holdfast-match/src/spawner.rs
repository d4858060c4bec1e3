//! Issues enemies one at a time, gated by the ready handshake.

use holdfast_pool::PooledActorRegistry;
use holdfast_protocol::{ActorId, PrefabKey, Transform, Vec2};

use crate::actors::Enemy;
use crate::SpawnError;

/// Spawns enemies at rotating spawn points and tracks which of them are
/// still alive in the current wave.
///
/// At most one spawned enemy is ever waiting for its ready signal; the next
/// spawn is refused until [`on_enemy_ready`](Self::on_enemy_ready) clears it.
#[derive(Debug)]
pub struct WaveSpawnCoordinator {
    enemy_key: Option<PrefabKey>,
    spawn_points: Vec<Vec2>,
    cursor: usize,
    alive: Vec<ActorId>,
    awaiting_ready: Option<ActorId>,
}

impl WaveSpawnCoordinator {
    pub fn new(enemy_key: Option<PrefabKey>, spawn_points: Vec<Vec2>) -> Self {
        Self {
            enemy_key,
            spawn_points,
            cursor: 0,
            alive: Vec::new(),
            awaiting_ready: None,
        }
    }

    /// Acquires one enemy at the next spawn point, scaled to `difficulty`,
    /// and marks it as awaiting ready.
    ///
    /// # Errors
    /// Nothing is acquired on error, and the spawn-point cursor does not move.
    pub fn spawn_enemy(
        &mut self,
        registry: &mut PooledActorRegistry<Enemy>,
        difficulty: u32,
    ) -> Result<ActorId, SpawnError> {
        if let Some(pending) = self.awaiting_ready {
            return Err(SpawnError::AwaitingReady(pending));
        }
        let key = self.enemy_key.as_ref().ok_or(SpawnError::NoEnemyPrefab)?;
        let point = *self
            .spawn_points
            .get(self.cursor)
            .ok_or(SpawnError::NoSpawnPoints)?;

        let max_hp = registry.template(key).map(|template| template.max_hp_at(difficulty));
        let id = registry.acquire(key, Transform::at(point))?;
        if let (Some(enemy), Some(max_hp)) = (registry.get_mut(id), max_hp) {
            enemy.prepare(max_hp);
        }

        self.cursor = (self.cursor + 1) % self.spawn_points.len();
        self.alive.push(id);
        self.awaiting_ready = Some(id);

        tracing::debug!(
            actor = %id,
            x = point.x,
            y = point.y,
            difficulty,
            alive = self.alive.len(),
            "enemy spawned"
        );
        Ok(id)
    }

    /// Clears the ready gate if `id` is the enemy it is waiting for.
    pub fn on_enemy_ready(&mut self, id: ActorId) -> bool {
        if self.awaiting_ready == Some(id) {
            self.awaiting_ready = None;
            true
        } else {
            false
        }
    }

    /// Forgets a dead enemy. Returns `false` if it was not tracked, so a
    /// death reported twice is only counted once.
    pub fn register_death(&mut self, id: ActorId) -> bool {
        let Some(index) = self.alive.iter().position(|alive| *alive == id) else {
            return false;
        };
        self.alive.remove(index);
        if self.awaiting_ready == Some(id) {
            self.awaiting_ready = None;
        }
        true
    }

    /// Drops tracked enemies that are no longer live in `registry` (lost
    /// without a death notification) and returns them.
    pub fn cleanup_dead_enemies(&mut self, registry: &PooledActorRegistry<Enemy>) -> Vec<ActorId> {
        let (stale, alive): (Vec<ActorId>, Vec<ActorId>) = self
            .alive
            .iter()
            .copied()
            .partition(|id| !registry.is_live(*id));
        if stale.is_empty() {
            return stale;
        }

        self.alive = alive;
        if self.awaiting_ready.is_some_and(|id| stale.contains(&id)) {
            self.awaiting_ready = None;
        }
        tracing::warn!(count = stale.len(), "dropped stale enemy references");
        stale
    }

    /// Releases every tracked enemy back to `registry`. Returns how many.
    pub fn despawn_all(&mut self, registry: &mut PooledActorRegistry<Enemy>) -> usize {
        let count = self.alive.len();
        for id in self.alive.drain(..) {
            registry.release(id);
        }
        self.awaiting_ready = None;
        count
    }

    /// Rewinds the spawn-point cursor and clears the ready gate.
    pub fn reset_spawn_state(&mut self) {
        self.cursor = 0;
        self.awaiting_ready = None;
    }

    pub fn awaiting_ready(&self) -> Option<ActorId> {
        self.awaiting_ready
    }

    pub fn is_waiting_for_ready(&self) -> bool {
        self.awaiting_ready.is_some()
    }

    pub fn alive(&self) -> &[ActorId] {
        &self.alive
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }
}
