//! The pooled actor registry.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use holdfast_protocol::{ActorId, PrefabKey, Transform};

use crate::PoolError;

/// Ids are unique process-wide, so instances from different pools (or
/// different matches) can share one replication stream.
static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Poolable
// ---------------------------------------------------------------------------

/// An actor type the registry can build and recycle.
pub trait Poolable: Send + 'static {
    /// Content the instance is built from (stats, lifetimes, ...).
    type Template: Send + 'static;

    /// Builds a fresh, inactive instance.
    fn instantiate(template: &Self::Template) -> Self;

    /// Called after the instance went live at `transform`.
    fn on_acquired(&mut self, _transform: Transform) {}

    /// Called before the instance is deactivated and requeued.
    fn on_released(&mut self) {}
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Inactive, waiting in its prefab's free queue.
    Free,
    /// Active and held by exactly one caller.
    Live,
    /// Lost without going through `release` (e.g. the owning connection
    /// dropped). Never handed out again.
    Destroyed,
}

struct Slot<T> {
    prefab: PrefabKey,
    state: SlotState,
    transform: Transform,
    instance: T,
}

struct PoolEntry<Tpl> {
    template: Tpl,
    free: VecDeque<ActorId>,
    allocated: usize,
}

/// A network publication change the owner must forward to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum Replication {
    Published {
        actor: ActorId,
        prefab: PrefabKey,
        transform: Transform,
    },
    Unpublished {
        actor: ActorId,
    },
}

/// What `release` did with an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Deactivated and put back in its free queue.
    Requeued,
    /// Not pool-managed (or already destroyed): dropped instead of requeued.
    Discarded,
    /// Already in the free queue; nothing changed.
    AlreadyFree,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Acquire/release cache for one actor type, keyed by prefab.
pub struct PooledActorRegistry<T: Poolable> {
    pools: HashMap<PrefabKey, PoolEntry<T::Template>>,
    slots: HashMap<ActorId, Slot<T>>,
    journal: Vec<Replication>,
}

impl<T: Poolable> PooledActorRegistry<T> {
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
            slots: HashMap::new(),
            journal: Vec::new(),
        }
    }

    /// Registers a prefab and prewarms `prewarm` inactive instances.
    ///
    /// Returns `false` (and changes nothing) if the key is empty or already
    /// registered.
    pub fn register(&mut self, key: PrefabKey, template: T::Template, prewarm: usize) -> bool {
        if key.is_empty() || self.pools.contains_key(&key) {
            return false;
        }

        let mut entry = PoolEntry {
            template,
            free: VecDeque::with_capacity(prewarm),
            allocated: 0,
        };
        for _ in 0..prewarm {
            let id = allocate(&mut self.slots, &mut entry, &key, SlotState::Free);
            entry.free.push_back(id);
        }

        tracing::debug!(prefab = %key, prewarm, "prefab registered");
        self.pools.insert(key, entry);
        true
    }

    /// Hands out a live instance of `key` positioned at `transform`.
    ///
    /// Reuses the first non-destroyed instance in the free queue and
    /// allocates a new one when none is left.
    ///
    /// # Errors
    /// [`PoolError::EmptyPrefabKey`] or [`PoolError::Unregistered`]. Nothing
    /// is allocated in either case.
    pub fn acquire(&mut self, key: &PrefabKey, transform: Transform) -> Result<ActorId, PoolError> {
        if key.is_empty() {
            return Err(PoolError::EmptyPrefabKey);
        }
        let entry = self
            .pools
            .get_mut(key)
            .ok_or_else(|| PoolError::Unregistered(key.clone()))?;

        let mut reused = None;
        while let Some(id) = entry.free.pop_front() {
            match self.slots.get(&id).map(|slot| slot.state) {
                Some(SlotState::Free) => {
                    reused = Some(id);
                    break;
                }
                Some(SlotState::Destroyed) => {
                    // Tombstone left by `destroy`; drop it for good.
                    self.slots.remove(&id);
                    tracing::debug!(prefab = %key, actor = %id, "skipping destroyed instance");
                }
                Some(SlotState::Live) => {
                    tracing::warn!(prefab = %key, actor = %id, "live instance found in free queue");
                }
                None => {}
            }
        }

        let id = match reused {
            Some(id) => id,
            None => {
                let id = allocate(&mut self.slots, entry, key, SlotState::Free);
                tracing::debug!(prefab = %key, actor = %id, allocated = entry.allocated, "pool miss, allocated");
                id
            }
        };

        let Some(slot) = self.slots.get_mut(&id) else {
            return Err(PoolError::Unregistered(key.clone()));
        };
        slot.state = SlotState::Live;
        slot.transform = transform;
        self.journal.push(Replication::Published {
            actor: id,
            prefab: key.clone(),
            transform,
        });
        slot.instance.on_acquired(transform);

        Ok(id)
    }

    /// Returns an instance to its pool.
    ///
    /// Unknown ids were never pool-managed: they are unpublished and
    /// discarded. Releasing an instance twice is a no-op.
    pub fn release(&mut self, id: ActorId) -> ReleaseOutcome {
        let Some(slot) = self.slots.get_mut(&id) else {
            self.journal.push(Replication::Unpublished { actor: id });
            tracing::debug!(actor = %id, "released unmanaged instance, discarding");
            return ReleaseOutcome::Discarded;
        };

        let state = slot.state;
        match state {
            SlotState::Free => ReleaseOutcome::AlreadyFree,
            SlotState::Destroyed => {
                self.slots.remove(&id);
                ReleaseOutcome::Discarded
            }
            SlotState::Live => {
                slot.instance.on_released();
                self.journal.push(Replication::Unpublished { actor: id });
                slot.state = SlotState::Free;
                match self.pools.get_mut(&slot.prefab) {
                    Some(entry) => {
                        entry.free.push_back(id);
                        ReleaseOutcome::Requeued
                    }
                    None => {
                        self.slots.remove(&id);
                        ReleaseOutcome::Discarded
                    }
                }
            }
        }
    }

    /// Marks an instance as lost outside the pool's control.
    ///
    /// A live instance is unpublished. Returns `false` for unknown or already
    /// destroyed instances.
    pub fn destroy(&mut self, id: ActorId) -> bool {
        match self.slots.get_mut(&id) {
            Some(slot) if slot.state != SlotState::Destroyed => {
                if slot.state == SlotState::Live {
                    self.journal.push(Replication::Unpublished { actor: id });
                }
                slot.state = SlotState::Destroyed;
                tracing::debug!(actor = %id, prefab = %slot.prefab, "instance destroyed externally");
                true
            }
            _ => false,
        }
    }

    /// The live instance behind `id`.
    pub fn get(&self, id: ActorId) -> Option<&T> {
        self.slots
            .get(&id)
            .filter(|slot| slot.state == SlotState::Live)
            .map(|slot| &slot.instance)
    }

    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut T> {
        self.slots
            .get_mut(&id)
            .filter(|slot| slot.state == SlotState::Live)
            .map(|slot| &mut slot.instance)
    }

    /// Where a live instance was placed.
    pub fn transform(&self, id: ActorId) -> Option<Transform> {
        self.slots
            .get(&id)
            .filter(|slot| slot.state == SlotState::Live)
            .map(|slot| slot.transform)
    }

    pub fn state(&self, id: ActorId) -> Option<SlotState> {
        self.slots.get(&id).map(|slot| slot.state)
    }

    pub fn is_live(&self, id: ActorId) -> bool {
        self.state(id) == Some(SlotState::Live)
    }

    pub fn prefab_of(&self, id: ActorId) -> Option<&PrefabKey> {
        self.slots.get(&id).map(|slot| &slot.prefab)
    }

    pub fn is_registered(&self, key: &PrefabKey) -> bool {
        self.pools.contains_key(key)
    }

    pub fn template(&self, key: &PrefabKey) -> Option<&T::Template> {
        self.pools.get(key).map(|entry| &entry.template)
    }

    /// Instances ever allocated for `key` (prewarmed plus pool misses).
    pub fn allocated_count(&self, key: &PrefabKey) -> usize {
        self.pools.get(key).map_or(0, |entry| entry.allocated)
    }

    /// Entries waiting in `key`'s free queue, tombstones included.
    pub fn free_count(&self, key: &PrefabKey) -> usize {
        self.pools.get(key).map_or(0, |entry| entry.free.len())
    }

    pub fn live_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.state == SlotState::Live)
            .count()
    }

    /// Ids of every live instance, sorted.
    pub fn live_ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.state == SlotState::Live)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Takes every publication change recorded since the last drain.
    pub fn drain_replication(&mut self) -> Vec<Replication> {
        std::mem::take(&mut self.journal)
    }
}

impl<T: Poolable> Default for PooledActorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn allocate<T: Poolable>(
    slots: &mut HashMap<ActorId, Slot<T>>,
    entry: &mut PoolEntry<T::Template>,
    key: &PrefabKey,
    state: SlotState,
) -> ActorId {
    let id = ActorId(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed));
    slots.insert(
        id,
        Slot {
            prefab: key.clone(),
            state,
            transform: Transform::default(),
            instance: T::instantiate(&entry.template),
        },
    );
    entry.allocated += 1;
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl Poolable for Dummy {
        type Template = ();

        fn instantiate(_: &()) -> Self {
            Dummy
        }
    }

    #[test]
    fn test_register_rejects_empty_key() {
        let mut registry = PooledActorRegistry::<Dummy>::new();
        assert!(!registry.register(PrefabKey::new(""), (), 3));
        assert!(!registry.is_registered(&PrefabKey::new("")));
    }

    #[test]
    fn test_acquire_empty_key_fails() {
        let mut registry = PooledActorRegistry::<Dummy>::new();
        let result = registry.acquire(&PrefabKey::new(""), Transform::default());
        assert!(matches!(result, Err(PoolError::EmptyPrefabKey)));
    }

    #[test]
    fn test_live_slot_in_free_queue_is_never_reissued() {
        let key = PrefabKey::new("dummy");
        let mut registry = PooledActorRegistry::<Dummy>::new();
        registry.register(key.clone(), (), 1);

        let id = registry.acquire(&key, Transform::default()).unwrap();
        // Corrupt the queue on purpose: the live id must still be skipped.
        registry.pools.get_mut(&key).unwrap().free.push_back(id);

        let other = registry.acquire(&key, Transform::default()).unwrap();
        assert_ne!(id, other);
        assert!(registry.is_live(id));
        assert!(registry.is_live(other));
    }
}
