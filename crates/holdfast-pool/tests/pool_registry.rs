//! Integration tests for the pooled actor registry.

use holdfast_pool::{PoolError, Poolable, PooledActorRegistry, ReleaseOutcome, Replication, SlotState};
use holdfast_protocol::{PrefabKey, Transform, Vec2};

// =========================================================================
// Mock actor: counts its lifecycle hooks.
// =========================================================================

#[derive(Debug)]
struct Crate {
    weight: u32,
    active: bool,
    acquired: u32,
    released: u32,
    placed_at: Vec2,
}

impl Poolable for Crate {
    type Template = u32;

    fn instantiate(weight: &u32) -> Self {
        Self {
            weight: *weight,
            active: false,
            acquired: 0,
            released: 0,
            placed_at: Vec2::ZERO,
        }
    }

    fn on_acquired(&mut self, transform: Transform) {
        self.active = true;
        self.acquired += 1;
        self.placed_at = transform.position;
    }

    fn on_released(&mut self) {
        self.active = false;
        self.released += 1;
    }
}

fn key() -> PrefabKey {
    PrefabKey::new("crate")
}

fn registry_with(prewarm: usize) -> PooledActorRegistry<Crate> {
    let mut registry = PooledActorRegistry::new();
    assert!(registry.register(key(), 5, prewarm));
    registry
}

fn at(x: f32, y: f32) -> Transform {
    Transform::at(Vec2::new(x, y))
}

// =========================================================================
// Register
// =========================================================================

#[test]
fn test_register_prewarms_free_instances() {
    let registry = registry_with(3);
    assert_eq!(registry.allocated_count(&key()), 3);
    assert_eq!(registry.free_count(&key()), 3);
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.template(&key()), Some(&5));
}

#[test]
fn test_register_twice_is_noop() {
    let mut registry = registry_with(2);
    assert!(!registry.register(key(), 99, 10));
    assert_eq!(registry.allocated_count(&key()), 2);
    assert_eq!(registry.template(&key()), Some(&5), "first template wins");
}

// =========================================================================
// Acquire
// =========================================================================

#[test]
fn test_acquire_activates_and_positions_instance() {
    let mut registry = registry_with(1);
    let id = registry.acquire(&key(), at(2.0, 3.0)).unwrap();

    let instance = registry.get(id).unwrap();
    assert!(instance.active);
    assert_eq!(instance.acquired, 1);
    assert_eq!(instance.weight, 5);
    assert_eq!(instance.placed_at, Vec2::new(2.0, 3.0));
    assert_eq!(registry.transform(id), Some(at(2.0, 3.0)));
    assert_eq!(registry.state(id), Some(SlotState::Live));
    assert_eq!(registry.free_count(&key()), 0);
}

#[test]
fn test_acquire_unregistered_key_fails_without_allocating() {
    let mut registry = registry_with(0);
    let missing = PrefabKey::new("barrel");
    let result = registry.acquire(&missing, at(0.0, 0.0));
    assert!(matches!(result, Err(PoolError::Unregistered(k)) if k == missing));
    assert_eq!(registry.live_count(), 0);
    assert!(registry.drain_replication().is_empty());
}

#[test]
fn test_acquire_with_every_instance_live_allocates_new_one() {
    let mut registry = registry_with(2);
    let first = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    let second = registry.acquire(&key(), at(1.0, 0.0)).unwrap();
    assert_eq!(registry.free_count(&key()), 0);

    let third = registry.acquire(&key(), at(2.0, 0.0)).unwrap();

    assert_ne!(third, first);
    assert_ne!(third, second);
    assert!(registry.get(third).unwrap().active);
    assert_eq!(registry.allocated_count(&key()), 3);
    assert_eq!(registry.live_count(), 3);
}

#[test]
fn test_acquire_never_returns_instance_live_elsewhere() {
    let mut registry = registry_with(4);
    let mut held = Vec::new();
    for i in 0..8 {
        let id = registry.acquire(&key(), at(i as f32, 0.0)).unwrap();
        assert!(!held.contains(&id), "{id} handed out twice");
        held.push(id);
    }
    assert_eq!(registry.live_ids().len(), 8);
}

// =========================================================================
// Release
// =========================================================================

#[test]
fn test_release_requeues_and_reuses_instance() {
    let mut registry = registry_with(1);
    let id = registry.acquire(&key(), at(0.0, 0.0)).unwrap();

    assert_eq!(registry.release(id), ReleaseOutcome::Requeued);
    assert_eq!(registry.state(id), Some(SlotState::Free));
    assert!(registry.get(id).is_none(), "free instances are not reachable");

    let again = registry.acquire(&key(), at(4.0, 4.0)).unwrap();
    assert_eq!(again, id);
    let instance = registry.get(again).unwrap();
    assert_eq!(instance.acquired, 2);
    assert_eq!(instance.released, 1);
}

#[test]
fn test_acquire_release_acquire_keeps_pool_size() {
    let mut registry = registry_with(0);
    let id = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    let size = registry.allocated_count(&key());

    registry.release(id);
    registry.acquire(&key(), at(0.0, 0.0)).unwrap();

    assert_eq!(registry.allocated_count(&key()), size);
}

#[test]
fn test_pool_grows_by_one_when_released_instance_was_destroyed() {
    let mut registry = registry_with(0);
    let id = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    let size = registry.allocated_count(&key());

    assert!(registry.destroy(id));
    assert_eq!(registry.release(id), ReleaseOutcome::Discarded);
    let fresh = registry.acquire(&key(), at(0.0, 0.0)).unwrap();

    assert_ne!(fresh, id);
    assert_eq!(registry.allocated_count(&key()), size + 1);
    assert_eq!(registry.state(id), None);
}

#[test]
fn test_destroyed_instance_in_free_queue_is_skipped() {
    let mut registry = registry_with(2);
    let first = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    let second = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    registry.release(first);
    registry.release(second);

    assert!(registry.destroy(first));
    assert!(!registry.destroy(first), "second destroy is a no-op");

    let id = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    assert_eq!(id, second);
    assert_eq!(registry.state(first), None, "tombstone dropped");
}

#[test]
fn test_double_release_is_noop() {
    let mut registry = registry_with(1);
    let id = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    assert_eq!(registry.release(id), ReleaseOutcome::Requeued);
    assert_eq!(registry.release(id), ReleaseOutcome::AlreadyFree);
    assert_eq!(registry.free_count(&key()), 1);

    // Only one acquire may get it back.
    let a = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    let b = registry.acquire(&key(), at(0.0, 0.0)).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_release_unmanaged_instance_is_discarded() {
    let mut registry = registry_with(0);
    let stranger = holdfast_protocol::ActorId(u64::MAX);
    assert_eq!(registry.release(stranger), ReleaseOutcome::Discarded);
    assert_eq!(
        registry.drain_replication(),
        vec![Replication::Unpublished { actor: stranger }]
    );
}

// =========================================================================
// Replication journal
// =========================================================================

#[test]
fn test_journal_records_publish_and_unpublish() {
    let mut registry = registry_with(1);
    let id = registry.acquire(&key(), at(1.0, 2.0)).unwrap();
    registry.release(id);

    assert_eq!(
        registry.drain_replication(),
        vec![
            Replication::Published {
                actor: id,
                prefab: key(),
                transform: at(1.0, 2.0),
            },
            Replication::Unpublished { actor: id },
        ]
    );
    assert!(registry.drain_replication().is_empty(), "drain empties the journal");
}
