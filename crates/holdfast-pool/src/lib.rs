//! Acquire/release cache for networked actor instances.
//!
//! Spawning a networked actor is expensive: it has to be built from its
//! template and registered with the network layer. The
//! [`PooledActorRegistry`] keeps released instances around, inactive, and
//! hands them out again on the next acquire.
//!
//! ```text
//! register(key, template, n) ─→ [Free] ×n
//!                                  │ acquire()
//!                                  ▼
//!                               [Live] ──(release)──→ [Free] (requeued)
//!                                  │
//!                            (destroy: abrupt loss)
//!                                  ▼
//!                             [Destroyed] ──→ skipped by acquire / discarded by release
//! ```
//!
//! # Guarantees
//!
//! - An instance is never in a free queue while live, so acquire never
//!   hands out an instance another caller still holds.
//! - Pools only grow. Instances are deactivated and requeued, never freed,
//!   unless they were destroyed from outside.
//!
//! # Network publication
//!
//! The registry does not talk to the network itself. Every publish and
//! unpublish is appended to a [`Replication`] journal which the owner drains
//! after each operation and forwards to observers.

mod error;
mod registry;

pub use error::PoolError;
pub use registry::{
    Poolable, PooledActorRegistry, ReleaseOutcome, Replication, SlotState,
};
