//! Live-object counters for leak detection.
//!
//! Updates are relaxed atomics: no lost increments, no ordering relative to
//! the entity operation that triggered them.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use once_cell::sync::Lazy;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AllocStats {
    pub worlds: i32,
    pub shapes: i32,
    pub rigid_bodies: i32,
    pub constraints: i32,
    pub motion_states: i32,
}

impl AllocStats {
    pub fn is_clean(&self) -> bool { *self == AllocStats::default() }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AllocKind { World, Shape, RigidBody, Constraint, MotionState }

#[derive(Debug, Default)]
pub struct AllocCounters {
    worlds: AtomicI32,
    shapes: AtomicI32,
    rigid_bodies: AtomicI32,
    constraints: AtomicI32,
    motion_states: AtomicI32,
}

static GLOBAL: Lazy<Arc<AllocCounters>> = Lazy::new(|| Arc::new(AllocCounters::default()));

impl AllocCounters {
    /// Fresh, independent counters (test-scoped or per embedding).
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// The process-wide instance.
    pub fn global() -> Arc<Self> { Arc::clone(&GLOBAL) }

    fn slot(&self, kind: AllocKind) -> &AtomicI32 {
        match kind {
            AllocKind::World => &self.worlds,
            AllocKind::Shape => &self.shapes,
            AllocKind::RigidBody => &self.rigid_bodies,
            AllocKind::Constraint => &self.constraints,
            AllocKind::MotionState => &self.motion_states,
        }
    }

    #[inline] pub fn increment(&self, kind: AllocKind) { self.slot(kind).fetch_add(1, Ordering::Relaxed); }
    #[inline] pub fn decrement(&self, kind: AllocKind) { self.slot(kind).fetch_sub(1, Ordering::Relaxed); }

    pub fn snapshot(&self) -> AllocStats {
        AllocStats {
            worlds: self.worlds.load(Ordering::Relaxed),
            shapes: self.shapes.load(Ordering::Relaxed),
            rigid_bodies: self.rigid_bodies.load(Ordering::Relaxed),
            constraints: self.constraints.load(Ordering::Relaxed),
            motion_states: self.motion_states.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_counters_are_isolated_from_global() {
        let before = AllocCounters::global().snapshot();
        let c = AllocCounters::new();
        c.increment(AllocKind::Shape);
        c.increment(AllocKind::Shape);
        c.decrement(AllocKind::Shape);
        c.increment(AllocKind::MotionState);
        assert_eq!(c.snapshot(), AllocStats { shapes: 1, motion_states: 1, ..Default::default() });
        assert_eq!(AllocCounters::global().snapshot(), before);
    }
}
