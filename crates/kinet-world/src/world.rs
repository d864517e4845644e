use std::collections::BTreeMap;

use kinet_collision::CollisionFilter;
use kinet_core::{ArenaHandle, BodyHandle, ConstraintHandle, Digest, StateDigest, Vec3};
use kinet_dynamics::RigidBody;

use crate::config::WorldConfig;
use crate::contact::WarmCache;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BodyRegistration { pub filter: CollisionFilter }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ConstraintRegistration { pub disable_collision: bool }

/// How one `step` call is split into substeps.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SubstepPlan {
    pub count: u32,
    pub dropped: u32,
    pub dt: f32,
}

impl SubstepPlan {
    const NONE: SubstepPlan = SubstepPlan { count: 0, dropped: 0, dt: 0.0 };
}

/// Gravity, timestep state and the registration sets. Bodies and
/// constraints are referenced by handle, never owned.
pub struct World {
    config: WorldConfig,
    gravity: Vec3,
    bodies: BTreeMap<BodyHandle, BodyRegistration>,
    constraints: BTreeMap<ConstraintHandle, ConstraintRegistration>,
    accumulator: f32,
    tick: u64,
    pub(crate) warm: WarmCache,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            gravity: config.gravity_vec(),
            config,
            bodies: BTreeMap::new(),
            constraints: BTreeMap::new(),
            accumulator: 0.0,
            tick: 0,
            warm: WarmCache::default(),
        }
    }

    #[inline] pub fn config(&self) -> &WorldConfig { &self.config }
    #[inline] pub fn gravity(&self) -> Vec3 { self.gravity }
    #[inline] pub fn set_gravity(&mut self, g: Vec3) { self.gravity = g; }
    #[inline] pub fn tick_index(&self) -> u64 { self.tick }
    #[inline] pub fn accumulator(&self) -> f32 { self.accumulator }

    #[inline] pub fn num_bodies(&self) -> usize { self.bodies.len() }
    #[inline] pub fn num_constraints(&self) -> usize { self.constraints.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.bodies.is_empty() && self.constraints.is_empty() }

    #[inline] pub fn contains_body(&self, b: BodyHandle) -> bool { self.bodies.contains_key(&b) }
    #[inline] pub fn contains_constraint(&self, c: ConstraintHandle) -> bool { self.constraints.contains_key(&c) }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &BodyRegistration)> + '_ {
        self.bodies.iter().map(|(h, r)| (*h, r))
    }
    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintHandle, &ConstraintRegistration)> + '_ {
        self.constraints.iter().map(|(h, r)| (*h, r))
    }

    /// Returns false if the body was already registered.
    pub(crate) fn register_body(&mut self, b: BodyHandle, filter: CollisionFilter) -> bool {
        if self.bodies.contains_key(&b) { return false; }
        self.bodies.insert(b, BodyRegistration { filter });
        true
    }
    pub(crate) fn unregister_body(&mut self, b: BodyHandle) -> bool {
        let removed = self.bodies.remove(&b).is_some();
        if removed { self.warm.forget_body(b); }
        removed
    }
    pub(crate) fn register_constraint(&mut self, c: ConstraintHandle, disable_collision: bool) -> bool {
        if self.constraints.contains_key(&c) { return false; }
        self.constraints.insert(c, ConstraintRegistration { disable_collision });
        true
    }
    pub(crate) fn unregister_constraint(&mut self, c: ConstraintHandle) -> bool {
        self.constraints.remove(&c).is_some()
    }

    /// Fixed-timestep accumulator. `max_substeps == 0` means one variable step of `dt`.
    /// Substeps beyond the budget are dropped together with their time.
    pub fn plan_substeps(&mut self, dt: f32, max_substeps: u32, fixed_dt: f32) -> SubstepPlan {
        if !dt.is_finite() || dt <= 0.0 { return SubstepPlan::NONE; }
        if max_substeps == 0 {
            return SubstepPlan { count: 1, dropped: 0, dt };
        }
        if !fixed_dt.is_finite() || fixed_dt <= 0.0 { return SubstepPlan::NONE; }
        self.accumulator += dt;
        let n = (self.accumulator / fixed_dt).floor();
        self.accumulator -= n * fixed_dt;
        if self.accumulator < 0.0 { self.accumulator = 0.0; }
        let n = n as u32;
        let count = n.min(max_substeps);
        SubstepPlan { count, dropped: n - count, dt: fixed_dt }
    }

    pub(crate) fn advance_tick(&mut self) { self.tick = self.tick.wrapping_add(1); }

    /// BLAKE3 over the tick and each registered body's pose and velocity, in handle order.
    pub fn state_hash<'a, F>(&self, mut lookup: F) -> Digest
    where
        F: FnMut(BodyHandle) -> Option<&'a RigidBody>,
    {
        let mut d = StateDigest::new();
        d.u64(self.tick);
        for (&handle, _) in &self.bodies {
            let Some(b) = lookup(handle) else { continue };
            d.u64(handle.to_raw())
                .vec3(b.position())
                .quat(b.rotation())
                .vec3(b.linear_velocity())
                .vec3(b.angular_velocity());
        }
        d.finish()
    }
}
