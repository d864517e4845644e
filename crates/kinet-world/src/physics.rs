//! Handle-based physics context.
//!
//! `Physics` owns four arenas (worlds, shapes, bodies, constraints) and the
//! edges between them: which bodies use a shape, which worlds a body or
//! constraint is registered in, which constraints hang off a body. Every
//! destroy checks those edges first, so an entity that is still referenced
//! is reported instead of freed.

use std::collections::BTreeSet;
use std::sync::Arc;

use glam::Quat;
use kinet_articulation::Generic6DofSpring;
use kinet_collision::CollisionFilter;
use kinet_core::{
    decode, encode, AllocCounters, AllocKind, AllocStats, Arena, ArenaHandle, BodyHandle, ColMajor4x4,
    ConstraintHandle, EntityKind, PhysicsError, Result, ShapeHandle, Vec3, WorldHandle,
};
use kinet_dynamics::{ActivationState, RigidBody, RigidBodyInfo};
use kinet_geom::Shape;
use log::{debug, info};

use crate::config::WorldConfig;
use crate::step::{self, StepStats};
use crate::world::World;

pub(crate) struct ShapeEntry {
    pub(crate) shape: Shape,
    pub(crate) users: BTreeSet<BodyHandle>,
}

pub(crate) struct BodyEntry {
    pub(crate) body: RigidBody,
    pub(crate) worlds: BTreeSet<WorldHandle>,
    pub(crate) constraints: BTreeSet<ConstraintHandle>,
}

pub(crate) struct ConstraintEntry {
    pub(crate) joint: Generic6DofSpring,
    pub(crate) worlds: BTreeSet<WorldHandle>,
}

pub struct Physics {
    counters: Arc<AllocCounters>,
    worlds: Arena<World, WorldHandle>,
    shapes: Arena<ShapeEntry, ShapeHandle>,
    bodies: Arena<BodyEntry, BodyHandle>,
    constraints: Arena<ConstraintEntry, ConstraintHandle>,
}

impl Default for Physics {
    fn default() -> Self { Self::new() }
}

#[inline]
fn not_registered<H: ArenaHandle>(h: H, world: WorldHandle) -> PhysicsError {
    PhysicsError::NotRegistered { kind: H::KIND, handle: h.to_raw(), world: world.to_raw() }
}

impl Physics {
    /// Context reporting into the process-wide counters.
    pub fn new() -> Self { Self::with_counters(AllocCounters::global()) }

    /// Context reporting into `counters`; tests use this to stay isolated.
    pub fn with_counters(counters: Arc<AllocCounters>) -> Self {
        Self {
            counters,
            worlds: Arena::new(),
            shapes: Arena::new(),
            bodies: Arena::new(),
            constraints: Arena::new(),
        }
    }

    #[inline] pub fn counters(&self) -> &Arc<AllocCounters> { &self.counters }
    #[inline] pub fn alloc_stats(&self) -> AllocStats { self.counters.snapshot() }

    /* ---------------- worlds ---------------- */

    pub fn create_world(&mut self, gravity: Vec3) -> WorldHandle {
        self.insert_world(WorldConfig::default().with_gravity(gravity))
    }

    pub fn create_world_with_config(&mut self, config: WorldConfig) -> Result<WorldHandle> {
        config.validate()?;
        Ok(self.insert_world(config))
    }

    fn insert_world(&mut self, config: WorldConfig) -> WorldHandle {
        let gravity = config.gravity_vec();
        let h = self.worlds.insert(World::new(config));
        self.counters.increment(AllocKind::World);
        info!("created world {h} (gravity {gravity:?})");
        h
    }

    /// Fails with `WorldNotEmpty` while anything is still registered.
    pub fn destroy_world(&mut self, h: WorldHandle) -> Result<()> {
        let w = self.worlds.try_get(h)?;
        if !w.is_empty() {
            return Err(PhysicsError::WorldNotEmpty {
                handle: h.to_raw(),
                bodies: w.num_bodies(),
                constraints: w.num_constraints(),
            });
        }
        self.worlds.remove(h);
        self.counters.decrement(AllocKind::World);
        info!("destroyed world {h}");
        Ok(())
    }

    #[inline] pub fn world(&self, h: WorldHandle) -> Result<&World> { self.worlds.try_get(h) }
    #[inline] pub fn num_worlds(&self) -> usize { self.worlds.len() }

    pub fn set_gravity(&mut self, h: WorldHandle, g: Vec3) -> Result<()> {
        self.worlds.try_get_mut(h)?.set_gravity(g);
        Ok(())
    }

    pub fn gravity(&self, h: WorldHandle) -> Result<Vec3> { Ok(self.worlds.try_get(h)?.gravity()) }

    /// Advances `h` by `dt` through its fixed-timestep accumulator.
    pub fn step(&mut self, h: WorldHandle, dt: f32, max_substeps: u32, fixed_dt: f32) -> Result<StepStats> {
        let world = self.worlds.try_get_mut(h)?;
        Ok(step::step_world(world, &mut self.bodies, &self.constraints, dt, max_substeps, fixed_dt))
    }

    /// `step` with the substep budget and fixed dt from the world's config.
    pub fn step_default(&mut self, h: WorldHandle, dt: f32) -> Result<StepStats> {
        let cfg = self.worlds.try_get(h)?.config();
        let (max_substeps, fixed_dt) = (cfg.max_substeps, cfg.fixed_dt);
        self.step(h, dt, max_substeps, fixed_dt)
    }

    pub fn add_rigid_body(&mut self, w: WorldHandle, b: BodyHandle, group: i32, mask: i32) -> Result<()> {
        let world = self.worlds.try_get_mut(w)?;
        let entry = self.bodies.try_get_mut(b)?;
        if !world.register_body(b, CollisionFilter::new(group, mask)) {
            return Err(PhysicsError::AlreadyRegistered { kind: EntityKind::RigidBody, handle: b.to_raw(), world: w.to_raw() });
        }
        entry.worlds.insert(w);
        debug!("world {w}: added {b} (group {group:#x}, mask {mask:#x})");
        Ok(())
    }

    pub fn remove_rigid_body(&mut self, w: WorldHandle, b: BodyHandle) -> Result<()> {
        let world = self.worlds.try_get_mut(w)?;
        let entry = self.bodies.try_get_mut(b)?;
        if !world.unregister_body(b) { return Err(not_registered(b, w)); }
        entry.worlds.remove(&w);
        debug!("world {w}: removed {b}");
        Ok(())
    }

    /// `disable_collision` suppresses contacts between the constraint's two
    /// bodies for as long as it stays registered in this world.
    pub fn add_constraint(&mut self, w: WorldHandle, c: ConstraintHandle, disable_collision: bool) -> Result<()> {
        let world = self.worlds.try_get_mut(w)?;
        let entry = self.constraints.try_get_mut(c)?;
        if !world.register_constraint(c, disable_collision) {
            return Err(PhysicsError::AlreadyRegistered { kind: EntityKind::Constraint, handle: c.to_raw(), world: w.to_raw() });
        }
        entry.worlds.insert(w);
        debug!("world {w}: added {c} (disable collision: {disable_collision})");
        Ok(())
    }

    pub fn remove_constraint(&mut self, w: WorldHandle, c: ConstraintHandle) -> Result<()> {
        let world = self.worlds.try_get_mut(w)?;
        let entry = self.constraints.try_get_mut(c)?;
        if !world.unregister_constraint(c) { return Err(not_registered(c, w)); }
        entry.worlds.remove(&w);
        debug!("world {w}: removed {c}");
        Ok(())
    }

    /// BLAKE3 of the world's tick and registered body states.
    pub fn world_state_hash(&self, h: WorldHandle) -> Result<[u8; 32]> {
        let world = self.worlds.try_get(h)?;
        Ok(world.state_hash(|b| self.bodies.get(b).map(|e| &e.body)))
    }

    /* ---------------- shapes ---------------- */

    fn insert_shape(&mut self, shape: Shape) -> ShapeHandle {
        let h = self.shapes.insert(ShapeEntry { shape, users: BTreeSet::new() });
        self.counters.increment(AllocKind::Shape);
        h
    }

    pub fn create_sphere(&mut self, radius: f32) -> Result<ShapeHandle> {
        let s = Shape::sphere(radius)?;
        Ok(self.insert_shape(s))
    }

    pub fn create_box(&mut self, hx: f32, hy: f32, hz: f32) -> Result<ShapeHandle> {
        let s = Shape::cuboid(hx, hy, hz)?;
        Ok(self.insert_shape(s))
    }

    pub fn create_capsule(&mut self, radius: f32, height: f32) -> Result<ShapeHandle> {
        let s = Shape::capsule(radius, height)?;
        Ok(self.insert_shape(s))
    }

    /// Fails with `InUse` while any body still references the shape.
    pub fn destroy_shape(&mut self, h: ShapeHandle) -> Result<()> {
        let entry = self.shapes.try_get(h)?;
        if !entry.users.is_empty() {
            return Err(PhysicsError::InUse {
                kind: EntityKind::Shape,
                handle: h.to_raw(),
                users: entry.users.len(),
                user_kind: EntityKind::RigidBody,
            });
        }
        self.shapes.remove(h);
        self.counters.decrement(AllocKind::Shape);
        Ok(())
    }

    pub fn shape(&self, h: ShapeHandle) -> Result<&Shape> { Ok(&self.shapes.try_get(h)?.shape) }

    /* ---------------- rigid bodies ---------------- */

    /// Builds a body from `info`. The motion state is created with it.
    pub fn create_body(&mut self, info: &RigidBodyInfo) -> Result<BodyHandle> {
        let shape = self.shapes.try_get(info.shape)?.shape;
        let h = self.bodies.insert(BodyEntry {
            body: RigidBody::new(info, shape),
            worlds: BTreeSet::new(),
            constraints: BTreeSet::new(),
        });
        if let Some(entry) = self.shapes.get_mut(info.shape) { entry.users.insert(h); }
        self.counters.increment(AllocKind::MotionState);
        self.counters.increment(AllocKind::RigidBody);
        Ok(h)
    }

    /// Fails with `StillRegistered` or `InUse` (by a constraint) instead of
    /// leaving dangling references behind.
    pub fn destroy_body(&mut self, h: BodyHandle) -> Result<()> {
        let entry = self.bodies.try_get(h)?;
        if !entry.worlds.is_empty() {
            return Err(PhysicsError::StillRegistered { kind: EntityKind::RigidBody, handle: h.to_raw(), worlds: entry.worlds.len() });
        }
        if !entry.constraints.is_empty() {
            return Err(PhysicsError::InUse {
                kind: EntityKind::RigidBody,
                handle: h.to_raw(),
                users: entry.constraints.len(),
                user_kind: EntityKind::Constraint,
            });
        }
        let Some(entry) = self.bodies.remove(h) else { return Ok(()) };
        if let Some(shape) = self.shapes.get_mut(entry.body.shape_handle()) { shape.users.remove(&h); }
        self.counters.decrement(AllocKind::MotionState);
        self.counters.decrement(AllocKind::RigidBody);
        Ok(())
    }

    #[inline] pub fn body(&self, h: BodyHandle) -> Result<&RigidBody> { Ok(&self.bodies.try_get(h)?.body) }
    #[inline] pub fn body_mut(&mut self, h: BodyHandle) -> Result<&mut RigidBody> { Ok(&mut self.bodies.try_get_mut(h)?.body) }
    #[inline] pub fn num_bodies(&self) -> usize { self.bodies.len() }

    /// Worlds the body is currently registered in.
    pub fn body_worlds(&self, h: BodyHandle) -> Result<Vec<WorldHandle>> {
        Ok(self.bodies.try_get(h)?.worlds.iter().copied().collect())
    }

    pub fn get_transform(&self, h: BodyHandle) -> Result<ColMajor4x4> { Ok(encode(&self.body(h)?.transform())) }

    pub fn set_transform(&mut self, h: BodyHandle, m: &ColMajor4x4) -> Result<()> {
        self.body_mut(h)?.set_transform(decode(m));
        Ok(())
    }

    pub fn get_position(&self, h: BodyHandle) -> Result<Vec3> { Ok(self.body(h)?.position()) }
    pub fn get_rotation(&self, h: BodyHandle) -> Result<Quat> { Ok(self.body(h)?.rotation()) }

    pub fn set_linear_velocity(&mut self, h: BodyHandle, v: Vec3) -> Result<()> {
        self.body_mut(h)?.set_linear_velocity(v);
        Ok(())
    }
    pub fn get_linear_velocity(&self, h: BodyHandle) -> Result<Vec3> { Ok(self.body(h)?.linear_velocity()) }

    pub fn set_angular_velocity(&mut self, h: BodyHandle, w: Vec3) -> Result<()> {
        self.body_mut(h)?.set_angular_velocity(w);
        Ok(())
    }
    pub fn get_angular_velocity(&self, h: BodyHandle) -> Result<Vec3> { Ok(self.body(h)?.angular_velocity()) }

    pub fn set_damping(&mut self, h: BodyHandle, linear: f32, angular: f32) -> Result<()> {
        self.body_mut(h)?.set_damping(linear, angular);
        Ok(())
    }
    pub fn set_friction(&mut self, h: BodyHandle, friction: f32) -> Result<()> {
        self.body_mut(h)?.set_friction(friction);
        Ok(())
    }
    pub fn set_restitution(&mut self, h: BodyHandle, restitution: f32) -> Result<()> {
        self.body_mut(h)?.set_restitution(restitution);
        Ok(())
    }

    /// Suggestion; see [`RigidBody::set_activation_state`].
    pub fn set_activation_state(&mut self, h: BodyHandle, s: ActivationState) -> Result<()> {
        self.body_mut(h)?.set_activation_state(s);
        Ok(())
    }
    pub fn force_activation_state(&mut self, h: BodyHandle, s: ActivationState) -> Result<()> {
        self.body_mut(h)?.force_activation_state(s);
        Ok(())
    }
    pub fn activation_state(&self, h: BodyHandle) -> Result<ActivationState> { Ok(self.body(h)?.activation_state()) }

    pub fn set_kinematic(&mut self, h: BodyHandle, kinematic: bool) -> Result<()> {
        self.body_mut(h)?.set_kinematic(kinematic);
        Ok(())
    }

    pub fn get_mass(&self, h: BodyHandle) -> Result<f32> { Ok(self.body(h)?.mass()) }

    pub fn clear_forces(&mut self, h: BodyHandle) -> Result<()> {
        self.body_mut(h)?.clear_forces();
        Ok(())
    }
    pub fn apply_central_force(&mut self, h: BodyHandle, f: Vec3) -> Result<()> {
        self.body_mut(h)?.apply_central_force(f);
        Ok(())
    }
    pub fn apply_torque(&mut self, h: BodyHandle, t: Vec3) -> Result<()> {
        self.body_mut(h)?.apply_torque(t);
        Ok(())
    }

    /* ---------------- constraints ---------------- */

    /// 6-DOF spring joint between `a` and `b`. The frames are each body's
    /// local joint frame in the caller's column-major layout.
    pub fn create_6dof_spring(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        frame_a: &ColMajor4x4,
        frame_b: &ColMajor4x4,
        use_linear_ref_a: bool,
    ) -> Result<ConstraintHandle> {
        self.bodies.try_get(a)?;
        self.bodies.try_get(b)?;
        if a == b {
            return Err(PhysicsError::SameBody { handle: a.to_raw() });
        }
        let joint = Generic6DofSpring::new(a, b, decode(frame_a), decode(frame_b), use_linear_ref_a);
        let h = self.constraints.insert(ConstraintEntry { joint, worlds: BTreeSet::new() });
        for body in [a, b] {
            if let Some(e) = self.bodies.get_mut(body) { e.constraints.insert(h); }
        }
        self.counters.increment(AllocKind::Constraint);
        Ok(h)
    }

    pub fn destroy_constraint(&mut self, h: ConstraintHandle) -> Result<()> {
        let entry = self.constraints.try_get(h)?;
        if !entry.worlds.is_empty() {
            return Err(PhysicsError::StillRegistered { kind: EntityKind::Constraint, handle: h.to_raw(), worlds: entry.worlds.len() });
        }
        let Some(entry) = self.constraints.remove(h) else { return Ok(()) };
        for body in [entry.joint.body_a(), entry.joint.body_b()] {
            if let Some(e) = self.bodies.get_mut(body) { e.constraints.remove(&h); }
        }
        self.counters.decrement(AllocKind::Constraint);
        Ok(())
    }

    #[inline] pub fn constraint(&self, h: ConstraintHandle) -> Result<&Generic6DofSpring> { Ok(&self.constraints.try_get(h)?.joint) }
    #[inline] pub fn constraint_mut(&mut self, h: ConstraintHandle) -> Result<&mut Generic6DofSpring> {
        Ok(&mut self.constraints.try_get_mut(h)?.joint)
    }

    pub fn set_linear_lower_limit(&mut self, h: ConstraintHandle, v: Vec3) -> Result<()> {
        self.constraint_mut(h)?.set_linear_lower_limit(v);
        Ok(())
    }
    pub fn set_linear_upper_limit(&mut self, h: ConstraintHandle, v: Vec3) -> Result<()> {
        self.constraint_mut(h)?.set_linear_upper_limit(v);
        Ok(())
    }
    pub fn set_angular_lower_limit(&mut self, h: ConstraintHandle, v: Vec3) -> Result<()> {
        self.constraint_mut(h)?.set_angular_lower_limit(v);
        Ok(())
    }
    pub fn set_angular_upper_limit(&mut self, h: ConstraintHandle, v: Vec3) -> Result<()> {
        self.constraint_mut(h)?.set_angular_upper_limit(v);
        Ok(())
    }

    pub fn enable_spring(&mut self, h: ConstraintHandle, axis: i32, on: bool) -> Result<()> {
        self.constraint_mut(h)?.enable_spring(axis, on)
    }
    pub fn set_spring_stiffness(&mut self, h: ConstraintHandle, axis: i32, value: f32) -> Result<()> {
        self.constraint_mut(h)?.set_stiffness(axis, value)
    }
    pub fn set_spring_damping(&mut self, h: ConstraintHandle, axis: i32, value: f32) -> Result<()> {
        self.constraint_mut(h)?.set_damping(axis, value)
    }

    /// Current relative pose of the two bodies becomes the rest pose of every spring.
    pub fn set_equilibrium_point(&mut self, h: ConstraintHandle) -> Result<()> {
        let entry = self.constraints.try_get_mut(h)?;
        let xa = self.bodies.try_get(entry.joint.body_a())?.body.transform();
        let xb = self.bodies.try_get(entry.joint.body_b())?.body.transform();
        entry.joint.set_equilibrium_point(&xa, &xb);
        Ok(())
    }

    pub fn set_constraint_param(&mut self, h: ConstraintHandle, kind: i32, value: f32, axis: i32) -> Result<()> {
        self.constraint_mut(h)?.set_param(kind, value, axis)
    }

    pub fn use_frame_offset(&mut self, h: ConstraintHandle, on: bool) -> Result<()> {
        self.constraint_mut(h)?.use_frame_offset(on);
        Ok(())
    }
}
