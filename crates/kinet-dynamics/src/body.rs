use glam::Quat;
use kinet_core::{Mat3, ShapeHandle, Transform, Vec3, Velocity};
use kinet_geom::{local_inertia, Shape};

use crate::activation::ActivationState;
use crate::motion::MotionState;

/// Collision flag bits.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct CollisionFlags(pub u32);

impl CollisionFlags {
    pub const STATIC_OBJECT: CollisionFlags = CollisionFlags(1);
    pub const KINEMATIC_OBJECT: CollisionFlags = CollisionFlags(2);
    pub const NO_CONTACT_RESPONSE: CollisionFlags = CollisionFlags(4);

    #[inline] pub fn contains(self, f: CollisionFlags) -> bool { self.0 & f.0 == f.0 }
    #[inline] pub fn insert(&mut self, f: CollisionFlags) { self.0 |= f.0; }
    #[inline] pub fn remove(&mut self, f: CollisionFlags) { self.0 &= !f.0; }
    #[inline] pub fn bits(self) -> u32 { self.0 }
}

/// Construction record for a rigid body.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RigidBodyInfo {
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
    pub additional_damping: bool,
    pub is_kinematic: bool,
    pub disable_deactivation: bool,
    pub no_contact_response: bool,
    pub shape: ShapeHandle,
    pub initial_transform: Transform,
}

impl RigidBodyInfo {
    pub fn new(shape: ShapeHandle, mass: f32) -> Self {
        Self {
            mass,
            linear_damping: 0.0,
            angular_damping: 0.0,
            friction: 0.5,
            restitution: 0.0,
            additional_damping: false,
            is_kinematic: false,
            disable_deactivation: false,
            no_contact_response: false,
            shape,
            initial_transform: Transform::IDENTITY,
        }
    }

    pub fn with_transform(mut self, t: Transform) -> Self { self.initial_transform = t; self }
    pub fn with_damping(mut self, lin: f32, ang: f32) -> Self { self.linear_damping = lin; self.angular_damping = ang; self }
    pub fn with_friction(mut self, f: f32) -> Self { self.friction = f; self }
    pub fn with_restitution(mut self, r: f32) -> Self { self.restitution = r; self }
    pub fn kinematic(mut self) -> Self { self.is_kinematic = true; self }
    pub fn no_deactivation(mut self) -> Self { self.disable_deactivation = true; self }
    pub fn no_contact_response(mut self) -> Self { self.no_contact_response = true; self }
    pub fn additional_damping(mut self) -> Self { self.additional_damping = true; self }
}

const ADDITIONAL_DAMPING_FACTOR: f32 = 0.005;
const ADDITIONAL_LINEAR_THRESHOLD_SQR: f32 = 0.01;
const ADDITIONAL_ANGULAR_THRESHOLD_SQR: f32 = 0.01;
const MAX_ANGULAR_MOTION: f32 = core::f32::consts::FRAC_PI_4;

pub struct RigidBody {
    shape_handle: ShapeHandle,
    shape: Shape,
    motion: MotionState,
    xform: Transform,
    inv_mass: f32,
    local_inertia: Vec3,
    inv_inertia_local: Vec3,
    lin_vel: Vec3,
    ang_vel: Vec3,
    total_force: Vec3,
    total_torque: Vec3,
    linear_damping: f32,
    angular_damping: f32,
    additional_damping: bool,
    friction: f32,
    restitution: f32,
    flags: CollisionFlags,
    activation: ActivationState,
    deactivation_time: f32,
}

impl RigidBody {
    /// `shape` is the geometry behind `info.shape`, already resolved by the caller.
    pub fn new(info: &RigidBodyInfo, shape: Shape) -> Self {
        let mass = if info.is_kinematic { 0.0 } else { info.mass };
        let (inv_mass, inertia) = if mass > 0.0 {
            (1.0 / mass, local_inertia(&shape, mass))
        } else {
            (0.0, Vec3::ZERO)
        };
        let inv_inertia_local = Vec3::new(
            if inertia.x != 0.0 { 1.0 / inertia.x } else { 0.0 },
            if inertia.y != 0.0 { 1.0 / inertia.y } else { 0.0 },
            if inertia.z != 0.0 { 1.0 / inertia.z } else { 0.0 },
        );

        let mut flags = CollisionFlags::default();
        if inv_mass == 0.0 { flags.insert(CollisionFlags::STATIC_OBJECT); }
        let mut activation = ActivationState::Active;
        if info.is_kinematic {
            flags.insert(CollisionFlags::KINEMATIC_OBJECT);
            activation = ActivationState::DisableDeactivation;
        } else if info.disable_deactivation {
            activation = ActivationState::DisableDeactivation;
        }
        if info.no_contact_response { flags.insert(CollisionFlags::NO_CONTACT_RESPONSE); }

        Self {
            shape_handle: info.shape,
            shape,
            motion: MotionState::new(info.initial_transform),
            xform: info.initial_transform,
            inv_mass,
            local_inertia: inertia,
            inv_inertia_local,
            lin_vel: Vec3::ZERO,
            ang_vel: Vec3::ZERO,
            total_force: Vec3::ZERO,
            total_torque: Vec3::ZERO,
            linear_damping: info.linear_damping,
            angular_damping: info.angular_damping,
            additional_damping: info.additional_damping,
            friction: info.friction,
            restitution: info.restitution,
            flags,
            activation,
            deactivation_time: 0.0,
        }
    }

    /* ---------- shape / transform ---------- */
    #[inline] pub fn shape_handle(&self) -> ShapeHandle { self.shape_handle }
    #[inline] pub fn shape(&self) -> &Shape { &self.shape }
    #[inline] pub fn transform(&self) -> Transform { self.xform }
    #[inline] pub fn motion_state(&self) -> &MotionState { &self.motion }
    #[inline] pub fn position(&self) -> Vec3 { self.xform.origin }
    #[inline] pub fn rotation(&self) -> Quat { self.xform.rotation() }

    /// Writes the body transform and its motion state together.
    pub fn set_transform(&mut self, t: Transform) {
        self.xform = t;
        self.motion.set_world_transform(t);
    }

    /* ---------- velocities / forces ---------- */
    #[inline] pub fn linear_velocity(&self) -> Vec3 { self.lin_vel }
    #[inline] pub fn angular_velocity(&self) -> Vec3 { self.ang_vel }
    #[inline] pub fn velocity(&self) -> Velocity { Velocity { lin: self.lin_vel, ang: self.ang_vel } }
    #[inline] pub fn set_linear_velocity(&mut self, v: Vec3) { self.lin_vel = v; }
    #[inline] pub fn set_angular_velocity(&mut self, w: Vec3) { self.ang_vel = w; }
    #[inline] pub fn set_velocity(&mut self, v: Velocity) { self.lin_vel = v.lin; self.ang_vel = v.ang; }

    #[inline] pub fn total_force(&self) -> Vec3 { self.total_force }
    #[inline] pub fn total_torque(&self) -> Vec3 { self.total_torque }
    #[inline] pub fn apply_central_force(&mut self, f: Vec3) { self.total_force += f; }
    #[inline] pub fn apply_torque(&mut self, t: Vec3) { self.total_torque += t; }
    #[inline] pub fn clear_forces(&mut self) {
        self.total_force = Vec3::ZERO;
        self.total_torque = Vec3::ZERO;
    }

    /* ---------- material ---------- */
    #[inline] pub fn linear_damping(&self) -> f32 { self.linear_damping }
    #[inline] pub fn angular_damping(&self) -> f32 { self.angular_damping }
    #[inline] pub fn set_damping(&mut self, lin: f32, ang: f32) {
        self.linear_damping = lin;
        self.angular_damping = ang;
    }
    #[inline] pub fn friction(&self) -> f32 { self.friction }
    #[inline] pub fn set_friction(&mut self, f: f32) { self.friction = f; }
    #[inline] pub fn restitution(&self) -> f32 { self.restitution }
    #[inline] pub fn set_restitution(&mut self, r: f32) { self.restitution = r; }

    /* ---------- mass ---------- */
    /// Reciprocal of the stored inverse mass, zero for infinite mass.
    #[inline] pub fn mass(&self) -> f32 { if self.inv_mass == 0.0 { 0.0 } else { 1.0 / self.inv_mass } }
    #[inline] pub fn local_inertia(&self) -> Vec3 { self.local_inertia }

    /// Inverse mass as seen by the solver: zero for static and kinematic bodies.
    #[inline] pub fn solver_inv_mass(&self) -> f32 {
        if self.is_static_or_kinematic() { 0.0 } else { self.inv_mass }
    }

    /// World-space inverse inertia: R * I^-1_local * R^T.
    pub fn inv_inertia_world(&self) -> Mat3 {
        if self.is_static_or_kinematic() { return Mat3::ZERO; }
        let r = self.xform.basis;
        r * Mat3::from_diagonal(self.inv_inertia_local.into()) * r.transpose()
    }

    /* ---------- flags ---------- */
    #[inline] pub fn flags(&self) -> CollisionFlags { self.flags }
    #[inline] pub fn is_kinematic(&self) -> bool { self.flags.contains(CollisionFlags::KINEMATIC_OBJECT) }
    #[inline] pub fn is_static(&self) -> bool { self.flags.contains(CollisionFlags::STATIC_OBJECT) }
    #[inline] pub fn is_static_or_kinematic(&self) -> bool {
        self.flags.0 & (CollisionFlags::STATIC_OBJECT.0 | CollisionFlags::KINEMATIC_OBJECT.0) != 0
    }
    #[inline] pub fn has_contact_response(&self) -> bool {
        !self.flags.contains(CollisionFlags::NO_CONTACT_RESPONSE)
    }
    /// Bodies that join simulation islands.
    #[inline] pub fn merges_islands(&self) -> bool {
        !self.is_static_or_kinematic() && self.has_contact_response()
    }

    /// Sets the KINEMATIC flag and pins the body awake. Clearing the flag
    /// only suggests DISABLE_DEACTIVATION, so DISABLE_SIMULATION survives.
    pub fn set_kinematic(&mut self, on: bool) {
        if on {
            self.flags.insert(CollisionFlags::KINEMATIC_OBJECT);
            self.activation = ActivationState::DisableDeactivation;
        } else {
            self.flags.remove(CollisionFlags::KINEMATIC_OBJECT);
            self.set_activation_state(ActivationState::DisableDeactivation);
        }
    }

    /* ---------- activation ---------- */
    #[inline] pub fn activation_state(&self) -> ActivationState { self.activation }
    #[inline] pub fn is_active(&self) -> bool { self.activation.is_active() }
    #[inline] pub fn deactivation_time(&self) -> f32 { self.deactivation_time }

    /// Suggestion. Ignored while the body is pinned by DISABLE_DEACTIVATION or
    /// DISABLE_SIMULATION. Returns whether the state was applied.
    pub fn set_activation_state(&mut self, s: ActivationState) -> bool {
        if self.activation.is_pinned() { return false; }
        self.activation = s;
        true
    }

    pub fn force_activation_state(&mut self, s: ActivationState) {
        self.activation = s;
    }

    /// Wakes a dynamic body (or any body with `force`).
    pub fn activate(&mut self, force: bool) {
        if force || !self.is_static_or_kinematic() {
            self.set_activation_state(ActivationState::Active);
            self.deactivation_time = 0.0;
        }
    }

    /// Sleep-island wake-up: back to WANTS_DEACTIVATION with a fresh timer.
    pub fn wake_from_island(&mut self) {
        if self.activation == ActivationState::IslandSleeping {
            self.activation = ActivationState::WantsDeactivation;
            self.deactivation_time = 0.0;
        }
    }

    pub fn put_to_sleep(&mut self) {
        if self.activation.is_pinned() { return; }
        self.activation = ActivationState::IslandSleeping;
        self.lin_vel = Vec3::ZERO;
        self.ang_vel = Vec3::ZERO;
    }

    /// Accumulates rest time while both speeds stay under their thresholds.
    pub fn update_deactivation(&mut self, dt: f32, lin_threshold: f32, ang_threshold: f32) {
        if self.is_static_or_kinematic()
            || self.activation == ActivationState::IslandSleeping
            || self.activation == ActivationState::DisableDeactivation {
            return;
        }
        if self.lin_vel.length_squared() < lin_threshold * lin_threshold
            && self.ang_vel.length_squared() < ang_threshold * ang_threshold {
            self.deactivation_time += dt;
        } else {
            self.deactivation_time = 0.0;
            self.set_activation_state(ActivationState::Active);
        }
    }

    pub fn wants_sleeping(&self, deactivation_time: f32) -> bool {
        match self.activation {
            ActivationState::DisableDeactivation => false,
            ActivationState::IslandSleeping | ActivationState::WantsDeactivation => true,
            _ => self.deactivation_time > deactivation_time,
        }
    }

    /// Per-body half of the activation update, after integration.
    pub fn update_activation(&mut self, dt: f32, lin_threshold: f32, ang_threshold: f32,
                             deactivation_time: f32, sleeping_enabled: bool) {
        if self.activation == ActivationState::DisableSimulation { return; }
        self.update_deactivation(dt, lin_threshold, ang_threshold);
        if sleeping_enabled && self.wants_sleeping(deactivation_time) {
            if self.is_static_or_kinematic() { return; }
            match self.activation {
                ActivationState::Active => self.activation = ActivationState::WantsDeactivation,
                ActivationState::IslandSleeping => {
                    self.lin_vel = Vec3::ZERO;
                    self.ang_vel = Vec3::ZERO;
                }
                _ => {}
            }
        } else if self.activation != ActivationState::DisableDeactivation {
            self.activation = ActivationState::Active;
        }
    }

    /* ---------- integration ---------- */
    /// Gravity and accumulated forces into velocity, then damping.
    pub fn integrate_velocities(&mut self, gravity: Vec3, dt: f32) {
        if self.is_static_or_kinematic() || !self.is_active() { return; }
        self.lin_vel += (self.total_force * self.inv_mass + gravity) * dt;
        self.ang_vel += self.inv_inertia_world() * self.total_torque * dt;
        self.apply_damping(dt);
    }

    pub fn apply_damping(&mut self, dt: f32) {
        let ld = self.linear_damping.clamp(0.0, 1.0);
        let ad = self.angular_damping.clamp(0.0, 1.0);
        self.lin_vel *= (1.0 - ld).powf(dt);
        self.ang_vel *= (1.0 - ad).powf(dt);

        if !self.additional_damping { return; }
        if self.ang_vel.length_squared() < ADDITIONAL_ANGULAR_THRESHOLD_SQR
            && self.lin_vel.length_squared() < ADDITIONAL_LINEAR_THRESHOLD_SQR {
            self.ang_vel *= ADDITIONAL_DAMPING_FACTOR;
            self.lin_vel *= ADDITIONAL_DAMPING_FACTOR;
        }
        self.lin_vel = shave(self.lin_vel, ld);
        self.ang_vel = shave(self.ang_vel, ad);
    }

    /// Advance the transform with velocity plus the solver's position push.
    pub fn integrate_transform(&mut self, dt: f32, push: &Velocity) {
        if self.is_static_or_kinematic() || !self.is_active() { return; }
        let lin = self.lin_vel + push.lin;
        let mut ang = self.ang_vel + push.ang;
        let origin = self.xform.origin + lin * dt;

        let mut speed = ang.length();
        if speed * dt > MAX_ANGULAR_MOTION {
            ang *= MAX_ANGULAR_MOTION / (speed * dt);
            speed = MAX_ANGULAR_MOTION / dt;
        }
        let axis = if speed < 1.0e-3 {
            // taylor expansion of sin(x/2)/x for small angles
            ang * (0.5 * dt - (dt * dt * dt) * 0.020_833_334 * speed * speed)
        } else {
            ang * ((0.5 * speed * dt).sin() / speed)
        };
        let dq = Quat::from_xyzw(axis.x, axis.y, axis.z, (0.5 * speed * dt).cos());
        let rot = (dq * self.xform.rotation()).normalize();
        self.set_transform(Transform::from_rotation_translation(rot, origin));
    }
}

/// Drops small residual speed by a fixed amount when it falls below `damping`.
#[inline]
fn shave(v: Vec3, damping: f32) -> Vec3 {
    const STEP: f32 = 0.005;
    let speed = v.length();
    if speed >= damping { return v; }
    if speed > STEP { v - v / speed * STEP } else { Vec3::ZERO }
}
