//! C ABI over one process-wide [`Physics`] context.
//!
//! Handles cross the boundary as `u64` (0 is null). Errors never cross it:
//! a null, stale or otherwise invalid argument turns the call into a no-op,
//! and accessors then leave their out-pointers untouched or return zero.
//! Ordering violations (destroying something still registered or referenced)
//! are logged at `warn` and the entity stays alive, so the allocation
//! counters show the leak.
//!
//! # Safety
//!
//! Pointer arguments must be null or point to valid memory of the documented
//! size. Every call locks the context; calls are serialised across threads.

pub mod types;

use std::sync::{Mutex, PoisonError};

use kinet_core::{
    vec3, ArenaHandle, BodyHandle, ColMajor4x4, ConstraintHandle, PhysicsError, ShapeHandle, WorldHandle,
};
use kinet_world::{ActivationState, Physics};
use log::{debug, warn};
use once_cell::sync::Lazy;

pub use types::*;

static PHYSICS: Lazy<Mutex<Physics>> = Lazy::new(|| Mutex::new(Physics::new()));

fn with_physics<R>(f: impl FnOnce(&mut Physics) -> R) -> R {
    let mut guard = PHYSICS.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

fn report(op: &str, e: &PhysicsError) {
    match e {
        PhysicsError::AlreadyRegistered { .. }
        | PhysicsError::NotRegistered { .. }
        | PhysicsError::StillRegistered { .. }
        | PhysicsError::InUse { .. }
        | PhysicsError::WorldNotEmpty { .. }
        | PhysicsError::SameBody { .. } => warn!("{op}: {e}"),
        _ => debug!("{op}: {e}"),
    }
}

/// Logs and swallows the error.
fn absorb<T>(op: &str, r: kinet_core::Result<T>) -> Option<T> {
    r.map_err(|e| report(op, &e)).ok()
}

fn handle<H: ArenaHandle>(op: &str, raw: u64) -> Option<H> {
    let h = H::from_raw(raw);
    if h.is_none() { debug!("{op}: null {} handle", H::KIND); }
    h
}

/// Runs `f` on the body context when `raw` is a non-null handle.
fn on_body<R>(op: &str, raw: KnRigidBody, f: impl FnOnce(&mut Physics, BodyHandle) -> kinet_core::Result<R>) -> Option<R> {
    let b = handle::<BodyHandle>(op, raw)?;
    with_physics(|p| absorb(op, f(p, b)))
}

fn on_world<R>(op: &str, raw: KnWorld, f: impl FnOnce(&mut Physics, WorldHandle) -> kinet_core::Result<R>) -> Option<R> {
    let w = handle::<WorldHandle>(op, raw)?;
    with_physics(|p| absorb(op, f(p, w)))
}

fn on_constraint<R>(
    op: &str,
    raw: KnConstraint,
    f: impl FnOnce(&mut Physics, ConstraintHandle) -> kinet_core::Result<R>,
) -> Option<R> {
    let c = handle::<ConstraintHandle>(op, raw)?;
    with_physics(|p| absorb(op, f(p, c)))
}

/// # Safety
/// `ptr` is null or points to 16 readable floats.
unsafe fn read_matrix(ptr: *const f32) -> Option<ColMajor4x4> {
    if ptr.is_null() { return None; }
    let mut m = [0.0f32; 16];
    std::ptr::copy_nonoverlapping(ptr, m.as_mut_ptr(), 16);
    Some(m)
}

/// # Safety
/// Each pointer is null or writable.
unsafe fn write_out(ptrs: &[*mut f32], values: &[f32]) {
    for (p, v) in ptrs.iter().zip(values) {
        if !p.is_null() { **p = *v; }
    }
}

/* ---------------- diagnostics ---------------- */

#[no_mangle]
pub extern "C" fn kn_get_alloc_stats() -> KnAllocStats {
    with_physics(|p| p.alloc_stats().into())
}

/* ---------------- world ---------------- */

#[no_mangle]
pub extern "C" fn kn_world_create(gravity_x: f32, gravity_y: f32, gravity_z: f32) -> KnWorld {
    with_physics(|p| p.create_world(vec3(gravity_x, gravity_y, gravity_z)).to_raw())
}

#[no_mangle]
pub extern "C" fn kn_world_destroy(world: KnWorld) {
    on_world("kn_world_destroy", world, |p, w| p.destroy_world(w));
}

/// Advances by `dt`. A negative `max_substeps` clamps to zero substeps: nothing
/// moves, pending forces are still cleared.
#[no_mangle]
pub extern "C" fn kn_world_step(world: KnWorld, dt: f32, max_substeps: i32, fixed_dt: f32) {
    let (dt, max) = match u32::try_from(max_substeps) {
        Ok(max) => (dt, max),
        Err(_) => {
            debug!("kn_world_step: max_substeps {max_substeps} < 0, no substeps");
            (0.0, 0)
        }
    };
    on_world("kn_world_step", world, |p, w| p.step(w, dt, max, fixed_dt));
}

#[no_mangle]
pub extern "C" fn kn_world_set_gravity(world: KnWorld, x: f32, y: f32, z: f32) {
    on_world("kn_world_set_gravity", world, |p, w| p.set_gravity(w, vec3(x, y, z)));
}

#[no_mangle]
pub extern "C" fn kn_world_add_rigid_body(world: KnWorld, body: KnRigidBody, group: i32, mask: i32) {
    let Some(b) = handle::<BodyHandle>("kn_world_add_rigid_body", body) else { return };
    on_world("kn_world_add_rigid_body", world, |p, w| p.add_rigid_body(w, b, group, mask));
}

#[no_mangle]
pub extern "C" fn kn_world_remove_rigid_body(world: KnWorld, body: KnRigidBody) {
    let Some(b) = handle::<BodyHandle>("kn_world_remove_rigid_body", body) else { return };
    on_world("kn_world_remove_rigid_body", world, |p, w| p.remove_rigid_body(w, b));
}

#[no_mangle]
pub extern "C" fn kn_world_add_constraint(world: KnWorld, constraint: KnConstraint, disable_collision: bool) {
    let Some(c) = handle::<ConstraintHandle>("kn_world_add_constraint", constraint) else { return };
    on_world("kn_world_add_constraint", world, |p, w| p.add_constraint(w, c, disable_collision));
}

#[no_mangle]
pub extern "C" fn kn_world_remove_constraint(world: KnWorld, constraint: KnConstraint) {
    let Some(c) = handle::<ConstraintHandle>("kn_world_remove_constraint", constraint) else { return };
    on_world("kn_world_remove_constraint", world, |p, w| p.remove_constraint(w, c));
}

/* ---------------- shapes ---------------- */

#[no_mangle]
pub extern "C" fn kn_shape_sphere(radius: f32) -> KnShape {
    with_physics(|p| absorb("kn_shape_sphere", p.create_sphere(radius)))
        .map_or(KN_NULL, |h| h.to_raw())
}

#[no_mangle]
pub extern "C" fn kn_shape_box(hx: f32, hy: f32, hz: f32) -> KnShape {
    with_physics(|p| absorb("kn_shape_box", p.create_box(hx, hy, hz)))
        .map_or(KN_NULL, |h| h.to_raw())
}

/// `height` is the length of the cylindrical section.
#[no_mangle]
pub extern "C" fn kn_shape_capsule(radius: f32, height: f32) -> KnShape {
    with_physics(|p| absorb("kn_shape_capsule", p.create_capsule(radius, height)))
        .map_or(KN_NULL, |h| h.to_raw())
}

#[no_mangle]
pub extern "C" fn kn_shape_destroy(shape: KnShape) {
    let Some(s) = handle::<ShapeHandle>("kn_shape_destroy", shape) else { return };
    with_physics(|p| absorb("kn_shape_destroy", p.destroy_shape(s)));
}

/* ---------------- rigid bodies ---------------- */

/// # Safety
/// `info` is null or points to a valid `KnRigidBodyInfo`.
#[no_mangle]
pub unsafe extern "C" fn kn_rigid_body_create(info: *const KnRigidBodyInfo) -> KnRigidBody {
    let Some(raw) = info.as_ref() else {
        debug!("kn_rigid_body_create: null info");
        return KN_NULL;
    };
    let Some(info) = raw.to_info() else {
        debug!("kn_rigid_body_create: null shape handle");
        return KN_NULL;
    };
    with_physics(|p| absorb("kn_rigid_body_create", p.create_body(&info)))
        .map_or(KN_NULL, |h| h.to_raw())
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_destroy(body: KnRigidBody) {
    on_body("kn_rigid_body_destroy", body, |p, b| p.destroy_body(b));
}

/// # Safety
/// `out` is null or points to 16 writable floats.
#[no_mangle]
pub unsafe extern "C" fn kn_rigid_body_get_transform(body: KnRigidBody, out: *mut f32) {
    if out.is_null() { return; }
    if let Some(m) = on_body("kn_rigid_body_get_transform", body, |p, b| p.get_transform(b)) {
        std::ptr::copy_nonoverlapping(m.as_ptr(), out, 16);
    }
}

/// # Safety
/// `matrix` is null or points to 16 readable floats.
#[no_mangle]
pub unsafe extern "C" fn kn_rigid_body_set_transform(body: KnRigidBody, matrix: *const f32) {
    let Some(m) = read_matrix(matrix) else {
        debug!("kn_rigid_body_set_transform: null matrix");
        return;
    };
    on_body("kn_rigid_body_set_transform", body, |p, b| p.set_transform(b, &m));
}

/// # Safety
/// Each out-pointer is null or writable.
#[no_mangle]
pub unsafe extern "C" fn kn_rigid_body_get_position(body: KnRigidBody, x: *mut f32, y: *mut f32, z: *mut f32) {
    if let Some(v) = on_body("kn_rigid_body_get_position", body, |p, b| p.get_position(b)) {
        write_out(&[x, y, z], &[v.x, v.y, v.z]);
    }
}

/// # Safety
/// Each out-pointer is null or writable.
#[no_mangle]
pub unsafe extern "C" fn kn_rigid_body_get_rotation(
    body: KnRigidBody,
    x: *mut f32,
    y: *mut f32,
    z: *mut f32,
    w: *mut f32,
) {
    if let Some(q) = on_body("kn_rigid_body_get_rotation", body, |p, b| p.get_rotation(b)) {
        write_out(&[x, y, z, w], &[q.x, q.y, q.z, q.w]);
    }
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_set_linear_velocity(body: KnRigidBody, x: f32, y: f32, z: f32) {
    on_body("kn_rigid_body_set_linear_velocity", body, |p, b| p.set_linear_velocity(b, vec3(x, y, z)));
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_set_angular_velocity(body: KnRigidBody, x: f32, y: f32, z: f32) {
    on_body("kn_rigid_body_set_angular_velocity", body, |p, b| p.set_angular_velocity(b, vec3(x, y, z)));
}

/// # Safety
/// Each out-pointer is null or writable.
#[no_mangle]
pub unsafe extern "C" fn kn_rigid_body_get_linear_velocity(body: KnRigidBody, x: *mut f32, y: *mut f32, z: *mut f32) {
    if let Some(v) = on_body("kn_rigid_body_get_linear_velocity", body, |p, b| p.get_linear_velocity(b)) {
        write_out(&[x, y, z], &[v.x, v.y, v.z]);
    }
}

/// # Safety
/// Each out-pointer is null or writable.
#[no_mangle]
pub unsafe extern "C" fn kn_rigid_body_get_angular_velocity(body: KnRigidBody, x: *mut f32, y: *mut f32, z: *mut f32) {
    if let Some(v) = on_body("kn_rigid_body_get_angular_velocity", body, |p, b| p.get_angular_velocity(b)) {
        write_out(&[x, y, z], &[v.x, v.y, v.z]);
    }
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_set_damping(body: KnRigidBody, linear: f32, angular: f32) {
    on_body("kn_rigid_body_set_damping", body, |p, b| p.set_damping(b, linear, angular));
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_set_friction(body: KnRigidBody, friction: f32) {
    on_body("kn_rigid_body_set_friction", body, |p, b| p.set_friction(b, friction));
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_set_restitution(body: KnRigidBody, restitution: f32) {
    on_body("kn_rigid_body_set_restitution", body, |p, b| p.set_restitution(b, restitution));
}

/// Suggestion; ignored while the body is in DISABLE_DEACTIVATION or DISABLE_SIMULATION.
#[no_mangle]
pub extern "C" fn kn_rigid_body_set_activation_state(body: KnRigidBody, state: i32) {
    on_body("kn_rigid_body_set_activation_state", body, |p, b| {
        p.set_activation_state(b, ActivationState::from_raw(state)?)
    });
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_force_activation_state(body: KnRigidBody, state: i32) {
    on_body("kn_rigid_body_force_activation_state", body, |p, b| {
        p.force_activation_state(b, ActivationState::from_raw(state)?)
    });
}

/// Current activation state, or 0 for an invalid handle.
#[no_mangle]
pub extern "C" fn kn_rigid_body_get_activation_state(body: KnRigidBody) -> i32 {
    on_body("kn_rigid_body_get_activation_state", body, |p, b| p.activation_state(b))
        .map_or(0, ActivationState::as_raw)
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_set_kinematic(body: KnRigidBody, kinematic: bool) {
    on_body("kn_rigid_body_set_kinematic", body, |p, b| p.set_kinematic(b, kinematic));
}

/// 0 for static, kinematic or invalid bodies.
#[no_mangle]
pub extern "C" fn kn_rigid_body_get_mass(body: KnRigidBody) -> f32 {
    on_body("kn_rigid_body_get_mass", body, |p, b| p.get_mass(b)).unwrap_or(0.0)
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_clear_forces(body: KnRigidBody) {
    on_body("kn_rigid_body_clear_forces", body, |p, b| p.clear_forces(b));
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_apply_central_force(body: KnRigidBody, x: f32, y: f32, z: f32) {
    on_body("kn_rigid_body_apply_central_force", body, |p, b| p.apply_central_force(b, vec3(x, y, z)));
}

#[no_mangle]
pub extern "C" fn kn_rigid_body_apply_torque(body: KnRigidBody, x: f32, y: f32, z: f32) {
    on_body("kn_rigid_body_apply_torque", body, |p, b| p.apply_torque(b, vec3(x, y, z)));
}

/* ---------------- 6-DOF spring ---------------- */

/// Null when either body handle or either frame pointer is null or invalid.
///
/// # Safety
/// Each frame pointer is null or points to 16 readable floats.
#[no_mangle]
pub unsafe extern "C" fn kn_6dof_spring_create(
    a: KnRigidBody,
    b: KnRigidBody,
    frame_a: *const f32,
    frame_b: *const f32,
    use_linear_ref_a: bool,
) -> KnConstraint {
    const OP: &str = "kn_6dof_spring_create";
    let (Some(fa), Some(fb)) = (read_matrix(frame_a), read_matrix(frame_b)) else {
        debug!("{OP}: null frame");
        return KN_NULL;
    };
    let (Some(ha), Some(hb)) = (handle::<BodyHandle>(OP, a), handle::<BodyHandle>(OP, b)) else { return KN_NULL };
    with_physics(|p| absorb(OP, p.create_6dof_spring(ha, hb, &fa, &fb, use_linear_ref_a)))
        .map_or(KN_NULL, |h| h.to_raw())
}

#[no_mangle]
pub extern "C" fn kn_constraint_destroy(constraint: KnConstraint) {
    on_constraint("kn_constraint_destroy", constraint, |p, c| p.destroy_constraint(c));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_linear_lower_limit(c: KnConstraint, x: f32, y: f32, z: f32) {
    on_constraint("kn_6dof_spring_set_linear_lower_limit", c, |p, c| p.set_linear_lower_limit(c, vec3(x, y, z)));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_linear_upper_limit(c: KnConstraint, x: f32, y: f32, z: f32) {
    on_constraint("kn_6dof_spring_set_linear_upper_limit", c, |p, c| p.set_linear_upper_limit(c, vec3(x, y, z)));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_angular_lower_limit(c: KnConstraint, x: f32, y: f32, z: f32) {
    on_constraint("kn_6dof_spring_set_angular_lower_limit", c, |p, c| p.set_angular_lower_limit(c, vec3(x, y, z)));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_angular_upper_limit(c: KnConstraint, x: f32, y: f32, z: f32) {
    on_constraint("kn_6dof_spring_set_angular_upper_limit", c, |p, c| p.set_angular_upper_limit(c, vec3(x, y, z)));
}

/// `index` 0..2 linear, 3..5 angular.
#[no_mangle]
pub extern "C" fn kn_6dof_spring_enable_spring(c: KnConstraint, index: i32, on: bool) {
    on_constraint("kn_6dof_spring_enable_spring", c, |p, c| p.enable_spring(c, index, on));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_stiffness(c: KnConstraint, index: i32, stiffness: f32) {
    on_constraint("kn_6dof_spring_set_stiffness", c, |p, c| p.set_spring_stiffness(c, index, stiffness));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_damping(c: KnConstraint, index: i32, damping: f32) {
    on_constraint("kn_6dof_spring_set_damping", c, |p, c| p.set_spring_damping(c, index, damping));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_equilibrium_point(c: KnConstraint) {
    on_constraint("kn_6dof_spring_set_equilibrium_point", c, |p, c| p.set_equilibrium_point(c));
}

/// `param` is `KN_CONSTRAINT_STOP_ERP` or `KN_CONSTRAINT_STOP_CFM`, `axis` 0..5.
#[no_mangle]
pub extern "C" fn kn_6dof_spring_set_param(c: KnConstraint, param: i32, value: f32, axis: i32) {
    on_constraint("kn_6dof_spring_set_param", c, |p, c| p.set_constraint_param(c, param, value, axis));
}

#[no_mangle]
pub extern "C" fn kn_6dof_spring_use_frame_offset(c: KnConstraint, on: bool) {
    on_constraint("kn_6dof_spring_use_frame_offset", c, |p, c| p.use_frame_offset(c, on));
}
