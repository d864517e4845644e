use std::ptr;
use std::sync::Mutex;

use approx::assert_relative_eq;
use kinet_core::IDENTITY_4X4;
use kinet_ffi::*;

// the context and its counters are process-wide
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

fn info(shape: KnShape, mass: f32, y: f32) -> KnRigidBodyInfo {
    let mut m = IDENTITY_4X4;
    m[13] = y;
    KnRigidBodyInfo {
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
        initial_transform: m,
    }
}

fn position(b: KnRigidBody) -> [f32; 3] {
    let mut p = [f32::NAN; 3];
    let [x, y, z] = &mut p;
    unsafe { kn_rigid_body_get_position(b, x, y, z) };
    p
}

#[test]
fn falling_sphere_through_the_c_api() {
    let _g = serial();
    let before = kn_get_alloc_stats();

    let w = kn_world_create(0.0, -9.8, 0.0);
    let s = kn_shape_sphere(0.5);
    let b = unsafe { kn_rigid_body_create(&info(s, 1.0, 0.0)) };
    assert!(w != KN_NULL && s != KN_NULL && b != KN_NULL);
    kn_world_add_rigid_body(w, b, 1, -1);

    let mut last = position(b)[1];
    for _ in 0..60 {
        kn_world_step(w, 1.0 / 60.0, 1, 1.0 / 60.0);
        let y = position(b)[1];
        assert!(y < last);
        last = y;
    }
    assert_relative_eq!(last, -4.9, epsilon = 0.15);

    let mut m = [0.0f32; 16];
    unsafe { kn_rigid_body_get_transform(b, m.as_mut_ptr()) };
    assert_eq!(m[13], last);
    assert_eq!(m[15], 1.0);

    let (mut vx, mut vy, mut vz) = (0.0, 0.0, 0.0);
    unsafe { kn_rigid_body_get_linear_velocity(b, &mut vx, &mut vy, &mut vz) };
    assert!(vy < -9.0 && vx == 0.0 && vz == 0.0);

    kn_world_remove_rigid_body(w, b);
    kn_rigid_body_destroy(b);
    kn_shape_destroy(s);
    kn_world_destroy(w);
    assert_eq!(kn_get_alloc_stats(), before);
}

#[test]
fn null_handles_are_no_ops() {
    let _g = serial();
    let before = kn_get_alloc_stats();

    kn_world_destroy(KN_NULL);
    kn_world_step(KN_NULL, 1.0 / 60.0, 1, 1.0 / 60.0);
    kn_world_set_gravity(KN_NULL, 0.0, 1.0, 0.0);
    kn_world_add_rigid_body(KN_NULL, KN_NULL, 1, -1);
    kn_shape_destroy(KN_NULL);
    kn_rigid_body_destroy(KN_NULL);
    kn_rigid_body_set_linear_velocity(KN_NULL, 1.0, 2.0, 3.0);
    kn_rigid_body_set_activation_state(KN_NULL, KN_ACTIVE_TAG);
    kn_constraint_destroy(KN_NULL);
    kn_6dof_spring_enable_spring(KN_NULL, 0, true);
    assert_eq!(kn_rigid_body_get_mass(KN_NULL), 0.0);
    assert_eq!(kn_rigid_body_get_activation_state(KN_NULL), 0);

    let mut x = 7.0f32;
    unsafe { kn_rigid_body_get_position(KN_NULL, &mut x, ptr::null_mut(), ptr::null_mut()) };
    assert_eq!(x, 7.0);
    assert_eq!(unsafe { kn_rigid_body_create(ptr::null()) }, KN_NULL);
    assert_eq!(unsafe { kn_rigid_body_create(&info(KN_NULL, 1.0, 0.0)) }, KN_NULL);
    assert_eq!(kn_shape_sphere(-1.0), KN_NULL);
    assert_eq!(kn_shape_box(1.0, f32::NAN, 1.0), KN_NULL);

    assert_eq!(kn_get_alloc_stats(), before);
}

#[test]
fn stale_handles_are_no_ops() {
    let _g = serial();
    let s = kn_shape_box(0.5, 0.5, 0.5);
    let b = unsafe { kn_rigid_body_create(&info(s, 2.0, 1.0)) };
    kn_rigid_body_destroy(b);
    let again = unsafe { kn_rigid_body_create(&info(s, 3.0, 1.0)) };
    assert_ne!(b, again);
    assert_eq!(kn_rigid_body_get_mass(b), 0.0);
    assert_relative_eq!(kn_rigid_body_get_mass(again), 3.0, max_relative = 1e-6);
    kn_rigid_body_destroy(again);
    kn_shape_destroy(s);
}

#[test]
fn destroy_in_wrong_order_keeps_entities_alive() {
    let _g = serial();
    let before = kn_get_alloc_stats();
    let w = kn_world_create(0.0, -9.8, 0.0);
    let s = kn_shape_sphere(0.5);
    let b = unsafe { kn_rigid_body_create(&info(s, 1.0, 0.0)) };
    kn_world_add_rigid_body(w, b, 1, -1);

    kn_shape_destroy(s);
    kn_rigid_body_destroy(b);
    kn_world_destroy(w);
    let live = kn_get_alloc_stats();
    assert_eq!(live.worlds - before.worlds, 1);
    assert_eq!(live.shapes - before.shapes, 1);
    assert_eq!(live.rigid_bodies - before.rigid_bodies, 1);
    assert_eq!(kn_rigid_body_get_mass(b), 1.0);

    kn_world_remove_rigid_body(w, b);
    kn_rigid_body_destroy(b);
    kn_shape_destroy(s);
    kn_world_destroy(w);
    assert_eq!(kn_get_alloc_stats(), before);
}

#[test]
fn kinematic_and_activation_through_the_c_api() {
    let _g = serial();
    let w = kn_world_create(0.0, -9.8, 0.0);
    let s = kn_shape_sphere(0.5);
    let mut i = info(s, 1.0, 3.0);
    i.is_kinematic = true;
    let b = unsafe { kn_rigid_body_create(&i) };
    kn_world_add_rigid_body(w, b, 1, -1);
    assert_eq!(kn_rigid_body_get_activation_state(b), KN_DISABLE_DEACTIVATION);
    assert_eq!(kn_rigid_body_get_mass(b), 0.0);

    for _ in 0..10 { kn_world_step(w, 1.0 / 60.0, 1, 1.0 / 60.0); }
    assert_eq!(position(b), [0.0, 3.0, 0.0]);

    kn_rigid_body_set_activation_state(b, KN_ISLAND_SLEEPING);
    assert_eq!(kn_rigid_body_get_activation_state(b), KN_DISABLE_DEACTIVATION);
    kn_rigid_body_force_activation_state(b, KN_ISLAND_SLEEPING);
    assert_eq!(kn_rigid_body_get_activation_state(b), KN_ISLAND_SLEEPING);
    kn_rigid_body_force_activation_state(b, 42);
    assert_eq!(kn_rigid_body_get_activation_state(b), KN_ISLAND_SLEEPING);

    let mut m = IDENTITY_4X4;
    m[12] = 2.0;
    unsafe { kn_rigid_body_set_transform(b, m.as_ptr()) };
    unsafe { kn_rigid_body_set_transform(b, ptr::null()) };
    assert_eq!(position(b), [2.0, 0.0, 0.0]);

    kn_world_remove_rigid_body(w, b);
    kn_rigid_body_destroy(b);
    kn_shape_destroy(s);
    kn_world_destroy(w);
}

#[test]
fn six_dof_spring_lifecycle() {
    let _g = serial();
    let before = kn_get_alloc_stats();
    let w = kn_world_create(0.0, -9.8, 0.0);
    let s = kn_shape_box(0.25, 0.25, 0.25);
    let a = unsafe { kn_rigid_body_create(&info(s, 0.0, 0.0)) };
    let b = unsafe { kn_rigid_body_create(&info(s, 1.0, -1.5)) };

    let mut fa = IDENTITY_4X4;
    fa[13] = -0.75;
    let mut fb = IDENTITY_4X4;
    fb[13] = 0.75;
    assert_eq!(unsafe { kn_6dof_spring_create(a, b, ptr::null(), fb.as_ptr(), true) }, KN_NULL);
    assert_eq!(unsafe { kn_6dof_spring_create(b, b, fa.as_ptr(), fb.as_ptr(), true) }, KN_NULL);
    assert_eq!(kn_get_alloc_stats().constraints, before.constraints);
    let c = unsafe { kn_6dof_spring_create(a, b, fa.as_ptr(), fb.as_ptr(), true) };
    assert_ne!(c, KN_NULL);

    kn_6dof_spring_set_linear_lower_limit(c, 0.0, 0.0, 0.0);
    kn_6dof_spring_set_linear_upper_limit(c, 0.0, 0.0, 0.0);
    kn_6dof_spring_set_angular_lower_limit(c, 0.0, 0.0, 0.0);
    kn_6dof_spring_set_angular_upper_limit(c, 0.0, 0.0, 0.0);
    kn_6dof_spring_enable_spring(c, 9, true);
    kn_6dof_spring_set_stiffness(c, 1, 10.0);
    kn_6dof_spring_set_damping(c, 1, 0.5);
    kn_6dof_spring_set_param(c, KN_CONSTRAINT_STOP_ERP, 0.8, 1);
    kn_6dof_spring_set_param(c, KN_CONSTRAINT_STOP_CFM, 0.0, 1);
    kn_6dof_spring_use_frame_offset(c, true);
    kn_6dof_spring_set_equilibrium_point(c);

    kn_world_add_rigid_body(w, a, 1, -1);
    kn_world_add_rigid_body(w, b, 1, -1);
    kn_world_add_constraint(w, c, true);
    for _ in 0..60 { kn_world_step(w, 1.0 / 60.0, 1, 1.0 / 60.0); }
    let [x, y, z] = position(b);
    assert!(x.abs() < 1e-2 && (y + 1.5).abs() < 1e-2 && z.abs() < 1e-2);

    // a body pinned by a constraint cannot go
    kn_world_remove_rigid_body(w, b);
    kn_rigid_body_destroy(b);
    assert_eq!(kn_get_alloc_stats().rigid_bodies - before.rigid_bodies, 2);

    kn_world_remove_constraint(w, c);
    kn_constraint_destroy(c);
    kn_rigid_body_destroy(b);
    kn_world_remove_rigid_body(w, a);
    kn_rigid_body_destroy(a);
    kn_shape_destroy(s);
    kn_world_destroy(w);
    assert_eq!(kn_get_alloc_stats(), before);
}

#[test]
fn negative_substep_budget_steps_nothing() {
    let _g = serial();
    let w = kn_world_create(0.0, -9.8, 0.0);
    let s = kn_shape_sphere(0.5);
    let b = unsafe { kn_rigid_body_create(&info(s, 1.0, 2.0)) };
    kn_world_add_rigid_body(w, b, 1, -1);

    kn_rigid_body_apply_central_force(b, 600.0, 0.0, 0.0);
    for _ in 0..5 { kn_world_step(w, 1.0 / 60.0, -1, 1.0 / 60.0); }
    assert_eq!(position(b), [0.0, 2.0, 0.0]);
    let (mut vx, mut vy, mut vz) = (1.0, 1.0, 1.0);
    unsafe { kn_rigid_body_get_linear_velocity(b, &mut vx, &mut vy, &mut vz) };
    assert_eq!([vx, vy, vz], [0.0, 0.0, 0.0]);

    // the force did not survive the empty step
    kn_world_step(w, 1.0 / 60.0, 1, 1.0 / 60.0);
    unsafe { kn_rigid_body_get_linear_velocity(b, &mut vx, &mut vy, &mut vz) };
    assert_eq!(vx, 0.0);
    assert!(vy < 0.0);

    kn_world_remove_rigid_body(w, b);
    kn_rigid_body_destroy(b);
    kn_shape_destroy(s);
    kn_world_destroy(w);
}
