use kinet_core::Vec3;
use kinet_dynamics::{SolverBody, SolverRow};

use crate::spring6dof::{Generic6DofSpring, JointFrames, LimitKind};

/// Lever arms from each body centre to the point the linear rows act on.
fn anchors(joint: &Generic6DofSpring, f: &JointFrames, a: &SolverBody, b: &SolverBody) -> (Vec3, Vec3) {
    if joint.uses_frame_offset() {
        return (f.world_a.origin - a.pos, f.world_b.origin - b.pos);
    }
    // shared anchor, weighted towards the lighter side's frame
    let weight = if b.inv_mass == 0.0 { 1.0 } else { a.inv_mass / (a.inv_mass + b.inv_mass) };
    let anchor = f.world_a.origin * weight + f.world_b.origin * (1.0 - weight);
    (anchor - a.pos, anchor - b.pos)
}

/// Limit rows of every locked or violated axis, prepared and ready to solve.
pub fn build_rows(
    joint: &Generic6DofSpring,
    f: &JointFrames,
    ia: usize,
    ib: usize,
    bodies: &[SolverBody],
    dt: f32,
    out: &mut Vec<SolverRow>,
) {
    if dt <= 0.0 { return; }
    let (ra, rb) = anchors(joint, f, &bodies[ia], &bodies[ib]);
    for axis in 0..6 {
        let (lo, hi) = joint.limits(axis);
        let diff = f.diff(axis);
        let (err, lower, upper) = match joint.limit_kind(axis) {
            LimitKind::Free => continue,
            LimitKind::Locked => (diff - lo, f32::NEG_INFINITY, f32::INFINITY),
            LimitKind::Limited if diff < lo => (diff - lo, 0.0, f32::INFINITY),
            LimitKind::Limited if diff > hi => (diff - hi, f32::NEG_INFINITY, 0.0),
            LimitKind::Limited => continue,
        };
        let row = if axis < 3 {
            SolverRow::along(ia, ib, ra, rb, f.linear_axes[axis])
        } else {
            SolverRow::angular(ia, ib, f.angular_axes[axis - 3])
        };
        let mut row = row
            .with_bounds(lower, upper)
            .with_rhs(-joint.stop_erp(axis) * err / dt)
            .with_cfm(joint.stop_cfm(axis));
        if row.prepare(bodies) { out.push(row); }
    }
}

/// Spring impulses for one substep: `-k (diff - rest)` plus velocity damping,
/// applied to B with the reaction on A.
pub fn apply_springs(joint: &Generic6DofSpring, f: &JointFrames, ia: usize, ib: usize, bodies: &mut [SolverBody], dt: f32) {
    if !joint.has_any_spring() || dt <= 0.0 { return; }
    let mut force = Vec3::ZERO;
    let mut torque = Vec3::ZERO;
    let rel_lin = bodies[ib].lin - bodies[ia].lin;
    let rel_ang = bodies[ib].ang - bodies[ia].ang;

    for axis in 0..6 {
        if !joint.spring_enabled(axis) { continue; }
        let k = joint.stiffness(axis);
        let delta = f.diff(axis) - joint.equilibrium(axis);
        let damp = (1.0 - joint.damping(axis).clamp(0.0, 1.0)) * k.abs().sqrt();
        if axis < 3 {
            let dir = f.linear_axes[axis];
            force += dir * (-k * delta - damp * rel_lin.dot(dir));
        } else {
            let dir = f.angular_axes[axis - 3];
            torque += dir * (-k * delta - damp * rel_ang.dot(dir));
        }
    }

    bodies[ib].apply_impulse(force * dt, torque * dt);
    if ia != ib { bodies[ia].apply_impulse(-force * dt, -torque * dt); }
}
