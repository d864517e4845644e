use kinet_core::{BodyHandle, Mat3, PhysicsError, Result, Transform, Vec3};

pub const PARAM_STOP_ERP: i32 = 2;
pub const PARAM_STOP_CFM: i32 = 3;

const DEFAULT_STOP_ERP: f32 = 0.2;

/// How one axis is constrained, derived from its limit pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LimitKind { Locked, Limited, Free }

/// Spring-augmented 6-DOF joint. Axes 0..3 are linear X/Y/Z, 3..6 angular X/Y/Z.
#[derive(Clone, Debug, PartialEq)]
pub struct Generic6DofSpring {
    body_a: BodyHandle,
    body_b: BodyHandle,
    frame_a: Transform,
    frame_b: Transform,
    use_linear_ref_a: bool,
    use_frame_offset: bool,
    lower: [f32; 6],
    upper: [f32; 6],
    spring_enabled: [bool; 6],
    stiffness: [f32; 6],
    damping: [f32; 6],
    equilibrium: [f32; 6],
    stop_erp: [f32; 6],
    stop_cfm: [f32; 6],
}

/// World-space joint frames and the relative coordinates the rows act on.
#[derive(Copy, Clone, Debug)]
pub struct JointFrames {
    pub world_a: Transform,
    pub world_b: Transform,
    /// Linear axes in world space (columns of the reference basis).
    pub linear_axes: [Vec3; 3],
    pub linear_diff: Vec3,
    pub angular_axes: [Vec3; 3],
    pub angles: Vec3,
}

impl JointFrames {
    #[inline] pub fn diff(&self, axis: usize) -> f32 {
        if axis < 3 { self.linear_diff[axis] } else { self.angles[axis - 3] }
    }
}

#[inline]
fn check_axis(axis: i32) -> Result<usize> {
    if (0..6).contains(&axis) { Ok(axis as usize) } else { Err(PhysicsError::InvalidAxis(axis)) }
}

impl Generic6DofSpring {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, frame_a: Transform, frame_b: Transform, use_linear_ref_a: bool) -> Self {
        Self {
            body_a, body_b, frame_a, frame_b,
            use_linear_ref_a,
            use_frame_offset: true,
            // linear axes locked, angular axes free
            lower: [0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            upper: [0.0, 0.0, 0.0, -1.0, -1.0, -1.0],
            spring_enabled: [false; 6],
            stiffness: [0.0; 6],
            damping: [1.0; 6],
            equilibrium: [0.0; 6],
            stop_erp: [DEFAULT_STOP_ERP; 6],
            stop_cfm: [0.0; 6],
        }
    }

    #[inline] pub fn body_a(&self) -> BodyHandle { self.body_a }
    #[inline] pub fn body_b(&self) -> BodyHandle { self.body_b }
    #[inline] pub fn frame_a(&self) -> Transform { self.frame_a }
    #[inline] pub fn frame_b(&self) -> Transform { self.frame_b }
    #[inline] pub fn uses_linear_ref_a(&self) -> bool { self.use_linear_ref_a }
    #[inline] pub fn uses_frame_offset(&self) -> bool { self.use_frame_offset }

    /* ---------- limits (3-vector convention) ---------- */
    pub fn set_linear_lower_limit(&mut self, v: Vec3) { self.lower[..3].copy_from_slice(&v.to_array()); }
    pub fn set_linear_upper_limit(&mut self, v: Vec3) { self.upper[..3].copy_from_slice(&v.to_array()); }
    pub fn set_angular_lower_limit(&mut self, v: Vec3) { self.lower[3..].copy_from_slice(&v.to_array()); }
    pub fn set_angular_upper_limit(&mut self, v: Vec3) { self.upper[3..].copy_from_slice(&v.to_array()); }

    #[inline] pub fn limits(&self, axis: usize) -> (f32, f32) { (self.lower[axis], self.upper[axis]) }

    pub fn limit_kind(&self, axis: usize) -> LimitKind {
        let (lo, hi) = self.limits(axis);
        if lo == hi { LimitKind::Locked } else if lo < hi { LimitKind::Limited } else { LimitKind::Free }
    }

    /* ---------- springs (flat 0..6 convention) ---------- */
    pub fn enable_spring(&mut self, axis: i32, on: bool) -> Result<()> {
        let i = check_axis(axis)?;
        self.spring_enabled[i] = on;
        Ok(())
    }
    pub fn set_stiffness(&mut self, axis: i32, v: f32) -> Result<()> {
        let i = check_axis(axis)?;
        self.stiffness[i] = v;
        Ok(())
    }
    /// 1.0 means undamped, 0.0 the strongest damping.
    pub fn set_damping(&mut self, axis: i32, v: f32) -> Result<()> {
        let i = check_axis(axis)?;
        self.damping[i] = v;
        Ok(())
    }

    #[inline] pub fn spring_enabled(&self, axis: usize) -> bool { self.spring_enabled[axis] }
    #[inline] pub fn stiffness(&self, axis: usize) -> f32 { self.stiffness[axis] }
    #[inline] pub fn damping(&self, axis: usize) -> f32 { self.damping[axis] }
    #[inline] pub fn equilibrium(&self, axis: usize) -> f32 { self.equilibrium[axis] }
    #[inline] pub fn has_any_spring(&self) -> bool { self.spring_enabled.iter().any(|&on| on) }

    /// Captures the current relative pose as rest position of every axis.
    pub fn set_equilibrium_point(&mut self, body_a: &Transform, body_b: &Transform) {
        let f = self.calculate_frames(body_a, body_b);
        for (i, e) in self.equilibrium.iter_mut().enumerate() { *e = f.diff(i); }
    }

    /* ---------- solver params ---------- */
    pub fn set_param(&mut self, kind: i32, value: f32, axis: i32) -> Result<()> {
        let i = check_axis(axis)?;
        match kind {
            PARAM_STOP_ERP => self.stop_erp[i] = value,
            PARAM_STOP_CFM => self.stop_cfm[i] = value,
            _ => return Err(PhysicsError::InvalidParam(kind)),
        }
        Ok(())
    }

    #[inline] pub fn stop_erp(&self, axis: usize) -> f32 { self.stop_erp[axis] }
    #[inline] pub fn stop_cfm(&self, axis: usize) -> f32 { self.stop_cfm[axis] }

    pub fn use_frame_offset(&mut self, on: bool) { self.use_frame_offset = on; }

    /* ---------- frames ---------- */
    pub fn calculate_frames(&self, body_a: &Transform, body_b: &Transform) -> JointFrames {
        let world_a = *body_a * self.frame_a;
        let world_b = *body_b * self.frame_b;

        let reference = if self.use_linear_ref_a { &world_a } else { &world_b };
        let linear_axes = [reference.basis.x_axis, reference.basis.y_axis, reference.basis.z_axis];
        let linear_diff = reference.basis.transpose() * (world_b.origin - world_a.origin);

        let relative = world_a.basis.transpose() * world_b.basis;
        let angles = matrix_to_euler_xyz(&relative);

        let x_b = world_b.basis.x_axis;
        let z_a = world_a.basis.z_axis;
        let axis1 = z_a.cross(x_b).normalize_or_zero();
        let axis0 = axis1.cross(z_a).normalize_or_zero();
        let axis2 = x_b.cross(axis1).normalize_or_zero();

        JointFrames { world_a, world_b, linear_axes, linear_diff, angular_axes: [axis0, axis1, axis2], angles }
    }
}

/// XYZ Euler angles of `m = Rx(x) * Ry(y) * Rz(z)`; snaps to the gimbal pole when |sin y| reaches 1.
pub fn matrix_to_euler_xyz(m: &Mat3) -> Vec3 {
    // r(row, col)
    let r = |row: usize, col: usize| m.col(col)[row];
    let sy = r(0, 2);
    if sy < 1.0 {
        if sy > -1.0 {
            Vec3::new((-r(1, 2)).atan2(r(2, 2)), sy.asin(), (-r(0, 1)).atan2(r(0, 0)))
        } else {
            Vec3::new(-r(1, 0).atan2(r(1, 1)), -core::f32::consts::FRAC_PI_2, 0.0)
        }
    } else {
        Vec3::new(r(1, 0).atan2(r(1, 1)), core::f32::consts::FRAC_PI_2, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;
    use kinet_core::{vec3, ArenaHandle};

    fn joint() -> Generic6DofSpring {
        Generic6DofSpring::new(BodyHandle::from_parts(0, 1), BodyHandle::from_parts(1, 1),
                               Transform::IDENTITY, Transform::IDENTITY, true)
    }

    #[test]
    fn defaults_lock_linear_and_free_angular_axes() {
        let j = joint();
        for i in 0..3 {
            assert_eq!(j.limits(i), (0.0, 0.0));
            assert_eq!(j.limit_kind(i), LimitKind::Locked);
        }
        for i in 3..6 {
            assert_eq!(j.limits(i), (1.0, -1.0));
            assert_eq!(j.limit_kind(i), LimitKind::Free);
        }
        for i in 0..6 {
            assert!(!j.spring_enabled(i));
            assert_eq!(j.damping(i), 1.0);
            assert_eq!(j.stop_erp(i), 0.2);
            assert_eq!(j.stop_cfm(i), 0.0);
        }
        assert!(j.uses_frame_offset());
    }

    #[test]
    fn limit_pairs_classify_axes() {
        let mut j = joint();
        j.set_linear_lower_limit(vec3(-1.0, 0.0, 1.0));
        j.set_linear_upper_limit(vec3(1.0, 0.0, -1.0));
        assert_eq!(j.limit_kind(0), LimitKind::Limited);
        assert_eq!(j.limit_kind(1), LimitKind::Locked);
        assert_eq!(j.limit_kind(2), LimitKind::Free);
        j.set_angular_lower_limit(vec3(0.5, 0.0, 0.0));
        assert_eq!(j.limit_kind(3), LimitKind::Free);
    }

    #[test]
    fn bad_axis_and_param_are_rejected() {
        let mut j = joint();
        assert_eq!(j.enable_spring(6, true), Err(PhysicsError::InvalidAxis(6)));
        assert_eq!(j.set_stiffness(-1, 1.0), Err(PhysicsError::InvalidAxis(-1)));
        assert_eq!(j.set_param(7, 0.5, 0), Err(PhysicsError::InvalidParam(7)));
        assert_eq!(j.set_param(PARAM_STOP_ERP, 0.5, 9), Err(PhysicsError::InvalidAxis(9)));
        j.set_param(PARAM_STOP_CFM, 0.01, 5).unwrap();
        assert_eq!(j.stop_cfm(5), 0.01);
    }

    #[test]
    fn euler_xyz_recovers_composed_angles() {
        let (x, y, z) = (0.3, -0.4, 0.7);
        let q = Quat::from_rotation_x(x) * Quat::from_rotation_y(y) * Quat::from_rotation_z(z);
        let e = matrix_to_euler_xyz(&Mat3::from_quat(q));
        assert_relative_eq!(e.x, x, epsilon = 1e-5);
        assert_relative_eq!(e.y, y, epsilon = 1e-5);
        assert_relative_eq!(e.z, z, epsilon = 1e-5);
    }

    #[test]
    fn frames_report_linear_and_angular_diff() {
        let j = joint();
        let a = Transform::IDENTITY;
        let b = Transform::from_rotation_translation(Quat::from_rotation_z(0.25), vec3(0.0, 2.0, 0.0));
        let f = j.calculate_frames(&a, &b);
        assert_relative_eq!(f.linear_diff.y, 2.0, epsilon = 1e-6);
        assert_relative_eq!(f.angles.z, 0.25, epsilon = 1e-5);
        assert_relative_eq!(f.angular_axes[2].z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn equilibrium_captures_current_pose() {
        let mut j = joint();
        let b = Transform::from_rotation_translation(Quat::from_rotation_x(0.1), vec3(1.0, 0.0, 0.0));
        j.set_equilibrium_point(&Transform::IDENTITY, &b);
        assert_relative_eq!(j.equilibrium(0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(j.equilibrium(3), 0.1, epsilon = 1e-5);
    }
}
