use kinet_core::{Mat3, Vec3, Velocity};

use crate::body::RigidBody;

/// Per-substep copy of the body state the solver works on.
#[derive(Copy, Clone, Debug)]
pub struct SolverBody {
    pub inv_mass: f32,
    pub inv_inertia: Mat3,
    pub pos: Vec3,
    pub lin: Vec3,
    pub ang: Vec3,
    /// Split-impulse pseudo velocity; moves the body but never feeds back into `lin`/`ang`.
    pub push: Velocity,
}

impl SolverBody {
    /// Sleeping, static and kinematic bodies are immovable in the solver.
    pub fn from_body(b: &RigidBody) -> Self {
        let movable = b.is_active() && !b.is_static_or_kinematic();
        Self {
            inv_mass: if movable { b.solver_inv_mass() } else { 0.0 },
            inv_inertia: if movable { b.inv_inertia_world() } else { Mat3::ZERO },
            pos: b.position(),
            lin: b.linear_velocity(),
            ang: b.angular_velocity(),
            push: Velocity::default(),
        }
    }

    /// Immovable body at `pos` (e.g. a constraint partner that is not simulated).
    pub fn fixed(pos: Vec3, lin: Vec3, ang: Vec3) -> Self {
        Self { inv_mass: 0.0, inv_inertia: Mat3::ZERO, pos, lin, ang, push: Velocity::default() }
    }

    #[inline] pub fn is_movable(&self) -> bool { self.inv_mass > 0.0 }

    #[inline] pub fn apply_impulse(&mut self, lin: Vec3, ang: Vec3) {
        self.lin += lin * self.inv_mass;
        self.ang += self.inv_inertia * ang;
    }

    #[inline] fn apply_push(&mut self, lin: Vec3, ang: Vec3) {
        self.push.lin += lin * self.inv_mass;
        self.push.ang += self.inv_inertia * ang;
    }

    #[inline] pub fn velocity_at(&self, r: Vec3) -> Vec3 { self.lin + self.ang.cross(r) }
}

/// One scalar velocity constraint `J v = rhs` with clamped accumulated impulse.
#[derive(Copy, Clone, Debug)]
pub struct SolverRow {
    pub a: usize,
    pub b: usize,
    pub lin_a: Vec3,
    pub ang_a: Vec3,
    pub lin_b: Vec3,
    pub ang_b: Vec3,
    pub rhs: f32,
    /// Positional correction for the split-impulse pass; 0 disables it.
    pub push_rhs: f32,
    pub cfm: f32,
    pub lower: f32,
    pub upper: f32,
    /// Friction rows bound themselves to `mu` times a normal row's impulse.
    pub friction_of: Option<(usize, f32)>,
    pub impulse: f32,
    push_impulse: f32,
    eff_mass: f32,
}

impl SolverRow {
    /// Row pulling the relative velocity of `b` w.r.t. `a` along the Jacobian.
    pub fn new(a: usize, b: usize, lin_a: Vec3, ang_a: Vec3, lin_b: Vec3, ang_b: Vec3) -> Self {
        Self {
            a, b, lin_a, ang_a, lin_b, ang_b,
            rhs: 0.0, push_rhs: 0.0, cfm: 0.0,
            lower: f32::NEG_INFINITY, upper: f32::INFINITY,
            friction_of: None, impulse: 0.0, push_impulse: 0.0, eff_mass: 0.0,
        }
    }

    /// Contact-style row between anchor offsets `ra`, `rb` along `dir` (A -> B).
    pub fn along(a: usize, b: usize, ra: Vec3, rb: Vec3, dir: Vec3) -> Self {
        Self::new(a, b, -dir, -ra.cross(dir), dir, rb.cross(dir))
    }

    /// Purely rotational row about `axis`.
    pub fn angular(a: usize, b: usize, axis: Vec3) -> Self {
        Self::new(a, b, Vec3::ZERO, -axis, Vec3::ZERO, axis)
    }

    pub fn with_bounds(mut self, lower: f32, upper: f32) -> Self { self.lower = lower; self.upper = upper; self }
    pub fn with_rhs(mut self, rhs: f32) -> Self { self.rhs = rhs; self }
    pub fn with_cfm(mut self, cfm: f32) -> Self { self.cfm = cfm; self }
    pub fn with_push(mut self, push_rhs: f32) -> Self { self.push_rhs = push_rhs; self }
    pub fn with_impulse(mut self, impulse: f32) -> Self { self.impulse = impulse; self }
    pub fn friction_for(mut self, normal_row: usize, mu: f32) -> Self {
        self.friction_of = Some((normal_row, mu));
        self
    }

    #[inline]
    pub fn jv(&self, bodies: &[SolverBody]) -> f32 {
        let (a, b) = (&bodies[self.a], &bodies[self.b]);
        self.lin_a.dot(a.lin) + self.ang_a.dot(a.ang) + self.lin_b.dot(b.lin) + self.ang_b.dot(b.ang)
    }

    #[inline]
    fn jv_push(&self, bodies: &[SolverBody]) -> f32 {
        let (a, b) = (&bodies[self.a].push, &bodies[self.b].push);
        self.lin_a.dot(a.lin) + self.ang_a.dot(a.ang) + self.lin_b.dot(b.lin) + self.ang_b.dot(b.ang)
    }

    /// Computes the effective mass; returns false when neither side can move.
    pub fn prepare(&mut self, bodies: &[SolverBody]) -> bool {
        let (a, b) = (&bodies[self.a], &bodies[self.b]);
        let k_sys = self.lin_a.length_squared() * a.inv_mass
            + self.ang_a.dot(a.inv_inertia * self.ang_a)
            + self.lin_b.length_squared() * b.inv_mass
            + self.ang_b.dot(b.inv_inertia * self.ang_b);
        if k_sys <= 1.0e-12 { self.eff_mass = 0.0; return false; }
        self.eff_mass = 1.0 / (k_sys + self.cfm);
        true
    }

    fn apply(&self, bodies: &mut [SolverBody], lambda: f32) {
        bodies[self.a].apply_impulse(self.lin_a * lambda, self.ang_a * lambda);
        if self.b != self.a { bodies[self.b].apply_impulse(self.lin_b * lambda, self.ang_b * lambda); }
    }

    fn solve(&mut self, bodies: &mut [SolverBody]) {
        if self.eff_mass == 0.0 { return; }
        let delta = (self.rhs - self.jv(bodies) - self.cfm * self.impulse) * self.eff_mass;
        let next = (self.impulse + delta).clamp(self.lower, self.upper);
        let applied = next - self.impulse;
        self.impulse = next;
        if applied != 0.0 { self.apply(bodies, applied); }
    }

    fn solve_push(&mut self, bodies: &mut [SolverBody]) {
        if self.eff_mass == 0.0 || self.push_rhs <= 0.0 { return; }
        let delta = (self.push_rhs - self.jv_push(bodies)) * self.eff_mass;
        let next = (self.push_impulse + delta).max(0.0);
        let applied = next - self.push_impulse;
        self.push_impulse = next;
        if applied == 0.0 { return; }
        bodies[self.a].apply_push(self.lin_a * applied, self.ang_a * applied);
        if self.b != self.a { bodies[self.b].apply_push(self.lin_b * applied, self.ang_b * applied); }
    }
}

/// Applies the impulses rows start with (warm starting).
pub fn warm_start(rows: &[SolverRow], bodies: &mut [SolverBody]) {
    for r in rows {
        if r.impulse != 0.0 && r.eff_mass != 0.0 { r.apply(bodies, r.impulse); }
    }
}

/// Projected Gauss-Seidel over all rows, then the split-impulse position pass.
pub fn solve_rows(rows: &mut [SolverRow], bodies: &mut [SolverBody], iterations: u32) {
    for _ in 0..iterations {
        for i in 0..rows.len() {
            if let Some((n, mu)) = rows[i].friction_of {
                let limit = mu * rows[n].impulse.max(0.0);
                rows[i].lower = -limit;
                rows[i].upper = limit;
            }
            rows[i].solve(bodies);
        }
    }
    for _ in 0..iterations {
        for r in rows.iter_mut() { r.solve_push(bodies); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kinet_core::vec3;

    fn ball(inv_mass: f32, lin: Vec3) -> SolverBody {
        SolverBody {
            inv_mass,
            inv_inertia: Mat3::from_diagonal(glam::Vec3::splat(inv_mass * 10.0)),
            pos: Vec3::ZERO,
            lin,
            ang: Vec3::ZERO,
            push: Velocity::default(),
        }
    }

    #[test]
    fn non_penetration_row_stops_approach() {
        let mut bodies = [SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO), ball(1.0, vec3(0.0, -3.0, 0.0))];
        let mut rows = [SolverRow::along(0, 1, Vec3::ZERO, Vec3::ZERO, Vec3::Y).with_bounds(0.0, f32::INFINITY)];
        assert!(rows[0].prepare(&bodies));
        solve_rows(&mut rows, &mut bodies, 4);
        assert_relative_eq!(bodies[1].lin.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(rows[0].impulse, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn separating_bodies_are_left_alone() {
        let mut bodies = [SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO), ball(1.0, vec3(0.0, 2.0, 0.0))];
        let mut rows = [SolverRow::along(0, 1, Vec3::ZERO, Vec3::ZERO, Vec3::Y).with_bounds(0.0, f32::INFINITY)];
        rows[0].prepare(&bodies);
        solve_rows(&mut rows, &mut bodies, 4);
        assert_eq!(bodies[1].lin.y, 2.0);
    }

    #[test]
    fn friction_is_capped_by_normal_impulse() {
        let mut bodies = [SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO), ball(1.0, vec3(10.0, -1.0, 0.0))];
        let mut rows = [
            SolverRow::along(0, 1, Vec3::ZERO, Vec3::ZERO, Vec3::Y).with_bounds(0.0, f32::INFINITY),
            SolverRow::along(0, 1, Vec3::ZERO, Vec3::ZERO, Vec3::X).friction_for(0, 0.5),
        ];
        for r in &mut rows { r.prepare(&bodies); }
        solve_rows(&mut rows, &mut bodies, 8);
        assert_relative_eq!(bodies[1].lin.x, 9.5, epsilon = 1e-5);
    }

    #[test]
    fn immovable_pair_does_nothing() {
        let bodies = [SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO); 2];
        let mut row = SolverRow::angular(0, 1, Vec3::Z);
        assert!(!row.prepare(&bodies));
    }

    #[test]
    fn push_pass_moves_without_velocity() {
        let mut bodies = [SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO), ball(1.0, Vec3::ZERO)];
        let mut rows = [SolverRow::along(0, 1, Vec3::ZERO, Vec3::ZERO, Vec3::Y).with_push(0.6)];
        rows[0].prepare(&bodies);
        solve_rows(&mut rows, &mut bodies, 2);
        assert_relative_eq!(bodies[1].push.lin.y, 0.6, epsilon = 1e-6);
        assert_eq!(bodies[1].lin, Vec3::ZERO);
    }
}
