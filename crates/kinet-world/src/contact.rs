use std::collections::BTreeMap;

use kinet_collision::{narrowphase::orthonormal_basis, ContactPoint};
use kinet_core::{BodyHandle, Vec3};
use kinet_dynamics::{SolverBody, SolverRow};

/// Restitution only kicks in above this approach speed.
const BOUNCE_THRESHOLD: f32 = 0.2;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct WarmImp { pub jn: f32, pub jt1: f32, pub jt2: f32 }

/// Last substep's contact impulses per body pair, by manifold point index.
#[derive(Clone, Debug, Default)]
pub struct WarmCache {
    pairs: BTreeMap<(BodyHandle, BodyHandle), Vec<WarmImp>>,
}

impl WarmCache {
    #[inline]
    fn key(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn get(&self, a: BodyHandle, b: BodyHandle, point: usize) -> WarmImp {
        self.pairs.get(&Self::key(a, b))
            .and_then(|v| v.get(point).copied())
            .unwrap_or_default()
    }

    pub fn forget_body(&mut self, b: BodyHandle) {
        self.pairs.retain(|(x, y), _| *x != b && *y != b);
    }

    pub fn clear(&mut self) { self.pairs.clear(); }
    pub fn len(&self) -> usize { self.pairs.len() }
    pub fn is_empty(&self) -> bool { self.pairs.is_empty() }

    pub(crate) fn replace(&mut self, next: BTreeMap<(BodyHandle, BodyHandle), Vec<WarmImp>>) {
        self.pairs = next;
    }
}

/// Combined material of one touching pair.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PairMaterial { pub friction: f32, pub restitution: f32 }

impl PairMaterial {
    /// Products of the two coefficients.
    pub fn combine(fa: f32, ra: f32, fb: f32, rb: f32) -> Self {
        Self { friction: fa * fb, restitution: ra * rb }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct ContactTuning { pub slop: f32, pub beta: f32 }

/// Indices of the three rows one manifold point produced.
#[derive(Copy, Clone, Debug)]
pub struct PointRows { pub normal: usize, pub t1: usize, pub t2: usize }

/// Normal row plus two friction rows for one point, prepared and warm-start
/// seeded. `normal` of the point points from `ia` to `ib`.
#[allow(clippy::too_many_arguments)]
pub fn push_point_rows(
    ia: usize,
    ib: usize,
    cp: &ContactPoint,
    mat: PairMaterial,
    warm: WarmImp,
    tuning: ContactTuning,
    bodies: &[SolverBody],
    dt: f32,
    rows: &mut Vec<SolverRow>,
) -> Option<PointRows> {
    let (a, b) = (&bodies[ia], &bodies[ib]);
    let n = cp.normal;
    let ra = cp.point - a.pos;
    let rb = cp.point - b.pos;

    let vn = (b.velocity_at(rb) - a.velocity_at(ra)).dot(n);
    let rhs = if cp.depth < 0.0 {
        // speculative: allowed to close the gap this substep, not more
        cp.depth / dt
    } else if vn < -BOUNCE_THRESHOLD {
        -mat.restitution * vn
    } else {
        0.0
    };
    let push = if cp.depth > tuning.slop { tuning.beta * (cp.depth - tuning.slop) / dt } else { 0.0 };

    let mut normal = SolverRow::along(ia, ib, ra, rb, n)
        .with_bounds(0.0, f32::INFINITY)
        .with_rhs(rhs)
        .with_push(push)
        .with_impulse(warm.jn.max(0.0));
    if !normal.prepare(bodies) { return None; }
    let ni = rows.len();
    rows.push(normal);

    let (t1, t2) = orthonormal_basis(n);
    let mut ids = [0usize; 2];
    for (k, (dir, jt)) in [(t1, warm.jt1), (t2, warm.jt2)].into_iter().enumerate() {
        let mut row = SolverRow::along(ia, ib, ra, rb, dir)
            .friction_for(ni, mat.friction)
            .with_impulse(jt);
        row.prepare(bodies);
        ids[k] = rows.len();
        rows.push(row);
    }
    Some(PointRows { normal: ni, t1: ids[0], t2: ids[1] })
}

/// Accumulated impulses of a point's rows, for the next substep's warm start.
#[inline]
pub fn harvest(rows: &[SolverRow], p: &PointRows) -> WarmImp {
    WarmImp { jn: rows[p.normal].impulse, jt1: rows[p.t1].impulse, jt2: rows[p.t2].impulse }
}

#[inline]
pub fn is_finite_point(cp: &ContactPoint) -> bool {
    cp.normal.is_finite() && cp.depth.is_finite() && cp.point.is_finite() && cp.normal != Vec3::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kinet_core::{vec3, ArenaHandle, Mat3, Velocity};
    use kinet_dynamics::{solve_rows, warm_start};

    fn ball(pos: Vec3, lin: Vec3) -> SolverBody {
        SolverBody {
            inv_mass: 1.0,
            inv_inertia: Mat3::from_diagonal(glam::Vec3::splat(2.5)),
            pos,
            lin,
            ang: Vec3::ZERO,
            push: Velocity::default(),
        }
    }

    const TUNING: ContactTuning = ContactTuning { slop: 0.01, beta: 0.2 };

    #[test]
    fn resting_contact_cancels_fall_without_bounce() {
        let ground = SolverBody::fixed(vec3(0.0, -0.5, 0.0), Vec3::ZERO, Vec3::ZERO);
        let mut bodies = [ground, ball(vec3(0.0, 0.5, 0.0), vec3(0.0, -0.1, 0.0))];
        let cp = ContactPoint { normal: Vec3::Y, depth: 0.0, point: Vec3::ZERO };
        let mut rows = Vec::new();
        let mat = PairMaterial::combine(0.5, 1.0, 0.5, 1.0);
        push_point_rows(0, 1, &cp, mat, WarmImp::default(), TUNING, &bodies, 1.0 / 60.0, &mut rows).unwrap();
        assert_eq!(rows.len(), 3);
        solve_rows(&mut rows, &mut bodies, 10);
        assert_relative_eq!(bodies[1].lin.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn fast_approach_bounces_with_restitution_product() {
        let ground = SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
        let mut bodies = [ground, ball(vec3(0.0, 1.0, 0.0), vec3(0.0, -4.0, 0.0))];
        let cp = ContactPoint { normal: Vec3::Y, depth: 0.0, point: vec3(0.0, 0.5, 0.0) };
        let mut rows = Vec::new();
        let mat = PairMaterial::combine(0.0, 0.5, 0.0, 1.0);
        push_point_rows(0, 1, &cp, mat, WarmImp::default(), TUNING, &bodies, 1.0 / 60.0, &mut rows).unwrap();
        solve_rows(&mut rows, &mut bodies, 10);
        assert_relative_eq!(bodies[1].lin.y, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn speculative_point_lets_gap_close() {
        let ground = SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
        let dt = 0.1;
        let mut bodies = [ground, ball(vec3(0.0, 1.0, 0.0), vec3(0.0, -1.0, 0.0))];
        let cp = ContactPoint { normal: Vec3::Y, depth: -0.2, point: vec3(0.0, 0.5, 0.0) };
        let mut rows = Vec::new();
        push_point_rows(0, 1, &cp, PairMaterial::combine(0.0, 0.0, 0.0, 0.0), WarmImp::default(),
                        TUNING, &bodies, dt, &mut rows).unwrap();
        solve_rows(&mut rows, &mut bodies, 10);
        // gap 0.2 over 0.1 s allows 2 m/s of approach, so 1 m/s is untouched
        assert_relative_eq!(bodies[1].lin.y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn warm_start_applies_cached_impulse() {
        let ground = SolverBody::fixed(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
        let mut bodies = [ground, ball(vec3(0.0, 1.0, 0.0), Vec3::ZERO)];
        let cp = ContactPoint { normal: Vec3::Y, depth: 0.0, point: vec3(0.0, 0.5, 0.0) };
        let mut rows = Vec::new();
        let warm = WarmImp { jn: 0.3, jt1: 0.0, jt2: 0.0 };
        let p = push_point_rows(0, 1, &cp, PairMaterial::combine(0.5, 0.0, 0.5, 0.0), warm,
                                TUNING, &bodies, 1.0 / 60.0, &mut rows).unwrap();
        warm_start(&rows, &mut bodies);
        assert_relative_eq!(bodies[1].lin.y, 0.3, epsilon = 1e-6);
        assert_relative_eq!(harvest(&rows, &p).jn, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn cache_forgets_pairs_of_removed_body() {
        let (a, b, c) = (BodyHandle::from_parts(0, 1), BodyHandle::from_parts(1, 1), BodyHandle::from_parts(2, 1));
        let mut cache = WarmCache::default();
        let mut next = BTreeMap::new();
        next.insert((a, b), vec![WarmImp { jn: 1.0, ..Default::default() }]);
        next.insert((b, c), vec![WarmImp { jn: 2.0, ..Default::default() }]);
        cache.replace(next);
        assert_eq!(cache.get(b, a, 0).jn, 1.0);
        cache.forget_body(a);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(a, b, 0), WarmImp::default());
        assert_eq!(cache.get(c, b, 0).jn, 2.0);
    }
}
