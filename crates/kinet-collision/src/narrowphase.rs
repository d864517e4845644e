use kinet_core::{Transform, Vec3};
use kinet_geom::Shape;

/// One contact between shapes A and B.
/// `normal` points from A towards B, `depth` is positive when penetrating and
/// negative (down to `-margin`) for speculative contacts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ContactPoint {
    pub normal: Vec3,
    pub depth: f32,
    pub point: Vec3,
}

const EPS: f32 = 1.0e-6;
const MAX_MANIFOLD: usize = 4;

/// Dispatch on the shape pair. Returns up to four points, all sharing the
/// same normal.
pub fn collide(sa: &Shape, xa: &Transform, sb: &Shape, xb: &Transform, margin: f32) -> Vec<ContactPoint> {
    match (*sa, *sb) {
        (Shape::Sphere { r: ra }, Shape::Sphere { r: rb }) => {
            round_round(xa.origin, ra, xb.origin, rb, margin).into_iter().collect()
        }
        (Shape::Sphere { r }, Shape::Box { hx, hy, hz }) => {
            sphere_box(xa.origin, r, xb, Vec3::new(hx, hy, hz), margin).map(flip).into_iter().collect()
        }
        (Shape::Box { hx, hy, hz }, Shape::Sphere { r }) => {
            sphere_box(xb.origin, r, xa, Vec3::new(hx, hy, hz), margin).into_iter().collect()
        }
        (Shape::Sphere { r: rs }, Shape::Capsule { r: rc, hh }) => {
            let (p0, p1) = capsule_segment(xb, hh);
            let (q, _) = closest_point_on_segment(p0, p1, xa.origin);
            round_round(xa.origin, rs, q, rc, margin).into_iter().collect()
        }
        (Shape::Capsule { r: rc, hh }, Shape::Sphere { r: rs }) => {
            let (p0, p1) = capsule_segment(xa, hh);
            let (q, _) = closest_point_on_segment(p0, p1, xb.origin);
            round_round(q, rc, xb.origin, rs, margin).into_iter().collect()
        }
        (Shape::Capsule { r: ra, hh: ha }, Shape::Capsule { r: rb, hh: hb }) => {
            capsule_capsule(xa, ra, ha, xb, rb, hb, margin)
        }
        (Shape::Capsule { r, hh }, Shape::Box { hx, hy, hz }) => {
            capsule_box(xa, r, hh, xb, Vec3::new(hx, hy, hz), margin).into_iter().map(flip).collect()
        }
        (Shape::Box { hx, hy, hz }, Shape::Capsule { r, hh }) => {
            capsule_box(xb, r, hh, xa, Vec3::new(hx, hy, hz), margin)
        }
        (Shape::Box { hx: ax, hy: ay, hz: az }, Shape::Box { hx: bx, hy: by, hz: bz }) => {
            box_box(xa, Vec3::new(ax, ay, az), xb, Vec3::new(bx, by, bz), margin)
        }
    }
}

#[inline]
fn flip(c: ContactPoint) -> ContactPoint { ContactPoint { normal: -c.normal, ..c } }

#[inline]
fn capsule_segment(xf: &Transform, hh: f32) -> (Vec3, Vec3) {
    let axis = xf.basis.y_axis * hh;
    (xf.origin + axis, xf.origin - axis)
}

/* ---------- point / segment cores with radii ---------- */

fn round_round(pa: Vec3, ra: f32, pb: Vec3, rb: f32, margin: f32) -> Option<ContactPoint> {
    let d = pb - pa;
    let dist2 = d.length_squared();
    let reach = ra + rb + margin;
    if dist2 >= reach * reach { return None; }
    let dist = dist2.sqrt();
    let normal = if dist > EPS { d / dist } else { Vec3::Y };
    let depth = ra + rb - dist;
    let point = pa + normal * (ra - depth * 0.5);
    Some(ContactPoint { normal, depth, point })
}

fn capsule_capsule(xa: &Transform, ra: f32, ha: f32, xb: &Transform, rb: f32, hb: f32, margin: f32) -> Vec<ContactPoint> {
    let (a0, a1) = capsule_segment(xa, ha);
    let (b0, b1) = capsule_segment(xb, hb);
    let da = (a1 - a0).normalize_or_zero();
    let db = (b1 - b0).normalize_or_zero();
    // near-parallel overlapping capsules get two points so they can rest side by side
    if da.cross(db).length_squared() < 1.0e-4 && da != Vec3::ZERO && db != Vec3::ZERO {
        let mut out = Vec::with_capacity(2);
        for p in [b0, b1] {
            let (q, t) = closest_point_on_segment(a0, a1, p);
            if t > 0.0 && t < 1.0 {
                if let Some(c) = round_round(q, ra, p, rb, margin) { out.push(c); }
            }
        }
        if out.len() == 2 { return out; }
    }
    let (p, q) = closest_points_segment_segment(a0, a1, b0, b1);
    round_round(p, ra, q, rb, margin).into_iter().collect()
}

/* ---------- sphere / capsule vs oriented box ---------- */

/// Contact with normal pointing from the box towards the sphere.
fn sphere_box(c: Vec3, r: f32, xb: &Transform, he: Vec3, margin: f32) -> Option<ContactPoint> {
    let p = xb.inverse_transform_point(c);
    let q = clamp_vec3(p, -he, he);
    let d = p - q;
    let dist2 = d.length_squared();
    if dist2 > EPS * EPS {
        let reach = r + margin;
        if dist2 >= reach * reach { return None; }
        let dist = dist2.sqrt();
        let n_local = d / dist;
        let normal = xb.transform_vector(n_local);
        return Some(ContactPoint { normal, depth: r - dist, point: xb.transform_point(q) });
    }
    // centre inside: push out through the closest face
    let gap = he - p.abs();
    let (axis, face_gap) = if gap.x <= gap.y && gap.x <= gap.z { (0, gap.x) }
        else if gap.y <= gap.z { (1, gap.y) } else { (2, gap.z) };
    let mut n_local = Vec3::ZERO;
    n_local[axis] = if p[axis] >= 0.0 { 1.0 } else { -1.0 };
    let mut on_face = p;
    on_face[axis] = he[axis] * n_local[axis];
    Some(ContactPoint {
        normal: xb.transform_vector(n_local),
        depth: r + face_gap,
        point: xb.transform_point(on_face),
    })
}

/// Contacts with normal pointing from the box towards the capsule.
fn capsule_box(xc: &Transform, r: f32, hh: f32, xb: &Transform, he: Vec3, margin: f32) -> Vec<ContactPoint> {
    let (p0, p1) = capsule_segment(xc, hh);
    let mut out: Vec<ContactPoint> = Vec::with_capacity(2);
    // end caps first, so a capsule lying on a face gets a two-point manifold
    for cap in [p0, p1] {
        if let Some(c) = sphere_box(cap, r, xb, he, margin) { out.push(c); }
    }
    if out.len() == 2 {
        let n0 = out[0].normal;
        if n0.dot(out[1].normal) > 0.99 {
            for c in &mut out { c.normal = n0; }
            return out;
        }
    }
    // segment fallback (e.g. a box edge under the middle of the capsule)
    let a = xb.inverse_transform_point(p0);
    let b = xb.inverse_transform_point(p1);
    let (ps, _) = closest_points_segment_aabb(a, b, -he, he);
    let seg = sphere_box(xb.transform_point(ps), r, xb, he, margin);
    let best = seg.into_iter().chain(out).fold(None::<ContactPoint>, |acc, c| match acc {
        Some(b) if b.depth >= c.depth => Some(b),
        _ => Some(c),
    });
    best.into_iter().collect()
}

/* ---------- box / box (SAT + face clipping) ---------- */

struct Obb { c: Vec3, u: [Vec3; 3], e: [f32; 3] }

impl Obb {
    fn new(xf: &Transform, he: Vec3) -> Self {
        Self { c: xf.origin, u: [xf.basis.x_axis, xf.basis.y_axis, xf.basis.z_axis], e: [he.x, he.y, he.z] }
    }
    #[inline] fn radius(&self, l: Vec3) -> f32 {
        self.e[0] * self.u[0].dot(l).abs() + self.e[1] * self.u[1].dot(l).abs() + self.e[2] * self.u[2].dot(l).abs()
    }
    fn support(&self, dir: Vec3) -> Vec3 {
        let mut p = self.c;
        for k in 0..3 {
            let s = if self.u[k].dot(dir) >= 0.0 { 1.0 } else { -1.0 };
            p += self.u[k] * (self.e[k] * s);
        }
        p
    }
}

fn box_box(xa: &Transform, ha: Vec3, xb: &Transform, hb: Vec3, margin: f32) -> Vec<ContactPoint> {
    let a = Obb::new(xa, ha);
    let b = Obb::new(xb, hb);
    let t = b.c - a.c;

    // (penetration, axis, feature id). ids 0..3 faces of A, 3..6 faces of B, 6.. edges
    let mut best: Option<(f32, Vec3, usize)> = None;
    let mut consider = |axis: Vec3, id: usize| -> bool {
        let len = axis.length();
        if len < 1.0e-5 { return true; }
        let l = axis / len;
        let pen = a.radius(l) + b.radius(l) - t.dot(l).abs();
        if pen < -margin { return false; }
        // edges must win clearly to be picked over faces
        let take = match best {
            Some((bp, _, bid)) => biased_pen(pen, id) < biased_pen(bp, bid),
            None => true,
        };
        if take { best = Some((pen, l, id)); }
        true
    };
    for i in 0..3 { if !consider(a.u[i], i) { return Vec::new(); } }
    for j in 0..3 { if !consider(b.u[j], 3 + j) { return Vec::new(); } }
    for i in 0..3 {
        for j in 0..3 {
            if !consider(a.u[i].cross(b.u[j]), 6 + i * 3 + j) { return Vec::new(); }
        }
    }
    let Some((pen, mut n, id)) = best else { return Vec::new() };
    if n.dot(t) < 0.0 { n = -n; }

    if id >= 6 {
        let (i, j) = ((id - 6) / 3, (id - 6) % 3);
        let pa = a.support(n) - a.u[i] * (a.e[i] * a.u[i].dot(n).signum());
        let pb = b.support(-n) - b.u[j] * (b.e[j] * b.u[j].dot(-n).signum());
        let ea = a.u[i] * a.e[i];
        let eb = b.u[j] * b.e[j];
        let (p, q) = closest_points_segment_segment(pa - ea, pa + ea, pb - eb, pb + eb);
        return vec![ContactPoint { normal: n, depth: pen, point: (p + q) * 0.5 }];
    }

    // reference face on the box that owns the axis, incident face on the other
    let (rf, inc, n_ref, ri) = if id < 3 { (&a, &b, n, id) } else { (&b, &a, -n, id - 3) };
    let mut j = 0;
    let mut best_dot = f32::MAX;
    for k in 0..3 {
        let d = inc.u[k].dot(n_ref);
        if -d.abs() < best_dot { best_dot = -d.abs(); j = k; }
    }
    let s = if inc.u[j].dot(n_ref) > 0.0 { -1.0 } else { 1.0 };
    let fc = inc.c + inc.u[j] * (inc.e[j] * s);
    let (k1, k2) = ((j + 1) % 3, (j + 2) % 3);
    let d1 = inc.u[k1] * inc.e[k1];
    let d2 = inc.u[k2] * inc.e[k2];
    let mut poly = vec![fc + d1 + d2, fc - d1 + d2, fc - d1 - d2, fc + d1 - d2];

    let (r1, r2) = ((ri + 1) % 3, (ri + 2) % 3);
    for (axis, ext) in [(rf.u[r1], rf.e[r1]), (rf.u[r2], rf.e[r2])] {
        let off = axis.dot(rf.c);
        poly = clip_polygon(&poly, axis, off + ext);
        poly = clip_polygon(&poly, -axis, -off + ext);
        if poly.is_empty() { break; }
    }

    let ref_plane = n_ref.dot(rf.c) + rf.e[ri];
    let mut pts: Vec<ContactPoint> = poly.into_iter().filter_map(|p| {
        let depth = ref_plane - n_ref.dot(p);
        (depth >= -margin).then(|| ContactPoint { normal: n, depth, point: p + n_ref * (depth * 0.5) })
    }).collect();

    if pts.is_empty() {
        let p = inc.support(-n_ref);
        return vec![ContactPoint { normal: n, depth: pen, point: p }];
    }
    reduce_manifold(&mut pts);
    pts
}

#[inline]
fn biased_pen(pen: f32, id: usize) -> f32 {
    if id >= 6 { pen * 1.05 + 1.0e-4 } else { pen }
}

fn clip_polygon(poly: &[Vec3], n: Vec3, off: f32) -> Vec<Vec3> {
    let mut out = Vec::with_capacity(poly.len() + 2);
    for (i, &p) in poly.iter().enumerate() {
        let q = poly[(i + 1) % poly.len()];
        let dp = n.dot(p) - off;
        let dq = n.dot(q) - off;
        if dp <= 0.0 { out.push(p); }
        if (dp <= 0.0) != (dq <= 0.0) {
            let t = dp / (dp - dq);
            out.push(p + (q - p) * t);
        }
    }
    out
}

/// Keep the deepest point plus the three that spread the manifold the most.
fn reduce_manifold(pts: &mut Vec<ContactPoint>) {
    if pts.len() <= MAX_MANIFOLD { return; }
    let mut keep: Vec<ContactPoint> = Vec::with_capacity(MAX_MANIFOLD);
    let deepest = pts.iter().enumerate()
        .fold(0, |bi, (i, c)| if c.depth > pts[bi].depth { i } else { bi });
    keep.push(pts.swap_remove(deepest));
    while keep.len() < MAX_MANIFOLD && !pts.is_empty() {
        let score = |c: &ContactPoint| keep.iter().map(|k| (k.point - c.point).length_squared())
            .fold(f32::MAX, f32::min);
        let mut bi = 0;
        for i in 1..pts.len() { if score(&pts[i]) > score(&pts[bi]) { bi = i; } }
        keep.push(pts.swap_remove(bi));
    }
    *pts = keep;
}

/* ---------- helpers ---------- */
#[inline] fn clampf(x: f32, lo: f32, hi: f32) -> f32 { x.max(lo).min(hi) }
#[inline] fn clamp_vec3(p: Vec3, mn: Vec3, mx: Vec3) -> Vec3 {
    Vec3::new(clampf(p.x, mn.x, mx.x), clampf(p.y, mn.y, mx.y), clampf(p.z, mn.z, mx.z))
}
#[inline]
fn closest_point_on_segment(a: Vec3, b: Vec3, p: Vec3) -> (Vec3, f32) {
    let ab = b - a;
    let l2 = ab.length_squared();
    if l2 <= EPS { return (a, 0.0); }
    let t = ((p - a).dot(ab) / l2).clamp(0.0, 1.0);
    (a + ab * t, t)
}
fn closest_points_segment_aabb(a: Vec3, b: Vec3, mn: Vec3, mx: Vec3) -> (Vec3, Vec3) {
    let mut ps = (a + b) * 0.5;
    let mut qs = clamp_vec3(ps, mn, mx);
    for _ in 0..4 {
        let (p2, _t) = closest_point_on_segment(a, b, qs);
        ps = p2;
        qs = clamp_vec3(ps, mn, mx);
    }
    (ps, qs)
}

/// Closest points between segments `p1q1` and `p2q2`.
pub fn closest_points_segment_segment(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.dot(d1);
    let e = d2.dot(d2);
    let f = d2.dot(r);
    let (s, t);
    if a <= EPS && e <= EPS { return (p1, p2); }
    if a <= EPS {
        s = 0.0;
        t = clampf(f / e, 0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= EPS {
            t = 0.0;
            s = clampf(-c / a, 0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s0 = if denom > EPS { clampf((b * f - c * e) / denom, 0.0, 1.0) } else { 0.0 };
            let t0 = (b * s0 + f) / e;
            if t0 < 0.0 {
                t = 0.0;
                s = clampf(-c / a, 0.0, 1.0);
            } else if t0 > 1.0 {
                t = 1.0;
                s = clampf((b - c) / a, 0.0, 1.0);
            } else {
                t = t0;
                s = s0;
            }
        }
    }
    (p1 + d1 * s, p2 + d2 * t)
}

pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let ax = n.x.abs(); let ay = n.y.abs(); let az = n.z.abs();
    let base = if ax <= ay && ax <= az { Vec3::X }
    else if ay <= az        { Vec3::Y }
    else                    { Vec3::Z };
    let t1 = (base.cross(n)).normalize_or_zero();
    let t2 = n.cross(t1);
    (t1, t2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kinet_core::{vec3, Quat};

    fn at(x: f32, y: f32, z: f32) -> Transform { Transform::from_translation(vec3(x, y, z)) }

    #[test]
    fn spheres_touching_report_depth_and_normal() {
        let s = Shape::Sphere { r: 0.5 };
        let c = collide(&s, &at(0.0, 0.0, 0.0), &s, &at(0.9, 0.0, 0.0), 0.0);
        assert_eq!(c.len(), 1);
        assert_relative_eq!(c[0].depth, 0.1, epsilon = 1e-5);
        assert_relative_eq!(c[0].normal.x, 1.0, epsilon = 1e-6);
        assert!(collide(&s, &at(0.0, 0.0, 0.0), &s, &at(1.1, 0.0, 0.0), 0.0).is_empty());
    }

    #[test]
    fn sphere_on_box_normal_points_from_a_to_b() {
        let sphere = Shape::Sphere { r: 0.5 };
        let ground = Shape::Box { hx: 5.0, hy: 0.5, hz: 5.0 };
        let c = collide(&ground, &at(0.0, -0.5, 0.0), &sphere, &at(0.0, 0.45, 0.0), 0.0);
        assert_eq!(c.len(), 1);
        assert_relative_eq!(c[0].normal.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(c[0].depth, 0.05, epsilon = 1e-5);
        let back = collide(&sphere, &at(0.0, 0.45, 0.0), &ground, &at(0.0, -0.5, 0.0), 0.0);
        assert_relative_eq!(back[0].normal.y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn sphere_centre_inside_box_uses_nearest_face() {
        let c = sphere_box(vec3(0.0, 0.4, 0.0), 0.1, &Transform::IDENTITY, vec3(1.0, 0.5, 1.0), 0.0).unwrap();
        assert_relative_eq!(c.normal.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(c.depth, 0.2, epsilon = 1e-5);
    }

    #[test]
    fn resting_cube_gets_four_points() {
        let cube = Shape::Box { hx: 0.5, hy: 0.5, hz: 0.5 };
        let ground = Shape::Box { hx: 5.0, hy: 0.5, hz: 5.0 };
        let c = collide(&ground, &at(0.0, -0.5, 0.0), &cube, &at(0.0, 0.49, 0.0), 0.0);
        assert_eq!(c.len(), 4);
        for p in &c {
            assert_relative_eq!(p.normal.y, 1.0, epsilon = 1e-5);
            assert_relative_eq!(p.depth, 0.01, epsilon = 1e-4);
        }
    }

    #[test]
    fn rotated_boxes_separated_on_edge_axis() {
        let cube = Shape::Box { hx: 0.5, hy: 0.5, hz: 0.5 };
        let q = Quat::from_rotation_y(core::f32::consts::FRAC_PI_4) * Quat::from_rotation_x(core::f32::consts::FRAC_PI_4);
        let b = Transform::from_rotation_translation(q, vec3(1.3, 0.0, 0.0));
        let c = collide(&cube, &Transform::IDENTITY, &cube, &b, 0.0);
        assert!(c.iter().all(|p| p.normal.x > 0.0));
        let far = Transform::from_rotation_translation(q, vec3(2.0, 0.0, 0.0));
        assert!(collide(&cube, &Transform::IDENTITY, &cube, &far, 0.0).is_empty());
    }

    #[test]
    fn lying_capsule_on_box_has_two_points() {
        let cap = Shape::Capsule { r: 0.25, hh: 0.5 };
        let ground = Shape::Box { hx: 5.0, hy: 0.5, hz: 5.0 };
        let lying = Transform::from_rotation_translation(
            Quat::from_rotation_z(core::f32::consts::FRAC_PI_2), vec3(0.0, 0.24, 0.0));
        let c = collide(&cap, &lying, &ground, &at(0.0, -0.5, 0.0), 0.0);
        assert_eq!(c.len(), 2);
        assert!(c.iter().all(|p| p.normal.y < -0.99));
    }

    #[test]
    fn crossed_capsules_meet_at_centre() {
        let cap = Shape::Capsule { r: 0.2, hh: 1.0 };
        let b = Transform::from_rotation_translation(
            Quat::from_rotation_x(core::f32::consts::FRAC_PI_2), vec3(0.0, 0.0, 0.0));
        let a = Transform::from_rotation_translation(
            Quat::from_rotation_z(core::f32::consts::FRAC_PI_2), vec3(0.0, 0.0, 0.0));
        let shifted = Transform { origin: vec3(0.0, 0.3, 0.0), ..b };
        let c = collide(&cap, &a, &cap, &shifted, 0.0);
        assert_eq!(c.len(), 1);
        assert_relative_eq!(c[0].depth, 0.1, epsilon = 1e-5);
        assert_relative_eq!(c[0].normal.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn speculative_margin_reports_negative_depth() {
        let s = Shape::Sphere { r: 0.5 };
        let c = collide(&s, &at(0.0, 0.0, 0.0), &s, &at(1.05, 0.0, 0.0), 0.1);
        assert_eq!(c.len(), 1);
        assert!(c[0].depth < 0.0);
    }

    #[test]
    fn segment_segment_parallel_and_skew() {
        let (p, q) = closest_points_segment_segment(vec3(-1.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0),
                                                    vec3(0.0, 1.0, -1.0), vec3(0.0, 1.0, 1.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(q.y, 1.0, epsilon = 1e-6);
        let (_, q) = closest_points_segment_segment(vec3(0.0, 0.0, 0.0), vec3(1.0, 0.0, 0.0),
                                                    vec3(0.0, 1.0, 0.0), vec3(1.0, 1.0, 0.0));
        assert_relative_eq!(q.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn basis_is_orthonormal() {
        for n in [Vec3::X, Vec3::Y, vec3(0.3, -0.8, 0.52).normalize()] {
            let (t1, t2) = orthonormal_basis(n);
            assert_relative_eq!(t1.dot(n), 0.0, epsilon = 1e-5);
            assert_relative_eq!(t2.dot(n), 0.0, epsilon = 1e-5);
            assert_relative_eq!(t1.length(), 1.0, epsilon = 1e-5);
        }
    }
}
