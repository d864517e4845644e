pub mod narrowphase;

use kinet_geom::Aabb;

pub use narrowphase::{ContactPoint, collide};

/// Group/mask pair. Two filters collide when each one's group intersects the other's mask.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CollisionFilter { pub group: i32, pub mask: i32 }

impl Default for CollisionFilter {
    fn default() -> Self { Self { group: 1, mask: -1 } }
}

impl CollisionFilter {
    #[inline] pub fn new(group: i32, mask: i32) -> Self { Self { group, mask } }
    #[inline] pub fn collides(&self, other: &CollisionFilter) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }
}

/// Deterministic 1D SAP along X with full AABB overlap, NaN-safe and stable.
/// `accept(i, j)` (with `i < j`) is consulted before the overlap test.
pub fn pairs_sap<F>(aabbs: &[Aabb], mut accept: F) -> Vec<(usize, usize)>
where
    F: FnMut(usize, usize) -> bool,
{
    #[derive(Copy, Clone)]
    struct Elem { min: f32, max: f32, idx: usize }

    let mut elems: Vec<Elem> = Vec::with_capacity(aabbs.len());
    for (i, a) in aabbs.iter().enumerate() {
        if !a.is_finite() { continue; }
        let (min, max) = a.x_span();
        elems.push(Elem { min, max, idx: i });
    }
    elems.sort_by(|a, b| a.min.total_cmp(&b.min).then(a.idx.cmp(&b.idx)));

    let mut active: Vec<Elem> = Vec::new();
    let mut out: Vec<(usize, usize)> = Vec::new();
    for e in elems {
        active.retain(|j| j.max >= e.min);
        for j in &active {
            let (i, k) = if j.idx < e.idx { (j.idx, e.idx) } else { (e.idx, j.idx) };
            if !accept(i, k) { continue; }
            if aabbs[i].overlaps(&aabbs[k]) { out.push((i, k)); }
        }
        active.push(e);
    }
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinet_core::vec3;

    fn cube(x: f32) -> Aabb { Aabb::around(vec3(x, 0.0, 0.0), vec3(0.5, 0.5, 0.5)) }

    #[test]
    fn finds_only_overlapping_pairs() {
        let boxes = [cube(0.0), cube(0.9), cube(5.0), cube(5.5)];
        assert_eq!(pairs_sap(&boxes, |_, _| true), vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn accept_callback_prunes_pairs() {
        let boxes = [cube(0.0), cube(0.2), cube(0.4)];
        let pairs = pairs_sap(&boxes, |i, j| !(i == 0 && j == 2));
        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn nan_boxes_are_skipped() {
        let mut bad = cube(0.0);
        bad.min.x = f32::NAN;
        assert!(pairs_sap(&[bad, cube(0.1)], |_, _| true).is_empty());
    }

    #[test]
    fn filter_needs_both_directions() {
        let a = CollisionFilter::new(0b01, 0b10);
        let b = CollisionFilter::new(0b10, 0b01);
        let c = CollisionFilter::new(0b10, 0b10);
        assert!(a.collides(&b));
        assert!(!a.collides(&c));
        assert!(CollisionFilter::default().collides(&CollisionFilter::default()));
    }
}
