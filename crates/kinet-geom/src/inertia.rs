use kinet_core::Vec3;
use crate::shape::Shape;

/// Diagonal local inertia tensor of `shape` carrying `mass`.
///
/// Sphere uses the solid-sphere formula; box the solid cuboid; capsule is
/// approximated by its bounding box `(r, r + hh, r)` with the long axis on Y.
pub fn local_inertia(shape: &Shape, mass: f32) -> Vec3 {
    match *shape {
        Shape::Sphere { r } => Vec3::splat(0.4 * mass * r * r),
        Shape::Box { hx, hy, hz } => box_inertia(Vec3::new(hx, hy, hz), mass),
        Shape::Capsule { r, hh } => box_inertia(Vec3::new(r, r + hh, r), mass),
    }
}

fn box_inertia(half: Vec3, mass: f32) -> Vec3 {
    let dims = half * 2.0;
    let x2 = dims.x * dims.x;
    let y2 = dims.y * dims.y;
    let z2 = dims.z * dims.z;
    let k = mass / 12.0;
    Vec3::new(k * (y2 + z2), k * (x2 + z2), k * (x2 + y2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_inertia() {
        let i = local_inertia(&Shape::Sphere { r: 0.5 }, 2.0);
        assert_relative_eq!(i.x, 0.2, epsilon = 1e-6);
        assert_eq!(i.x, i.y);
        assert_eq!(i.y, i.z);
    }

    #[test]
    fn unit_cube_inertia() {
        let i = local_inertia(&Shape::Box { hx: 0.5, hy: 0.5, hz: 0.5 }, 6.0);
        assert_relative_eq!(i.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(i.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn capsule_long_axis_is_cheapest_to_spin() {
        let i = local_inertia(&Shape::Capsule { r: 0.2, hh: 1.0 }, 1.0);
        assert!(i.y < i.x);
        assert_relative_eq!(i.x, i.z);
    }
}
