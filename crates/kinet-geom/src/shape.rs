use kinet_core::{PhysicsError, Result, Transform, Vec3, Mat3};
use crate::aabb::Aabb;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShapeKind { Sphere, Box, Capsule }

/// Immutable convex collision geometry, centred on the body origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    Sphere { r: f32 },
    Box { hx: f32, hy: f32, hz: f32 },
    /// `hh` is half the distance between the two cap centres, along local Y.
    Capsule { r: f32, hh: f32 },
}

fn check_dim(name: &str, v: f32) -> Result<f32> {
    if v.is_finite() && v >= 0.0 { Ok(v) } else {
        Err(PhysicsError::InvalidShape(format!("{name} must be finite and non-negative, got {v}")))
    }
}

impl Shape {
    pub fn sphere(radius: f32) -> Result<Self> {
        Ok(Shape::Sphere { r: check_dim("radius", radius)? })
    }

    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Result<Self> {
        Ok(Shape::Box {
            hx: check_dim("half extent x", hx)?,
            hy: check_dim("half extent y", hy)?,
            hz: check_dim("half extent z", hz)?,
        })
    }

    /// `height` is the length of the cylindrical part, excluding the caps.
    pub fn capsule(radius: f32, height: f32) -> Result<Self> {
        Ok(Shape::Capsule { r: check_dim("radius", radius)?, hh: check_dim("height", height)? * 0.5 })
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere { .. } => ShapeKind::Sphere,
            Shape::Box { .. } => ShapeKind::Box,
            Shape::Capsule { .. } => ShapeKind::Capsule,
        }
    }
}

#[inline]
pub fn aabb_of(shape: &Shape, xf: &Transform) -> Aabb {
    match *shape {
        Shape::Sphere { r } => Aabb::around(xf.origin, Vec3::splat(r)),
        Shape::Box { hx, hy, hz } => {
            let he = Vec3::new(hx, hy, hz);
            let b = &xf.basis;
            let m = Mat3::from_cols(b.x_axis.abs(), b.y_axis.abs(), b.z_axis.abs());
            Aabb::around(xf.origin, m * he)
        }
        Shape::Capsule { r, hh } => {
            let axis_world = xf.basis.y_axis * hh;
            let he = axis_world.abs() + Vec3::splat(r);
            Aabb::around(xf.origin, he)
        }
    }
}
