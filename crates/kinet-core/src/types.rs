use core::ops::Mul;
use glam::{Mat3A, Quat, Vec3A};

pub type Scalar = f32;
pub type Vec3 = Vec3A;
pub type Mat3 = Mat3A;

#[inline] pub fn vec3(x: Scalar, y: Scalar, z: Scalar) -> Vec3 { Vec3::new(x, y, z) }

/// Rigid transform as kept by the engine: a 3x3 basis plus an origin.
///
/// The basis is stored as-is. Nothing here re-orthonormalizes it, so a
/// skewed basis written through the codec stays skewed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub basis: Mat3,
    pub origin: Vec3,
}

impl Default for Transform {
    fn default() -> Self { Self::IDENTITY }
}

impl Transform {
    pub const IDENTITY: Transform = Transform { basis: Mat3::IDENTITY, origin: Vec3::ZERO };

    #[inline] pub fn new(basis: Mat3, origin: Vec3) -> Self { Self { basis, origin } }

    #[inline] pub fn from_translation(origin: Vec3) -> Self {
        Self { basis: Mat3::IDENTITY, origin }
    }

    #[inline] pub fn from_rotation_translation(rot: Quat, origin: Vec3) -> Self {
        Self { basis: Mat3::from_quat(rot), origin }
    }

    /// Unit quaternion extracted from the basis.
    #[inline] pub fn rotation(&self) -> Quat {
        Quat::from_mat3a(&self.basis).normalize()
    }

    #[inline] pub fn transform_point(&self, p: Vec3) -> Vec3 { self.basis * p + self.origin }
    #[inline] pub fn transform_vector(&self, v: Vec3) -> Vec3 { self.basis * v }

    /// Inverse assuming an orthonormal basis (transpose of the rotation).
    #[inline] pub fn inverse(&self) -> Transform {
        let inv = self.basis.transpose();
        Transform { basis: inv, origin: inv * -self.origin }
    }

    #[inline] pub fn inverse_transform_point(&self, p: Vec3) -> Vec3 {
        self.basis.transpose() * (p - self.origin)
    }
    #[inline] pub fn inverse_transform_vector(&self, v: Vec3) -> Vec3 {
        self.basis.transpose() * v
    }
}

impl Mul for Transform {
    type Output = Transform;
    #[inline]
    fn mul(self, rhs: Transform) -> Transform {
        Transform { basis: self.basis * rhs.basis, origin: self.basis * rhs.origin + self.origin }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Velocity { pub lin: Vec3, pub ang: Vec3 }
