//! Column-major 4x4 <-> [`Transform`] conversion.
//!
//! Layout of the caller matrix: `m[0..4]` is column 0, `m[4..8]` column 1,
//! `m[8..12]` column 2 and `m[12..16]` column 3 (translation). The bottom
//! row is not read on decode and is written as `[0, 0, 0, 1]` on encode.
//! Both directions are a plain reshuffle of the scalars.

use glam::Mat4;
use crate::types::{Mat3, Transform, Vec3};

pub type ColMajor4x4 = [f32; 16];

pub const IDENTITY_4X4: ColMajor4x4 = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

#[inline]
pub fn decode(m: &ColMajor4x4) -> Transform {
    let basis = Mat3::from_cols(
        Vec3::new(m[0], m[1], m[2]),
        Vec3::new(m[4], m[5], m[6]),
        Vec3::new(m[8], m[9], m[10]),
    );
    Transform { basis, origin: Vec3::new(m[12], m[13], m[14]) }
}

#[inline]
pub fn encode(t: &Transform) -> ColMajor4x4 {
    let (x, y, z, o) = (t.basis.x_axis, t.basis.y_axis, t.basis.z_axis, t.origin);
    [
        x.x, x.y, x.z, 0.0,
        y.x, y.y, y.z, 0.0,
        z.x, z.y, z.z, 0.0,
        o.x, o.y, o.z, 1.0,
    ]
}

#[inline] pub fn from_mat4(m: &Mat4) -> Transform { decode(&m.to_cols_array()) }
#[inline] pub fn to_mat4(t: &Transform) -> Mat4 { Mat4::from_cols_array(&encode(t)) }
