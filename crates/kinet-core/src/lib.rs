pub mod types;
pub mod codec;
pub mod ids;
pub mod arena;
pub mod diag;
pub mod error;
pub mod digest;

pub use types::{Scalar, Vec3, Mat3, Transform, Velocity, vec3};
pub use codec::{ColMajor4x4, IDENTITY_4X4, decode, encode, from_mat4, to_mat4};
pub use ids::{ArenaHandle, EntityKind, WorldHandle, ShapeHandle, BodyHandle, ConstraintHandle};
pub use arena::Arena;
pub use diag::{AllocCounters, AllocKind, AllocStats};
pub use error::{PhysicsError, Result};
pub use digest::{Digest, StateDigest};
pub use glam::Quat;
