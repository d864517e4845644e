pub mod aabb;
pub mod shape;
pub mod inertia;

pub use aabb::Aabb;
pub use shape::{Shape, ShapeKind, aabb_of};
pub use inertia::local_inertia;
