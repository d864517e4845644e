pub mod config;
pub mod world;
pub mod islands;
pub mod contact;
pub mod step;
pub mod physics;

pub use config::WorldConfig;
pub use world::{BodyRegistration, ConstraintRegistration, World};
pub use step::StepStats;
pub use physics::Physics;

pub use kinet_articulation::{Generic6DofSpring, LimitKind, PARAM_STOP_CFM, PARAM_STOP_ERP};
pub use kinet_collision::CollisionFilter;
pub use kinet_dynamics::{ActivationState, CollisionFlags, RigidBody, RigidBodyInfo};
pub use kinet_geom::{Shape, ShapeKind};
