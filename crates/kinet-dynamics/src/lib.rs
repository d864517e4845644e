pub mod activation;
pub mod motion;
pub mod body;
pub mod solver;

pub use activation::ActivationState;
pub use motion::MotionState;
pub use body::{CollisionFlags, RigidBody, RigidBodyInfo};
pub use solver::{SolverBody, SolverRow, solve_rows, warm_start};
