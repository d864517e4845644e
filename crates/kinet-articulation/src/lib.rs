pub mod spring6dof;
pub mod rows;

pub use spring6dof::{
    Generic6DofSpring, JointFrames, LimitKind, matrix_to_euler_xyz,
    PARAM_STOP_ERP, PARAM_STOP_CFM,
};
pub use rows::{apply_springs, build_rows};
