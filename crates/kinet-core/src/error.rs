use thiserror::Error;
use crate::ids::EntityKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("invalid {kind} handle {handle:#x}")]
    InvalidHandle { kind: EntityKind, handle: u64 },

    #[error("invalid shape dimensions: {0}")]
    InvalidShape(String),

    #[error("axis index {0} out of range 0..6")]
    InvalidAxis(i32),

    #[error("unknown constraint parameter {0}")]
    InvalidParam(i32),

    #[error("unknown activation state {0}")]
    InvalidActivationState(i32),

    #[error("{kind} {handle:#x} is already registered in world {world:#x}")]
    AlreadyRegistered { kind: EntityKind, handle: u64, world: u64 },

    #[error("{kind} {handle:#x} is not registered in world {world:#x}")]
    NotRegistered { kind: EntityKind, handle: u64, world: u64 },

    #[error("{kind} {handle:#x} is still registered in {worlds} world(s)")]
    StillRegistered { kind: EntityKind, handle: u64, worlds: usize },

    #[error("{kind} {handle:#x} is still referenced by {users} {user_kind}(s)")]
    InUse { kind: EntityKind, handle: u64, users: usize, user_kind: EntityKind },

    #[error("world {handle:#x} still has {bodies} rigid bodies and {constraints} constraints registered")]
    WorldNotEmpty { handle: u64, bodies: usize, constraints: usize },

    #[error("constraint needs two distinct bodies, got {handle:#x} twice")]
    SameBody { handle: u64 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;
