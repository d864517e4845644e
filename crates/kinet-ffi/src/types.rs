//! Plain C types shared with the host.

use kinet_core::{decode, AllocStats, ArenaHandle, ColMajor4x4, ShapeHandle};
use kinet_world::RigidBodyInfo;

/// Opaque handles. `0` is the null handle; live values pack arena index and generation.
pub type KnWorld = u64;
pub type KnShape = u64;
pub type KnRigidBody = u64;
pub type KnConstraint = u64;

pub const KN_NULL: u64 = 0;

pub const KN_ACTIVE_TAG: i32 = 1;
pub const KN_ISLAND_SLEEPING: i32 = 2;
pub const KN_WANTS_DEACTIVATION: i32 = 3;
pub const KN_DISABLE_DEACTIVATION: i32 = 4;
pub const KN_DISABLE_SIMULATION: i32 = 5;

pub const KN_CONSTRAINT_STOP_ERP: i32 = kinet_world::PARAM_STOP_ERP;
pub const KN_CONSTRAINT_STOP_CFM: i32 = kinet_world::PARAM_STOP_CFM;

/// Live object counts, one field per tracked kind.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct KnAllocStats {
    pub worlds: i32,
    pub shapes: i32,
    pub rigid_bodies: i32,
    pub constraints: i32,
    pub motion_states: i32,
}

impl From<AllocStats> for KnAllocStats {
    fn from(s: AllocStats) -> Self {
        Self {
            worlds: s.worlds,
            shapes: s.shapes,
            rigid_bodies: s.rigid_bodies,
            constraints: s.constraints,
            motion_states: s.motion_states,
        }
    }
}

/// Construction parameters for `kn_rigid_body_create`.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct KnRigidBodyInfo {
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
    pub additional_damping: bool,
    pub is_kinematic: bool,
    pub disable_deactivation: bool,
    pub no_contact_response: bool,
    pub shape: KnShape,
    /// Column-major 4x4.
    pub initial_transform: ColMajor4x4,
}

impl KnRigidBodyInfo {
    /// `None` when the shape handle is null.
    pub fn to_info(&self) -> Option<RigidBodyInfo> {
        let shape = ShapeHandle::from_raw(self.shape)?;
        Some(RigidBodyInfo {
            mass: self.mass,
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
            friction: self.friction,
            restitution: self.restitution,
            additional_damping: self.additional_damping,
            is_kinematic: self.is_kinematic,
            disable_deactivation: self.disable_deactivation,
            no_contact_response: self.no_contact_response,
            shape,
            initial_transform: decode(&self.initial_transform),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinet_core::{vec3, IDENTITY_4X4};

    fn raw_info(shape: KnShape) -> KnRigidBodyInfo {
        let mut m = IDENTITY_4X4;
        m[12] = 1.0;
        m[13] = 2.0;
        KnRigidBodyInfo {
            mass: 3.0,
            linear_damping: 0.1,
            angular_damping: 0.2,
            friction: 0.7,
            restitution: 0.3,
            additional_damping: true,
            is_kinematic: false,
            disable_deactivation: true,
            no_contact_response: false,
            shape,
            initial_transform: m,
        }
    }

    #[test]
    fn info_carries_every_field() {
        let shape = ShapeHandle::from_parts(4, 2);
        let info = raw_info(shape.to_raw()).to_info().unwrap();
        assert_eq!(info.shape, shape);
        assert_eq!(info.mass, 3.0);
        assert_eq!((info.linear_damping, info.angular_damping), (0.1, 0.2));
        assert_eq!((info.friction, info.restitution), (0.7, 0.3));
        assert!(info.additional_damping && info.disable_deactivation);
        assert!(!info.is_kinematic && !info.no_contact_response);
        assert_eq!(info.initial_transform.origin, vec3(1.0, 2.0, 0.0));
    }

    #[test]
    fn null_shape_yields_no_info() {
        assert!(raw_info(KN_NULL).to_info().is_none());
    }

    #[test]
    fn state_constants_match_activation_states() {
        use kinet_world::ActivationState;
        for (raw, s) in [
            (KN_ACTIVE_TAG, ActivationState::Active),
            (KN_ISLAND_SLEEPING, ActivationState::IslandSleeping),
            (KN_WANTS_DEACTIVATION, ActivationState::WantsDeactivation),
            (KN_DISABLE_DEACTIVATION, ActivationState::DisableDeactivation),
            (KN_DISABLE_SIMULATION, ActivationState::DisableSimulation),
        ] {
            assert_eq!(s.as_raw(), raw);
        }
    }
}
