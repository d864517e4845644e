use kinet_core::{PhysicsError, Result};

/// Sleep/wake status of a body. The discriminants are the boundary integers.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ActivationState {
    Active = 1,
    IslandSleeping = 2,
    WantsDeactivation = 3,
    DisableDeactivation = 4,
    DisableSimulation = 5,
}

impl ActivationState {
    pub fn from_raw(v: i32) -> Result<Self> {
        Ok(match v {
            1 => Self::Active,
            2 => Self::IslandSleeping,
            3 => Self::WantsDeactivation,
            4 => Self::DisableDeactivation,
            5 => Self::DisableSimulation,
            _ => return Err(PhysicsError::InvalidActivationState(v)),
        })
    }

    #[inline] pub fn as_raw(self) -> i32 { self as i32 }

    /// Integrated and solved this substep.
    #[inline] pub fn is_active(self) -> bool {
        !matches!(self, Self::IslandSleeping | Self::DisableSimulation)
    }

    /// States that ignore suggestions and the deactivation heuristic.
    #[inline] pub fn is_pinned(self) -> bool {
        matches!(self, Self::DisableDeactivation | Self::DisableSimulation)
    }
}

impl Default for ActivationState {
    fn default() -> Self { Self::Active }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_are_stable() {
        for v in 1..=5 {
            assert_eq!(ActivationState::from_raw(v).unwrap().as_raw(), v);
        }
        assert!(matches!(ActivationState::from_raw(0), Err(PhysicsError::InvalidActivationState(0))));
        assert!(ActivationState::from_raw(6).is_err());
    }

    #[test]
    fn only_sleeping_and_disabled_are_inactive() {
        assert!(ActivationState::Active.is_active());
        assert!(ActivationState::WantsDeactivation.is_active());
        assert!(ActivationState::DisableDeactivation.is_active());
        assert!(!ActivationState::IslandSleeping.is_active());
        assert!(!ActivationState::DisableSimulation.is_active());
    }
}
