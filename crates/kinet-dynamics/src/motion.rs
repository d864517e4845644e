use kinet_core::Transform;

/// Transform cache owned by exactly one body.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MotionState {
    world: Transform,
}

impl MotionState {
    #[inline] pub fn new(start: Transform) -> Self { Self { world: start } }
    #[inline] pub fn world_transform(&self) -> Transform { self.world }
    #[inline] pub fn set_world_transform(&mut self, t: Transform) { self.world = t; }
}
