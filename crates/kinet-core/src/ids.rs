use core::fmt;

/// Entity kinds addressed through handles; also used in error messages.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind { World, Shape, RigidBody, Constraint }

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::World => "world",
            EntityKind::Shape => "shape",
            EntityKind::RigidBody => "rigid body",
            EntityKind::Constraint => "constraint",
        })
    }
}

/// Generation-checked slot address. The raw form packs `generation << 32 | index`;
/// generations start at 1, so a raw value of 0 never names a live entity.
pub trait ArenaHandle: Copy + Eq + Ord + fmt::Debug {
    const KIND: EntityKind;
    fn from_parts(index: u32, generation: u32) -> Self;
    fn index(self) -> u32;
    fn generation(self) -> u32;

    #[inline] fn to_raw(self) -> u64 { ((self.generation() as u64) << 32) | self.index() as u64 }
    #[inline] fn from_raw(raw: u64) -> Option<Self> {
        let generation = (raw >> 32) as u32;
        if generation == 0 { None } else { Some(Self::from_parts(raw as u32, generation)) }
    }
}

macro_rules! define_handle {
    ($name:ident, $kind:expr) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name { index: u32, generation: u32 }

        impl ArenaHandle for $name {
            const KIND: EntityKind = $kind;
            #[inline] fn from_parts(index: u32, generation: u32) -> Self { Self { index, generation } }
            #[inline] fn index(self) -> u32 { self.index }
            #[inline] fn generation(self) -> u32 { self.generation }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}v{})", stringify!($name), self.index, self.generation)
            }
        }
    };
}

define_handle!(WorldHandle, EntityKind::World);
define_handle!(ShapeHandle, EntityKind::Shape);
define_handle!(BodyHandle, EntityKind::RigidBody);
define_handle!(ConstraintHandle, EntityKind::Constraint);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_zero_is_null() {
        assert!(BodyHandle::from_raw(0).is_none());
        assert!(BodyHandle::from_raw(7).is_none()); // index 7, generation 0
    }

    #[test]
    fn raw_roundtrip_keeps_index_and_generation() {
        let h = ShapeHandle::from_parts(42, 3);
        let back = ShapeHandle::from_raw(h.to_raw()).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.index(), 42);
        assert_eq!(back.generation(), 3);
    }
}
