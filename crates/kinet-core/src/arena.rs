use core::marker::PhantomData;
use crate::error::{PhysicsError, Result};
use crate::ids::ArenaHandle;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage addressed by generation-checked handles.
///
/// Removing an entry bumps the slot generation, so every handle issued for
/// the old occupant stops resolving even after the slot is reused.
pub struct Arena<T, H: ArenaHandle> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _handle: PhantomData<fn() -> H>,
}

impl<T, H: ArenaHandle> Default for Arena<T, H> {
    fn default() -> Self { Self::new() }
}

impl<T, H: ArenaHandle> Arena<T, H> {
    pub fn new() -> Self { Self::with_capacity(0) }

    pub fn with_capacity(cap: usize) -> Self {
        Self { slots: Vec::with_capacity(cap), free: Vec::new(), len: 0, _handle: PhantomData }
    }

    #[inline] pub fn len(&self) -> usize { self.len }
    #[inline] pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn insert(&mut self, value: T) -> H {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return H::from_parts(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 1, value: Some(value) });
        H::from_parts(index, 1)
    }

    pub fn remove(&mut self, h: H) -> Option<T> {
        let slot = self.slots.get_mut(h.index() as usize)?;
        if slot.generation != h.generation() { return None; }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(h.index());
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn get(&self, h: H) -> Option<&T> {
        let slot = self.slots.get(h.index() as usize)?;
        if slot.generation != h.generation() { return None; }
        slot.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, h: H) -> Option<&mut T> {
        let slot = self.slots.get_mut(h.index() as usize)?;
        if slot.generation != h.generation() { return None; }
        slot.value.as_mut()
    }

    #[inline] pub fn contains(&self, h: H) -> bool { self.get(h).is_some() }

    /// Like [`Arena::get`], with a stale or foreign handle reported as an error.
    pub fn try_get(&self, h: H) -> Result<&T> {
        self.get(h).ok_or(PhysicsError::InvalidHandle { kind: H::KIND, handle: h.to_raw() })
    }

    pub fn try_get_mut(&mut self, h: H) -> Result<&mut T> {
        self.get_mut(h).ok_or(PhysicsError::InvalidHandle { kind: H::KIND, handle: h.to_raw() })
    }

    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value.as_ref().map(|v| (H::from_parts(i as u32, s.generation), v))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value.as_mut().map(|v| (H::from_parts(i as u32, generation), v))
        })
    }

    pub fn handles(&self) -> Vec<H> { self.iter().map(|(h, _)| h).collect() }
}
