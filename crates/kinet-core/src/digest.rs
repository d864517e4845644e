//! Determinism digest over simulation state.
//!
//! Floats are fed in canonical form: `-0.0` hashes as `0.0`, every NaN hashes
//! alike, and a quaternion is flipped so `w >= 0`. Two states that describe the
//! same poses and velocities therefore produce the same digest.

use blake3::Hasher;
use glam::Quat;

use crate::types::Vec3;

pub type Digest = [u8; 32];

pub struct StateDigest {
    hasher: Hasher,
    words: u64,
}

impl Default for StateDigest {
    fn default() -> Self { Self::new() }
}

impl StateDigest {
    pub fn new() -> Self {
        Self { hasher: Hasher::new(), words: 0 }
    }

    /// Number of scalars fed so far.
    pub fn words(&self) -> u64 { self.words }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.hasher.update(&v.to_le_bytes());
        self.words += 1;
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        let bits = if v.is_nan() {
            f32::NAN.to_bits()
        } else if v == 0.0 {
            0
        } else {
            v.to_bits()
        };
        self.hasher.update(&bits.to_le_bytes());
        self.words += 1;
        self
    }

    pub fn vec3(&mut self, v: Vec3) -> &mut Self {
        self.f32(v.x).f32(v.y).f32(v.z)
    }

    pub fn quat(&mut self, q: Quat) -> &mut Self {
        let q = if q.w < 0.0 { -q } else { q };
        self.f32(q.x).f32(q.y).f32(q.z).f32(q.w)
    }

    pub fn finish(&self) -> Digest { *self.hasher.finalize().as_bytes() }
}
