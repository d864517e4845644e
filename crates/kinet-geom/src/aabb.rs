use kinet_core::Vec3;

/// World-space bounds. Touching faces count as overlap.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Bounds that never pair in the broadphase.
    pub const UNBOUNDED: Aabb = Aabb { min: Vec3::NAN, max: Vec3::NAN };

    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self { Self { min, max } }

    #[inline]
    pub fn around(center: Vec3, half: Vec3) -> Self {
        Self { min: center - half, max: center + half }
    }

    /// Copy widened by `margin` on every side.
    #[inline]
    pub fn grown(self, margin: f32) -> Self {
        Self::around(self.center(), self.half_extents() + Vec3::splat(margin))
    }

    #[inline] pub fn center(&self) -> Vec3 { (self.min + self.max) * 0.5 }
    #[inline] pub fn half_extents(&self) -> Vec3 { (self.max - self.min) * 0.5 }

    /// Interval on X, ordered low to high.
    #[inline]
    pub fn x_span(&self) -> (f32, f32) {
        if self.min.x <= self.max.x { (self.min.x, self.max.x) } else { (self.max.x, self.min.x) }
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    #[inline] pub fn is_finite(&self) -> bool { self.min.is_finite() && self.max.is_finite() }
}
