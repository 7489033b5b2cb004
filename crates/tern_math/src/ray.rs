use crate::{Interval, Vec3};

/// Default minimum hit distance, keeps secondary rays from re-hitting
/// the surface they start on.
pub const RAY_EPSILON: f32 = 1e-4;

/// A ray with a parametric segment `[mint, maxt]` of valid hit distances.
///
/// Rays are cheap value types. Traversal code copies them and shrinks
/// `maxt` as closer hits are found.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub mint: f32,
    pub maxt: f32,
}

impl Ray {
    /// Create a ray spanning `[RAY_EPSILON, +inf)`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::with_segment(origin, direction, RAY_EPSILON, f32::INFINITY)
    }

    /// Create a ray with an explicit segment.
    pub fn with_segment(origin: Vec3, direction: Vec3, mint: f32, maxt: f32) -> Self {
        Self {
            origin,
            direction,
            mint,
            maxt,
        }
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// The valid hit range as an interval.
    #[inline]
    pub fn segment(&self) -> Interval {
        Interval::new(self.mint, self.maxt)
    }

    /// Returns: origin + t * direction
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
