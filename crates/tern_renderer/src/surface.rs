//! Surface trait and HitInfo for ray-surface intersection.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use tern_math::{Aabb, Ray, Transform, Vec2, Vec3};

use crate::material::{Material, ScatterRecord};

/// A dummy material used for HitInfo::default().
/// Always absorbs light (returns None from scatter).
struct DummyMaterial;

impl Material for DummyMaterial {
    fn scatter(&self, _ray: &Ray, _hit: &HitInfo, _rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        None
    }
}

/// Static dummy material instance for Default impl.
static DUMMY_MATERIAL: DummyMaterial = DummyMaterial;

/// Record of a ray-surface intersection.
///
/// Only meaningful after `Surface::intersect` returned true; a failed
/// intersection leaves it untouched.
#[derive(Clone, Copy)]
pub struct HitInfo<'a> {
    /// Ray parameter of the hit
    pub t: f32,
    /// World-space hit position
    pub p: Vec3,
    /// Geometric normal, from the raw geometry
    pub gn: Vec3,
    /// Shading normal, possibly interpolated
    pub sn: Vec3,
    /// Surface parameterization at the hit
    pub uv: Vec2,
    /// Material at the intersection point
    pub material: &'a dyn Material,
}

impl<'a> Default for HitInfo<'a> {
    fn default() -> Self {
        Self {
            t: f32::INFINITY,
            p: Vec3::ZERO,
            gn: Vec3::ZERO,
            sn: Vec3::ZERO,
            uv: Vec2::ZERO,
            material: &DUMMY_MATERIAL,
        }
    }
}

impl<'a> HitInfo<'a> {
    /// Move a local-space hit into the frame described by `xform`.
    /// `t` is shared between both frames and is left alone.
    #[inline]
    pub fn transform(&mut self, xform: &Transform) {
        self.p = xform.point(self.p);
        self.gn = xform.normal(self.gn);
        self.sn = xform.normal(self.sn);
    }
}

impl fmt::Debug for HitInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HitInfo")
            .field("t", &self.t)
            .field("p", &self.p)
            .field("gn", &self.gn)
            .field("sn", &self.sn)
            .field("uv", &self.uv)
            .finish_non_exhaustive()
    }
}

/// Anything a ray can hit: primitives and groups alike.
///
/// Surfaces are immutable once built and shared across render threads.
pub trait Surface: Send + Sync {
    /// Intersect `ray` within its `[mint, maxt]` segment.
    ///
    /// Returns true and fills every field of `hit` on success. Degenerate
    /// configurations simply miss.
    fn intersect<'a>(&'a self, ray: &Ray, hit: &mut HitInfo<'a>) -> bool;

    /// World-space bounds.
    fn bounds(&self) -> Aabb;
}

/// A collection of surfaces that is filled during scene construction and
/// then frozen into an intersectable surface.
pub trait Accelerator: Send {
    fn add_child(&mut self, surface: Arc<dyn Surface>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish construction. The result is read-only.
    fn build(self: Box<Self>) -> Arc<dyn Surface>;
}
