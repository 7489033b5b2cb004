//! Axis-aligned rectangle in the XY plane of its local frame.

use std::sync::Arc;

use serde_json::Value;
use tern_core::{json, SceneResult};
use tern_math::{Aabb, Ray, Transform, Vec2, Vec3};

use crate::material::Material;
use crate::stats::{self, Counter};
use crate::surface::{HitInfo, Surface};

/// Padding applied to the local bounds so they never have zero thickness.
pub const QUAD_BOUNDS_EPSILON: f32 = 1e-4;

/// A rectangle spanning `[-size/2, size/2]` in x and y at z = 0.
pub struct Quad {
    half_size: Vec2,
    xform: Transform,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Quad {
    pub fn new(size: Vec2, xform: Transform, material: Arc<dyn Material>) -> Self {
        let half_size = size * 0.5;
        let bbox = xform.aabb(&Self::bounds_for(half_size));
        Self {
            half_size,
            xform,
            material,
            bbox,
        }
    }

    pub fn from_json(j: &Value, material: Arc<dyn Material>) -> SceneResult<Self> {
        Ok(Self::new(
            json::vec2_or(j, "size", Vec2::ONE)?,
            json::transform_or_identity(j, "transform")?,
            material,
        ))
    }

    /// Bounds in the quad's own frame.
    pub fn local_bounds(&self) -> Aabb {
        Self::bounds_for(self.half_size)
    }

    fn bounds_for(half_size: Vec2) -> Aabb {
        let eps = QUAD_BOUNDS_EPSILON;
        Aabb::from_min_max(
            Vec3::new(-half_size.x - eps, -half_size.y - eps, -eps),
            Vec3::new(half_size.x + eps, half_size.y + eps, eps),
        )
    }
}

impl Surface for Quad {
    fn intersect<'a>(&'a self, ray: &Ray, hit: &mut HitInfo<'a>) -> bool {
        stats::increment(Counter::QuadTests);

        let local = self.xform.inverse_ray(ray);

        // Parallel to the plane
        if local.direction.z == 0.0 {
            return false;
        }

        let t = -local.origin.z / local.direction.z;
        if !ray.segment().contains(t) {
            return false;
        }

        let p = local.at(t);
        if p.x.abs() > self.half_size.x || p.y.abs() > self.half_size.y {
            return false;
        }

        let normal = self.xform.normal(Vec3::Z);

        hit.t = t;
        hit.p = self.xform.point(p);
        hit.gn = normal;
        hit.sn = normal;
        hit.uv = Vec2::new(
            0.5 * (p.x / self.half_size.x + 1.0),
            0.5 * (p.y / self.half_size.y + 1.0),
        );
        hit.material = self.material.as_ref();

        stats::increment(Counter::QuadHits);
        true
    }

    fn bounds(&self) -> Aabb {
        self.bbox
    }
}
