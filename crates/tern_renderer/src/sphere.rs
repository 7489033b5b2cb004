//! Sphere primitive for ray tracing.

use std::f32::consts::PI;
use std::sync::Arc;

use serde_json::Value;
use tern_core::{json, SceneError, SceneResult};
use tern_math::{Aabb, Ray, Transform, Vec2, Vec3};

use crate::material::Material;
use crate::stats::{self, Counter};
use crate::surface::{HitInfo, Surface};

/// A sphere centered at the origin of its local frame.
pub struct Sphere {
    radius: f32,
    xform: Transform,
    material: Arc<dyn Material>,
    bbox: Aabb,
}

impl Sphere {
    pub fn new(radius: f32, xform: Transform, material: Arc<dyn Material>) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = xform.aabb(&Aabb::from_points(-rvec, rvec));

        Self {
            radius,
            xform,
            material,
            bbox,
        }
    }

    /// Fails unless `radius` is positive and finite.
    pub fn from_json(j: &Value, material: Arc<dyn Material>) -> SceneResult<Self> {
        let radius = json::f32_or(j, "radius", 1.0)?;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SceneError::invalid("radius", "must be positive and finite", j));
        }
        Ok(Self::new(
            radius,
            json::transform_or_identity(j, "transform")?,
            material,
        ))
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// UV coordinates for a point on the unit sphere.
    fn sphere_uv(p: Vec3) -> Vec2 {
        // theta: angle down from +Y, phi: angle around Y from +X
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;
        Vec2::new(phi / (2.0 * PI), theta / PI)
    }
}

impl Surface for Sphere {
    fn intersect<'a>(&'a self, ray: &Ray, hit: &mut HitInfo<'a>) -> bool {
        stats::increment(Counter::SphereTests);

        let local = self.xform.inverse_ray(ray);
        let oc = -local.origin;
        let a = local.direction.length_squared();
        if a == 0.0 {
            return false;
        }
        let h = local.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return false;
        }

        let sqrtd = discriminant.sqrt();
        let segment = ray.segment();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !segment.contains(root) {
            root = (h + sqrtd) / a;
            if !segment.contains(root) {
                return false;
            }
        }

        let p = local.at(root);
        let n = (p / self.radius).normalize();
        let normal = self.xform.normal(n);

        hit.t = root;
        hit.p = self.xform.point(p);
        hit.gn = normal;
        hit.sn = normal;
        hit.uv = Self::sphere_uv(n);
        hit.material = self.material.as_ref();

        stats::increment(Counter::SphereHits);
        true
    }

    fn bounds(&self) -> Aabb {
        self.bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Lambertian;

    fn gray() -> Arc<dyn Material> {
        Arc::new(Lambertian::new(Vec3::splat(0.5)))
    }

    #[test]
    fn test_sphere_hit_exact() {
        let sphere = Sphere::new(1.0, Transform::IDENTITY, gray());
        let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::new(0.0, 0.0, -1.0));
        let mut hit = HitInfo::default();

        assert!(sphere.intersect(&ray, &mut hit));
        assert!((hit.t - 3.0).abs() < 1e-5);
        assert!(hit.p.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-5));
        assert!(hit.gn.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-5));
        assert_eq!(hit.gn, hit.sn);
    }

    #[test]
    fn test_sphere_miss_leaves_hit_untouched() {
        let sphere = Sphere::new(1.0, Transform::IDENTITY, gray());
        let ray = Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::Y);
        let mut hit = HitInfo::default();

        assert!(!sphere.intersect(&ray, &mut hit));
        assert_eq!(hit.t, f32::INFINITY);
        assert_eq!(hit.p, Vec3::ZERO);
    }

    #[test]
    fn test_sphere_respects_segment() {
        let sphere = Sphere::new(1.0, Transform::IDENTITY, gray());
        let origin = Vec3::new(0.0, 0.0, 4.0);
        let mut hit = HitInfo::default();

        // Segment ends before the sphere.
        assert!(!sphere.intersect(&Ray::with_segment(origin, -Vec3::Z, 0.0, 2.9), &mut hit));

        // Segment starts past the near root: the far root is returned.
        assert!(sphere.intersect(&Ray::with_segment(origin, -Vec3::Z, 3.5, 10.0), &mut hit));
        assert!((hit.t - 5.0).abs() < 1e-5);
        assert!(hit.gn.abs_diff_eq(-Vec3::Z, 1e-5));
    }

    #[test]
    fn test_sphere_inside() {
        let sphere = Sphere::new(2.0, Transform::IDENTITY, gray());
        let mut hit = HitInfo::default();

        assert!(sphere.intersect(&Ray::new(Vec3::ZERO, Vec3::X), &mut hit));
        assert!((hit.t - 2.0).abs() < 1e-5);
        // Normal points outward, along the ray.
        assert!(hit.gn.dot(Vec3::X) > 0.99);
    }

    #[test]
    fn test_sphere_transformed() {
        let xform = Transform::translate(Vec3::new(0.0, 0.0, -5.0)) * Transform::scale(Vec3::splat(2.0));
        let sphere = Sphere::new(0.5, xform, gray());
        let mut hit = HitInfo::default();

        assert!(sphere.intersect(&Ray::new(Vec3::ZERO, -Vec3::Z), &mut hit));
        // World radius is 1, so the near side is at z = -4.
        assert!((hit.t - 4.0).abs() < 1e-5);
        assert!(hit.p.abs_diff_eq(Vec3::new(0.0, 0.0, -4.0), 1e-5));
        assert!(hit.sn.abs_diff_eq(Vec3::Z, 1e-5));

        let bounds = sphere.bounds();
        assert!(bounds.min().abs_diff_eq(Vec3::new(-1.0, -1.0, -6.0), 1e-5));
        assert!(bounds.max().abs_diff_eq(Vec3::new(1.0, 1.0, -4.0), 1e-5));
    }

    #[test]
    fn test_sphere_zero_direction_misses() {
        let sphere = Sphere::new(1.0, Transform::IDENTITY, gray());
        let mut hit = HitInfo::default();
        assert!(!sphere.intersect(&Ray::new(Vec3::new(0.0, 0.0, 4.0), Vec3::ZERO), &mut hit));
    }

    #[test]
    fn test_sphere_from_json() {
        let j = serde_json::json!({"type": "sphere", "radius": 3, "transform": {"translate": [1, 0, 0]}});
        let sphere = Sphere::from_json(&j, gray()).unwrap();

        assert_eq!(sphere.radius(), 3.0);
        assert!(sphere.bounds().max().abs_diff_eq(Vec3::new(4.0, 3.0, 3.0), 1e-5));
    }

    #[test]
    fn test_sphere_from_json_rejects_bad_radius() {
        for radius in [serde_json::json!(-2), serde_json::json!(0), serde_json::json!(1e39)] {
            let j = serde_json::json!({"type": "sphere", "radius": radius});
            let err = Sphere::from_json(&j, gray()).err().unwrap();
            assert!(matches!(err, SceneError::InvalidValue { ref field, .. } if field == "radius"));
        }
    }
}
