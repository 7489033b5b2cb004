//! Recursive Monte Carlo estimator of the radiance along a ray.

use rand::RngCore;
use serde::Deserialize;
use serde_json::Value;
use tern_core::{json, SceneError, SceneResult};
use tern_math::Ray;

use crate::material::Color;
use crate::stats::{self, Counter};
use crate::surface::{HitInfo, Surface};

/// Default maximum number of scattering events along a path.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Radiance for rays that leave the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    Constant(Color),
    /// Vertical blend from `bottom` (straight down) to `top` (straight up).
    Gradient { bottom: Color, top: Color },
}

impl Default for Background {
    fn default() -> Self {
        Background::Constant(Color::splat(0.2))
    }
}

impl Background {
    /// Parse `[r, g, b]`, a scalar, or `{"type": "gradient", "bottom", "top"}`.
    pub fn from_json(j: &Value) -> SceneResult<Self> {
        if !j.is_object() {
            return Ok(Background::Constant(json::to_vec3(j, "background")?));
        }

        match json::str_or(j, "type", "constant")? {
            "constant" => Ok(Background::Constant(json::vec3_or(j, "color", Color::splat(0.2))?)),
            "gradient" => Ok(Background::Gradient {
                bottom: json::vec3_or(j, "bottom", Color::ONE)?,
                top: json::vec3_or(j, "top", Color::new(0.5, 0.7, 1.0))?,
            }),
            other => Err(SceneError::unknown_type("background", other, j)),
        }
    }

    /// Radiance arriving from direction `ray.direction`.
    pub fn eval(&self, ray: &Ray) -> Color {
        match *self {
            Background::Constant(color) => color,
            Background::Gradient { bottom, top } => {
                let unit_direction = ray.direction.normalize_or_zero();
                let a = 0.5 * (unit_direction.y + 1.0);
                bottom * (1.0 - a) + top * a
            }
        }
    }
}

/// The recursive path tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Integrator {
    /// Scattering stops once a path reaches this many bounces.
    pub max_depth: u32,
}

impl Default for Integrator {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Integrator {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// Compute the color seen along `ray`.
    ///
    /// Adds the emission at each hit to the attenuated color of the
    /// scattered ray until the path is absorbed, escapes, or reaches
    /// `max_depth` bounces. Scatter events that produce a non-finite
    /// direction or attenuation count as absorption.
    pub fn recursive_color(
        &self,
        world: &dyn Surface,
        background: &Background,
        ray: &Ray,
        depth: u32,
        rng: &mut dyn RngCore,
    ) -> Color {
        stats::increment(Counter::RaysTraced);

        let mut hit = HitInfo::default();
        if !world.intersect(ray, &mut hit) {
            return background.eval(ray);
        }

        let emitted = hit.material.emitted(ray, &hit);
        if depth >= self.max_depth {
            return emitted;
        }

        match hit.material.scatter(ray, &hit, rng) {
            Some(srec)
                if srec.attenuation.is_finite()
                    && srec.scattered.direction.is_finite()
                    && srec.scattered.origin.is_finite() =>
            {
                let incoming =
                    self.recursive_color(world, background, &srec.scattered, depth + 1, rng);
                emitted + srec.attenuation * incoming
            }
            _ => emitted,
        }
    }

    /// Radiance estimate for a camera ray. Non-finite estimates are
    /// counted and replaced by black.
    pub fn sample(
        &self,
        world: &dyn Surface,
        background: &Background,
        ray: &Ray,
        rng: &mut dyn RngCore,
    ) -> Color {
        let color = self.recursive_color(world, background, ray, 0, rng);
        if color.is_finite() {
            color
        } else {
            stats::increment(Counter::NanSamples);
            Color::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Lambertian, Material, Metal, ScatterRecord};
    use crate::quad::Quad;
    use crate::sphere::Sphere;
    use crate::surface::Accelerator;
    use crate::surface_group::SurfaceGroup;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tern_math::{Transform, Vec2, Vec3};

    /// Perfect mirror that also glows, so every bounce adds light.
    struct GlowingMirror;

    impl Material for GlowingMirror {
        fn scatter(&self, ray: &Ray, hit: &HitInfo, _rng: &mut dyn RngCore) -> Option<ScatterRecord> {
            Some(ScatterRecord {
                attenuation: Color::ONE,
                scattered: Ray::new(hit.p, crate::material::reflect(ray.direction, hit.sn)),
            })
        }

        fn emitted(&self, _ray: &Ray, _hit: &HitInfo) -> Color {
            Color::new(1.0, 0.5, 0.25)
        }
    }

    /// Scatters into a NaN direction.
    struct Broken;

    impl Material for Broken {
        fn scatter(&self, _ray: &Ray, hit: &HitInfo, _rng: &mut dyn RngCore) -> Option<ScatterRecord> {
            Some(ScatterRecord {
                attenuation: Color::ONE,
                scattered: Ray::new(hit.p, Vec3::NAN),
            })
        }
    }

    fn world_of(surfaces: Vec<Arc<dyn Surface>>) -> Arc<dyn Surface> {
        let mut group = SurfaceGroup::default();
        for s in surfaces {
            group.add_child(s);
        }
        Box::new(group).build()
    }

    #[test]
    fn test_background_constant_and_gradient() {
        let ray_up = Ray::new(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0));
        let ray_down = Ray::new(Vec3::ZERO, -Vec3::Y);
        let ray_side = Ray::new(Vec3::ZERO, Vec3::X);

        let constant = Background::Constant(Color::new(0.1, 0.2, 0.3));
        assert_eq!(constant.eval(&ray_up), Color::new(0.1, 0.2, 0.3));

        let gradient = Background::Gradient {
            bottom: Color::ZERO,
            top: Color::ONE,
        };
        assert_eq!(gradient.eval(&ray_up), Color::ONE);
        assert_eq!(gradient.eval(&ray_down), Color::ZERO);
        assert_eq!(gradient.eval(&ray_side), Color::splat(0.5));
    }

    #[test]
    fn test_background_from_json() {
        assert_eq!(
            Background::from_json(&serde_json::json!([1, 0, 0])).unwrap(),
            Background::Constant(Color::X)
        );
        assert_eq!(
            Background::from_json(&serde_json::json!(0.5)).unwrap(),
            Background::Constant(Color::splat(0.5))
        );
        assert_eq!(
            Background::from_json(&serde_json::json!({"type": "gradient", "bottom": 1, "top": 0}))
                .unwrap(),
            Background::Gradient {
                bottom: Color::ONE,
                top: Color::ZERO
            }
        );
        assert!(Background::from_json(&serde_json::json!({"type": "hdri"})).is_err());
    }

    #[test]
    fn test_integrator_deserialize() {
        let integrator: Integrator = serde_json::from_value(serde_json::json!({"max_depth": 8})).unwrap();
        assert_eq!(integrator.max_depth, 8);

        let integrator: Integrator =
            serde_json::from_value(serde_json::json!({"type": "recursive"})).unwrap();
        assert_eq!(integrator, Integrator::default());
    }

    #[test]
    fn test_miss_returns_background_exactly() {
        let world = world_of(Vec::new());
        let background = Background::Constant(Color::new(0.3, 0.6, 0.9));
        let mut rng = StdRng::seed_from_u64(1);

        let color = Integrator::default().recursive_color(
            world.as_ref(),
            &background,
            &Ray::new(Vec3::ZERO, Vec3::X),
            0,
            &mut rng,
        );
        assert_eq!(color, Color::new(0.3, 0.6, 0.9));
    }

    #[test]
    fn test_always_scattering_path_terminates() {
        // Camera ray starts inside a mirror sphere and can never escape.
        let world = world_of(vec![Arc::new(Sphere::new(
            1.0,
            Transform::IDENTITY,
            Arc::new(GlowingMirror),
        ))]);
        let mut rng = StdRng::seed_from_u64(1);
        let integrator = Integrator::default();

        let color = integrator.sample(
            world.as_ref(),
            &Background::default(),
            &Ray::new(Vec3::ZERO, Vec3::new(0.3, 0.2, 1.0)),
            &mut rng,
        );

        // One emission per hit: depths 0 through max_depth.
        let hits = (integrator.max_depth + 1) as f32;
        assert!(color.is_finite());
        assert!(color.abs_diff_eq(Color::new(1.0, 0.5, 0.25) * hits, 1e-3));
    }

    #[test]
    fn test_facing_mirrors_stay_finite() {
        let mirror: Arc<dyn Material> = Arc::new(Metal::new(Color::splat(0.9), 0.0));
        let floor = Quad::new(
            Vec2::splat(4.0),
            Transform::translate(Vec3::new(0.0, 0.0, -1.0)),
            Arc::clone(&mirror),
        );
        // Flipped so both normals face the gap between the quads
        let ceiling = Quad::new(
            Vec2::splat(4.0),
            Transform::translate(Vec3::new(0.0, 0.0, 1.0)) * Transform::rotate(180.0, Vec3::X),
            mirror,
        );
        let world = world_of(vec![Arc::new(floor), Arc::new(ceiling)]);
        let mut rng = StdRng::seed_from_u64(1);

        let color = Integrator::new(16).sample(
            world.as_ref(),
            &Background::Constant(Color::ONE),
            &Ray::new(Vec3::ZERO, Vec3::Z),
            &mut rng,
        );
        assert!(color.is_finite());
        // The path is trapped and there is no emitter.
        assert_eq!(color, Color::ZERO);
    }

    #[test]
    fn test_non_finite_scatter_is_absorbed() {
        let world = world_of(vec![Arc::new(Sphere::new(
            1.0,
            Transform::translate(Vec3::new(0.0, 0.0, -3.0)),
            Arc::new(Broken),
        ))]);
        let mut rng = StdRng::seed_from_u64(1);

        let color = Integrator::default().sample(
            world.as_ref(),
            &Background::Constant(Color::ONE),
            &Ray::new(Vec3::ZERO, -Vec3::Z),
            &mut rng,
        );
        assert_eq!(color, Color::ZERO);
    }

    #[test]
    fn test_diffuse_sphere_under_white_sky() {
        // A white Lambertian sphere under a uniform white sky reflects
        // at most the sky radiance.
        let world = world_of(vec![Arc::new(Sphere::new(
            1.0,
            Transform::translate(Vec3::new(0.0, 0.0, -3.0)),
            Arc::new(Lambertian::new(Color::splat(0.5))),
        ))]);
        let mut rng = StdRng::seed_from_u64(5);
        let integrator = Integrator::default();
        let background = Background::Constant(Color::ONE);

        for _ in 0..100 {
            let c = integrator.sample(world.as_ref(), &background, &Ray::new(Vec3::ZERO, -Vec3::Z), &mut rng);
            assert!(c.max_element() <= 0.5 + 1e-6);
            assert!(c.min_element() > 0.0);
        }
    }
}
