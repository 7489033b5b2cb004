//! Material trait for surface scattering.

use rand::RngCore;
use serde_json::Value;
use tern_core::{json, SceneResult};
use tern_math::{Ray, Vec3};

use crate::sampling::{gen_f32, random_in_unit_sphere};
use crate::surface::HitInfo;

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// Outcome of a successful scattering event.
#[derive(Debug, Clone, Copy)]
pub struct ScatterRecord {
    /// Multiplier applied to light arriving along `scattered`
    pub attenuation: Color,
    pub scattered: Ray,
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Scatter an incoming ray, or return `None` if it is absorbed.
    fn scatter(&self, ray: &Ray, hit: &HitInfo, rng: &mut dyn RngCore) -> Option<ScatterRecord>;

    /// Light emitted toward the ray origin. Black for most materials.
    fn emitted(&self, _ray: &Ray, _hit: &HitInfo) -> Color {
        Color::ZERO
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Lambertian {
    albedo: Color,
}

impl Lambertian {
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }

    pub fn from_json(j: &Value) -> SceneResult<Self> {
        Ok(Self::new(json::vec3_or(j, "albedo", Color::splat(0.8))?))
    }
}

impl Material for Lambertian {
    fn scatter(&self, _ray: &Ray, hit: &HitInfo, rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        let offset = random_in_unit_sphere(rng).try_normalize().unwrap_or(Vec3::ZERO);
        let mut direction = hit.sn + offset;

        // Catch degenerate scatter direction
        if direction.length_squared() < 1e-8 {
            direction = hit.sn;
        }

        Some(ScatterRecord {
            attenuation: self.albedo,
            scattered: Ray::new(hit.p, direction),
        })
    }
}

/// Metal (specular) material.
#[derive(Debug, Clone)]
pub struct Metal {
    albedo: Color,
    roughness: f32,
}

impl Metal {
    /// `roughness` is clamped to [0, 1]; 0 is a perfect mirror.
    pub fn new(albedo: Color, roughness: f32) -> Self {
        Self {
            albedo,
            roughness: roughness.clamp(0.0, 1.0),
        }
    }

    pub fn from_json(j: &Value) -> SceneResult<Self> {
        Ok(Self::new(
            json::vec3_or(j, "albedo", Color::splat(0.8))?,
            json::f32_or(j, "roughness", 0.0)?,
        ))
    }
}

impl Material for Metal {
    fn scatter(&self, ray: &Ray, hit: &HitInfo, rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        let reflected = reflect(ray.direction.normalize(), hit.sn);
        let direction = reflected + self.roughness * random_in_unit_sphere(rng);

        // Only scatter if the reflected ray is in the same hemisphere as the normal
        (direction.dot(hit.sn) > 0.0).then(|| ScatterRecord {
            attenuation: self.albedo,
            scattered: Ray::new(hit.p, direction),
        })
    }
}

/// Dielectric (glass) material.
#[derive(Debug, Clone)]
pub struct Dielectric {
    /// Index of refraction
    ior: f32,
}

impl Dielectric {
    pub fn new(ior: f32) -> Self {
        Self { ior }
    }

    pub fn from_json(j: &Value) -> SceneResult<Self> {
        Ok(Self::new(json::f32_or(j, "ior", 1.5)?))
    }
}

impl Material for Dielectric {
    fn scatter(&self, ray: &Ray, hit: &HitInfo, rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        let unit = ray.direction.normalize();
        let cos_i = -unit.dot(hit.sn);

        // Orient the normal against the incoming ray.
        let (normal, eta) = if cos_i >= 0.0 {
            (hit.sn, 1.0 / self.ior)
        } else {
            (-hit.sn, self.ior)
        };

        let reflectance = fresnel_dielectric(cos_i, 1.0, self.ior);
        let direction = if gen_f32(rng) < reflectance {
            reflect(unit, normal)
        } else {
            refract(unit, normal, eta).unwrap_or_else(|| reflect(unit, normal))
        };

        Some(ScatterRecord {
            attenuation: Color::ONE,
            scattered: Ray::new(hit.p, direction),
        })
    }
}

/// Emissive material. Emits from the side the shading normal faces.
#[derive(Debug, Clone)]
pub struct DiffuseLight {
    emit: Color,
}

impl DiffuseLight {
    pub fn new(emit: Color) -> Self {
        Self { emit }
    }

    pub fn from_json(j: &Value) -> SceneResult<Self> {
        Ok(Self::new(json::vec3_or(j, "emit", Color::ONE)?))
    }
}

impl Material for DiffuseLight {
    fn scatter(&self, _ray: &Ray, _hit: &HitInfo, _rng: &mut dyn RngCore) -> Option<ScatterRecord> {
        None
    }

    fn emitted(&self, ray: &Ray, hit: &HitInfo) -> Color {
        if ray.direction.dot(hit.sn) <= 0.0 {
            self.emit
        } else {
            Color::ZERO
        }
    }
}

/// Mirror `v` about the plane with normal `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract unit vector `v` through the surface with unit normal `n`
/// (facing `v`), where `eta` is the ratio of indices of refraction.
/// Returns `None` on total internal reflection.
#[inline]
pub fn refract(v: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = -v.dot(n);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t > 1.0 {
        return None;
    }
    Some(eta * v + (eta * cos_i - (1.0 - sin2_t).sqrt()) * n)
}

/// Unpolarized Fresnel reflectance between two dielectrics.
///
/// `cos_theta_i` is measured against the normal on the `eta_i` side; a
/// negative value means the ray travels from the `eta_t` side instead.
pub fn fresnel_dielectric(cos_theta_i: f32, eta_i: f32, eta_t: f32) -> f32 {
    let mut cos_i = cos_theta_i.clamp(-1.0, 1.0);
    let (mut eta_i, mut eta_t) = (eta_i, eta_t);
    if cos_i <= 0.0 {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_i = -cos_i;
    }

    let sin_i = (1.0 - cos_i * cos_i).max(0.0).sqrt();
    let sin_t = eta_i / eta_t * sin_i;
    if sin_t >= 1.0 {
        return 1.0;
    }
    let cos_t = (1.0 - sin_t * sin_t).max(0.0).sqrt();

    let r_parl = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perp = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    0.5 * (r_parl * r_parl + r_perp * r_perp)
}
