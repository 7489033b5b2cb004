//! Camera for ray generation.

use rand::RngCore;
use serde_json::Value;
use tern_core::{json, SceneError, SceneResult};
use tern_math::{Ray, Transform, Vec2, Vec3};

use crate::sampling::random_in_unit_disk;
use crate::stats::{self, Counter};

/// Pinhole or thin-lens camera looking down its local -z axis, +y up.
#[derive(Clone, Debug)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    /// Camera to world
    transform: Transform,

    vfov: f32,       // Vertical field of view in degrees
    focus_dist: f32, // Distance to the plane of perfect focus
    aperture: f32,   // Lens diameter, 0 for a pinhole

    // Size of the image plane at unit distance (set by initialize())
    plane_size: Vec2,
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 512,
            image_height: 512,
            transform: Transform::IDENTITY,
            vfov: 90.0,
            focus_dist: 1.0,
            aperture: 0.0,
            plane_size: Vec2::splat(2.0),
        };
        camera.initialize();
        camera
    }

    /// Build a camera from its JSON description.
    pub fn from_json(j: &Value) -> SceneResult<Self> {
        let resolution = match j.get("resolution") {
            Some(v) => json::to_floats::<2>(v, "resolution")?,
            None => [512.0, 512.0],
        };
        if resolution.iter().any(|r| *r < 1.0 || r.fract() != 0.0) {
            return Err(SceneError::invalid(
                "resolution",
                "expected two positive integers",
                j,
            ));
        }

        let vfov = json::f32_or(j, "vfov", 90.0)?;
        if !(vfov > 0.0 && vfov < 180.0) {
            return Err(SceneError::invalid(
                "vfov",
                "must lie strictly between 0 and 180 degrees",
                j,
            ));
        }

        Ok(Self::new()
            .with_resolution(resolution[0] as u32, resolution[1] as u32)
            .with_transform(json::transform_or_identity(j, "transform")?)
            .with_lens(
                vfov,
                json::f32_or(j, "fdist", 1.0)?,
                json::f32_or(j, "aperture", 0.0)?,
            ))
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width.max(1);
        self.image_height = height.max(1);
        self.initialize();
        self
    }

    /// Set the camera-to-world transform.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set lens settings.
    pub fn with_lens(mut self, vfov: f32, focus_dist: f32, aperture: f32) -> Self {
        self.vfov = vfov;
        self.focus_dist = focus_dist;
        self.aperture = aperture.max(0.0);
        self.initialize();
        self
    }

    fn initialize(&mut self) {
        let height = 2.0 * (self.vfov.to_radians() / 2.0).tan();
        let width = height * self.image_width as f32 / self.image_height as f32;
        self.plane_size = Vec2::new(width, height);
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    /// Generate a ray through the image position `pixel`, which ranges over
    /// `[0, width] x [0, height]` with y pointing down.
    pub fn generate_ray(&self, pixel: Vec2, rng: &mut dyn RngCore) -> Ray {
        stats::increment(Counter::CameraRays);

        let target = Vec3::new(
            (pixel.x / self.image_width as f32 - 0.5) * self.plane_size.x,
            (0.5 - pixel.y / self.image_height as f32) * self.plane_size.y,
            -1.0,
        ) * self.focus_dist;

        let origin = if self.aperture > 0.0 {
            let disk = random_in_unit_disk(rng) * (0.5 * self.aperture);
            Vec3::new(disk.x, disk.y, 0.0)
        } else {
            Vec3::ZERO
        };

        let mut ray = self.transform.ray(&Ray::new(origin, target - origin));
        ray.direction = ray.direction.normalize();
        ray
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
