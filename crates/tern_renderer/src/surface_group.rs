//! Flat collection of surfaces, intersected by linear scan.

use std::sync::Arc;

use serde_json::Value;
use tern_core::{json, SceneResult};
use tern_math::{Aabb, Ray, Transform};

use crate::surface::{Accelerator, HitInfo, Surface};

/// A transformed list of child surfaces.
///
/// This is the reference accelerator: every other accelerator must return
/// the same hits as a `SurfaceGroup` over the same children.
pub struct SurfaceGroup {
    xform: Transform,
    surfaces: Vec<Arc<dyn Surface>>,
    local_bounds: Aabb,
    bounds: Aabb,
}

impl SurfaceGroup {
    pub fn new(xform: Transform) -> Self {
        Self {
            xform,
            surfaces: Vec::new(),
            local_bounds: Aabb::EMPTY,
            bounds: Aabb::EMPTY,
        }
    }

    pub fn from_json(j: &Value) -> SceneResult<Self> {
        Ok(Self::new(json::transform_or_identity(j, "transform")?))
    }

    pub fn surfaces(&self) -> &[Arc<dyn Surface>] {
        &self.surfaces
    }

    /// Union of the children's bounds, before this group's transform.
    pub fn local_bounds(&self) -> Aabb {
        self.local_bounds
    }
}

impl Default for SurfaceGroup {
    fn default() -> Self {
        Self::new(Transform::IDENTITY)
    }
}

impl Surface for SurfaceGroup {
    fn intersect<'a>(&'a self, ray: &Ray, hit: &mut HitInfo<'a>) -> bool {
        let identity = self.xform.is_identity();
        let mut local = if identity {
            *ray
        } else {
            self.xform.inverse_ray(ray)
        };

        let mut hit_anything = false;
        for surface in &self.surfaces {
            if surface.intersect(&local, hit) {
                hit_anything = true;
                local.maxt = hit.t;
            }
        }

        if hit_anything && !identity {
            hit.transform(&self.xform);
        }
        hit_anything
    }

    fn bounds(&self) -> Aabb {
        self.bounds
    }
}

impl Accelerator for SurfaceGroup {
    fn add_child(&mut self, surface: Arc<dyn Surface>) {
        self.local_bounds.enclose(&surface.bounds());
        self.bounds = self.xform.aabb(&self.local_bounds);
        self.surfaces.push(surface);
    }

    fn len(&self) -> usize {
        self.surfaces.len()
    }

    fn build(self: Box<Self>) -> Arc<dyn Surface> {
        log::debug!("Surface group built with {} surfaces", self.surfaces.len());
        Arc::new(*self)
    }
}
