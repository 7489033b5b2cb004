//! A fully built scene, ready to render.

use std::sync::Arc;

use crate::camera::Camera;
use crate::error::RenderResult;
use crate::integrator::{Background, Integrator};
use crate::renderer::{self, CancelToken, ImageBuffer, RenderConfig};
use crate::stats::RenderStats;
use crate::surface::Surface;

/// Camera, surface tree and render settings.
///
/// The surface tree is immutable; a scene can be rendered any number of
/// times, from any thread.
pub struct Scene {
    camera: Camera,
    root: Arc<dyn Surface>,
    background: Background,
    config: RenderConfig,
}

impl Scene {
    pub fn new(
        camera: Camera,
        root: Arc<dyn Surface>,
        background: Background,
        config: RenderConfig,
    ) -> Self {
        Self {
            camera,
            root,
            background,
            config,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn root(&self) -> &dyn Surface {
        self.root.as_ref()
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Settings such as the seed or sample count may be overridden before
    /// rendering.
    pub fn config_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    pub fn integrator(&self) -> Integrator {
        Integrator::new(self.config.max_depth)
    }

    /// Render the scene.
    pub fn raytrace(&self, cancel: &CancelToken) -> RenderResult<ImageBuffer> {
        self.raytrace_with_stats(cancel).map(|(image, _)| image)
    }

    /// Render the scene and return the merged intersection counters too.
    pub fn raytrace_with_stats(
        &self,
        cancel: &CancelToken,
    ) -> RenderResult<(ImageBuffer, RenderStats)> {
        renderer::render(self, cancel)
    }
}
