//! Tern Renderer - CPU Path Tracing
//!
//! A Monte Carlo path tracer over a tree of transformable surfaces.
//!
//! Scenes are built from JSON through a name-based [`Registry`], frozen into
//! an immutable surface tree (linear [`SurfaceGroup`]s or [`Bvh`]s), and
//! rendered in parallel buckets with per-bucket random streams.
//!
//! # Example
//!
//! ```ignore
//! use tern_renderer::{load_scene_file, CancelToken};
//!
//! let scene = load_scene_file("scenes/cornell.json")?;
//! let image = scene.raytrace(&CancelToken::new())?;
//! image.to_rgb8().save("cornell.png")?;
//! ```

mod bucket;
mod bvh;
mod camera;
mod error;
mod example_scenes;
mod factory;
mod integrator;
mod material;
mod mesh;
mod parser;
mod quad;
mod renderer;
mod sampling;
mod scene;
mod scene_test;
mod sphere;
pub mod stats;
mod surface;
mod surface_group;
mod triangle;

pub use bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use bvh::{Bvh, BvhBuilder, BvhConfig, BvhNode, SplitMethod, MAX_DEPTH};
pub use camera::Camera;
pub use error::{RenderError, RenderResult};
pub use example_scenes::{example_scene, example_scene_by_name, EXAMPLE_SCENE_COUNT};
pub use factory::{add_surfaces, BuildContext, Factory, Registry, Surfaces};
pub use integrator::{Background, Integrator, DEFAULT_MAX_DEPTH};
pub use material::{
    fresnel_dielectric, reflect, refract, Color, Dielectric, DiffuseLight, Lambertian, Material,
    Metal, ScatterRecord,
};
pub use mesh::TriangleMesh;
pub use parser::{load_scene, load_scene_file, parse_scene, read_scene_json};
pub use quad::Quad;
pub use renderer::{
    color_to_rgb, linear_to_gamma, render, render_pixel, CancelToken, ImageBuffer, RenderConfig,
    DEFAULT_SEED,
};
pub use sampling::{bucket_seed, gen_f32, random_in_unit_disk, random_in_unit_sphere, random_unit_vector};
pub use scene::Scene;
pub use scene_test::{
    is_test_document, run_tests, IntersectionTest, ScatterTest, SceneTest, TestFailure, TestReport,
};
pub use sphere::Sphere;
pub use stats::{Counter, RenderStats};
pub use surface::{Accelerator, HitInfo, Surface};
pub use surface_group::SurfaceGroup;
pub use triangle::Triangle;

/// Scene-construction types from tern_core
pub use tern_core::{FileResolver, SceneError, SceneResult};

/// Re-export math types from tern_math
pub use tern_math::{Aabb, Interval, Ray, Transform, Vec2, Vec3};
