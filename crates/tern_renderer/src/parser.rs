//! Turns a JSON scene description into a [`Scene`].

use std::path::Path;
use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Value};
use tern_core::{json as jv, FileResolver, SceneError, SceneResult};

use crate::camera::Camera;
use crate::factory::{add_surfaces, BuildContext, Registry};
use crate::integrator::{Background, Integrator};
use crate::renderer::RenderConfig;
use crate::scene::Scene;
use crate::scene_test::is_test_document;

/// Top-level fields a scene may contain.
const SCENE_FIELDS: [&str; 8] = [
    "camera",
    "sampler",
    "integrator",
    "accelerator",
    "background",
    "materials",
    "surfaces",
    "media",
];

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SamplerSettings {
    samples: u32,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self { samples: 1 }
    }
}

/// Deserialize an optional settings block, keeping the fragment on error.
fn settings<T: Default + for<'de> Deserialize<'de>>(j: &Value, key: &str) -> SceneResult<T> {
    match j.get(key) {
        None => Ok(T::default()),
        Some(v) => T::deserialize(v).map_err(|e| SceneError::invalid(key, e.to_string(), v)),
    }
}

/// Read a scene file as JSON, with a resolver that searches the file's
/// directory first.
pub fn read_scene_json(path: impl AsRef<Path>) -> SceneResult<(Value, FileResolver)> {
    let path = path.as_ref();
    log::info!("Loading scene {}", path.display());

    let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let j: Value = serde_json::from_str(&text)?;

    let mut resolver = FileResolver::new();
    if let Some(dir) = path.parent() {
        resolver.prepend(dir);
    }
    Ok((j, resolver))
}

/// Read and parse a scene file. Relative asset paths are resolved against
/// the file's directory first.
pub fn load_scene_file(path: impl AsRef<Path>) -> SceneResult<Scene> {
    let (j, resolver) = read_scene_json(path)?;
    parse_scene(&j, &Registry::with_builtins()?, resolver)
}

/// Parse a scene using the built-in types.
pub fn load_scene(j: &Value) -> SceneResult<Scene> {
    parse_scene(j, &Registry::with_builtins()?, FileResolver::new())
}

/// Parse a scene with a caller-supplied registry and file resolver.
pub fn parse_scene(j: &Value, registry: &Registry, resolver: FileResolver) -> SceneResult<Scene> {
    let start = Instant::now();

    let fields = j
        .as_object()
        .ok_or_else(|| SceneError::invalid("scene", "expected a JSON object", j))?;
    if is_test_document(j) {
        return Err(SceneError::invalid("type", "a tests document cannot be rendered", j));
    }
    for key in fields.keys() {
        if !SCENE_FIELDS.contains(&key.as_str()) {
            return Err(SceneError::UnsupportedField(key.clone()));
        }
    }
    if fields.contains_key("media") {
        log::warn!("Participating media are not supported and will be ignored");
    }

    let camera = Camera::from_json(jv::require(j, "camera")?)?;
    let sampler: SamplerSettings = settings(j, "sampler")?;
    let integrator: Integrator = settings(j, "integrator")?;
    let background = j
        .get("background")
        .map_or(Ok(Background::default()), Background::from_json)?;

    let mut ctx = BuildContext::new(resolver);

    if let Some(materials) = j.get("materials") {
        let entries = materials.as_array().ok_or_else(|| {
            SceneError::invalid("materials", "expected an array of materials", materials)
        })?;
        for entry in entries {
            let name = jv::require_str(entry, "name")?;
            let material = registry.materials.create(entry, registry, &mut ctx)?;
            ctx.add_material(name, material)?;
        }
    }

    let default_accelerator = json!({"type": "group"});
    let accelerator_json = j.get("accelerator").unwrap_or(&default_accelerator);
    let mut accelerator = registry.accelerators.create(accelerator_json, registry, &mut ctx)?;

    if let Some(surfaces) = j.get("surfaces") {
        add_surfaces(accelerator.as_mut(), surfaces, registry, &mut ctx)?;
    }
    let surface_count = accelerator.len();
    let root = accelerator.build();

    log::info!(
        "Scene built with {} top-level surfaces in {:.2?}",
        surface_count,
        start.elapsed()
    );

    let config = RenderConfig {
        samples_per_pixel: sampler.samples.max(1),
        max_depth: integrator.max_depth,
        ..RenderConfig::default()
    };
    Ok(Scene::new(camera, root, background, config))
}
