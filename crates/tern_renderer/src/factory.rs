//! Construct-by-name registry for scene objects.
//!
//! Every material, surface and accelerator type is registered under a name
//! at startup. Scene descriptions then select a type with their `"type"`
//! field.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tern_core::{json, FileResolver, Mesh, SceneError, SceneResult};

use crate::bvh::BvhBuilder;
use crate::material::{Dielectric, DiffuseLight, Lambertian, Material, Metal};
use crate::mesh::TriangleMesh;
use crate::quad::Quad;
use crate::scene_test::{IntersectionTest, ScatterTest, SceneTest};
use crate::sphere::Sphere;
use crate::surface::{Accelerator, Surface};
use crate::surface_group::SurfaceGroup;
use crate::triangle::Triangle;

type Constructor<T> =
    Box<dyn Fn(&Value, &Registry, &mut BuildContext) -> SceneResult<T> + Send + Sync>;

/// Table of named constructors for one kind of object.
pub struct Factory<T> {
    kind: &'static str,
    constructors: HashMap<String, Constructor<T>>,
}

impl<T> Factory<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            constructors: HashMap::new(),
        }
    }

    /// Register a constructor. Fails if `name` is already taken.
    pub fn register<F>(&mut self, name: &str, constructor: F) -> SceneResult<()>
    where
        F: Fn(&Value, &Registry, &mut BuildContext) -> SceneResult<T> + Send + Sync + 'static,
    {
        if self.constructors.contains_key(name) {
            return Err(SceneError::DuplicateType {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.constructors.insert(name.to_string(), Box::new(constructor));
        Ok(())
    }

    /// Build an object from `j`, dispatching on its `"type"` field.
    pub fn create(&self, j: &Value, registry: &Registry, ctx: &mut BuildContext) -> SceneResult<T> {
        let type_name = json::require_str(j, "type")?;
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| SceneError::unknown_type(self.kind, type_name, j))?;
        constructor(j, registry, ctx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Surfaces produced by one scene entry. A mesh yields one per triangle.
pub type Surfaces = Vec<Arc<dyn Surface>>;

/// The factories for every kind of scene object.
pub struct Registry {
    pub materials: Factory<Arc<dyn Material>>,
    pub surfaces: Factory<Surfaces>,
    pub accelerators: Factory<Box<dyn Accelerator>>,
    pub tests: Factory<Box<dyn SceneTest>>,
}

impl Registry {
    /// A registry with no types registered.
    pub fn new() -> Self {
        Self {
            materials: Factory::new("material"),
            surfaces: Factory::new("surface"),
            accelerators: Factory::new("accelerator"),
            tests: Factory::new("test"),
        }
    }

    /// A registry holding every built-in type.
    pub fn with_builtins() -> SceneResult<Self> {
        let mut registry = Self::new();
        registry.register_materials()?;
        registry.register_surfaces()?;
        registry.register_accelerators()?;
        registry.register_tests()?;
        Ok(registry)
    }

    fn register_materials(&mut self) -> SceneResult<()> {
        let m = &mut self.materials;
        m.register("lambertian", |j, _, _| {
            Ok(Arc::new(Lambertian::from_json(j)?) as Arc<dyn Material>)
        })?;
        m.register("metal", |j, _, _| {
            Ok(Arc::new(Metal::from_json(j)?) as Arc<dyn Material>)
        })?;
        m.register("dielectric", |j, _, _| {
            Ok(Arc::new(Dielectric::from_json(j)?) as Arc<dyn Material>)
        })?;
        m.register("diffuse_light", |j, _, _| {
            Ok(Arc::new(DiffuseLight::from_json(j)?) as Arc<dyn Material>)
        })
    }

    fn register_surfaces(&mut self) -> SceneResult<()> {
        let s = &mut self.surfaces;
        s.register("sphere", |j, registry, ctx| {
            let material = ctx.find_material(registry, j)?;
            Ok(vec![Arc::new(Sphere::from_json(j, material)?) as Arc<dyn Surface>])
        })?;
        s.register("quad", |j, registry, ctx| {
            let material = ctx.find_material(registry, j)?;
            Ok(vec![Arc::new(Quad::from_json(j, material)?) as Arc<dyn Surface>])
        })?;
        s.register("triangle", |j, registry, ctx| {
            let material = ctx.find_material(registry, j)?;
            Ok(vec![Arc::new(Triangle::from_json(j, material)?) as Arc<dyn Surface>])
        })?;
        s.register("mesh", build_mesh)?;
        for name in ["group", "bvh", "bbh"] {
            s.register(name, |j, registry, ctx| {
                let mut accelerator = registry.accelerators.create(j, registry, ctx)?;
                if let Some(children) = j.get("children") {
                    add_surfaces(accelerator.as_mut(), children, registry, ctx)?;
                }
                Ok(vec![accelerator.build()])
            })?;
        }
        Ok(())
    }

    fn register_accelerators(&mut self) -> SceneResult<()> {
        let a = &mut self.accelerators;
        a.register("group", |j, _, _| {
            Ok(Box::new(SurfaceGroup::from_json(j)?) as Box<dyn Accelerator>)
        })?;
        for name in ["bvh", "bbh"] {
            a.register(name, |j, _, _| {
                Ok(Box::new(BvhBuilder::from_json(j)?) as Box<dyn Accelerator>)
            })?;
        }
        Ok(())
    }

    fn register_tests(&mut self) -> SceneResult<()> {
        let t = &mut self.tests;
        t.register("intersection", |j, registry, ctx| {
            Ok(Box::new(IntersectionTest::from_json(j, registry, ctx)?) as Box<dyn SceneTest>)
        })?;
        t.register("scatter material", |j, registry, ctx| {
            Ok(Box::new(ScatterTest::from_json(j, registry, ctx)?) as Box<dyn SceneTest>)
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Load an OBJ file and split it into triangles.
fn build_mesh(j: &Value, registry: &Registry, ctx: &mut BuildContext) -> SceneResult<Surfaces> {
    let filename = json::require_str(j, "filename")?;
    let path = ctx.resolver().resolve(filename)?;
    let xform = json::transform_or_identity(j, "transform")?;
    let material = ctx.find_material(registry, j)?;
    let prefix = json::str_or(j, "material prefix", "")?;

    let mesh = Mesh::load_obj(&path, &xform)?;
    let mesh = TriangleMesh::with_named_materials(mesh, material, |name| {
        ctx.material(&format!("{prefix}{name}"))
    });

    Ok(Arc::new(mesh).triangles())
}

/// Build every entry of the `surfaces` array and add it to `accelerator`.
pub fn add_surfaces(
    accelerator: &mut dyn Accelerator,
    surfaces: &Value,
    registry: &Registry,
    ctx: &mut BuildContext,
) -> SceneResult<()> {
    let entries = surfaces
        .as_array()
        .ok_or_else(|| SceneError::invalid("surfaces", "expected an array of surfaces", surfaces))?;

    for entry in entries {
        for surface in registry.surfaces.create(entry, registry, ctx)? {
            accelerator.add_child(surface);
        }
    }
    Ok(())
}

/// State shared while one scene is being built.
#[derive(Default)]
pub struct BuildContext {
    materials: HashMap<String, Arc<dyn Material>>,
    resolver: FileResolver,
}

impl BuildContext {
    pub fn new(resolver: FileResolver) -> Self {
        Self {
            materials: HashMap::new(),
            resolver,
        }
    }

    pub fn resolver(&self) -> &FileResolver {
        &self.resolver
    }

    /// Make a material available by name to later scene entries.
    pub fn add_material(&mut self, name: &str, material: Arc<dyn Material>) -> SceneResult<()> {
        if self.materials.contains_key(name) {
            return Err(SceneError::DuplicateMaterial(name.to_string()));
        }
        self.materials.insert(name.to_string(), material);
        Ok(())
    }

    pub fn material(&self, name: &str) -> Option<Arc<dyn Material>> {
        self.materials.get(name).cloned()
    }

    /// Resolve the `"material"` field of `j`: either the name of a
    /// registered material or an inline material description.
    pub fn find_material(&mut self, registry: &Registry, j: &Value) -> SceneResult<Arc<dyn Material>> {
        match json::require(j, "material")? {
            Value::String(name) => self
                .material(name)
                .ok_or_else(|| SceneError::UnknownMaterial(name.clone())),
            inline @ Value::Object(_) => registry.materials.create(inline, registry, self),
            other => Err(SceneError::invalid(
                "material",
                "expected a material name or a material object",
                other,
            )),
        }
    }
}
