//! Mesh surfaces: shared triangle data plus the materials its faces use.

use std::collections::HashMap;
use std::sync::Arc;

use tern_core::Mesh;

use crate::material::Material;
use crate::surface::Surface;
use crate::triangle::Triangle;

/// Immutable mesh data shared by all of its triangles.
pub struct TriangleMesh {
    mesh: Mesh,
    /// Slot 0 is the mesh's default material.
    materials: Vec<Arc<dyn Material>>,
    /// Material slot per face
    face_material: Vec<u32>,
}

impl TriangleMesh {
    /// Wrap `mesh` with a single material for every face.
    pub fn new(mesh: Mesh, material: Arc<dyn Material>) -> Self {
        let face_material = vec![0; mesh.triangle_count()];
        Self {
            mesh,
            materials: vec![material],
            face_material,
        }
    }

    /// Wrap `mesh`, resolving the per-face material names it carries.
    ///
    /// `lookup` receives the mesh's material names. Faces whose name
    /// cannot be resolved use `default`.
    pub fn with_named_materials<F>(mesh: Mesh, default: Arc<dyn Material>, mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<Arc<dyn Material>>,
    {
        let mut materials = vec![default];
        let mut slots: HashMap<u32, u32> = HashMap::new();

        for (name_slot, name) in mesh.material_names.iter().enumerate() {
            match lookup(name) {
                Some(material) => {
                    slots.insert(name_slot as u32, materials.len() as u32);
                    materials.push(material);
                }
                None => log::warn!(
                    "Mesh material '{}' not found, using the mesh material instead",
                    name
                ),
            }
        }

        let face_material = mesh
            .face_materials
            .iter()
            .map(|slot| slot.and_then(|s| slots.get(&s).copied()).unwrap_or(0))
            .collect();

        Self {
            mesh,
            materials,
            face_material,
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    /// Material for triangle `face`.
    #[inline]
    pub fn material(&self, face: usize) -> &dyn Material {
        let slot = self.face_material.get(face).copied().unwrap_or(0) as usize;
        self.materials[slot].as_ref()
    }

    /// One independent surface per face.
    pub fn triangles(self: &Arc<Self>) -> Vec<Arc<dyn Surface>> {
        (0..self.triangle_count())
            .map(|face| Arc::new(Triangle::new(Arc::clone(self), face)) as Arc<dyn Surface>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{DiffuseLight, Lambertian};
    use crate::surface::HitInfo;
    use tern_math::{Ray, Vec3};

    fn two_quads_mesh() -> Mesh {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = Mesh::new(positions, vec![0, 1, 2, 0, 2, 3], None);
        mesh.material_names = vec!["red".to_string(), "missing".to_string()];
        mesh.face_materials = vec![Some(0), Some(1)];
        mesh
    }

    #[test]
    fn test_mesh_decomposes_into_triangles() {
        let mesh = Arc::new(TriangleMesh::new(
            two_quads_mesh(),
            Arc::new(Lambertian::new(Vec3::ONE)),
        ));
        let tris = mesh.triangles();
        assert_eq!(tris.len(), 2);

        // Both triangles share the mesh data.
        assert_eq!(Arc::strong_count(&mesh), 3);
    }

    #[test]
    fn test_mesh_named_materials_fallback() {
        let light: Arc<dyn Material> = Arc::new(DiffuseLight::new(Vec3::splat(4.0)));
        let default: Arc<dyn Material> = Arc::new(Lambertian::new(Vec3::splat(0.5)));

        let mesh = TriangleMesh::with_named_materials(two_quads_mesh(), default, |name| {
            (name == "red").then(|| Arc::clone(&light))
        });

        assert_eq!(mesh.materials.len(), 2);
        assert_eq!(mesh.face_material, vec![1, 0]);

        let mesh = Arc::new(mesh);
        let tris = mesh.triangles();
        let ray = Ray::new(Vec3::new(0.75, 0.25, 1.0), -Vec3::Z);
        let mut hit = HitInfo::default();
        assert!(tris[0].intersect(&ray, &mut hit));
        let emitted = hit.material.emitted(&ray, &hit);
        assert_eq!(emitted, Vec3::splat(4.0));

        let ray = Ray::new(Vec3::new(0.25, 0.75, 1.0), -Vec3::Z);
        assert!(tris[1].intersect(&ray, &mut hit));
        assert_eq!(hit.material.emitted(&ray, &hit), Vec3::ZERO);
    }
}
