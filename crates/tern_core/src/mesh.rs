//! Triangle mesh data shared by every triangle of a mesh surface.
//!
//! Meshes are stored in world space: the owning transform is applied to
//! positions and normals once at load time, so triangles never transform
//! rays.

use std::path::Path;

use tern_math::{Aabb, Transform, Vec2, Vec3};

use crate::error::{SceneError, SceneResult};

/// An indexed triangle mesh with optional per-vertex normals and UVs.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals, same length as `positions` when present
    pub normals: Option<Vec<Vec3>>,

    /// UV coordinates, same length as `positions` when present
    pub uvs: Option<Vec<Vec2>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Material slot per triangle, indexing `material_names`.
    /// `None` means the mesh's default material.
    pub face_materials: Vec<Option<u32>>,

    /// Material names referenced by `face_materials`
    pub material_names: Vec<String>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    ///
    /// Triangles referencing vertices out of range are dropped with a warning.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let indices = Self::valid_indices(indices, positions.len());
        let bounds = Self::compute_bounds(&positions);
        let face_materials = vec![None; indices.len() / 3];
        Self {
            positions,
            normals,
            uvs: None,
            indices,
            face_materials,
            material_names: Vec::new(),
            bounds,
        }
    }

    /// Attach per-vertex UV coordinates.
    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// A mesh holding a single triangle.
    pub fn from_triangle(
        positions: [Vec3; 3],
        normals: Option<[Vec3; 3]>,
        uvs: Option<[Vec2; 3]>,
    ) -> Self {
        let mesh = Self::new(positions.to_vec(), vec![0, 1, 2], normals.map(|n| n.to_vec()));
        match uvs {
            Some(uvs) => mesh.with_uvs(uvs.to_vec()),
            None => mesh,
        }
    }

    /// Load a Wavefront OBJ file and move it into world space with `xform`.
    ///
    /// Polygons are triangulated and all objects in the file are merged.
    /// A missing or broken material library is tolerated; faces then use
    /// the default material.
    pub fn load_obj(path: impl AsRef<Path>, xform: &Transform) -> SceneResult<Self> {
        let path = path.as_ref();
        log::info!("Loading OBJ file {}", path.display());

        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )
        .map_err(|source| SceneError::Obj {
            path: path.to_path_buf(),
            source,
        })?;

        let material_names = match materials {
            Ok(materials) => materials.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                log::debug!("No material library for {}: {}", path.display(), e);
                Vec::new()
            }
        };

        let mut mesh = Self::from_models(&models, material_names);
        if mesh.triangle_count() == 0 {
            return Err(SceneError::EmptyMesh(path.to_path_buf()));
        }
        mesh.transform(xform);

        log::info!(
            "Loaded {}: {} vertices, {} triangles, normals: {}, uvs: {}",
            path.display(),
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.has_normals(),
            mesh.has_uvs()
        );
        Ok(mesh)
    }

    fn from_models(models: &[tobj::Model], material_names: Vec<String>) -> Self {
        // Attributes are only kept when every object provides them.
        let has_normals = models
            .iter()
            .all(|m| m.mesh.normals.len() == m.mesh.positions.len());
        let has_uvs = models
            .iter()
            .all(|m| m.mesh.texcoords.len() / 2 == m.mesh.positions.len() / 3);

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut uvs = Vec::new();
        let mut indices = Vec::new();
        let mut face_materials = Vec::new();

        for model in models {
            let m = &model.mesh;
            let offset = positions.len() as u32;

            positions.extend(m.positions.chunks_exact(3).map(|p| Vec3::new(p[0], p[1], p[2])));
            if has_normals {
                normals.extend(m.normals.chunks_exact(3).map(|n| Vec3::new(n[0], n[1], n[2])));
            }
            if has_uvs {
                uvs.extend(m.texcoords.chunks_exact(2).map(|t| Vec2::new(t[0], t[1])));
            }

            let slot = m
                .material_id
                .filter(|&id| id < material_names.len())
                .map(|id| id as u32);
            indices.extend(m.indices.iter().map(|&i| i + offset));
            face_materials.extend(std::iter::repeat(slot).take(m.indices.len() / 3));
        }

        let mut mesh = Self::new(positions, indices, has_normals.then_some(normals));
        if has_uvs {
            mesh.uvs = Some(uvs);
        }
        // `new` may have dropped invalid triangles; only keep slots if still aligned.
        if face_materials.len() == mesh.triangle_count() {
            mesh.face_materials = face_materials;
        }
        mesh.material_names = material_names;
        mesh
    }

    fn valid_indices(indices: Vec<u32>, vertex_count: usize) -> Vec<u32> {
        if indices.iter().all(|&i| (i as usize) < vertex_count) && indices.len() % 3 == 0 {
            return indices;
        }

        let mut valid = Vec::with_capacity(indices.len());
        for chunk in indices.chunks(3) {
            if chunk.len() < 3 {
                continue;
            }
            if chunk.iter().any(|&i| i as usize >= vertex_count) {
                log::warn!(
                    "Invalid triangle indices: [{}, {}, {}], vertex count: {}",
                    chunk[0],
                    chunk[1],
                    chunk[2],
                    vertex_count
                );
                continue;
            }
            valid.extend_from_slice(chunk);
        }
        valid
    }

    /// Compute axis-aligned bounding box from positions.
    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        Aabb::from_point_iter(positions.iter().copied())
    }

    /// Move positions and normals into another frame.
    pub fn transform(&mut self, xform: &Transform) {
        if xform.is_identity() {
            return;
        }
        for p in &mut self.positions {
            *p = xform.point(*p);
        }
        if let Some(normals) = &mut self.normals {
            for n in normals.iter_mut() {
                *n = xform.normal(*n);
            }
        }
        self.bounds = Self::compute_bounds(&self.positions);
    }

    /// Compute smooth vertex normals by averaging area-weighted face normals.
    ///
    /// Face normals follow counter-clockwise winding, `(p1 - p0) x (p2 - p0)`.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];

        for face in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            // Default up normal for degenerate cases
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        self.normals = Some(normals);
    }

    /// Check if the mesh has normals.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Check if the mesh has UV coordinates.
    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Vertex indices of triangle `face`.
    #[inline]
    pub fn triangle(&self, face: usize) -> [usize; 3] {
        let i = 3 * face;
        [
            self.indices[i] as usize,
            self.indices[i + 1] as usize,
            self.indices[i + 2] as usize,
        ]
    }

    #[inline]
    pub fn triangle_positions(&self, face: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangle(face);
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    pub fn triangle_normals(&self, face: usize) -> Option<[Vec3; 3]> {
        let normals = self.normals.as_ref()?;
        let [a, b, c] = self.triangle(face);
        Some([normals[a], normals[b], normals[c]])
    }

    pub fn triangle_uvs(&self, face: usize) -> Option<[Vec2; 3]> {
        let uvs = self.uvs.as_ref()?;
        let [a, b, c] = self.triangle(face);
        Some([uvs[a], uvs[b], uvs[c]])
    }

    /// Name of the material assigned to triangle `face`, if any.
    pub fn material_name(&self, face: usize) -> Option<&str> {
        let slot = self.face_materials.get(face).copied().flatten()?;
        self.material_names.get(slot as usize).map(String::as_str)
    }
}
