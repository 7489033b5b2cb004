//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.
//! Triangles reference shared mesh data that is already in world space.

use std::sync::Arc;

use serde_json::Value;
use tern_core::{json, Mesh, SceneResult};
use tern_math::{Aabb, Ray, Vec2, Vec3};

use crate::material::Material;
use crate::mesh::TriangleMesh;
use crate::stats::{self, Counter};
use crate::surface::{HitInfo, Surface};

/// Thickness added to flat bounding boxes.
pub const TRIANGLE_BOUNDS_EPSILON: f32 = 1e-4;

/// Determinants below this fraction of `|edge1| * |d x edge2|` count as
/// parallel. Relative, so tiny triangles and scaled rays still hit.
const PARALLEL_EPSILON: f32 = 1e-6;

/// One face of a [`TriangleMesh`].
pub struct Triangle {
    mesh: Arc<TriangleMesh>,
    face: usize,
    bbox: Aabb,
}

impl Triangle {
    pub fn new(mesh: Arc<TriangleMesh>, face: usize) -> Self {
        let bbox = Aabb::from_point_iter(mesh.mesh().triangle_positions(face))
            .pad_to_minimums(TRIANGLE_BOUNDS_EPSILON);
        Self { mesh, face, bbox }
    }

    /// A standalone triangle backed by its own one-face mesh.
    pub fn from_json(j: &Value, material: Arc<dyn Material>) -> SceneResult<Self> {
        let xform = json::transform_or_identity(j, "transform")?;
        let positions = json::vec3_array::<3>(json::require(j, "positions")?, "positions")?;
        let normals = j
            .get("normals")
            .map(|n| json::vec3_array::<3>(n, "normals"))
            .transpose()?;
        let uvs = j
            .get("uvs")
            .map(|uv| json::vec2_array::<3>(uv, "uvs"))
            .transpose()?;

        let mut mesh = Mesh::from_triangle(positions, normals, uvs);
        mesh.transform(&xform);

        Ok(Self::new(Arc::new(TriangleMesh::new(mesh, material)), 0))
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        self.mesh.mesh().triangle_positions(self.face)
    }
}

impl Surface for Triangle {
    /// Möller-Trumbore, accepting hits from either side.
    fn intersect<'a>(&'a self, ray: &Ray, hit: &mut HitInfo<'a>) -> bool {
        stats::increment(Counter::TriangleTests);

        let [v0, v1, v2] = self.vertices();
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to the triangle, or the triangle is degenerate
        if a.abs() <= PARALLEL_EPSILON * edge1.length() * h.length() {
            return false;
        }

        let f = 1.0 / a;
        if !f.is_finite() {
            return false;
        }
        let s = ray.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return false;
        }

        let t = f * edge2.dot(q);
        if !ray.segment().contains(t) {
            return false;
        }

        let Some(gn) = edge1.cross(edge2).try_normalize() else {
            return false;
        };
        let mesh = self.mesh.mesh();
        let w = 1.0 - u - v;

        let sn = mesh
            .triangle_normals(self.face)
            .map(|[n0, n1, n2]| (w * n0 + u * n1 + v * n2).normalize_or_zero())
            .filter(|n| *n != Vec3::ZERO)
            .unwrap_or(gn);

        let uv = mesh
            .triangle_uvs(self.face)
            .map(|[t0, t1, t2]| w * t0 + u * t1 + v * t2)
            .unwrap_or(Vec2::new(u, v));

        hit.t = t;
        hit.p = ray.at(t);
        hit.gn = gn;
        hit.sn = sn;
        hit.uv = uv;
        hit.material = self.mesh.material(self.face);

        stats::increment(Counter::TriangleHits);
        true
    }

    fn bounds(&self) -> Aabb {
        self.bbox
    }
}
