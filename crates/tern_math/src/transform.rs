// Affine/projective transforms for ray tracing.
//
// A `Transform` carries its forward matrix and the inverse together so
// surfaces can move rays into their local frame without re-inverting.

use std::ops::Mul;

use glam::{Mat4, Vec3, Vec4};

use crate::{Aabb, Ray};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Inverse, or `None` if the matrix is singular or non-finite.
    fn checked_inverse(&self) -> Option<Mat4>;

    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn checked_inverse(&self) -> Option<Mat4> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = self.inverse();
        inv.is_finite().then_some(inv)
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        let lo = aabb.min();
        let hi = aabb.max();

        let mut result = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            result.enclose_point(self.project_point3(corner));
        }
        result
    }
}

/// A 4x4 homogeneous transform together with its inverse.
///
/// Every constructor keeps `m_inv == m.inverse()`. Composition multiplies
/// forward matrices left to right and inverses right to left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    m: Mat4,
    m_inv: Mat4,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        m: Mat4::IDENTITY,
        m_inv: Mat4::IDENTITY,
    };

    /// Build from a forward matrix. Returns `None` for singular matrices.
    pub fn new(m: Mat4) -> Option<Self> {
        m.checked_inverse().map(|m_inv| Self { m, m_inv })
    }

    /// Build from a matrix and its known inverse. The caller guarantees they match.
    pub fn from_parts(m: Mat4, m_inv: Mat4) -> Self {
        Self { m, m_inv }
    }

    pub fn translate(offset: Vec3) -> Self {
        Self::from_parts(Mat4::from_translation(offset), Mat4::from_translation(-offset))
    }

    /// Non-uniform scale. Zero components make the transform singular, so
    /// callers building from user data should go through [`Transform::new`].
    pub fn scale(factors: Vec3) -> Self {
        Self::from_parts(Mat4::from_scale(factors), Mat4::from_scale(factors.recip()))
    }

    /// Rotation by `degrees` around `axis` (normalized here).
    pub fn rotate(degrees: f32, axis: Vec3) -> Self {
        let m = Mat4::from_axis_angle(axis.normalize(), degrees.to_radians());
        Self::from_parts(m, m.transpose())
    }

    /// Frame whose columns are the given axes and origin.
    pub fn axis_offset(x: Vec3, y: Vec3, z: Vec3, o: Vec3) -> Option<Self> {
        Self::new(Mat4::from_cols(
            x.extend(0.0),
            y.extend(0.0),
            z.extend(0.0),
            o.extend(1.0),
        ))
    }

    /// Camera-style frame at `from`, whose local -z axis points at `at`.
    pub fn look_at(from: Vec3, at: Vec3, up: Vec3) -> Option<Self> {
        let dir = (from - at).normalize();
        let left = up.cross(dir).normalize();
        let new_up = dir.cross(left);
        Self::axis_offset(left, new_up, dir, from)
    }

    pub fn matrix(&self) -> &Mat4 {
        &self.m
    }

    pub fn inverse_matrix(&self) -> &Mat4 {
        &self.m_inv
    }

    /// The inverse transform (swaps the two matrices).
    pub fn inverse(&self) -> Self {
        Self {
            m: self.m_inv,
            m_inv: self.m,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.m == Mat4::IDENTITY
    }

    /// Transform a point (w = 1), dividing by the resulting w.
    #[inline]
    pub fn point(&self, p: Vec3) -> Vec3 {
        self.m.project_point3(p)
    }

    /// Transform a direction (w = 0), ignoring translation.
    #[inline]
    pub fn vector(&self, v: Vec3) -> Vec3 {
        self.m.transform_vector3(v)
    }

    /// Transform a normal by the inverse transpose and renormalize.
    #[inline]
    pub fn normal(&self, n: Vec3) -> Vec3 {
        let n = self.m_inv.transpose() * Vec4::new(n.x, n.y, n.z, 0.0);
        n.truncate().normalize()
    }

    /// Transform a ray. The segment `[mint, maxt]` is kept unchanged.
    #[inline]
    pub fn ray(&self, r: &Ray) -> Ray {
        Ray::with_segment(self.point(r.origin), self.vector(r.direction), r.mint, r.maxt)
    }

    /// Move a ray into this transform's local frame (applies the inverse).
    #[inline]
    pub fn inverse_ray(&self, r: &Ray) -> Ray {
        Ray::with_segment(
            self.m_inv.project_point3(r.origin),
            self.m_inv.transform_vector3(r.direction),
            r.mint,
            r.maxt,
        )
    }

    /// Bounds of the transformed box. Empty boxes map to themselves.
    pub fn aabb(&self, b: &Aabb) -> Aabb {
        if b.is_empty() {
            return *b;
        }
        self.m.transform_aabb(b)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        &self * &rhs
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        Transform {
            m: self.m * rhs.m,
            m_inv: rhs.m_inv * self.m_inv,
        }
    }
}
