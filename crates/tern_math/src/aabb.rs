use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box, one interval per axis.
///
/// A box is empty when any axis interval is empty. `Aabb::EMPTY` is the
/// identity for `enclose`, so bounds can be accumulated starting from it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create a new AABB from three intervals.
    pub const fn new(x: Interval, y: Interval, z: Interval) -> Self {
        Self { x, y, z }
    }

    /// Create an AABB from two corner points, in any order.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::from_min_max(min, max)
    }

    /// Create an AABB from its min and max corners as given. Does not reorder,
    /// so `min > max` on an axis yields an empty box.
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            x: Interval::new(min.x, max.x),
            y: Interval::new(min.y, max.y),
            z: Interval::new(min.z, max.z),
        }
    }

    /// Smallest box containing every point of the iterator.
    pub fn from_point_iter<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.enclose_point(p);
        }
        aabb
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// True if any axis has min > max.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// Grow the box to contain `p`.
    pub fn enclose_point(&mut self, p: Vec3) {
        self.x.enclose(p.x);
        self.y.enclose(p.y);
        self.z.enclose(p.z);
    }

    /// Grow the box to contain `other`. Enclosing an empty box is a no-op.
    pub fn enclose(&mut self, other: &Aabb) {
        *self = Aabb::surrounding(self, other);
    }

    /// Point containment. `proper` excludes the boundary.
    pub fn contains(&self, p: Vec3, proper: bool) -> bool {
        if proper {
            self.x.surrounds(p.x) && self.y.surrounds(p.y) && self.z.surrounds(p.z)
        } else {
            self.x.contains(p.x) && self.y.contains(p.y) && self.z.contains(p.z)
        }
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Test if the ray's `[mint, maxt]` segment overlaps this box.
    pub fn intersect(&self, ray: &Ray) -> bool {
        self.intersect_segment(ray).is_some()
    }

    /// Slab test. Returns the part of the ray segment inside the box.
    ///
    /// Zero direction components produce infinite slab distances; `f32::max`
    /// and `f32::min` discard the NaN that appears when the origin also lies
    /// on the slab plane.
    pub fn intersect_segment(&self, ray: &Ray) -> Option<Interval> {
        let mut ray_t = ray.segment();

        for axis in 0..3 {
            let slab = self.axis_interval(axis);
            let adinv = 1.0 / ray.direction[axis];
            let mut t0 = (slab.min - ray.origin[axis]) * adinv;
            let mut t1 = (slab.max - ray.origin[axis]) * adinv;
            if adinv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            ray_t.min = t0.max(ray_t.min);
            ray_t.max = t1.min(ray_t.max);
            if ray_t.min > ray_t.max {
                return None;
            }
        }

        Some(ray_t)
    }

    /// Expand every axis thinner than `delta` to exactly `delta` more width
    /// (`delta / 2` on each side).
    pub fn pad_to_minimums(&self, delta: f32) -> Aabb {
        let pad = |i: Interval| if i.size() < delta { i.expand(delta) } else { i };
        Aabb::new(pad(self.x), pad(self.y), pad(self.z))
    }

    /// Translate (move) the AABB by an offset vector.
    pub fn translate(&self, offset: Vec3) -> Aabb {
        Aabb::new(
            self.x.add_scalar(offset.x),
            self.y.add_scalar(offset.y),
            self.z.add_scalar(offset.z),
        )
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let x_size = self.x.size();
        let y_size = self.y.size();
        let z_size = self.z.size();

        if x_size > y_size && x_size > z_size {
            0
        } else if y_size > z_size {
            1
        } else {
            2
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    pub fn diagonal(&self) -> Vec3 {
        self.max() - self.min()
    }

    /// Surface area, zero for empty boxes.
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn volume(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.diagonal();
        d.x * d.y * d.z
    }

    /// Static constants
    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    pub const UNIVERSE: Aabb = Aabb {
        x: Interval::UNIVERSE,
        y: Interval::UNIVERSE,
        z: Interval::UNIVERSE,
    };
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}
