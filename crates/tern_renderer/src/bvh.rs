//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Surfaces are collected by a [`BvhBuilder`] and frozen into a [`Bvh`].
//! Construction recurses (in parallel for large subtrees); traversal uses a
//! fixed-size explicit stack.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tern_core::{json, SceneResult};
use tern_math::{Aabb, Ray, Transform, Vec3};

use crate::stats::{self, Counter};
use crate::surface::{Accelerator, HitInfo, Surface};

/// Maximum tree depth. Nodes at the last level become leaves regardless of
/// their size, which bounds the traversal stack.
pub const MAX_DEPTH: usize = 64;

/// Default maximum primitives per leaf node.
pub const DEFAULT_MAX_LEAF_SIZE: usize = 4;

/// Subtrees with more surfaces than this are built on the rayon pool.
const PARALLEL_THRESHOLD: usize = 4096;

const SAH_BINS: usize = 12;
const SAH_TRAVERSAL_COST: f32 = 0.125;

/// How a node's surfaces are divided between its two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMethod {
    /// Split at the midpoint of the centroid bounds.
    Middle,
    /// Split so both children hold the same number of surfaces.
    #[default]
    Equal,
    /// Surface area heuristic over binned centroids.
    Sah,
}

impl SplitMethod {
    /// Parse a split method name. Unknown names fall back to `Equal`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "middle" => SplitMethod::Middle,
            "equal" => SplitMethod::Equal,
            "sah" => SplitMethod::Sah,
            other => {
                log::error!(
                    "'split_method' must be one of 'middle', 'equal' or 'sah', got '{}'. Using 'equal'",
                    other
                );
                SplitMethod::Equal
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvhConfig {
    pub split_method: SplitMethod,
    pub max_leaf_size: usize,
}

impl Default for BvhConfig {
    fn default() -> Self {
        Self {
            split_method: SplitMethod::default(),
            max_leaf_size: DEFAULT_MAX_LEAF_SIZE,
        }
    }
}

impl BvhConfig {
    pub fn from_json(j: &Value) -> SceneResult<Self> {
        let split_method = SplitMethod::parse(json::str_or(j, "split_method", "equal")?);
        let max_leaf_size = json::u32_or(j, "max_leaf_size", DEFAULT_MAX_LEAF_SIZE as u32)?.max(1);
        Ok(Self {
            split_method,
            max_leaf_size: max_leaf_size as usize,
        })
    }
}

/// BVH node - either a branch with two children or a leaf with primitives.
pub enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf node with a small number of primitives.
    Leaf {
        surfaces: Vec<Arc<dyn Surface>>,
        bbox: Aabb,
    },
}

impl BvhNode {
    #[inline]
    pub fn bbox(&self) -> &Aabb {
        match self {
            BvhNode::Branch { bbox, .. } | BvhNode::Leaf { bbox, .. } => bbox,
        }
    }

    /// Node count, leaf count and depth of this subtree.
    fn shape(&self) -> (usize, usize, usize) {
        match self {
            BvhNode::Leaf { .. } => (1, 1, 1),
            BvhNode::Branch { left, right, .. } => {
                let (ln, ll, ld) = left.shape();
                let (rn, rl, rd) = right.shape();
                (ln + rn + 1, ll + rl, ld.max(rd) + 1)
            }
        }
    }
}

/// A surface with its bounds cached for partitioning.
struct BuildItem {
    surface: Arc<dyn Surface>,
    bounds: Aabb,
    centroid: Vec3,
}

impl BuildItem {
    fn new(surface: Arc<dyn Surface>) -> Self {
        let bounds = surface.bounds();
        Self {
            surface,
            bounds,
            centroid: bounds.centroid(),
        }
    }
}

/// The unbuilt state of a BVH: collects children, then builds once.
pub struct BvhBuilder {
    xform: Transform,
    config: BvhConfig,
    surfaces: Vec<Arc<dyn Surface>>,
}

impl BvhBuilder {
    pub fn new(xform: Transform, config: BvhConfig) -> Self {
        Self {
            xform,
            config,
            surfaces: Vec::new(),
        }
    }

    pub fn from_json(j: &Value) -> SceneResult<Self> {
        Ok(Self::new(
            json::transform_or_identity(j, "transform")?,
            BvhConfig::from_json(j)?,
        ))
    }

    pub fn config(&self) -> &BvhConfig {
        &self.config
    }

    /// Partition the collected surfaces into a tree.
    pub fn finish(self) -> Bvh {
        let start = Instant::now();
        let len = self.surfaces.len();

        let mut items: Vec<BuildItem> = self.surfaces.into_iter().map(BuildItem::new).collect();
        let root = if items.is_empty() {
            None
        } else {
            Some(build_node(&mut items, &self.config, 0))
        };

        let local_bounds = root.as_ref().map_or(Aabb::EMPTY, |r| *r.bbox());
        let (nodes, leaves, depth) = root.as_ref().map_or((0, 0, 0), BvhNode::shape);

        log::info!(
            "BVH built over {} surfaces ({:?} split): {} nodes, {} leaves, depth {} in {:.2?}",
            len,
            self.config.split_method,
            nodes,
            leaves,
            depth,
            start.elapsed()
        );

        Bvh {
            bounds: self.xform.aabb(&local_bounds),
            xform: self.xform,
            root,
            len,
            nodes,
            leaves,
            depth,
        }
    }
}

impl Default for BvhBuilder {
    fn default() -> Self {
        Self::new(Transform::IDENTITY, BvhConfig::default())
    }
}

impl Accelerator for BvhBuilder {
    fn add_child(&mut self, surface: Arc<dyn Surface>) {
        self.surfaces.push(surface);
    }

    fn len(&self) -> usize {
        self.surfaces.len()
    }

    fn build(self: Box<Self>) -> Arc<dyn Surface> {
        Arc::new(self.finish())
    }
}

fn build_node(items: &mut [BuildItem], config: &BvhConfig, depth: usize) -> BvhNode {
    let bbox = items
        .iter()
        .fold(Aabb::EMPTY, |acc, item| Aabb::surrounding(&acc, &item.bounds));

    if items.len() <= config.max_leaf_size || depth + 1 >= MAX_DEPTH {
        return BvhNode::Leaf {
            surfaces: items.iter().map(|item| Arc::clone(&item.surface)).collect(),
            bbox,
        };
    }

    let centroid_bounds = Aabb::from_point_iter(items.iter().map(|item| item.centroid));
    let axis = centroid_bounds.longest_axis();

    let mid = if centroid_bounds.axis_interval(axis).size() <= 0.0 {
        split_equal(items, axis)
    } else {
        match config.split_method {
            SplitMethod::Middle => split_middle(items, axis, &centroid_bounds),
            SplitMethod::Equal => split_equal(items, axis),
            SplitMethod::Sah => split_sah(items, axis, &centroid_bounds, &bbox),
        }
    };

    let (left_items, right_items) = items.split_at_mut(mid);
    let (left, right) = if left_items.len() + right_items.len() > PARALLEL_THRESHOLD {
        rayon::join(
            || build_node(left_items, config, depth + 1),
            || build_node(right_items, config, depth + 1),
        )
    } else {
        (
            build_node(left_items, config, depth + 1),
            build_node(right_items, config, depth + 1),
        )
    };

    BvhNode::Branch {
        left: Box::new(left),
        right: Box::new(right),
        bbox,
    }
}

/// Move items matching `pred` to the front, returning how many matched.
fn partition(items: &mut [BuildItem], pred: impl Fn(&BuildItem) -> bool) -> usize {
    let mut first = 0;
    for i in 0..items.len() {
        if pred(&items[i]) {
            items.swap(first, i);
            first += 1;
        }
    }
    first
}

fn split_equal(items: &mut [BuildItem], axis: usize) -> usize {
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
    mid
}

fn split_middle(items: &mut [BuildItem], axis: usize, centroid_bounds: &Aabb) -> usize {
    let extent = centroid_bounds.axis_interval(axis);
    let pivot = 0.5 * (extent.min + extent.max);
    let mid = partition(items, |item| item.centroid[axis] < pivot);

    if mid == 0 || mid == items.len() {
        split_equal(items, axis)
    } else {
        mid
    }
}

fn split_sah(items: &mut [BuildItem], axis: usize, centroid_bounds: &Aabb, bbox: &Aabb) -> usize {
    let area = bbox.area();
    if area <= 0.0 {
        return split_equal(items, axis);
    }

    let extent = centroid_bounds.axis_interval(axis);
    let bin_of = |c: f32| -> usize {
        let b = ((c - extent.min) / extent.size() * SAH_BINS as f32) as usize;
        b.min(SAH_BINS - 1)
    };

    let mut counts = [0usize; SAH_BINS];
    let mut boxes = [Aabb::EMPTY; SAH_BINS];
    for item in items.iter() {
        let b = bin_of(item.centroid[axis]);
        counts[b] += 1;
        boxes[b].enclose(&item.bounds);
    }

    // Sweep from the right so each split's right side is available in O(1).
    let mut right_area = [0.0f32; SAH_BINS];
    let mut right_count = [0usize; SAH_BINS];
    let mut acc_box = Aabb::EMPTY;
    let mut acc_count = 0;
    for b in (1..SAH_BINS).rev() {
        acc_box.enclose(&boxes[b]);
        acc_count += counts[b];
        right_area[b] = acc_box.area();
        right_count[b] = acc_count;
    }

    let mut best: Option<(usize, f32)> = None;
    let mut left_box = Aabb::EMPTY;
    let mut left_count = 0;
    for split in 1..SAH_BINS {
        left_box.enclose(&boxes[split - 1]);
        left_count += counts[split - 1];
        if left_count == 0 || right_count[split] == 0 {
            continue;
        }

        let cost = SAH_TRAVERSAL_COST
            + (left_count as f32 * left_box.area() + right_count[split] as f32 * right_area[split])
                / area;
        if best.map_or(true, |(_, c)| cost < c) {
            best = Some((split, cost));
        }
    }

    match best {
        Some((split, _)) => partition(items, |item| bin_of(item.centroid[axis]) < split),
        None => split_equal(items, axis),
    }
}

/// A built, immutable BVH.
pub struct Bvh {
    xform: Transform,
    root: Option<BvhNode>,
    bounds: Aabb,
    len: usize,
    nodes: usize,
    leaves: usize,
    depth: usize,
}

impl Bvh {
    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Number of surfaces in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Surface for Bvh {
    fn intersect<'a>(&'a self, ray: &Ray, hit: &mut HitInfo<'a>) -> bool {
        let Some(root) = self.root.as_ref() else {
            return false;
        };

        let identity = self.xform.is_identity();
        let mut local = if identity {
            *ray
        } else {
            self.xform.inverse_ray(ray)
        };

        let Some(entry) = root.bbox().intersect_segment(&local) else {
            return false;
        };

        // Each branch pops one entry and pushes at most two, so the stack
        // never holds more than one entry per level.
        let mut stack: [(&BvhNode, f32); MAX_DEPTH] = [(root, 0.0); MAX_DEPTH];
        stack[0] = (root, entry.min);
        let mut top = 1;
        let mut hit_anything = false;

        while top > 0 {
            top -= 1;
            let (node, tentry) = stack[top];

            // A closer hit was found since this node was pushed
            if tentry > local.maxt {
                continue;
            }
            stats::increment(Counter::BvhNodesVisited);

            match node {
                BvhNode::Leaf { surfaces, .. } => {
                    for surface in surfaces {
                        if surface.intersect(&local, hit) {
                            hit_anything = true;
                            local.maxt = hit.t;
                        }
                    }
                }
                BvhNode::Branch { left, right, .. } => {
                    let left_t = left.bbox().intersect_segment(&local);
                    let right_t = right.bbox().intersect_segment(&local);

                    match (left_t, right_t) {
                        (Some(lt), Some(rt)) => {
                            // Push the far child first so the near one is popped next
                            let (near, near_t, far, far_t) = if lt.min <= rt.min {
                                (left, lt.min, right, rt.min)
                            } else {
                                (right, rt.min, left, lt.min)
                            };
                            stack[top] = (far.as_ref(), far_t);
                            stack[top + 1] = (near.as_ref(), near_t);
                            top += 2;
                        }
                        (Some(lt), None) => {
                            stack[top] = (left.as_ref(), lt.min);
                            top += 1;
                        }
                        (None, Some(rt)) => {
                            stack[top] = (right.as_ref(), rt.min);
                            top += 1;
                        }
                        (None, None) => {}
                    }
                }
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
