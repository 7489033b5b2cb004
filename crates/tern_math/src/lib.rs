// Re-export glam for convenience
pub use glam::*;

// Tern math types
mod aabb;
mod interval;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::{Ray, RAY_EPSILON};
pub use transform::{Mat4Ext, Transform};
