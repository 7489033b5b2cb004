//! Tern Core - scene description plumbing shared by the renderer.
//!
//! This crate provides:
//!
//! - **Errors**: `SceneError`, raised while turning a scene description into
//!   renderable objects
//! - **JSON helpers**: typed field access and transform parsing
//! - **Mesh data**: triangle meshes loaded from Wavefront OBJ files
//! - **File resolution**: search paths for assets referenced by scenes
//!
//! # Example
//!
//! ```ignore
//! use tern_core::{json, Mesh};
//!
//! let xform = json::transform_or_identity(&value, "transform")?;
//! let mesh = Mesh::load_obj("bunny.obj", &xform)?;
//! println!("{} triangles", mesh.triangle_count());
//! ```

pub mod error;
pub mod json;
pub mod mesh;
pub mod resolver;

// Re-export commonly used types
pub use error::{SceneError, SceneResult};
pub use mesh::Mesh;
pub use resolver::FileResolver;
