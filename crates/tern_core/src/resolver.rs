//! Locating files referenced from a scene description.

use std::path::{Path, PathBuf};

use crate::error::{SceneError, SceneResult};

/// Ordered list of directories searched for relative asset paths.
///
/// Paths that exist as given (absolute, or relative to the working
/// directory) are returned unchanged.
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    search_paths: Vec<PathBuf>,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory searched before the ones already registered.
    pub fn prepend(&mut self, dir: impl Into<PathBuf>) {
        self.search_paths.insert(0, dir.into());
    }

    /// Add a directory searched after the ones already registered.
    pub fn append(&mut self, dir: impl Into<PathBuf>) {
        self.search_paths.push(dir.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn resolve(&self, name: &str) -> SceneResult<PathBuf> {
        let path = Path::new(name);
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if path.is_relative() {
            for dir in &self.search_paths {
                let candidate = dir.join(path);
                if candidate.exists() {
                    log::debug!("Resolved '{}' to {}", name, candidate.display());
                    return Ok(candidate);
                }
            }
        }
        Err(SceneError::FileNotFound(name.to_string()))
    }
}
