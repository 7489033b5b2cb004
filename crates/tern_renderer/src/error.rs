//! Render-time errors.

use tern_core::SceneError;
use thiserror::Error;

/// Errors returned by the render driver.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Render cancelled")]
    Cancelled,

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
