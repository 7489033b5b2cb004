//! Errors raised while building a scene.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while constructing a scene from its description.
///
/// All of these are fatal: construction aborts and nothing is rendered.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field '{field}' in:\n{fragment}")]
    MissingField { field: String, fragment: String },

    #[error("invalid value for '{field}': {message}\n{fragment}")]
    InvalidValue {
        field: String,
        message: String,
        fragment: String,
    },

    #[error("unknown {kind} type '{name}' in:\n{fragment}")]
    UnknownType {
        kind: &'static str,
        name: String,
        fragment: String,
    },

    #[error("{kind} type '{name}' is already registered")]
    DuplicateType { kind: &'static str, name: String },

    #[error("cannot find a material named '{0}'")]
    UnknownMaterial(String),

    #[error("material '{0}' is defined more than once")]
    DuplicateMaterial(String),

    #[error("unsupported top-level field '{0}'")]
    UnsupportedField(String),

    #[error("transform is singular or not finite:\n{fragment}")]
    SingularTransform { fragment: String },

    #[error("cannot find file '{0}'")]
    FileNotFound(String),

    #[error("failed to load OBJ file '{path}': {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("mesh '{0}' contains no triangles")]
    EmptyMesh(PathBuf),
}

/// Result type for scene construction.
pub type SceneResult<T> = Result<T, SceneError>;

impl SceneError {
    pub fn missing(field: &str, j: &Value) -> Self {
        SceneError::MissingField {
            field: field.to_string(),
            fragment: fragment(j),
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>, j: &Value) -> Self {
        SceneError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
            fragment: fragment(j),
        }
    }

    pub fn unknown_type(kind: &'static str, name: &str, j: &Value) -> Self {
        SceneError::UnknownType {
            kind,
            name: name.to_string(),
            fragment: fragment(j),
        }
    }
}

/// Pretty-printed JSON, used to show the offending part of a scene file.
pub fn fragment(j: &Value) -> String {
    serde_json::to_string_pretty(j).unwrap_or_else(|_| j.to_string())
}
