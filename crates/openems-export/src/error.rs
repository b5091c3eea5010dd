use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the scene snapshot
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Failed to parse scene: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read scene file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Vertex index {index} out of range ({count} vertices)")]
    BadVertexIndex { index: usize, count: usize },

    #[error("Face {face} does not exist")]
    BadFace { face: usize },

    #[error("Edge {edge} does not exist")]
    BadEdge { edge: usize },

    #[error("Modifier evaluation failed: {0}")]
    Evaluation(String),

    #[error("Vertex group '{group}' has {found} weights for {expected} vertices")]
    GroupLength {
        group: String,
        expected: usize,
        found: usize,
    },
}

/// Errors in procedural attribute channels
#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("Channel '{name}' is required but missing")]
    Missing { name: String },

    #[error("Channel '{name}' must accompany '{with}'")]
    MissingCompanion { name: String, with: String },

    #[error("Channel '{name}' has {found} values, expected {expected}")]
    Length {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Channel '{name}' holds {found} data, expected {expected}")]
    Type {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Channel '{name}' is on the {found} domain, expected {expected}")]
    Domain {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Channel '{name}' has invalid value at {index}: {reason}")]
    Value {
        name: String,
        index: usize,
        reason: String,
    },
}

/// Errors from the solid round trip
#[derive(Error, Debug)]
pub enum SolidError {
    #[error("Solid '{0}' has no faces")]
    Empty(String),

    #[error("Solid '{name}' references a missing vertex: {source}")]
    Mesh { name: String, source: SceneError },

    #[error("Failed to write solid {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read back solid {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-object export failures; the object is skipped and compile continues
#[derive(Error, Debug)]
pub enum ObjectError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Solid(#[from] SolidError),

    #[error("Object has no geometry to take a bounding box from")]
    NoBoundingBox,

    #[error("Object has no faces")]
    NoFaces,
}

/// Errors that abort a whole compile
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Scene provider failed: {0}")]
    Scene(#[from] SceneError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Rejected configuration values
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("max_res must be positive and finite, got {0}")]
    MaxRes(f64),

    #[error("ratio must be greater than 1 and finite, got {0}")]
    Ratio(f64),

    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("max_timesteps must be at least 1")]
    MaxTimesteps,
}
