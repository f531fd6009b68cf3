//! Error types for the pvs-eval library.

use crate::types::Shape;
use thiserror::Error;

/// Result type for pvs-eval operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types that can occur while loading volumes or computing metrics.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Two volumes that must be compared voxel-by-voxel differ in shape.
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch { expected: Shape, found: Shape },

    /// A metric denominator is zero (e.g. AVD against an empty ground truth).
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Data that cannot be turned into a 3D binary volume.
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    /// Image file that is not a supported NIfTI-1 variant.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Case identifier that no configured site rule matches.
    #[error("Unknown case: {0}")]
    UnknownCase(String),

    /// Invalid configuration values.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error during TOML parsing.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EvalError {
    /// Build a `ShapeMismatch` from the two offending shapes.
    pub fn shape_mismatch(expected: Shape, found: Shape) -> Self {
        EvalError::ShapeMismatch { expected, found }
    }
}
