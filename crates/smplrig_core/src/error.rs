//! Error types for smplrig-core.

use crate::common::types::SmplVariant;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by model loading, sequence binding and mesh export.
///
/// The forward pass itself has no failure modes: every shape is fixed by the
/// model configuration when a `Body` is constructed.
#[derive(Debug, Error)]
pub enum SmplError {
    /// Model or sequence path does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// A required array is absent from the archive.
    #[error("required array `{name}` missing from archive")]
    MissingField { name: String },

    /// An array disagrees with the shape the model configuration expects.
    #[error("array `{name}` has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// An array stores elements that are neither 4 nor 8 bytes wide.
    #[error("array `{name}` has an unsupported scalar width (expected 4 or 8 byte elements)")]
    UnsupportedScalarWidth { name: String },

    /// A sequence was bound to a model variant it cannot drive.
    #[error("sequence binding is not supported for {0}")]
    UnsupportedVariantBinding(SmplVariant),

    /// The UV side-car file could not be parsed.
    #[error("uv file parse error: {0}")]
    UvParse(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("npz read error: {0}")]
    Npz(#[from] ndarray_npy::ReadNpzError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_names_the_offender() {
        let err = SmplError::ShapeMismatch {
            name: "v_template".into(),
            expected: vec![10475, 3],
            got: vec![6890, 3],
        };
        let msg = err.to_string();
        assert!(msg.contains("v_template"));
        assert!(msg.contains("6890"));
    }

    #[test]
    fn unsupported_binding_names_the_variant() {
        let err = SmplError::UnsupportedVariantBinding(SmplVariant::SmplXPca);
        assert!(err.to_string().contains("SmplXPca"));
    }
}
