//! Error types for MP2RAGE processing

use thiserror::Error;

/// Result type for MP2RAGE operations
pub type Result<T> = std::result::Result<T, Mp2rageError>;

/// Errors surfaced to callers before any voxel is processed.
///
/// Voxels whose unified value cannot be inverted are not errors: they are
/// clamped and flagged (see [`crate::inversion::InversionStatus`]).
#[derive(Error, Debug)]
pub enum Mp2rageError {
    /// Input arrays disagree in length or shape
    #[error("Shape mismatch for '{name}': expected {expected:?}, got {found:?}")]
    InvalidShape {
        name: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Non-physical or infeasible acquisition parameters
    #[error("Invalid acquisition parameters: {0}")]
    InvalidParameters(String),

    /// Bad inversion or masking configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed JSON parameter file
    #[error("Failed to parse parameters: {0}")]
    Config(#[from] serde_json::Error),
}

impl Mp2rageError {
    pub(crate) fn length_mismatch(name: &'static str, expected: usize, found: usize) -> Self {
        Mp2rageError::InvalidShape {
            name,
            expected: vec![expected],
            found: vec![found],
        }
    }
}
