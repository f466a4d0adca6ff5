//! Learning-specific error types

use thiserror::Error;

/// Errors that can occur when building or querying a learner
#[derive(Debug, Error)]
pub enum LearningError {
    /// No action can be chosen from the given state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A table, row or mask has the wrong shape
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type for learning operations
pub type LearningResult<T> = Result<T, LearningError>;
