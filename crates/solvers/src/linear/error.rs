use thiserror::Error;

use super::Method;

/// Errors that can occur during an inner linear solve.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinearError {
    #[error("dimension mismatch: operator has dimension {expected}, vector has {actual} entries")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{method} broke down at iteration {iter}")]
    Breakdown { method: Method, iter: usize },

    #[error("matrix is singular")]
    Singular,

    #[error("non-finite value encountered in {method}")]
    NonFinite { method: Method },
}
