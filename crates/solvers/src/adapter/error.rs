use std::error::Error as StdError;

use newtonkit_core::{PatternError, PreconditionerError};
use thiserror::Error;

/// Errors that can occur when the engine calls back into a problem.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("expected a vector of length {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("residual evaluation failed")]
    Residual(#[source] Box<dyn StdError + Send + Sync>),

    #[error("residual component {index} is not finite")]
    NonFiniteResidual { index: usize },

    #[error("jacobian assembly failed")]
    Jacobian(#[source] Box<dyn StdError + Send + Sync>),

    #[error("invalid jacobian pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("preconditioner requested before the jacobian was assembled")]
    MissingJacobian,

    #[error("preconditioner computation failed")]
    Preconditioner(#[source] PreconditionerError),

    #[error("shared preconditioner lock is poisoned")]
    PoisonedPreconditioner,
}

impl EvalError {
    /// Wraps a problem error raised while evaluating the residual.
    pub fn residual<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Residual(Box::new(err))
    }

    /// Wraps a problem error raised while assembling the Jacobian.
    pub fn jacobian<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Jacobian(Box::new(err))
    }
}
