#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a Newton step is shortened when the full step is not acceptable.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSearch {
    /// Always take the full step.
    ///
    /// A trial point whose residual cannot be evaluated still ends the solve.
    FullStep,

    /// Shrink the step by `factor` until the residual decreases enough.
    ///
    /// A step of length `λ` is accepted when
    /// `‖F(x + λΔx)‖₂ ≤ (1 - 10⁻⁴ λ) ‖F(x)‖₂`.
    Backtrack { max_reductions: usize, factor: f64 },
}

/// Errors that can occur when validating a line search.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchError {
    #[error("backtracking factor must lie strictly between 0 and 1")]
    Factor,
}

impl Default for LineSearch {
    fn default() -> Self {
        Self::Backtrack {
            max_reductions: 8,
            factor: 0.5,
        }
    }
}

impl LineSearch {
    /// Sufficient decrease constant.
    pub(super) const ARMIJO: f64 = 1e-4;

    pub(super) fn validate(self) -> Result<Self, LineSearchError> {
        match self {
            Self::Backtrack { factor, .. }
                if factor.is_nan() || factor <= 0.0 || factor >= 1.0 =>
            {
                Err(LineSearchError::Factor)
            }
            _ => Ok(self),
        }
    }

    /// Returns the number of step reductions allowed after the full step.
    pub(super) fn max_reductions(self) -> usize {
        match self {
            Self::FullStep => 0,
            Self::Backtrack { max_reductions, .. } => max_reductions,
        }
    }

    /// Returns true if a trial residual norm is acceptable.
    pub(super) fn accepts(self, step_length: f64, norm: f64, trial_norm: f64) -> bool {
        match self {
            Self::FullStep => true,
            Self::Backtrack { .. } => trial_norm <= (1.0 - Self::ARMIJO * step_length) * norm,
        }
    }

    /// Returns the next step length after a rejection.
    pub(super) fn reduce(self, step_length: f64) -> f64 {
        match self {
            Self::FullStep => step_length,
            Self::Backtrack { factor, .. } => step_length * factor,
        }
    }
}
