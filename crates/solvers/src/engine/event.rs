use nalgebra::DVector;

use crate::{adapter::EvalError, convergence::TestStatus, linear::LinearSolve};

/// Events emitted by a nonlinear engine.
#[derive(Debug)]
pub enum Event<'a> {
    /// The convergence criteria were checked at an accepted iterate.
    ///
    /// Emitted once at the initial guess and once after every accepted step.
    Evaluated {
        /// Completed Newton steps.
        iter: usize,

        /// The current iterate.
        x: &'a DVector<f64>,

        /// Two-norm of the residual at `x`.
        residual_norm: f64,

        /// Outcome of the convergence check.
        status: TestStatus,
    },

    /// The Newton step's linear system was solved.
    LinearSolved { iter: usize, solve: LinearSolve },

    /// A trial step was rejected.
    StepRejected {
        iter: usize,

        /// The step length that was tried.
        step_length: f64,

        /// The evaluation error, or `None` if the residual did not decrease
        /// enough.
        error: Option<&'a EvalError>,
    },
}

impl Event<'_> {
    /// Returns the number of completed Newton steps when the event occurred.
    #[must_use]
    pub fn iter(&self) -> usize {
        match self {
            Self::Evaluated { iter, .. }
            | Self::LinearSolved { iter, .. }
            | Self::StepRejected { iter, .. } => *iter,
        }
    }
}
