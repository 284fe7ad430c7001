/// The terminal state of a nonlinear solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Converged according to the configured criteria.
    Converged,

    /// Reached the iteration cap without converging.
    MaxIters,

    /// Stopped because a step could not be computed or accepted.
    Failed(Failure),

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

impl Status {
    /// Returns true if the solve converged.
    #[must_use]
    pub fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Why a nonlinear solve failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The residual could not be evaluated at the initial guess.
    ResidualEvaluation,

    /// The Jacobian could not be assembled.
    JacobianEvaluation,

    /// The preconditioner could not be computed.
    PreconditionerEvaluation,

    /// The linear solver broke down or found the Jacobian singular.
    LinearSolve,

    /// No trial step was accepted.
    LineSearch,

    /// The residual norm is not finite.
    NonFiniteResidual,
}
